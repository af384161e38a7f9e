//! Contribution-calendar scraping.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use chrono::{Days, NaiveDate};
use regex::Regex;

use crate::error::UpstreamError;
use crate::github::GithubSource;
use crate::models::{ContributionsBody, DailyCount};

pub const CONTRIBUTIONS_UNAVAILABLE: &str = "Unable to load contributions right now.";
pub const NO_CONTRIBUTIONS: &str = "No contribution data available.";

/// `(today - lookback_days, today)`, both inclusive.
pub fn contribution_range(today: NaiveDate, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    let from = today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN);
    (from, today)
}

/// Extract `(date, count)` pairs from day markers in the calendar markup.
///
/// A marker is a `<rect>` or `<td>` element carrying both `data-date` and
/// `data-count`, in either order. Markers that do not parse, or fall outside
/// `[from, to]`, are skipped. The first marker for a given date wins.
pub fn parse_contribution_calendar(markup: &str, from: NaiveDate, to: NaiveDate) -> Vec<DailyCount> {
    let (Ok(marker_re), Ok(date_re), Ok(count_re)) = (
        Regex::new(r"(?i)<(?:rect|td)\b[^>]*>"),
        Regex::new(r#"\bdata-date="([^"]+)""#),
        Regex::new(r#"\bdata-count="(\d+)""#),
    ) else {
        return Vec::new();
    };

    let mut days: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for marker in marker_re.find_iter(markup) {
        let tag = marker.as_str();
        let date = date_re
            .captures(tag)
            .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok());
        let count = count_re.captures(tag).and_then(|c| c[1].parse::<u32>().ok());

        if let (Some(date), Some(count)) = (date, count) {
            if date >= from && date <= to {
                days.entry(date).or_insert(count);
            }
        }
    }

    days.into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

/// Endpoint result: the body always has the same shape, only the status varies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionsOutcome {
    pub status: StatusCode,
    pub body: ContributionsBody,
}

impl ContributionsOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

pub async fn fetch_contributions(
    source: &dyn GithubSource,
    username: &str,
    today: NaiveDate,
    lookback_days: u32,
) -> ContributionsOutcome {
    let (from, to) = contribution_range(today, lookback_days);
    let empty = ContributionsBody {
        days: Vec::new(),
        total: 0,
        from,
        to,
    };

    match source.contribution_markup(username, from, to).await {
        Ok(markup) => {
            let days = parse_contribution_calendar(&markup, from, to);
            let total = days.iter().map(|d| u64::from(d.count)).sum();
            tracing::debug!("Parsed {} contribution days ({} total)", days.len(), total);
            ContributionsOutcome {
                status: StatusCode::OK,
                body: ContributionsBody { days, total, from, to },
            }
        }
        Err(e) => {
            tracing::warn!("Contribution calendar unavailable for {}: {}", username, e);
            let status = match &e {
                UpstreamError::Status(code) => StatusCode::from_u16(code.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            ContributionsOutcome { status, body: empty }
        }
    }
}
