//! Public-event aggregation for the activity heatmap.
//!
//! Events are folded into a fixed window of UTC calendar days. The window is
//! created up front and never grows: anything dated outside it is dropped.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::github::GithubSource;
use crate::models::{
    ActivityEvent, ActivitySummary, ActivityType, DailyCount, RecentActivityItem, RecentCommit,
};

pub const RECENT_LIMIT: usize = 10;
pub const PULL_REQUEST_WEIGHT: u32 = 2;
pub const ISSUE_WEIGHT: u32 = 2;
pub const OTHER_WEIGHT: u32 = 1;

pub const ACTIVITY_UNAVAILABLE: &str = "Live activity is currently unavailable.";

/// Contiguous, ascending run of days ending at the reference day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySeries {
    days: Vec<DailyCount>,
}

impl DailySeries {
    pub fn days(&self) -> &[DailyCount] {
        &self.days
    }

    pub fn into_days(self) -> Vec<DailyCount> {
        self.days
    }

    pub fn total(&self) -> u64 {
        self.days.iter().map(|d| u64::from(d.count)).sum()
    }

    fn slot_mut(&mut self, date: NaiveDate) -> Option<&mut DailyCount> {
        let start = self.days.first()?.date;
        let offset = usize::try_from(date.signed_duration_since(start).num_days()).ok()?;
        self.days.get_mut(offset)
    }
}

/// Zeroed series of `window_days` days, the last one being `reference`.
pub fn build_daily_series(window_days: u32, reference: NaiveDate) -> DailySeries {
    if window_days == 0 {
        return DailySeries::default();
    }
    let Some(start) = reference.checked_sub_days(Days::new(u64::from(window_days) - 1)) else {
        return DailySeries::default();
    };
    let days = start
        .iter_days()
        .take(window_days as usize)
        .map(|date| DailyCount { date, count: 0 })
        .collect();
    DailySeries { days }
}

/// Summary, feed and commit list produced by one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulation {
    pub summary: ActivitySummary,
    pub recent: Vec<RecentActivityItem>,
    pub recent_commits: Vec<RecentCommit>,
}

/// Classify `events` and add their weight to `series` in place.
/// Links to repositories and commits are built under `web_base`.
pub fn classify_and_accumulate(
    events: &[ActivityEvent],
    series: &mut DailySeries,
    web_base: &str,
) -> Accumulation {
    let web = web_base.trim_end_matches('/');
    let mut acc = Accumulation::default();

    for event in events {
        let Some(created_at) = event.timestamp() else {
            tracing::debug!("Skipping event without a usable timestamp: {:?}", event.id);
            continue;
        };
        let Some(slot) = series.slot_mut(created_at.date_naive()) else {
            continue;
        };

        let Some(kind) = event.activity_type() else {
            slot.count = slot.count.saturating_add(OTHER_WEIGHT);
            continue;
        };

        let repo = event.repo_name().unwrap_or("unknown").to_string();
        let payload = event.payload.clone().unwrap_or_default();

        let (weight, action, url) = match kind {
            ActivityType::Commit => {
                let commits = payload.commits.as_deref().unwrap_or_default();
                let size = payload
                    .size
                    .filter(|s| *s > 0)
                    .unwrap_or(commits.len() as u32)
                    .max(1);
                acc.summary.commits = acc.summary.commits.saturating_add(size);

                for (index, commit) in commits.iter().enumerate() {
                    if acc.recent_commits.len() >= RECENT_LIMIT {
                        break;
                    }
                    let sha = commit.sha.clone().unwrap_or_default();
                    let message = commit
                        .message
                        .as_deref()
                        .and_then(|m| m.lines().next())
                        .unwrap_or("")
                        .to_string();
                    let url = if sha.is_empty() {
                        format!("{}/{}", web, repo)
                    } else {
                        format!("{}/{}/commit/{}", web, repo, sha)
                    };
                    let id = if sha.is_empty() {
                        format!("{}-{}", event_id(event), index)
                    } else {
                        sha
                    };
                    acc.recent_commits.push(RecentCommit {
                        id,
                        repo: repo.clone(),
                        message,
                        created_at,
                        url,
                    });
                }

                let label = if size == 1 {
                    "1 commit pushed".to_string()
                } else {
                    format!("{} commits pushed", size)
                };
                (size, label, format!("{}/{}", web, repo))
            }
            ActivityType::PullRequest => {
                acc.summary.pull_requests = acc.summary.pull_requests.saturating_add(1);
                let action = labelled("PR", payload.action.as_deref());
                let url = payload
                    .pull_request
                    .and_then(|pr| pr.html_url)
                    .unwrap_or_else(|| format!("{}/{}", web, repo));
                (PULL_REQUEST_WEIGHT, action, url)
            }
            ActivityType::Issue => {
                acc.summary.issues = acc.summary.issues.saturating_add(1);
                let action = labelled("Issue", payload.action.as_deref());
                let url = payload
                    .issue
                    .and_then(|issue| issue.html_url)
                    .unwrap_or_else(|| format!("{}/{}", web, repo));
                (ISSUE_WEIGHT, action, url)
            }
        };

        slot.count = slot.count.saturating_add(weight);

        if acc.recent.len() < RECENT_LIMIT {
            acc.recent.push(RecentActivityItem {
                id: event_id(event),
                kind,
                repo,
                action,
                created_at,
                url,
            });
        }
    }

    acc
}

fn labelled(prefix: &str, action: Option<&str>) -> String {
    match action.map(str::trim).filter(|a| !a.is_empty()) {
        Some(action) => format!("{} {}", prefix, action),
        None => format!("{} activity", prefix),
    }
}

fn event_id(event: &ActivityEvent) -> String {
    event
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Everything the activity panel renders from the events feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPayload {
    pub daily: Vec<DailyCount>,
    pub summary: ActivitySummary,
    pub recent: Vec<RecentActivityItem>,
    pub recent_commits: Vec<RecentCommit>,
}

impl ActivityPayload {
    /// An empty daily series means "unavailable", never "no activity".
    pub fn is_available(&self) -> bool {
        !self.daily.is_empty()
    }
}

pub fn aggregate(
    events: &[ActivityEvent],
    window_days: u32,
    reference: NaiveDate,
    web_base: &str,
) -> ActivityPayload {
    let mut series = build_daily_series(window_days, reference);
    let acc = classify_and_accumulate(events, &mut series, web_base);
    tracing::debug!(
        "Aggregated {} events into {} days ({} activities)",
        events.len(),
        series.days().len(),
        series.total()
    );
    ActivityPayload {
        daily: series.into_days(),
        summary: acc.summary,
        recent: acc.recent,
        recent_commits: acc.recent_commits,
    }
}

/// Fetch public events and aggregate them; any upstream failure yields an empty payload.
pub async fn load_activity(
    source: &dyn GithubSource,
    username: &str,
    window_days: u32,
    reference: NaiveDate,
    web_base: &str,
) -> ActivityPayload {
    match source.public_events(username).await {
        Ok(events) => {
            tracing::debug!("Fetched {} public events for {}", events.len(), username);
            aggregate(&events, window_days, reference, web_base)
        }
        Err(e) => {
            tracing::warn!("Public events unavailable for {}: {}", username, e);
            ActivityPayload::default()
        }
    }
}

/// One heatmap cell with its intensity bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphDay {
    pub date: NaiveDate,
    pub count: u32,
    pub level: u8,
}

/// Bucket 0..=4, saturating at eight activities a day.
pub fn heat_level(count: u32) -> u8 {
    if count == 0 {
        return 0;
    }
    let intensity = (f64::from(count) / 8.0).min(1.0);
    if intensity < 0.3 {
        1
    } else if intensity < 0.55 {
        2
    } else if intensity < 0.8 {
        3
    } else {
        4
    }
}

/// Prefer the contribution calendar; fall back to the event-based series.
pub fn select_graph(contributions: &[DailyCount], activity: &[DailyCount]) -> Vec<GraphDay> {
    let source = if contributions.is_empty() {
        activity
    } else {
        contributions
    };
    source
        .iter()
        .map(|day| GraphDay {
            date: day.date,
            count: day.count,
            level: heat_level(day.count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventPayload, EventRepo, LinkedItem, PushCommit};

    const WEB: &str = "https://github.com";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(kind: &str, created_at: &str, payload: EventPayload) -> ActivityEvent {
        ActivityEvent {
            id: Some(format!("{}-{}", kind, created_at)),
            kind: Some(kind.to_string()),
            repo: Some(EventRepo {
                name: Some("albanbyaugisha/portfolio".to_string()),
            }),
            created_at: Some(created_at.to_string()),
            payload: Some(payload),
        }
    }

    fn push(created_at: &str, size: u32) -> ActivityEvent {
        let commits = (0..size)
            .map(|i| PushCommit {
                sha: Some(format!("sha{}", i)),
                message: Some(format!("commit {}\n\nbody", i)),
            })
            .collect();
        event(
            "PushEvent",
            created_at,
            EventPayload {
                size: Some(size),
                commits: Some(commits),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_series_is_contiguous_and_ends_at_reference() {
        for window in [1u32, 7, 84, 365] {
            let series = build_daily_series(window, day(2026, 3, 1));
            assert_eq!(series.days().len(), window as usize);
            assert_eq!(series.days().last().unwrap().date, day(2026, 3, 1));
            for pair in series.days().windows(2) {
                assert_eq!(pair[0].date.succ_opt().unwrap(), pair[1].date);
            }
            assert!(series.days().iter().all(|d| d.count == 0));
        }
    }

    #[test]
    fn test_series_crosses_leap_day() {
        let series = build_daily_series(3, day(2024, 3, 1));
        let dates: Vec<_> = series.days().iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![day(2024, 2, 28), day(2024, 2, 29), day(2024, 3, 1)]);
    }

    #[test]
    fn test_zero_window_is_empty() {
        assert!(build_daily_series(0, day(2026, 3, 1)).days().is_empty());
    }

    #[test]
    fn test_single_push_of_three_commits() {
        let today = day(2026, 10, 15);
        let payload = aggregate(&[push("2026-10-15T09:30:00Z", 3)], 84, today, WEB);

        assert_eq!(payload.daily.len(), 84);
        assert_eq!(payload.summary.commits, 3);
        assert_eq!(payload.daily.last().unwrap().count, 3);
        assert_eq!(payload.recent.len(), 1);
        assert_eq!(payload.recent[0].action, "3 commits pushed");
        assert_eq!(payload.recent[0].kind, ActivityType::Commit);
        assert_eq!(payload.recent_commits.len(), 3);
        assert_eq!(payload.recent_commits[0].message, "commit 0");
        assert_eq!(
            payload.recent_commits[0].url,
            "https://github.com/albanbyaugisha/portfolio/commit/sha0"
        );
    }

    #[test]
    fn test_links_follow_configured_web_base() {
        let today = day(2026, 10, 15);
        let payload = aggregate(
            &[push("2026-10-15T09:30:00Z", 1)],
            7,
            today,
            "https://ghe.example.com/",
        );
        assert_eq!(payload.recent[0].url, "https://ghe.example.com/albanbyaugisha/portfolio");
        assert_eq!(
            payload.recent_commits[0].url,
            "https://ghe.example.com/albanbyaugisha/portfolio/commit/sha0"
        );
    }

    #[test]
    fn test_push_without_size_counts_one() {
        let mut series = build_daily_series(7, day(2026, 10, 15));
        let ev = event("PushEvent", "2026-10-14T10:00:00Z", EventPayload::default());
        let acc = classify_and_accumulate(&[ev], &mut series, WEB);
        assert_eq!(acc.summary.commits, 1);
        assert_eq!(acc.recent[0].action, "1 commit pushed");
        assert_eq!(series.total(), 1);
    }

    #[test]
    fn test_pull_requests_and_issues_weigh_two() {
        let mut series = build_daily_series(7, day(2026, 10, 15));
        let events = vec![
            event(
                "PullRequestEvent",
                "2026-10-13T10:00:00Z",
                EventPayload {
                    action: Some("opened".to_string()),
                    pull_request: Some(LinkedItem {
                        html_url: Some("https://github.com/a/b/pull/4".to_string()),
                    }),
                    ..Default::default()
                },
            ),
            event("IssuesEvent", "2026-10-13T11:00:00Z", EventPayload::default()),
            event("WatchEvent", "2026-10-13T12:00:00Z", EventPayload::default()),
        ];
        let acc = classify_and_accumulate(&events, &mut series, WEB);

        assert_eq!(
            acc.summary,
            ActivitySummary {
                commits: 0,
                pull_requests: 1,
                issues: 1
            }
        );
        assert_eq!(series.total(), 5);
        assert_eq!(acc.recent.len(), 2);
        assert_eq!(acc.recent[0].action, "PR opened");
        assert_eq!(acc.recent[0].url, "https://github.com/a/b/pull/4");
        assert_eq!(acc.recent[1].action, "Issue activity");
    }

    #[test]
    fn test_events_outside_window_are_dropped() {
        let mut series = build_daily_series(7, day(2026, 10, 15));
        let events = vec![
            push("2026-10-01T10:00:00Z", 2),
            push("2026-10-16T00:00:01Z", 2),
            event("IssuesEvent", "not a date", EventPayload::default()),
        ];
        let acc = classify_and_accumulate(&events, &mut series, WEB);
        assert_eq!(acc, Accumulation::default());
        assert_eq!(series.days().len(), 7);
        assert_eq!(series.total(), 0);
    }

    #[test]
    fn test_utc_day_boundary_uses_utc() {
        let mut series = build_daily_series(2, day(2026, 10, 15));
        // 23:30 at UTC-5 is already the next UTC day.
        let ev = push("2026-10-14T23:30:00-05:00", 1);
        classify_and_accumulate(&[ev], &mut series, WEB);
        assert_eq!(series.days()[0].count, 0);
        assert_eq!(series.days()[1].count, 1);
    }

    #[test]
    fn test_feed_is_capped_but_counts_continue() {
        let mut series = build_daily_series(30, day(2026, 10, 15));
        let events: Vec<_> = (0..25)
            .map(|i| event("IssuesEvent", &format!("2026-10-{:02}T08:00:00Z", 1 + i % 15), EventPayload::default()))
            .collect();
        let acc = classify_and_accumulate(&events, &mut series, WEB);
        assert_eq!(acc.recent.len(), RECENT_LIMIT);
        assert_eq!(acc.summary.issues, 25);
        assert_eq!(series.total(), 50);
    }

    #[test]
    fn test_empty_batch_leaves_everything_zero() {
        let mut series = build_daily_series(84, day(2026, 10, 15));
        let acc = classify_and_accumulate(&[], &mut series, WEB);
        assert_eq!(acc.summary, ActivitySummary::default());
        assert!(acc.recent.is_empty());
        assert_eq!(series.total(), 0);
    }

    #[test]
    fn test_daily_total_covers_weighted_summary() {
        let mut series = build_daily_series(14, day(2026, 10, 15));
        let mut events = vec![push("2026-10-10T10:00:00Z", 4), push("2026-10-11T10:00:00Z", 0)];
        events.push(event("PullRequestEvent", "2026-10-12T10:00:00Z", EventPayload::default()));
        events.push(event("ForkEvent", "2026-10-12T10:00:00Z", EventPayload::default()));
        let acc = classify_and_accumulate(&events, &mut series, WEB);
        let weighted = u64::from(acc.summary.commits)
            + u64::from(acc.summary.pull_requests) * 2
            + u64::from(acc.summary.issues) * 2;
        assert!(series.total() >= weighted);
        assert_eq!(series.total(), weighted + 1);
    }

    #[test]
    fn test_heat_levels() {
        assert_eq!(heat_level(0), 0);
        assert_eq!(heat_level(1), 1);
        assert_eq!(heat_level(3), 2);
        assert_eq!(heat_level(5), 3);
        assert_eq!(heat_level(7), 4);
        assert_eq!(heat_level(40), 4);
    }

    #[test]
    fn test_graph_prefers_contributions() {
        let activity = vec![DailyCount { date: day(2026, 1, 1), count: 1 }];
        let contributions = vec![DailyCount { date: day(2026, 1, 2), count: 8 }];
        let graph = select_graph(&contributions, &activity);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph[0].date, day(2026, 1, 2));
        assert_eq!(graph[0].level, 4);

        let fallback = select_graph(&[], &activity);
        assert_eq!(fallback[0].date, day(2026, 1, 1));
    }
}
