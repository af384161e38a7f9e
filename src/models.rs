use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One calendar day of activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub commits: u32,
    pub pull_requests: u32,
    pub issues: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Commit,
    PullRequest,
    Issue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivityItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub repo: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCommit {
    pub id: String,
    pub repo: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

/// A public event as returned by the GitHub events feed.
///
/// Every field is optional on the wire; classification decides what is usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub repo: Option<EventRepo>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub payload: Option<EventPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRepo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub commits: Option<Vec<PushCommit>>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub pull_request: Option<LinkedItem>,
    #[serde(default)]
    pub issue: Option<LinkedItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkedItem {
    #[serde(default)]
    pub html_url: Option<String>,
}

impl ActivityEvent {
    /// Typed category, `None` for event kinds that only count toward the heatmap.
    pub fn activity_type(&self) -> Option<ActivityType> {
        match self.kind.as_deref() {
            Some("PushEvent") => Some(ActivityType::Commit),
            Some("PullRequestEvent") => Some(ActivityType::PullRequest),
            Some("IssuesEvent") => Some(ActivityType::Issue),
            _ => None,
        }
    }

    pub fn repo_name(&self) -> Option<&str> {
        self.repo
            .as_ref()
            .and_then(|r| r.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Event timestamp; accepts RFC 3339 or a bare `YYYY-MM-DD` prefix.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        raw.get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

/// Repository entry from the GitHub listing API.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
    pub language: Option<String>,
}

impl Repository {
    /// Drops listing entries without a name or link.
    pub fn from_github(repo: GithubRepo) -> Option<Self> {
        let name = repo.name.filter(|n| !n.is_empty())?;
        let html_url = repo.html_url.filter(|u| !u.is_empty())?;
        Some(Self {
            id: repo.id,
            name,
            html_url,
            description: repo.description,
            stargazers_count: repo.stargazers_count,
            language: repo.language,
        })
    }
}

/// Body of `GET /api/github/contributions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionsBody {
    pub days: Vec<DailyCount>,
    pub total: u64,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_count_serializes_plain_date() {
        let day = DailyCount {
            date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            count: 4,
        };
        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(json, serde_json::json!({ "date": "2026-03-09", "count": 4 }));
    }

    #[test]
    fn test_event_timestamp_falls_back_to_date_prefix() {
        let event = ActivityEvent {
            created_at: Some("2026-01-02 garbage".to_string()),
            ..Default::default()
        };
        let ts = event.timestamp().unwrap();
        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());

        let bad = ActivityEvent {
            created_at: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(bad.timestamp().is_none());
    }

    #[test]
    fn test_repository_requires_name_and_url() {
        let repo: GithubRepo = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "portfolio",
            "html_url": null,
            "stargazers_count": 3
        }))
        .unwrap();
        assert!(Repository::from_github(repo).is_none());
    }
}
