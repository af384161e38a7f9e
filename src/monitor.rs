//! Background refresh of the activity panel data.
//!
//! Activity and contributions are refreshed together on a fixed interval.
//! The two fetches run concurrently and each one only ever touches its own
//! half of the snapshot. Repositories are fetched once at start and again
//! on explicit retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::activity::{self, ActivityPayload, GraphDay, ACTIVITY_UNAVAILABLE};
use crate::contributions::{self, CONTRIBUTIONS_UNAVAILABLE, NO_CONTRIBUTIONS};
use crate::error::UpstreamError;
use crate::github::GithubSource;
use crate::models::{ContributionsBody, Repository};

pub const REPOS_RATE_LIMITED: &str = "GitHub API rate limit reached. Please try again shortly.";
pub const REPOS_UNAVAILABLE: &str = "Unable to load repositories right now.";

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub username: String,
    pub window_days: u32,
    pub lookback_days: u32,
    pub refresh_interval: Duration,
    pub repo_limit: usize,
    /// Base for repository and commit links in the feed.
    pub web_base: String,
}

#[derive(Debug, Default)]
struct ActivityState {
    activity: Option<ActivityPayload>,
    activity_error: Option<String>,
    contributions: Option<ContributionsBody>,
    contributions_error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// What `GET /api/github/activity` returns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub username: String,
    pub activity: ActivityPayload,
    pub activity_error: Option<String>,
    pub contributions_total: u64,
    pub contributions_error: Option<String>,
    pub graph: Vec<GraphDay>,
    pub graph_loading: bool,
    pub graph_error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReposSnapshot {
    pub repos: Vec<Repository>,
    pub error: Option<String>,
    pub loading: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

pub struct ActivityMonitor {
    source: Arc<dyn GithubSource>,
    settings: MonitorSettings,
    activity: RwLock<ActivityState>,
    repos: RwLock<ReposSnapshot>,
}

impl ActivityMonitor {
    pub fn new(source: Arc<dyn GithubSource>, settings: MonitorSettings) -> Arc<Self> {
        Arc::new(Self {
            source,
            settings,
            activity: RwLock::new(ActivityState::default()),
            repos: RwLock::new(ReposSnapshot {
                loading: true,
                ..Default::default()
            }),
        })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Refresh activity and contributions for the current UTC day.
    pub async fn refresh_activity(&self) {
        self.refresh_activity_at(Utc::now().date_naive()).await;
    }

    pub async fn refresh_activity_at(&self, today: NaiveDate) {
        let username = self.settings.username.as_str();
        let source = self.source.as_ref();

        tokio::join!(
            async {
                let payload = activity::load_activity(
                    source,
                    username,
                    self.settings.window_days,
                    today,
                    &self.settings.web_base,
                )
                .await;
                let error = (!payload.is_available()).then(|| ACTIVITY_UNAVAILABLE.to_string());
                let mut state = self.activity.write().await;
                state.activity = Some(payload);
                state.activity_error = error;
                state.refreshed_at = Some(Utc::now());
            },
            async {
                let outcome = contributions::fetch_contributions(
                    source,
                    username,
                    today,
                    self.settings.lookback_days,
                )
                .await;
                let error = if !outcome.is_success() {
                    Some(CONTRIBUTIONS_UNAVAILABLE.to_string())
                } else if outcome.body.days.is_empty() {
                    Some(NO_CONTRIBUTIONS.to_string())
                } else {
                    None
                };
                let mut state = self.activity.write().await;
                state.contributions = Some(outcome.body);
                state.contributions_error = error;
                state.refreshed_at = Some(Utc::now());
            },
        );
        tracing::debug!("Activity snapshot refreshed for {}", username);
    }

    pub async fn refresh_repositories(&self) {
        {
            let mut snapshot = self.repos.write().await;
            snapshot.loading = true;
            snapshot.error = None;
        }

        let result = self
            .source
            .repositories(&self.settings.username, self.settings.repo_limit)
            .await;

        let mut snapshot = self.repos.write().await;
        snapshot.loading = false;
        snapshot.fetched_at = Some(Utc::now());
        match result {
            Ok(repos) => {
                snapshot.repos = repos
                    .into_iter()
                    .filter_map(Repository::from_github)
                    .take(self.settings.repo_limit)
                    .collect();
                snapshot.error = None;
            }
            Err(e) => {
                tracing::warn!("Repository list unavailable: {}", e);
                snapshot.repos.clear();
                snapshot.error = Some(repos_error_message(&e).to_string());
            }
        }
    }

    pub async fn activity_view(&self) -> ActivityView {
        let state = self.activity.read().await;
        let activity = state.activity.clone().unwrap_or_default();
        let contribution_days = state
            .contributions
            .as_ref()
            .map(|c| c.days.as_slice())
            .unwrap_or_default();

        let graph = activity::select_graph(contribution_days, &activity.daily);
        let pending = state.activity.is_none() || state.contributions.is_none();
        let graph_loading = graph.is_empty() && pending;
        let graph_error = if graph.is_empty() && !graph_loading {
            state
                .contributions_error
                .clone()
                .or_else(|| state.activity_error.clone())
        } else {
            None
        };

        ActivityView {
            username: self.settings.username.clone(),
            contributions_total: state.contributions.as_ref().map_or(0, |c| c.total),
            activity,
            activity_error: state.activity_error.clone(),
            contributions_error: state.contributions_error.clone(),
            graph,
            graph_loading,
            graph_error,
            refreshed_at: state.refreshed_at,
        }
    }

    pub async fn repositories(&self) -> ReposSnapshot {
        self.repos.read().await.clone()
    }

    /// Start the refresh loop. The loop stops when the handle is dropped.
    pub fn spawn(self: &Arc<Self>) -> MonitorHandle {
        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move {
            // The repository list loads alongside the first refresh, not before it.
            let refresh_loop = async {
                let mut ticker = tokio::time::interval(monitor.settings.refresh_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    monitor.refresh_activity().await;
                }
            };
            tokio::join!(monitor.refresh_repositories(), refresh_loop);
        });
        tracing::info!(
            "Activity monitor started (every {}s)",
            self.settings.refresh_interval.as_secs()
        );
        MonitorHandle { task: Some(task) }
    }
}

fn repos_error_message(error: &UpstreamError) -> &'static str {
    match error.status() {
        Some(status) if status.as_u16() == 403 => REPOS_RATE_LIMITED,
        _ => REPOS_UNAVAILABLE,
    }
}

/// Owns the refresh task; dropping it aborts any in-flight refresh.
pub struct MonitorHandle {
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            tracing::info!("Activity monitor stopped");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
