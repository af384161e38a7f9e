use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::assistant::{ResponseCategory, ResponseDelays, SessionLimits};
use crate::monitor::MonitorSettings;

/// Runtime settings, read from the environment (and `.env`) at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_address: String,
    pub github_username: String,
    pub github_api_url: String,
    pub github_web_url: String,
    pub http_timeout: Duration,
    pub activity_window_days: u32,
    pub contributions_lookback_days: u32,
    pub refresh_interval: Duration,
    pub repo_limit: usize,
    pub chat_store_dir: Option<PathBuf>,
    pub knowledge_path: Option<PathBuf>,
    pub delays: ResponseDelays,
    pub sessions: SessionLimits,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let path = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        let mut delays = ResponseDelays::default();
        for category in ResponseCategory::ALL {
            let key = format!("ASSISTANT_DELAY_{}_MS", category.env_name());
            if let Some(ms) = parse_opt::<u64>(&lookup, &key)? {
                delays.set(category, Duration::from_millis(ms));
            }
        }

        let defaults = SessionLimits::default();
        let sessions = SessionLimits {
            idle_ttl: Duration::from_secs(number(
                &lookup,
                "SESSION_IDLE_TTL_SECS",
                defaults.idle_ttl.as_secs(),
            )?),
            max_sessions: number(&lookup, "MAX_SESSIONS", defaults.max_sessions)?,
        };
        if sessions.max_sessions == 0 {
            anyhow::bail!("MAX_SESSIONS must be greater than zero");
        }

        let refresh_secs = number(&lookup, "REFRESH_INTERVAL_SECS", 60u64)?;
        if refresh_secs == 0 {
            anyhow::bail!("REFRESH_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            bind_address: text("BIND_ADDRESS", "0.0.0.0:8080"),
            github_username: text("GITHUB_USERNAME", "albanbyaugisha"),
            github_api_url: text("GITHUB_API_URL", "https://api.github.com"),
            github_web_url: text("GITHUB_WEB_URL", "https://github.com"),
            http_timeout: Duration::from_secs(number(&lookup, "HTTP_TIMEOUT_SECS", 10u64)?),
            activity_window_days: number(&lookup, "ACTIVITY_WINDOW_DAYS", 84u32)?,
            contributions_lookback_days: number(&lookup, "CONTRIBUTIONS_LOOKBACK_DAYS", 365u32)?,
            refresh_interval: Duration::from_secs(refresh_secs),
            repo_limit: number(&lookup, "REPO_LIMIT", 6usize)?,
            chat_store_dir: path("CHAT_STORE_DIR"),
            knowledge_path: path("KNOWLEDGE_PATH"),
            delays,
            sessions,
        })
    }

    pub fn monitor(&self) -> MonitorSettings {
        MonitorSettings {
            username: self.github_username.clone(),
            window_days: self.activity_window_days,
            lookback_days: self.contributions_lookback_days,
            refresh_interval: self.refresh_interval,
            repo_limit: self.repo_limit,
            web_base: self.github_web_url.clone(),
        }
    }
}

fn parse_opt<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        _ => Ok(None),
    }
}

fn number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.bind_address, "0.0.0.0:8080");
        assert_eq!(s.github_username, "albanbyaugisha");
        assert_eq!(s.activity_window_days, 84);
        assert_eq!(s.contributions_lookback_days, 365);
        assert_eq!(s.refresh_interval, Duration::from_secs(60));
        assert_eq!(s.repo_limit, 6);
        assert!(s.chat_store_dir.is_none());
        assert!(s.knowledge_path.is_none());
        assert_eq!(s.delays, ResponseDelays::default());
        assert_eq!(s.sessions, SessionLimits::default());
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("GITHUB_USERNAME", "octocat"),
            ("ACTIVITY_WINDOW_DAYS", " 30 "),
            ("CHAT_STORE_DIR", "/var/lib/chats"),
            ("ASSISTANT_DELAY_SKILLS_LIST_MS", "0"),
            ("ASSISTANT_DELAY_TOPIC_MS", "1200"),
            ("GITHUB_WEB_URL", "https://ghe.example.com"),
            ("SESSION_IDLE_TTL_SECS", "90"),
            ("MAX_SESSIONS", "10"),
        ])
        .unwrap();
        assert_eq!(s.github_username, "octocat");
        assert_eq!(s.activity_window_days, 30);
        assert_eq!(s.chat_store_dir, Some(PathBuf::from("/var/lib/chats")));
        assert_eq!(s.delays.get(ResponseCategory::SkillsList), Duration::ZERO);
        assert_eq!(s.delays.get(ResponseCategory::Topic), Duration::from_millis(1200));
        assert_eq!(s.delays.get(ResponseCategory::Greeting), Duration::from_millis(150));

        let monitor = s.monitor();
        assert_eq!(monitor.username, "octocat");
        assert_eq!(monitor.window_days, 30);
        assert_eq!(monitor.web_base, "https://ghe.example.com");
        assert_eq!(s.sessions.idle_ttl, Duration::from_secs(90));
        assert_eq!(s.sessions.max_sessions, 10);
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        let err = settings(&[("REPO_LIMIT", "six")]).unwrap_err();
        assert!(err.to_string().contains("REPO_LIMIT"));

        assert!(settings(&[("ASSISTANT_DELAY_GREETING_MS", "-5")]).is_err());
        assert!(settings(&[("REFRESH_INTERVAL_SECS", "0")]).is_err());
        assert!(settings(&[("MAX_SESSIONS", "0")]).is_err());
    }
}
