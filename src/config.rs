use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::buckets::BucketConfig;
use crate::feed::{FeedOptions, ScorePolicy};
use crate::tracker::DEFAULT_RECENT_WINDOW;

const APP_DIR: &str = "eagle_eye";
const DB_FILE: &str = "eagle_eye.sqlite";
const MAX_UTC_OFFSET_MIN: i32 = 18 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: Option<PathBuf>,
    pub score_policy: ScorePolicy,
    pub feed_utc_offset_min: i32,
    pub feed_url: Option<String>,
    pub bucket_config_path: Option<PathBuf>,
    pub apply_calibration: bool,
    pub metrics_recent_window: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            score_policy: ScorePolicy::default(),
            feed_utc_offset_min: 0,
            feed_url: None,
            bucket_config_path: None,
            apply_calibration: false,
            metrics_recent_window: DEFAULT_RECENT_WINDOW,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let db_path = env_string("EAGLE_EYE_DB")
            .map(PathBuf::from)
            .or_else(default_db_path);
        let score_policy = match env_string("SCORE_POLICY") {
            Some(raw) => ScorePolicy::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown SCORE_POLICY, using zero");
                ScorePolicy::default()
            }),
            None => ScorePolicy::default(),
        };
        let feed_utc_offset_min = env::var("FEED_UTC_OFFSET_MIN")
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .unwrap_or(0)
            .clamp(-MAX_UTC_OFFSET_MIN, MAX_UTC_OFFSET_MIN);
        let metrics_recent_window = env::var("METRICS_RECENT_WINDOW")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RECENT_WINDOW);

        Self {
            db_path,
            score_policy,
            feed_utc_offset_min,
            feed_url: env_string("FEED_URL"),
            bucket_config_path: env_string("BUCKET_CONFIG_PATH").map(PathBuf::from),
            apply_calibration: env_bool("APPLY_CALIBRATION", false),
            metrics_recent_window,
        }
    }

    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            score_policy: self.score_policy,
            utc_offset_minutes: self.feed_utc_offset_min,
        }
    }

    /// Built-in buckets unless a config file is named.
    pub fn bucket_config(&self) -> Result<BucketConfig> {
        match &self.bucket_config_path {
            Some(path) => load_bucket_config(path),
            None => Ok(BucketConfig::default()),
        }
    }
}

fn load_bucket_config(path: &Path) -> Result<BucketConfig> {
    BucketConfig::load(path).with_context(|| format!("load bucket config {}", path.display()))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_zero_policy_and_builtin_buckets() {
        let cfg = AppConfig {
            db_path: None,
            ..AppConfig::default()
        };
        assert_eq!(cfg.score_policy, ScorePolicy::DefaultZero);
        assert_eq!(cfg.metrics_recent_window, DEFAULT_RECENT_WINDOW);
        let buckets = cfg.bucket_config().expect("default buckets");
        assert_eq!(buckets, BucketConfig::default());
    }

    #[test]
    fn feed_options_carry_offset_and_policy() {
        let cfg = AppConfig {
            score_policy: ScorePolicy::Strict,
            feed_utc_offset_min: 960,
            ..AppConfig::default()
        };
        let opts = cfg.feed_options();
        assert_eq!(opts.score_policy, ScorePolicy::Strict);
        assert_eq!(opts.utc_offset_minutes, 960);
    }

    #[test]
    fn missing_bucket_file_is_an_error() {
        let cfg = AppConfig {
            bucket_config_path: Some(PathBuf::from("/nonexistent/buckets.json")),
            ..AppConfig::default()
        };
        let err = cfg.bucket_config().unwrap_err();
        assert!(err.to_string().contains("load bucket config"));
    }
}
