use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::MatchResult;
use crate::paste::split_score;

/// Status value the feed uses for a completed match.
const FINISHED_STATUS: &str = "End";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

static FEED_CLIENT: OnceCell<Client> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorePolicy {
    /// A malformed score becomes 0-0.
    #[default]
    DefaultZero,
    /// A malformed score rejects the whole payload.
    Strict,
}

impl ScorePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "zero" | "default" | "default_zero" => Some(ScorePolicy::DefaultZero),
            "strict" | "reject" => Some(ScorePolicy::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedOptions {
    pub score_policy: ScorePolicy,
    /// Offset applied to kickoff timestamps before taking the block time.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed score {score:?} for {home} vs {away}")]
    MalformedScore {
        score: String,
        home: String,
        away: String,
    },
    #[error("invalid kickoff timestamp {0}")]
    Timestamp(i64),
    #[error("utc offset of {0} minutes is out of range")]
    Offset(i32),
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(rename = "bizCode")]
    #[allow(dead_code)]
    biz_code: i64,
    data: FeedData,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    tournaments: Vec<FeedTournament>,
}

#[derive(Debug, Deserialize)]
struct FeedTournament {
    #[serde(default)]
    events: Vec<FeedEvent>,
}

#[derive(Debug, Deserialize)]
struct FeedEvent {
    #[serde(rename = "estimateStartTime")]
    estimate_start_time: i64,
    #[serde(rename = "setScore", default)]
    set_score: String,
    #[serde(rename = "homeTeamName")]
    home_team_name: String,
    #[serde(rename = "awayTeamName")]
    away_team_name: String,
    #[serde(rename = "matchStatus", default)]
    match_status: String,
}

/// Decodes a feed payload into finished results. Unfinished events are dropped.
pub fn parse_feed_json(raw: &str, opts: FeedOptions) -> Result<Vec<MatchResult>, FeedError> {
    let response: FeedResponse = serde_json::from_str(raw.trim())?;
    let offset = FixedOffset::east_opt(opts.utc_offset_minutes * 60)
        .ok_or(FeedError::Offset(opts.utc_offset_minutes))?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for event in response
        .data
        .tournaments
        .into_iter()
        .flat_map(|t| t.events)
    {
        if event.match_status != FINISHED_STATUS {
            skipped += 1;
            continue;
        }

        let (home_goals, away_goals) = match split_score(&event.set_score, ':') {
            Some(score) => score,
            None => match opts.score_policy {
                ScorePolicy::DefaultZero => {
                    warn!(
                        score = %event.set_score,
                        home = %event.home_team_name,
                        away = %event.away_team_name,
                        "malformed score, recording 0-0"
                    );
                    (0, 0)
                }
                ScorePolicy::Strict => {
                    return Err(FeedError::MalformedScore {
                        score: event.set_score,
                        home: event.home_team_name,
                        away: event.away_team_name,
                    });
                }
            },
        };

        let kickoff = DateTime::<Utc>::from_timestamp_millis(event.estimate_start_time)
            .ok_or(FeedError::Timestamp(event.estimate_start_time))?
            .with_timezone(&offset);

        out.push(MatchResult::new(
            kickoff.format("%H:%M").to_string(),
            Some(kickoff.date_naive()),
            event.home_team_name,
            event.away_team_name,
            home_goals,
            away_goals,
        ));
    }

    debug!(finished = out.len(), skipped, "decoded feed payload");
    Ok(out)
}

/// Downloads one feed payload. A failed request is reported, never retried.
pub fn fetch_feed(url: &str, opts: FeedOptions) -> Result<Vec<MatchResult>> {
    let client = FEED_CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("eagle_eye/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build feed client")
    })?;
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("GET {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        bail!("feed {url} answered {status}");
    }
    let body = resp.text().context("read feed body")?;
    parse_feed_json(&body, opts).context("decode feed payload")
}
