use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Largest per-side score any input may carry.
pub const MAX_GOALS: u32 = u16::MAX as u32;

/// A finished match. The goal fields are private so the derived totals always
/// agree with the two scores; [`MatchResult::new`] is the only way in, and
/// deserialization goes through it as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScoreLine")]
pub struct MatchResult {
    pub block_time: String,
    pub match_date: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    home_goals: u32,
    away_goals: u32,
    total_goals: u32,
    over_15: bool,
    over_25: bool,
}

#[derive(Deserialize)]
struct ScoreLine {
    block_time: String,
    match_date: Option<NaiveDate>,
    home_team: String,
    away_team: String,
    home_goals: u32,
    away_goals: u32,
}

impl TryFrom<ScoreLine> for MatchResult {
    type Error = String;

    fn try_from(raw: ScoreLine) -> Result<Self, Self::Error> {
        if raw.home_goals > MAX_GOALS || raw.away_goals > MAX_GOALS {
            return Err(format!(
                "score {}-{} exceeds {MAX_GOALS} goals per side",
                raw.home_goals, raw.away_goals
            ));
        }
        Ok(MatchResult::new(
            raw.block_time,
            raw.match_date,
            raw.home_team,
            raw.away_team,
            raw.home_goals,
            raw.away_goals,
        ))
    }
}

impl MatchResult {
    /// Parsers cap each side at [`MAX_GOALS`]; the total saturates rather than
    /// wrapping for anything larger.
    pub fn new(
        block_time: impl Into<String>,
        match_date: Option<NaiveDate>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        home_goals: u32,
        away_goals: u32,
    ) -> Self {
        let total_goals = home_goals.saturating_add(away_goals);
        Self {
            block_time: block_time.into(),
            match_date,
            home_team: home_team.into(),
            away_team: away_team.into(),
            home_goals,
            away_goals,
            total_goals,
            over_15: total_goals >= 2,
            over_25: total_goals >= 3,
        }
    }

    pub fn home_goals(&self) -> u32 {
        self.home_goals
    }

    pub fn away_goals(&self) -> u32 {
        self.away_goals
    }

    pub fn total_goals(&self) -> u32 {
        self.total_goals
    }

    pub fn over_15(&self) -> bool {
        self.over_15
    }

    pub fn over_25(&self) -> bool {
        self.over_25
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team.eq_ignore_ascii_case(team) || self.away_team.eq_ignore_ascii_case(team)
    }
}

/// Market prices for one upcoming match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub block_time: String,
    pub match_date: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    pub home_odd: f64,
    pub draw_odd: f64,
    pub away_odd: f64,
    pub goal_line: f64,
    pub over_odd: f64,
    pub under_odd: f64,
}

impl OddsQuote {
    pub fn is_line(&self, line: f64) -> bool {
        (self.goal_line - line).abs() < 1e-9
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoricalStats {
    pub total_matches: usize,
    pub avg_goals: f64,
    pub over15_rate: f64,
    pub over25_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TeamStats {
    pub avg_scored: f64,
    pub avg_conceded: f64,
    pub matches_played: usize,
    pub over15_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PredictionStatus {
    Safe,
    Moderate,
    Risky,
}

impl PredictionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionStatus::Safe => "SAFE",
            PredictionStatus::Moderate => "MODERATE",
            PredictionStatus::Risky => "RISKY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Some(PredictionStatus::Safe),
            "MODERATE" => Some(PredictionStatus::Moderate),
            "RISKY" => Some(PredictionStatus::Risky),
            _ => None,
        }
    }
}

/// The market a prediction points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionLabel {
    #[serde(rename = "OVER 1.5")]
    Over15,
    #[serde(rename = "OVER 2.5")]
    Over25,
    #[serde(rename = "UNDER 2.5")]
    Under25,
    #[serde(rename = "LOW CONFIDENCE")]
    LowConfidence,
}

impl PredictionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionLabel::Over15 => "OVER 1.5",
            PredictionLabel::Over25 => "OVER 2.5",
            PredictionLabel::Under25 => "UNDER 2.5",
            PredictionLabel::LowConfidence => "LOW CONFIDENCE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OVER 1.5" => Some(PredictionLabel::Over15),
            "OVER 2.5" => Some(PredictionLabel::Over25),
            "UNDER 2.5" => Some(PredictionLabel::Under25),
            "LOW CONFIDENCE" => Some(PredictionLabel::LowConfidence),
            _ => None,
        }
    }

    /// Whether the label is an actual bet. `None` for no-bet labels.
    pub fn hit(self, result: &MatchResult) -> Option<bool> {
        match self {
            PredictionLabel::Over15 => Some(result.over_15()),
            PredictionLabel::Over25 => Some(result.over_25()),
            PredictionLabel::Under25 => Some(!result.over_25()),
            PredictionLabel::LowConfidence => None,
        }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "match")]
    pub quote: OddsQuote,
    pub historical_stats: HistoricalStats,
    pub team_stats: TeamStats,
    pub prediction: PredictionLabel,
    pub confidence: u8,
    pub status: PredictionStatus,
    pub calibrated_probability: Option<f64>,
}

/// A finished match joined with the odds it was priced at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketedResult {
    pub match_date: NaiveDate,
    pub block_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_odd: Option<f64>,
    pub away_odd: Option<f64>,
    pub over25_odd: Option<f64>,
    pub under25_odd: Option<f64>,
    pub home_goals: u32,
    pub away_goals: u32,
    pub result_over25: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakType {
    Over,
    Under,
    None,
}

impl StreakType {
    pub fn as_str(self) -> &'static str {
        match self {
            StreakType::Over => "over",
            StreakType::Under => "under",
            StreakType::None => "none",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "over" => StreakType::Over,
            "under" => StreakType::Under,
            _ => StreakType::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketPerformance {
    pub bucket_range: String,
    pub total_matches: usize,
    pub over25_hits: usize,
    pub over25_rate: f64,
    pub current_streak: usize,
    pub streak_type: StreakType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsPattern {
    pub pattern_hash: String,
    pub home_odd_range: String,
    pub over25_odd_range: String,
    pub total_matches: usize,
    pub over25_hits: usize,
    pub over25_rate: f64,
    pub current_streak: usize,
    pub streak_type: StreakType,
    pub last_seen: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBlockPerformance {
    pub date: NaiveDate,
    pub block_id: Option<String>,
    pub total_matches: usize,
    pub over25_hits: usize,
    pub over25_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallOver25Stats {
    pub total_matches: usize,
    pub over25_hits: usize,
    pub over25_rate: f64,
    pub current_streak: usize,
    pub streak_type: StreakType,
}

pub fn rate_pct(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}
