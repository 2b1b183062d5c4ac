use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::current_streak;
use crate::buckets::{BucketConfig, OddsDimension, classify, pattern_hash};
use crate::model::{BucketedResult, OddsQuote, StreakType, rate_pct};

const STRONG_SAMPLE: usize = 20;
const MODERATE_SAMPLE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Some(Confidence::High),
            "MEDIUM" => Some(Confidence::Medium),
            "LOW" => Some(Confidence::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingMatchInput {
    #[serde(default)]
    pub match_date: Option<NaiveDate>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    pub home_odd: f64,
    pub away_odd: f64,
    pub over25_odd: f64,
    pub under25_odd: f64,
}

impl UpcomingMatchInput {
    /// Only quotes priced on the 2.5 line describe this market.
    pub fn from_quote(quote: &OddsQuote) -> Option<Self> {
        if !quote.is_line(2.5) {
            return None;
        }
        Some(Self {
            match_date: quote.match_date,
            block_id: Some(quote.block_time.clone()),
            home_team: quote.home_team.clone(),
            away_team: quote.away_team.clone(),
            home_odd: quote.home_odd,
            away_odd: quote.away_odd,
            over25_odd: quote.over_odd,
            under25_odd: quote.under_odd,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let odds = [self.home_odd, self.away_odd, self.over25_odd, self.under25_odd];
        if odds.iter().any(|o| !o.is_finite() || *o <= 0.0) {
            return Err(anyhow!("Missing required odds data"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Over25Analysis {
    pub bucket_home: String,
    pub bucket_over25: String,
    pub pattern_hash: String,
    pub historical_over25_rate: f64,
    pub total_in_bucket: usize,
    pub current_streak: usize,
    pub streak_type: StreakType,
    pub confidence_indicator: Confidence,
    pub recommendation: String,
}

/// An analysed upcoming fixture as kept in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingMatch {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub input: UpcomingMatchInput,
    #[serde(flatten)]
    pub analysis: Over25Analysis,
}

/// Looks up how matches priced in the same pair of buckets have gone.
pub fn analyze_upcoming(
    input: &UpcomingMatchInput,
    history: &[BucketedResult],
    config: &BucketConfig,
) -> Result<Over25Analysis> {
    input.validate()?;

    let bucket_home = classify(input.home_odd, OddsDimension::HomeOdd, config);
    let bucket_over25 = classify(input.over25_odd, OddsDimension::Over25Odd, config);

    let matching: Vec<&BucketedResult> = history
        .iter()
        .filter(|r| {
            let (Some(home_odd), Some(over25_odd)) = (r.home_odd, r.over25_odd) else {
                return false;
            };
            home_odd > 0.0
                && over25_odd > 0.0
                && classify(home_odd, OddsDimension::HomeOdd, config) == bucket_home
                && classify(over25_odd, OddsDimension::Over25Odd, config) == bucket_over25
        })
        .collect();

    let total = matching.len();
    let hits = matching.iter().filter(|r| r.result_over25).count();
    let rate = rate_pct(hits, total);
    let (streak, streak_type) = current_streak(&matching);
    let (confidence_indicator, recommendation) = grade(total, rate);

    Ok(Over25Analysis {
        bucket_home: bucket_home.to_string(),
        bucket_over25: bucket_over25.to_string(),
        pattern_hash: pattern_hash(bucket_home, bucket_over25),
        historical_over25_rate: (rate * 10.0).round() / 10.0,
        total_in_bucket: total,
        current_streak: streak,
        streak_type,
        confidence_indicator,
        recommendation: recommendation.to_string(),
    })
}

fn grade(sample: usize, rate: f64) -> (Confidence, &'static str) {
    if sample >= STRONG_SAMPLE {
        if rate >= 70.0 {
            (Confidence::High, "Strong Over 2.5 pattern detected")
        } else if rate >= 55.0 {
            (Confidence::Medium, "Moderate Over 2.5 tendency")
        } else if rate <= 40.0 {
            (Confidence::High, "Strong Under 2.5 pattern detected")
        } else {
            (Confidence::Medium, "Mixed results, proceed with caution")
        }
    } else if sample >= MODERATE_SAMPLE {
        (Confidence::Medium, "Limited data, moderate confidence")
    } else {
        (Confidence::Low, "Insufficient historical data")
    }
}
