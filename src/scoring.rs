use crate::aggregate::{team_stats, time_block_stats};
use crate::model::{
    HistoricalStats, MatchResult, OddsQuote, Prediction, PredictionLabel, PredictionStatus,
    TeamStats,
};

/// Minimum values a candidate must reach for one grade of the over 1.5 call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Over15Thresholds {
    pub block_over15_rate: f64,
    pub block_avg_goals: f64,
    pub expected_goals: f64,
    pub team_over15_rate: f64,
    pub min_block_sample: usize,
}

pub const SAFE: Over15Thresholds = Over15Thresholds {
    block_over15_rate: 75.0,
    block_avg_goals: 2.2,
    expected_goals: 2.0,
    team_over15_rate: 65.0,
    min_block_sample: 10,
};

pub const MODERATE: Over15Thresholds = Over15Thresholds {
    block_over15_rate: 60.0,
    block_avg_goals: 1.8,
    expected_goals: 1.5,
    team_over15_rate: 55.0,
    min_block_sample: 5,
};

const SAFE_CONFIDENCE_CAP: f64 = 95.0;

impl Over15Thresholds {
    fn passes(&self, block: &HistoricalStats, teams: &TeamStats) -> bool {
        let expected_goals = teams.avg_scored + teams.avg_conceded;
        block.over15_rate >= self.block_over15_rate
            && block.avg_goals >= self.block_avg_goals
            && expected_goals >= self.expected_goals
            && teams.over15_rate >= self.team_over15_rate
            && block.total_matches >= self.min_block_sample
    }
}

/// Grades a quote for over 1.5 goals from its time block and both teams' history.
///
/// `calibration_factor` rescales the confidence into `calibrated_probability`.
pub fn score_over15(
    quote: &OddsQuote,
    results: &[MatchResult],
    calibration_factor: Option<f64>,
) -> Prediction {
    let block = time_block_stats(results, &quote.block_time);
    let home = team_stats(results, &quote.home_team);
    let away = team_stats(results, &quote.away_team);

    let teams = TeamStats {
        avg_scored: (home.avg_scored + away.avg_scored) / 2.0,
        avg_conceded: (home.avg_conceded + away.avg_conceded) / 2.0,
        matches_played: home.matches_played.min(away.matches_played),
        over15_rate: (home.over15_rate + away.over15_rate) / 2.0,
    };

    let rate = block.over15_rate.round();
    let (status, prediction, confidence) = if SAFE.passes(&block, &teams) {
        (
            PredictionStatus::Safe,
            PredictionLabel::Over15,
            rate.min(SAFE_CONFIDENCE_CAP),
        )
    } else if MODERATE.passes(&block, &teams) {
        (PredictionStatus::Moderate, PredictionLabel::Over15, rate)
    } else {
        (
            PredictionStatus::Risky,
            PredictionLabel::LowConfidence,
            rate.max(0.0),
        )
    };
    let confidence = confidence.clamp(0.0, 100.0) as u8;

    Prediction {
        quote: quote.clone(),
        historical_stats: block,
        team_stats: teams,
        prediction,
        confidence,
        status,
        calibrated_probability: calibration_factor
            .filter(|f| f.is_finite())
            .map(|f| (f64::from(confidence) / 100.0 * f).clamp(0.0, 1.0)),
    }
}

pub fn score_all(
    quotes: &[OddsQuote],
    results: &[MatchResult],
    calibration_factor: Option<f64>,
) -> Vec<Prediction> {
    quotes
        .iter()
        .map(|q| score_over15(q, results, calibration_factor))
        .collect()
}

/// Decimal price of the market a label bets on, when the quote carries it.
pub fn market_odd(label: PredictionLabel, quote: &OddsQuote) -> Option<f64> {
    let odd = match label {
        PredictionLabel::Over15 if quote.is_line(1.5) => quote.over_odd,
        PredictionLabel::Over25 if quote.is_line(2.5) => quote.over_odd,
        PredictionLabel::Under25 if quote.is_line(2.5) => quote.under_odd,
        _ => return None,
    };
    (odd > 1.0).then_some(odd)
}
