//! Reconciles stored predictions with final results and measures how well
//! the stated probabilities hold up.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MatchResult, Prediction, PredictionLabel, PredictionStatus};
use crate::scoring::market_odd;

pub const DEFAULT_RECENT_WINDOW: usize = 50;

/// Lower edges of the probability bands; the last band is closed at 1.0.
const BAND_EDGES: [f64; 7] = [0.0, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub match_date: Option<NaiveDate>,
    pub block_time: String,
    pub home_team: String,
    pub away_team: String,
    pub label: PredictionLabel,
    pub confidence: u8,
    pub status: PredictionStatus,
    pub predicted_probability: f64,
    pub market_odd: Option<f64>,
}

impl NewPrediction {
    pub fn from_prediction(p: &Prediction) -> Self {
        Self {
            match_date: p.quote.match_date,
            block_time: p.quote.block_time.clone(),
            home_team: p.quote.home_team.clone(),
            away_team: p.quote.away_team.clone(),
            label: p.prediction,
            confidence: p.confidence,
            status: p.status,
            predicted_probability: p
                .calibrated_probability
                .unwrap_or(f64::from(p.confidence) / 100.0),
            market_odd: market_odd(p.prediction, &p.quote),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub home_goals: u32,
    pub away_goals: u32,
    pub actual_over15: bool,
    pub actual_over25: bool,
    /// `None` for no-bet labels.
    pub is_correct: Option<bool>,
    pub profit_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub prediction: NewPrediction,
    pub resolution: Option<Resolution>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PredictionRecord {
    pub fn is_pending(&self) -> bool {
        self.resolved_at.is_none()
    }
}

pub fn resolve(prediction: &NewPrediction, result: &MatchResult) -> Resolution {
    let is_correct = prediction.label.hit(result);
    let profit_loss = match (prediction.label, is_correct) {
        (PredictionLabel::LowConfidence, _) => Some(0.0),
        (_, Some(true)) => prediction.market_odd.map(|odd| odd - 1.0),
        (_, Some(false)) => prediction.market_odd.map(|_| -1.0),
        (_, None) => None,
    };
    Resolution {
        home_goals: result.home_goals(),
        away_goals: result.away_goals(),
        actual_over15: result.over_15(),
        actual_over25: result.over_25(),
        is_correct,
        profit_loss,
    }
}

/// A result along with when it was ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub stored_at: DateTime<Utc>,
    pub result: MatchResult,
}

/// Finished result for a prediction. Candidates share the teams, were stored
/// no earlier than the prediction, and agree on the date when both carry one.
/// A candidate at the predicted block time wins; otherwise the newest does.
pub fn find_result<'a>(
    record: &PredictionRecord,
    results: &'a [StoredResult],
) -> Option<&'a MatchResult> {
    let p = &record.prediction;
    let candidates = results.iter().filter(|s| {
        let r = &s.result;
        s.stored_at >= record.created_at
            && r.home_team.eq_ignore_ascii_case(&p.home_team)
            && r.away_team.eq_ignore_ascii_case(&p.away_team)
            && match (p.match_date, r.match_date) {
                (Some(pd), Some(rd)) => pd == rd,
                _ => true,
            }
    });
    let (same_block, other): (Vec<&StoredResult>, Vec<&StoredResult>) =
        candidates.partition(|s| s.result.block_time == p.block_time);
    let newest = |v: Vec<&'a StoredResult>| v.into_iter().max_by_key(|s| s.stored_at);
    newest(same_block)
        .or_else(|| newest(other))
        .map(|s| &s.result)
}

/// Resolutions for every still-pending record that has a result. Records
/// already resolved are never revisited.
pub fn reconcile(records: &[PredictionRecord], results: &[StoredResult]) -> Vec<(i64, Resolution)> {
    records
        .iter()
        .filter(|r| r.is_pending())
        .filter_map(|r| {
            let result = find_result(r, results)?;
            Some((r.id, resolve(&r.prediction, result)))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyBand {
    pub band_start: f64,
    pub band_end: f64,
    pub count: usize,
    pub correct: usize,
    pub avg_predicted: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_predictions: usize,
    pub resolved: usize,
    pub bets: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub recent_window: usize,
    pub recent_accuracy: f64,
    pub avg_predicted_probability: f64,
    pub calibration_factor: f64,
    pub total_profit: f64,
    pub roi: f64,
    pub bands: Vec<AccuracyBand>,
}

pub fn performance_metrics(records: &[PredictionRecord], recent_window: usize) -> PerformanceMetrics {
    let mut bets: Vec<(&PredictionRecord, bool)> = records
        .iter()
        .filter_map(|r| {
            let correct = r.resolution.as_ref()?.is_correct?;
            Some((r, correct))
        })
        .collect();
    bets.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at).then(b.0.id.cmp(&a.0.id)));

    let n = bets.len();
    let correct = bets.iter().filter(|(_, ok)| *ok).count();
    let accuracy = ratio(correct, n);

    let recent_window = recent_window.max(1);
    let recent_correct = bets.iter().take(recent_window).filter(|(_, ok)| *ok).count();
    let recent_accuracy = ratio(recent_correct, n.min(recent_window));

    let avg_predicted_probability = if n == 0 {
        0.0
    } else {
        bets.iter()
            .map(|(r, _)| r.prediction.predicted_probability)
            .sum::<f64>()
            / n as f64
    };
    let calibration_factor = if avg_predicted_probability > 0.0 {
        accuracy / avg_predicted_probability
    } else {
        1.0
    };

    let mut staked = 0usize;
    let mut total_profit = 0.0;
    for (r, _) in &bets {
        if let Some(pl) = r.resolution.as_ref().and_then(|res| res.profit_loss) {
            staked += 1;
            total_profit += pl;
        }
    }

    PerformanceMetrics {
        total_predictions: records.len(),
        resolved: records.iter().filter(|r| !r.is_pending()).count(),
        bets: n,
        correct,
        accuracy,
        recent_window,
        recent_accuracy,
        avg_predicted_probability,
        calibration_factor,
        total_profit,
        roi: if staked == 0 {
            0.0
        } else {
            total_profit / staked as f64
        },
        bands: accuracy_bands(&bets),
    }
}

fn accuracy_bands(bets: &[(&PredictionRecord, bool)]) -> Vec<AccuracyBand> {
    let bands = BAND_EDGES.len() - 1;
    let mut counts = vec![0usize; bands];
    let mut hits = vec![0usize; bands];
    let mut pred_sum = vec![0.0_f64; bands];

    for (r, ok) in bets {
        let p = r.prediction.predicted_probability.clamp(0.0, 1.0);
        let idx = BAND_EDGES[1..]
            .iter()
            .position(|edge| p < *edge)
            .unwrap_or(bands - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        hits[idx] += usize::from(*ok);
    }

    (0..bands)
        .map(|i| AccuracyBand {
            band_start: BAND_EDGES[i],
            band_end: BAND_EDGES[i + 1],
            count: counts[i],
            correct: hits[i],
            avg_predicted: if counts[i] == 0 {
                0.0
            } else {
                pred_sum[i] / counts[i] as f64
            },
            accuracy: ratio(hits[i], counts[i]),
        })
        .collect()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
