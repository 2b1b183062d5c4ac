use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;
use tracing::info;

use crate::model::{BucketPerformance, DayBlockPerformance, OddsPattern};
use crate::tracker::{PerformanceMetrics, PredictionRecord};

/// Everything that goes into one workbook.
pub struct ReportData<'a> {
    pub predictions: &'a [PredictionRecord],
    pub home_buckets: &'a [BucketPerformance],
    pub over25_buckets: &'a [BucketPerformance],
    pub patterns: &'a [OddsPattern],
    pub days: &'a [DayBlockPerformance],
    pub metrics: &'a PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: String,
    pub predictions: usize,
    pub home_buckets: usize,
    pub over25_buckets: usize,
    pub patterns: usize,
    pub days: usize,
    pub bands: usize,
}

pub fn export_report(path: &Path, data: &ReportData<'_>) -> Result<ExportReport> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows(data.predictions))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("HomeBuckets")?;
        write_rows(sheet, &bucket_rows(data.home_buckets))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Over25Buckets")?;
        write_rows(sheet, &bucket_rows(data.over25_buckets))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Patterns")?;
        write_rows(sheet, &pattern_rows(data.patterns))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Days")?;
        write_rows(sheet, &day_rows(data.days))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Metrics")?;
        write_rows(sheet, &metrics_rows(data.metrics))?;
    }

    workbook
        .save(path)
        .with_context(|| format!("save xlsx {}", path.display()))?;

    let report = ExportReport {
        path: path.display().to_string(),
        predictions: data.predictions.len(),
        home_buckets: data.home_buckets.len(),
        over25_buckets: data.over25_buckets.len(),
        patterns: data.patterns.len(),
        days: data.days.len(),
        bands: data.metrics.bands.len(),
    };
    info!(path = %report.path, predictions = report.predictions, "report exported");
    Ok(report)
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn pct(v: f64) -> String {
    format!("{v:.1}")
}

fn prediction_rows(records: &[PredictionRecord]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&[
        "ID",
        "Created",
        "Date",
        "Block",
        "Home",
        "Away",
        "Prediction",
        "Confidence",
        "Status",
        "Probability",
        "Odd",
        "Score",
        "Correct",
        "P/L",
    ])];
    for r in records {
        let p = &r.prediction;
        let res = r.resolution.as_ref();
        rows.push(vec![
            r.id.to_string(),
            r.created_at.format("%Y-%m-%d %H:%M").to_string(),
            opt(p.match_date),
            p.block_time.clone(),
            p.home_team.clone(),
            p.away_team.clone(),
            p.label.as_str().to_string(),
            p.confidence.to_string(),
            p.status.as_str().to_string(),
            format!("{:.3}", p.predicted_probability),
            opt(p.market_odd),
            opt(res.map(|x| format!("{}-{}", x.home_goals, x.away_goals))),
            match res.and_then(|x| x.is_correct) {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => String::new(),
            },
            opt(res.and_then(|x| x.profit_loss).map(|v| format!("{v:.2}"))),
        ]);
    }
    rows
}

fn bucket_rows(buckets: &[BucketPerformance]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&[
        "Bucket", "Matches", "Over 2.5", "Rate %", "Streak", "Streak Type",
    ])];
    for b in buckets {
        rows.push(vec![
            b.bucket_range.clone(),
            b.total_matches.to_string(),
            b.over25_hits.to_string(),
            pct(b.over25_rate),
            b.current_streak.to_string(),
            b.streak_type.as_str().to_string(),
        ]);
    }
    rows
}

fn pattern_rows(patterns: &[OddsPattern]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&[
        "Pattern",
        "Home Odd",
        "Over 2.5 Odd",
        "Matches",
        "Over 2.5",
        "Rate %",
        "Streak",
        "Streak Type",
        "Last Seen",
    ])];
    for p in patterns {
        rows.push(vec![
            p.pattern_hash.clone(),
            p.home_odd_range.clone(),
            p.over25_odd_range.clone(),
            p.total_matches.to_string(),
            p.over25_hits.to_string(),
            pct(p.over25_rate),
            p.current_streak.to_string(),
            p.streak_type.as_str().to_string(),
            p.last_seen.to_string(),
        ]);
    }
    rows
}

fn day_rows(days: &[DayBlockPerformance]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&["Date", "Block", "Matches", "Over 2.5", "Rate %"])];
    for d in days {
        rows.push(vec![
            d.date.to_string(),
            d.block_id.clone().unwrap_or_default(),
            d.total_matches.to_string(),
            d.over25_hits.to_string(),
            pct(d.over25_rate),
        ]);
    }
    rows
}

fn metrics_rows(m: &PerformanceMetrics) -> Vec<Vec<String>> {
    let mut rows = vec![
        header(&["Metric", "Value"]),
        vec!["Total predictions".to_string(), m.total_predictions.to_string()],
        vec!["Resolved".to_string(), m.resolved.to_string()],
        vec!["Bets".to_string(), m.bets.to_string()],
        vec!["Correct".to_string(), m.correct.to_string()],
        vec!["Accuracy".to_string(), format!("{:.3}", m.accuracy)],
        vec![
            format!("Recent accuracy (last {})", m.recent_window),
            format!("{:.3}", m.recent_accuracy),
        ],
        vec![
            "Avg predicted probability".to_string(),
            format!("{:.3}", m.avg_predicted_probability),
        ],
        vec![
            "Calibration factor".to_string(),
            format!("{:.3}", m.calibration_factor),
        ],
        vec!["Total profit".to_string(), format!("{:.2}", m.total_profit)],
        vec!["ROI".to_string(), format!("{:.3}", m.roi)],
        Vec::new(),
        header(&["Band", "Count", "Correct", "Avg Predicted", "Accuracy"]),
    ];
    for b in &m.bands {
        rows.push(vec![
            format!("{:.1}-{:.1}", b.band_start, b.band_end),
            b.count.to_string(),
            b.correct.to_string(),
            format!("{:.3}", b.avg_predicted),
            format!("{:.3}", b.accuracy),
        ]);
    }
    rows
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
