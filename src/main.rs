use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use eagle_eye::aggregate::{
    DayGrouping, bucket_stats, day_block_performance, join_results_with_odds, overall_over25,
    pattern_stats,
};
use eagle_eye::buckets::OddsDimension;
use eagle_eye::config::AppConfig;
use eagle_eye::feed::{fetch_feed, parse_feed_json};
use eagle_eye::model::MatchResult;
use eagle_eye::over25::{UpcomingMatchInput, analyze_upcoming};
use eagle_eye::paste::{parse_dmy_date, parse_odds_text, parse_results_text};
use eagle_eye::report::{ReportData, export_report};
use eagle_eye::scoring::score_all;
use eagle_eye::store::{InsertSummary, Store};
use eagle_eye::tracker::{NewPrediction, performance_metrics};

const USAGE: &str = "usage: eagle_eye <command> [args]

commands:
  ingest-feed <file.json>..   store finished matches from feed payloads
  fetch-feed                  download FEED_URL and store finished matches
  ingest-results <file>       store pasted results (tab or comma separated)
  ingest-odds <file>          replace stored odds with a pasted odds table
  predict [--record]          score every stored quote for over 1.5
  over25 --home H --away A --over O --under U [--date D] [--block HH:MM] [--teams HOME AWAY]
  buckets [home|over25]       over 2.5 rate per odds bucket
  patterns                    over 2.5 rate per home/over 2.5 bucket pair
  days [--by-block]           over 2.5 rate per day (or day and block)
  overall                     over 2.5 rate across all history
  stats                       global goal statistics
  link                        resolve pending predictions against results
  metrics                     prediction accuracy and calibration
  upcoming                    stored over 2.5 analyses
  clear-upcoming              delete stored over 2.5 analyses
  export <file.xlsx>          write all aggregates to a workbook";

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eagle_eye=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match run(&args) {
        Ok(data) => {
            println!("{}", json!({ "success": true, "data": data }));
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", json!({ "success": false, "error": format!("{err:#}") }));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<Value> {
    let Some((command, rest)) = args.split_first() else {
        bail!("{USAGE}");
    };
    let config = AppConfig::from_env();

    match command.as_str() {
        "help" | "--help" | "-h" => Ok(Value::String(USAGE.to_string())),
        "ingest-feed" => {
            if rest.is_empty() {
                bail!("ingest-feed needs at least one file");
            }
            let mut store = Store::open_configured(&config)?;
            let mut files = Vec::new();
            let mut total = InsertSummary::default();
            for path in rest {
                let raw = read_file(Path::new(path))?;
                let results = parse_feed_json(&raw, config.feed_options())
                    .with_context(|| format!("parse feed {path}"))?;
                let summary = record_results(&mut store, &results)?;
                total.count += summary.count;
                total.duplicates += summary.duplicates;
                files.push(json!({ "file": path, "parsed": results.len(), "inserted": summary }));
            }
            to_json(json!({ "files": files, "total": total }))
        }
        "fetch-feed" => {
            let url = config
                .feed_url
                .as_deref()
                .ok_or_else(|| anyhow!("FEED_URL is not set"))?;
            let results = fetch_feed(url, config.feed_options())?;
            let mut store = Store::open_configured(&config)?;
            let summary = record_results(&mut store, &results)?;
            to_json(json!({ "parsed": results.len(), "inserted": summary }))
        }
        "ingest-results" => {
            let path = positional(rest, "ingest-results <file>")?;
            let results = parse_results_text(&read_file(&path)?)?;
            let mut store = Store::open_configured(&config)?;
            let summary = record_results(&mut store, &results)?;
            to_json(json!({ "parsed": results.len(), "inserted": summary }))
        }
        "ingest-odds" => {
            let path = positional(rest, "ingest-odds <file>")?;
            let quotes = parse_odds_text(&read_file(&path)?)?;
            let mut store = Store::open_configured(&config)?;
            let stored = store.replace_odds(&quotes)?;
            to_json(json!({ "stored": stored }))
        }
        "predict" => {
            let store = Store::open_configured(&config)?;
            let results = store.all_results()?;
            let quotes = store.all_odds()?;
            let factor = if config.apply_calibration {
                let history = store.predictions(usize::MAX)?;
                Some(performance_metrics(&history, config.metrics_recent_window).calibration_factor)
            } else {
                None
            };
            let predictions = score_all(&quotes, &results, factor);
            if has_flag(rest, "--record") {
                let mut recorded = 0usize;
                for p in &predictions {
                    if store
                        .record_prediction(&NewPrediction::from_prediction(p))?
                        .is_some()
                    {
                        recorded += 1;
                    }
                }
                info!(
                    recorded,
                    already_pending = predictions.len() - recorded,
                    "predictions recorded"
                );
            }
            to_json(&predictions)
        }
        "over25" => {
            let input = over25_input(rest)?;
            let store = Store::open_configured(&config)?;
            let history = store.bucketed_results()?;
            let analysis = analyze_upcoming(&input, &history, &config.bucket_config()?)?;
            let id = store.insert_upcoming_match(&input, &analysis)?;
            to_json(json!({ "id": id, "analysis": analysis }))
        }
        "buckets" => {
            let mut store = Store::open_configured(&config)?;
            let history = store.bucketed_results()?;
            let buckets = config.bucket_config()?;
            let dimensions = match rest.first() {
                Some(raw) => vec![
                    OddsDimension::parse(raw).ok_or_else(|| anyhow!("unknown dimension {raw}"))?,
                ],
                None => vec![OddsDimension::HomeOdd, OddsDimension::Over25Odd],
            };
            let mut out = serde_json::Map::new();
            for dimension in dimensions {
                let rows = bucket_stats(&history, dimension, &buckets);
                store.upsert_bucket_stats(dimension, &rows)?;
                out.insert(dimension.as_str().to_string(), serde_json::to_value(&rows)?);
            }
            Ok(Value::Object(out))
        }
        "patterns" => {
            let store = Store::open_configured(&config)?;
            let patterns = pattern_stats(&store.bucketed_results()?, &config.bucket_config()?);
            for p in &patterns {
                store.upsert_odds_pattern(p)?;
            }
            to_json(&patterns)
        }
        "days" => {
            let store = Store::open_configured(&config)?;
            let grouping = if has_flag(rest, "--by-block") {
                DayGrouping::Block
            } else {
                DayGrouping::Day
            };
            to_json(day_block_performance(&store.bucketed_results()?, grouping))
        }
        "overall" => {
            let store = Store::open_configured(&config)?;
            to_json(overall_over25(&store.bucketed_results()?))
        }
        "stats" => {
            let store = Store::open_configured(&config)?;
            to_json(store.historical_stats()?)
        }
        "link" => {
            let mut store = Store::open_configured(&config)?;
            to_json(store.link_results_to_predictions()?)
        }
        "metrics" => {
            let store = Store::open_configured(&config)?;
            let records = store.predictions(usize::MAX)?;
            to_json(performance_metrics(&records, config.metrics_recent_window))
        }
        "upcoming" => {
            let store = Store::open_configured(&config)?;
            to_json(store.upcoming_matches()?)
        }
        "clear-upcoming" => {
            let store = Store::open_configured(&config)?;
            to_json(json!({ "deleted": store.clear_upcoming_matches()? }))
        }
        "export" => {
            let path = positional(rest, "export <file.xlsx>")?;
            let store = Store::open_configured(&config)?;
            let history = store.bucketed_results()?;
            let buckets = config.bucket_config()?;
            let predictions = store.predictions(usize::MAX)?;
            let home_buckets = bucket_stats(&history, OddsDimension::HomeOdd, &buckets);
            let over25_buckets = bucket_stats(&history, OddsDimension::Over25Odd, &buckets);
            let patterns = pattern_stats(&history, &buckets);
            let days = day_block_performance(&history, DayGrouping::Block);
            let metrics = performance_metrics(&predictions, config.metrics_recent_window);
            let report = export_report(
                &path,
                &ReportData {
                    predictions: &predictions,
                    home_buckets: &home_buckets,
                    over25_buckets: &over25_buckets,
                    patterns: &patterns,
                    days: &days,
                    metrics: &metrics,
                },
            )?;
            to_json(report)
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

/// Stores new results and the over 2.5 history they produce against the
/// odds on file.
fn record_results(store: &mut Store, results: &[MatchResult]) -> Result<InsertSummary> {
    let summary = store.insert_results(results)?;
    let quotes = store.all_odds()?;
    let joined = join_results_with_odds(results, &quotes);
    if !joined.is_empty() {
        let history = store.insert_bucketed_results(&joined)?;
        info!(added = history.count, "over 2.5 history extended");
    }
    Ok(summary)
}

fn over25_input(args: &[String]) -> Result<UpcomingMatchInput> {
    let odd = |name: &str| -> Result<f64> {
        let raw = flag_value(args, name).ok_or_else(|| anyhow!("missing {name}"))?;
        raw.trim()
            .parse::<f64>()
            .with_context(|| format!("{name} is not a number: {raw}"))
    };
    let match_date = match flag_value(args, "--date") {
        Some(raw) => {
            let parsed = parse_cli_date(&raw);
            if parsed.is_none() {
                warn!(date = %raw, "unrecognised --date, analysing without a date");
            }
            parsed
        }
        None => None,
    };
    let (home_team, away_team) = teams_arg(args).unwrap_or_default();

    Ok(UpcomingMatchInput {
        match_date,
        block_id: flag_value(args, "--block"),
        home_team,
        away_team,
        home_odd: odd("--home")?,
        away_odd: odd("--away")?,
        over25_odd: odd("--over")?,
        under25_odd: odd("--under")?,
    })
}

fn parse_cli_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_dmy_date(raw))
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn teams_arg(args: &[String]) -> Option<(String, String)> {
    let idx = args.iter().position(|a| a == "--teams")?;
    let home = args.get(idx + 1)?;
    let away = args.get(idx + 2)?;
    Some((home.clone(), away.clone()))
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn positional(args: &[String], usage: &str) -> Result<PathBuf> {
    args.iter()
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: eagle_eye {usage}"))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn to_json(value: impl Serialize) -> Result<Value> {
    serde_json::to_value(value).context("serialize output")
}
