use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use eagle_eye::feed::{FeedOptions, parse_feed_json};
use eagle_eye::model::{PredictionLabel, PredictionStatus};
use eagle_eye::paste::{parse_odds_text, parse_results_text};
use eagle_eye::scoring::score_all;
use eagle_eye::store::{LinkSummary, Store};
use eagle_eye::tracker::{NewPrediction, performance_metrics};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn bet(home: &str, away: &str, label: PredictionLabel, odd: Option<f64>) -> NewPrediction {
    NewPrediction {
        match_date: NaiveDate::from_ymd_opt(2026, 1, 26),
        block_time: "08:00".to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        label,
        confidence: 80,
        status: PredictionStatus::Safe,
        predicted_probability: 0.8,
        market_odd: odd,
    }
}

fn undated(home: &str, away: &str) -> NewPrediction {
    NewPrediction {
        match_date: None,
        ..bet(home, away, PredictionLabel::Over15, Some(1.30))
    }
}

fn ingest_feed(store: &mut Store) {
    let results = parse_feed_json(&read_fixture("feed_day.json"), FeedOptions::default())
        .expect("feed fixture");
    store.insert_results(&results).expect("results stored");
}

fn ingest_text(store: &mut Store, text: &str) {
    let results = parse_results_text(text).expect("results text");
    store.insert_results(&results).expect("results stored");
}

fn store_with_feed_results() -> Store {
    let mut store = Store::open_in_memory().expect("store");
    ingest_feed(&mut store);
    store
}

#[test]
fn feed_reingest_counts_duplicates() {
    let mut store = store_with_feed_results();
    let results = parse_feed_json(&read_fixture("feed_day.json"), FeedOptions::default())
        .expect("feed fixture");
    let summary = store.insert_results(&results).expect("results stored");
    assert_eq!(summary.count, 0);
    assert_eq!(summary.duplicates, 4);

    let stats = store.historical_stats().expect("stats");
    assert_eq!(stats.total_matches, 4);
    assert!((stats.avg_goals - 2.5).abs() < 1e-9);
    assert!((stats.over15_rate - 75.0).abs() < 1e-9);
    assert!((stats.over25_rate - 50.0).abs() < 1e-9);
}

#[test]
fn link_resolves_each_prediction_once() {
    let mut store = Store::open_in_memory().expect("store");
    store
        .insert_prediction(&bet("LEV", "HSV", PredictionLabel::Over15, Some(1.30)))
        .expect("insert");
    store
        .insert_prediction(&bet("bvb", "sge", PredictionLabel::Over25, Some(1.45)))
        .expect("insert");
    store
        .insert_prediction(&bet("FCA", "HDH", PredictionLabel::Over15, Some(1.25)))
        .expect("insert");
    store
        .insert_prediction(&bet("WOB", "BMG", PredictionLabel::LowConfidence, None))
        .expect("insert");
    store
        .insert_prediction(&bet("SCF", "M05", PredictionLabel::Over15, Some(1.20)))
        .expect("insert");
    ingest_feed(&mut store);

    let first = store.link_results_to_predictions().expect("link");
    assert_eq!(first, LinkSummary { pending: 5, resolved: 4 });

    let second = store.link_results_to_predictions().expect("link again");
    assert_eq!(second, LinkSummary { pending: 1, resolved: 0 });

    let fca = store
        .prediction_by_match("FCA", "HDH", None)
        .expect("lookup")
        .expect("stored");
    let res = fca.resolution.expect("resolved");
    assert_eq!(res.is_correct, Some(false));
    assert_eq!(res.profit_loss, Some(-1.0));

    let wob = store
        .prediction_by_match("WOB", "BMG", None)
        .expect("lookup")
        .expect("stored");
    let res = wob.resolution.expect("resolved");
    assert_eq!(res.is_correct, None);
    assert_eq!(res.profit_loss, Some(0.0));

    let records = store.predictions(usize::MAX).expect("all predictions");
    assert_eq!(records.len(), 5);
    let m = performance_metrics(&records, 50);
    assert_eq!(m.resolved, 4);
    assert_eq!(m.bets, 3);
    assert_eq!(m.correct, 2);
    assert!((m.accuracy - 2.0 / 3.0).abs() < 1e-9);
    assert!((m.total_profit - (-0.25)).abs() < 1e-9);
    assert!((m.calibration_factor - (2.0 / 3.0) / 0.8).abs() < 1e-9);

    assert_eq!(store.predictions(2).expect("limited").len(), 2);
}

#[test]
fn recorded_predictions_carry_the_quoted_market_odd() {
    let store = store_with_feed_results();
    let quotes = parse_odds_text(&read_fixture("odds_legacy.txt")).expect("odds");
    let results = store.all_results().expect("results");
    let predictions = score_all(&quotes, &results, None);
    assert_eq!(predictions.len(), 2);

    for p in &predictions {
        let record = NewPrediction::from_prediction(p);
        assert_eq!(record.label, p.prediction);
        assert!(store.record_prediction(&record).expect("record").is_some());
    }
    let pending = store.pending_predictions().expect("pending");
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.resolution.is_none()));
}

#[test]
fn recording_the_same_slate_twice_keeps_one_bet_per_fixture() {
    let store = store_with_feed_results();
    let quotes = parse_odds_text(&read_fixture("odds_legacy.txt")).expect("odds");
    let predictions = score_all(&quotes, &store.all_results().expect("results"), None);

    for _ in 0..2 {
        for p in &predictions {
            store
                .record_prediction(&NewPrediction::from_prediction(p))
                .expect("record");
        }
    }
    assert_eq!(store.predictions(usize::MAX).expect("all").len(), 2);
}

#[test]
fn result_stored_before_the_prediction_does_not_settle_it() {
    let mut store = Store::open_in_memory().expect("store");
    ingest_text(&mut store, "08:00\tLEV 0-0 HSV");
    store.insert_prediction(&undated("LEV", "HSV")).expect("insert");

    let early = store.link_results_to_predictions().expect("link");
    assert_eq!(early, LinkSummary { pending: 1, resolved: 0 });

    ingest_text(&mut store, "08:00\tLEV 2-1 HSV");
    let later = store.link_results_to_predictions().expect("link");
    assert_eq!(later, LinkSummary { pending: 1, resolved: 1 });

    let res = store
        .prediction_by_match("LEV", "HSV", None)
        .expect("lookup")
        .expect("stored")
        .resolution
        .expect("resolved");
    assert_eq!((res.home_goals, res.away_goals), (2, 1));
    assert_eq!(res.is_correct, Some(true));
}

#[test]
fn undated_prediction_prefers_its_block_across_days() {
    let mut store = Store::open_in_memory().expect("store");
    store.insert_prediction(&undated("LEV", "HSV")).expect("insert");
    ingest_text(
        &mut store,
        "26/01/2026,07:00,LEV 1-0 HSV\n27/01/2026,08:00,LEV 0-0 HSV\n28/01/2026,09:00,LEV 3-3 HSV",
    );

    let summary = store.link_results_to_predictions().expect("link");
    assert_eq!(summary, LinkSummary { pending: 1, resolved: 1 });
    let res = store
        .prediction_by_match("LEV", "HSV", None)
        .expect("lookup")
        .expect("stored")
        .resolution
        .expect("resolved");
    assert_eq!((res.home_goals, res.away_goals), (0, 0));
    assert_eq!(res.is_correct, Some(false));
    assert_eq!(res.profit_loss, Some(-1.0));
}

#[test]
fn dated_prediction_links_to_an_undated_result() {
    let mut store = Store::open_in_memory().expect("store");
    store
        .insert_prediction(&bet("FCA", "HDH", PredictionLabel::Over15, Some(1.25)))
        .expect("insert");
    ingest_text(&mut store, "08:00\tFCA 1-1 HDH");

    let summary = store.link_results_to_predictions().expect("link");
    assert_eq!(summary, LinkSummary { pending: 1, resolved: 1 });
    let res = store
        .prediction_by_match("FCA", "HDH", NaiveDate::from_ymd_opt(2026, 1, 26))
        .expect("lookup")
        .expect("stored")
        .resolution
        .expect("resolved");
    assert_eq!(res.is_correct, Some(true));
}

#[test]
fn dated_prediction_ignores_results_from_other_days() {
    let mut store = Store::open_in_memory().expect("store");
    store
        .insert_prediction(&bet("FCA", "HDH", PredictionLabel::Over15, Some(1.25)))
        .expect("insert");
    ingest_text(&mut store, "25/01/2026,08:00,FCA 3-0 HDH");

    let summary = store.link_results_to_predictions().expect("link");
    assert_eq!(summary, LinkSummary { pending: 1, resolved: 0 });
}
