//! Grouping and hit-rate statistics over historical records.
//!
//! Every function recomputes from the slice it is given; nothing is cached.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::buckets::{BucketConfig, OddsDimension, classify, pattern_hash};
use crate::model::{
    BucketPerformance, BucketedResult, DayBlockPerformance, HistoricalStats, MatchResult,
    OddsPattern, OddsQuote, OverallOver25Stats, StreakType, TeamStats, rate_pct,
};

const DEFAULT_BLOCK_ID: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayGrouping {
    Day,
    Block,
}

pub fn historical_stats<'a>(results: impl IntoIterator<Item = &'a MatchResult>) -> HistoricalStats {
    let mut n = 0usize;
    let mut goals = 0u64;
    let mut over15 = 0usize;
    let mut over25 = 0usize;
    for r in results {
        n += 1;
        goals += u64::from(r.total_goals());
        over15 += usize::from(r.over_15());
        over25 += usize::from(r.over_25());
    }
    if n == 0 {
        return HistoricalStats::default();
    }
    HistoricalStats {
        total_matches: n,
        avg_goals: goals as f64 / n as f64,
        over15_rate: rate_pct(over15, n),
        over25_rate: rate_pct(over25, n),
    }
}

pub fn time_block_stats(results: &[MatchResult], block_time: &str) -> HistoricalStats {
    historical_stats(results.iter().filter(|r| r.block_time == block_time))
}

pub fn overall_stats(results: &[MatchResult]) -> HistoricalStats {
    historical_stats(results)
}

pub fn team_stats(results: &[MatchResult], team: &str) -> TeamStats {
    let mut n = 0usize;
    let mut scored = 0u64;
    let mut conceded = 0u64;
    let mut over15 = 0usize;

    for r in results.iter().filter(|r| r.involves(team)) {
        n += 1;
        over15 += usize::from(r.over_15());
        if r.home_team.eq_ignore_ascii_case(team) {
            scored += u64::from(r.home_goals());
            conceded += u64::from(r.away_goals());
        } else {
            scored += u64::from(r.away_goals());
            conceded += u64::from(r.home_goals());
        }
    }

    if n == 0 {
        return TeamStats::default();
    }
    TeamStats {
        avg_scored: scored as f64 / n as f64,
        avg_conceded: conceded as f64 / n as f64,
        matches_played: n,
        over15_rate: rate_pct(over15, n),
    }
}

/// Length and direction of the run of identical over/under outcomes at the
/// most recent end of `records`.
pub fn current_streak(records: &[&BucketedResult]) -> (usize, StreakType) {
    let mut sorted = records.to_vec();
    // Stable: same-day records keep their input order.
    sorted.sort_by(|a, b| b.match_date.cmp(&a.match_date));

    let Some(first) = sorted.first() else {
        return (0, StreakType::None);
    };
    let want = first.result_over25;
    let streak = sorted
        .iter()
        .take_while(|r| r.result_over25 == want)
        .count();
    let kind = if want {
        StreakType::Over
    } else {
        StreakType::Under
    };
    (streak, kind)
}

pub fn bucket_stats(
    records: &[BucketedResult],
    dimension: OddsDimension,
    config: &BucketConfig,
) -> Vec<BucketPerformance> {
    let mut groups: HashMap<&str, Vec<&BucketedResult>> = HashMap::new();
    for r in records {
        let odd = match dimension {
            OddsDimension::HomeOdd => r.home_odd,
            OddsDimension::Over25Odd => r.over25_odd,
        };
        let Some(odd) = odd.filter(|v| *v > 0.0) else {
            continue;
        };
        groups
            .entry(classify(odd, dimension, config))
            .or_default()
            .push(r);
    }

    let mut out: Vec<BucketPerformance> = groups
        .into_iter()
        .map(|(label, rows)| {
            let hits = rows.iter().filter(|r| r.result_over25).count();
            let (current_streak, streak_type) = current_streak(&rows);
            BucketPerformance {
                bucket_range: label.to_string(),
                total_matches: rows.len(),
                over25_hits: hits,
                over25_rate: rate_pct(hits, rows.len()),
                current_streak,
                streak_type,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_matches
            .cmp(&a.total_matches)
            .then_with(|| a.bucket_range.cmp(&b.bucket_range))
    });
    out
}

pub fn pattern_stats(records: &[BucketedResult], config: &BucketConfig) -> Vec<OddsPattern> {
    let mut groups: HashMap<(&str, &str), Vec<&BucketedResult>> = HashMap::new();
    for r in records {
        let (Some(home_odd), Some(over25_odd)) = (r.home_odd, r.over25_odd) else {
            continue;
        };
        if home_odd <= 0.0 || over25_odd <= 0.0 {
            continue;
        }
        let key = (
            classify(home_odd, OddsDimension::HomeOdd, config),
            classify(over25_odd, OddsDimension::Over25Odd, config),
        );
        groups.entry(key).or_default().push(r);
    }

    let mut out: Vec<OddsPattern> = groups
        .into_iter()
        .filter_map(|((home, over25), rows)| {
            let last_seen = rows.iter().map(|r| r.match_date).max()?;
            let hits = rows.iter().filter(|r| r.result_over25).count();
            let (current_streak, streak_type) = current_streak(&rows);
            Some(OddsPattern {
                pattern_hash: pattern_hash(home, over25),
                home_odd_range: home.to_string(),
                over25_odd_range: over25.to_string(),
                total_matches: rows.len(),
                over25_hits: hits,
                over25_rate: rate_pct(hits, rows.len()),
                current_streak,
                streak_type,
                last_seen,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_matches
            .cmp(&a.total_matches)
            .then_with(|| a.pattern_hash.cmp(&b.pattern_hash))
    });
    out
}

pub fn day_block_performance(
    records: &[BucketedResult],
    grouping: DayGrouping,
) -> Vec<DayBlockPerformance> {
    let mut groups: HashMap<(NaiveDate, Option<&str>), (usize, usize)> = HashMap::new();
    for r in records {
        let block = match grouping {
            DayGrouping::Day => None,
            DayGrouping::Block => Some(r.block_id.as_deref().unwrap_or(DEFAULT_BLOCK_ID)),
        };
        let entry = groups.entry((r.match_date, block)).or_default();
        entry.0 += 1;
        entry.1 += usize::from(r.result_over25);
    }

    let mut out: Vec<DayBlockPerformance> = groups
        .into_iter()
        .map(|((date, block), (total, hits))| DayBlockPerformance {
            date,
            block_id: block.map(str::to_string),
            total_matches: total,
            over25_hits: hits,
            over25_rate: rate_pct(hits, total),
        })
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.block_id.cmp(&b.block_id)));
    out
}

pub fn overall_over25(records: &[BucketedResult]) -> OverallOver25Stats {
    let rows: Vec<&BucketedResult> = records.iter().collect();
    let hits = rows.iter().filter(|r| r.result_over25).count();
    let (current_streak, streak_type) = current_streak(&rows);
    OverallOver25Stats {
        total_matches: rows.len(),
        over25_hits: hits,
        over25_rate: rate_pct(hits, rows.len()),
        current_streak,
        streak_type,
    }
}

/// Pairs finished results with the quote recorded for the same fixture.
///
/// Over/under 2.5 prices are only taken from quotes on the 2.5 line. A pair
/// with no date on either side cannot be placed in time and is skipped.
pub fn join_results_with_odds(results: &[MatchResult], quotes: &[OddsQuote]) -> Vec<BucketedResult> {
    let mut out = Vec::new();
    for r in results {
        let quote = quotes.iter().find(|q| {
            q.block_time == r.block_time
                && q.home_team.eq_ignore_ascii_case(&r.home_team)
                && q.away_team.eq_ignore_ascii_case(&r.away_team)
                && match (q.match_date, r.match_date) {
                    (Some(qd), Some(rd)) => qd == rd,
                    _ => true,
                }
        });
        let Some(quote) = quote else {
            continue;
        };
        let Some(match_date) = r.match_date.or(quote.match_date) else {
            continue;
        };
        let on_line = quote.is_line(2.5);
        out.push(BucketedResult {
            match_date,
            block_id: Some(r.block_time.clone()),
            home_team: r.home_team.clone(),
            away_team: r.away_team.clone(),
            home_odd: Some(quote.home_odd),
            away_odd: Some(quote.away_odd),
            over25_odd: on_line.then_some(quote.over_odd),
            under25_odd: on_line.then_some(quote.under_odd),
            home_goals: r.home_goals(),
            away_goals: r.away_goals(),
            result_over25: r.over_25(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn bucketed(d: u32, home_odd: f64, over25_odd: f64, over: bool) -> BucketedResult {
        BucketedResult {
            match_date: day(d),
            block_id: None,
            home_team: "H".to_string(),
            away_team: "A".to_string(),
            home_odd: Some(home_odd),
            away_odd: Some(4.0),
            over25_odd: Some(over25_odd),
            under25_odd: Some(2.0),
            home_goals: if over { 2 } else { 0 },
            away_goals: if over { 1 } else { 0 },
            result_over25: over,
        }
    }

    #[test]
    fn block_stats_match_worked_example() {
        let results = vec![
            MatchResult::new("08:00", None, "A", "B", 2, 1),
            MatchResult::new("08:00", None, "A", "C", 0, 0),
            MatchResult::new("09:00", None, "B", "C", 5, 0),
        ];
        let stats = time_block_stats(&results, "08:00");
        assert_eq!(stats.total_matches, 2);
        assert!((stats.avg_goals - 1.5).abs() < 1e-9);
        assert!((stats.over15_rate - 50.0).abs() < 1e-9);
        assert!(stats.over25_rate.abs() < 1e-9);
    }

    #[test]
    fn empty_block_is_all_zero() {
        assert_eq!(time_block_stats(&[], "08:00"), HistoricalStats::default());
    }

    #[test]
    fn team_stats_orient_goals_per_side() {
        let results = vec![
            MatchResult::new("08:00", None, "LEV", "HSV", 3, 1),
            MatchResult::new("08:03", None, "BMG", "lev", 2, 0),
            MatchResult::new("08:06", None, "BMG", "HSV", 1, 1),
        ];
        let stats = team_stats(&results, "Lev");
        assert_eq!(stats.matches_played, 2);
        assert!((stats.avg_scored - 1.5).abs() < 1e-9);
        assert!((stats.avg_conceded - 1.5).abs() < 1e-9);
        assert!((stats.over15_rate - 100.0).abs() < 1e-9);
        assert_eq!(team_stats(&results, "XYZ"), TeamStats::default());
    }

    #[test]
    fn streak_counts_leading_run_by_date() {
        let rows = [
            bucketed(1, 1.5, 1.7, true),
            bucketed(4, 1.5, 1.7, false),
            bucketed(2, 1.5, 1.7, true),
            bucketed(3, 1.5, 1.7, false),
        ];
        let refs: Vec<&BucketedResult> = rows.iter().collect();
        assert_eq!(current_streak(&refs), (2, StreakType::Under));
        assert_eq!(current_streak(&[]), (0, StreakType::None));
    }

    #[test]
    fn bucket_stats_rank_by_sample_size() {
        let rows = vec![
            bucketed(1, 1.55, 1.7, true),
            bucketed(2, 1.60, 1.7, true),
            bucketed(3, 1.30, 1.7, false),
            BucketedResult {
                home_odd: None,
                ..bucketed(4, 1.0, 1.7, false)
            },
        ];
        let stats = bucket_stats(&rows, OddsDimension::HomeOdd, &BucketConfig::default());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].bucket_range, "1.41-1.70");
        assert_eq!(stats[0].total_matches, 2);
        assert!((stats[0].over25_rate - 100.0).abs() < 1e-9);
        assert_eq!((stats[0].current_streak, stats[0].streak_type), (2, StreakType::Over));
        assert_eq!(stats[1].bucket_range, "1.20-1.40");
    }

    #[test]
    fn patterns_track_last_seen_and_tiebreak_on_hash() {
        let rows = vec![
            bucketed(5, 1.55, 1.50, true),
            bucketed(9, 1.55, 1.50, false),
            bucketed(7, 2.50, 1.90, true),
            bucketed(8, 1.30, 1.90, true),
        ];
        let patterns = pattern_stats(&rows, &BucketConfig::default());
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[0].pattern_hash, "1.41-1.70_1.41-1.60");
        assert_eq!(patterns[0].last_seen, day(9));
        assert_eq!(patterns[0].streak_type, StreakType::Under);
        assert_eq!(patterns[1].pattern_hash, "1.20-1.40_1.81+");
        assert_eq!(patterns[2].pattern_hash, "2.21+_1.81+");
    }

    #[test]
    fn day_grouping_sorts_newest_first() {
        let mut rows = vec![
            bucketed(1, 1.5, 1.7, true),
            bucketed(3, 1.5, 1.7, false),
            bucketed(3, 1.5, 1.7, true),
        ];
        rows[2].block_id = Some("B2".to_string());

        let days = day_block_performance(&rows, DayGrouping::Day);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, day(3));
        assert_eq!(days[0].total_matches, 2);
        assert!((days[0].over25_rate - 50.0).abs() < 1e-9);

        let blocks = day_block_performance(&rows, DayGrouping::Block);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].block_id.as_deref(), Some("B2"));
        assert_eq!(blocks[1].block_id.as_deref(), Some("default"));
    }

    #[test]
    fn aggregation_is_repeatable() {
        let rows: Vec<BucketedResult> = (1..=20)
            .map(|d| bucketed(d, 1.2 + d as f64 * 0.05, 1.3 + d as f64 * 0.03, d % 3 == 0))
            .collect();
        let cfg = BucketConfig::default();
        assert_eq!(pattern_stats(&rows, &cfg), pattern_stats(&rows, &cfg));
        assert_eq!(
            bucket_stats(&rows, OddsDimension::Over25Odd, &cfg),
            bucket_stats(&rows, OddsDimension::Over25Odd, &cfg)
        );
    }

    #[test]
    fn join_pairs_results_with_their_quote() {
        let date = Some(day(26));
        let results = vec![
            MatchResult::new("05:36", date, "FCA", "HDH", 2, 2),
            MatchResult::new("05:39", date, "BMG", "RBL", 1, 0),
        ];
        let quotes = vec![
            OddsQuote {
                block_time: "05:36".to_string(),
                match_date: date,
                home_team: "FCA".to_string(),
                away_team: "HDH".to_string(),
                home_odd: 1.55,
                draw_odd: 4.1,
                away_odd: 5.2,
                goal_line: 2.5,
                over_odd: 1.72,
                under_odd: 2.05,
            },
            OddsQuote {
                block_time: "05:39".to_string(),
                match_date: date,
                home_team: "BMG".to_string(),
                away_team: "RBL".to_string(),
                home_odd: 2.0,
                draw_odd: 3.4,
                away_odd: 3.1,
                goal_line: 1.5,
                over_odd: 1.30,
                under_odd: 3.2,
            },
        ];
        let joined = join_results_with_odds(&results, &quotes);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].over25_odd, Some(1.72));
        assert!(joined[0].result_over25);
        assert_eq!(joined[1].over25_odd, None);
        assert_eq!(joined[1].home_odd, Some(2.0));
        assert_eq!(joined[1].block_id.as_deref(), Some("05:39"));
    }
}
