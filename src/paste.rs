//! Parsers for the two hand-pasted text formats.
//!
//! Results: `[DD/MM/YYYY<sep>]HH:MM<sep>HOME h-a AWAY`, separator tab or comma.
//! Odds: a header line followed by tab-separated rows, either
//! `Time Event 1 X 2 Goals Over Under` or the same with a leading `Date`.
//! Any malformed row rejects the whole batch.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{MAX_GOALS, MatchResult, OddsQuote};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no data rows found")]
    NoData,
    #[error("line {line}: expected {expected} columns, got {got}")]
    ColumnCount {
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("line {line}: missing separator between time and result (use tab or comma)")]
    MissingSeparator { line: usize },
    #[error("line {line}: invalid result format, expected \"TEAM GOAL-GOAL TEAM\"")]
    ResultFormat { line: usize },
    #[error("line {line}: invalid score {raw:?}, expected \"GOAL-GOAL\"")]
    Score { line: usize, raw: String },
    #[error("line {line}: invalid event format, expected \"HomeTeam - AwayTeam\"")]
    EventFormat { line: usize },
    #[error("line {line}: invalid numeric value {raw:?}")]
    Numeric { line: usize, raw: String },
    #[error("line {line}: missing required fields")]
    MissingField { line: usize },
}

pub fn parse_results_text(input: &str) -> Result<Vec<MatchResult>, ParseError> {
    let mut out = Vec::new();

    for (idx, raw_line) in input.trim().lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(['\t', ',']).map(str::trim).collect();
        let (date_col, time_col, result_col) = if looks_like_dmy(parts[0]) {
            if parts.len() < 3 {
                return Err(ParseError::ColumnCount {
                    line: line_no,
                    expected: 3,
                    got: parts.len(),
                });
            }
            (Some(parts[0]), parts[1], parts[2])
        } else {
            if parts.len() < 2 {
                return Err(ParseError::MissingSeparator { line: line_no });
            }
            (None, parts[0], parts[1])
        };

        let tokens: Vec<&str> = result_col.split_whitespace().collect();
        let [home, score, away] = tokens.as_slice() else {
            return Err(ParseError::ResultFormat { line: line_no });
        };
        let Some((home_goals, away_goals)) = split_score(score, '-') else {
            return Err(ParseError::Score {
                line: line_no,
                raw: score.to_string(),
            });
        };
        if time_col.is_empty() {
            return Err(ParseError::MissingField { line: line_no });
        }

        out.push(MatchResult::new(
            time_col,
            date_col.and_then(parse_dmy_date),
            *home,
            *away,
            home_goals,
            away_goals,
        ));
    }

    if out.is_empty() {
        return Err(ParseError::NoData);
    }
    Ok(out)
}

pub fn parse_odds_text(input: &str) -> Result<Vec<OddsQuote>, ParseError> {
    let lines: Vec<&str> = input.trim().lines().collect();
    if lines.len() < 2 {
        return Err(ParseError::NoData);
    }

    // The header is the only hint of which layout the rows use.
    let dated = lines[0].to_ascii_lowercase().contains("date");
    let expected = if dated { 9 } else { 8 };
    let offset = usize::from(dated);

    let mut out = Vec::new();
    for (idx, raw_line) in lines.iter().enumerate().skip(1) {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').map(str::trim).collect();
        if parts.len() < expected {
            return Err(ParseError::ColumnCount {
                line: line_no,
                expected,
                got: parts.len(),
            });
        }

        let match_date = if dated {
            parse_dmy_date(parts[0])
        } else {
            None
        };
        let time_col = parts[offset];
        let event_col = parts[offset + 1];

        let teams: Vec<&str> = event_col.split(" - ").map(str::trim).collect();
        let [home, away] = teams.as_slice() else {
            return Err(ParseError::EventFormat { line: line_no });
        };

        let mut odds = [0.0_f64; 6];
        for (slot, raw) in odds.iter_mut().zip(&parts[offset + 2..offset + 8]) {
            *slot = parse_decimal(raw).ok_or_else(|| ParseError::Numeric {
                line: line_no,
                raw: raw.to_string(),
            })?;
        }

        if time_col.is_empty() || home.is_empty() || away.is_empty() {
            return Err(ParseError::MissingField { line: line_no });
        }

        let [home_odd, draw_odd, away_odd, goal_line, over_odd, under_odd] = odds;
        out.push(OddsQuote {
            block_time: time_col.to_string(),
            match_date,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_odd,
            draw_odd,
            away_odd,
            goal_line,
            over_odd,
            under_odd,
        });
    }

    if out.is_empty() {
        return Err(ParseError::NoData);
    }
    Ok(out)
}

/// `DD/MM/YYYY` to a calendar date. Anything else is treated as absent.
pub fn parse_dmy_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().split('/');
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    let month = parts.next()?.trim().parse::<u32>().ok()?;
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `h<sep>a` with each side at most [`MAX_GOALS`].
pub(crate) fn split_score(raw: &str, sep: char) -> Option<(u32, u32)> {
    let goals = |s: &str| s.trim().parse::<u32>().ok().filter(|g| *g <= MAX_GOALS);
    let mut parts = raw.split(sep);
    let home = goals(parts.next()?)?;
    let away = goals(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((home, away))
}

fn looks_like_dmy(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return false;
    };
    let digits = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };
    digits(day, 1, 2) && digits(month, 1, 2) && digits(year, 4, 4)
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_result_line_parses() {
        let rows = parse_results_text("08:24\tLEV 0-2 HSV").expect("should parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].block_time, "08:24");
        assert_eq!(rows[0].home_team, "LEV");
        assert_eq!(rows[0].away_team, "HSV");
        assert_eq!((rows[0].home_goals(), rows[0].away_goals()), (0, 2));
        assert!(rows[0].over_15());
        assert!(!rows[0].over_25());
        assert_eq!(rows[0].match_date, None);
    }

    #[test]
    fn dated_comma_separated_result_line_parses() {
        let rows = parse_results_text("26/1/2026,08:24,LEV 3-1 HSV").expect("should parse");
        assert_eq!(rows[0].match_date, NaiveDate::from_ymd_opt(2026, 1, 26));
        assert_eq!(rows[0].total_goals(), 4);
        assert!(rows[0].over_25());
    }

    #[test]
    fn impossible_date_is_passed_through_as_absent() {
        let rows = parse_results_text("31/02/2026\t08:24\tLEV 1-1 HSV").expect("should parse");
        assert_eq!(rows[0].match_date, None);
        assert_eq!(rows[0].block_time, "08:24");
    }

    #[test]
    fn bad_result_row_fails_whole_batch_with_line_number() {
        let input = "08:00\tA 1-0 B\n\n08:03\tA 1:0 B";
        let err = parse_results_text(input).unwrap_err();
        assert_eq!(
            err,
            ParseError::Score {
                line: 3,
                raw: "1:0".to_string()
            }
        );
        assert!(err.to_string().starts_with("line 3:"));
    }

    #[test]
    fn result_row_without_separator_is_rejected() {
        let err = parse_results_text("08:00 A 1-0 B").unwrap_err();
        assert_eq!(err, ParseError::MissingSeparator { line: 1 });
    }

    #[test]
    fn result_row_with_extra_tokens_is_rejected() {
        let err = parse_results_text("08:00\tMAN UTD 1-0 B").unwrap_err();
        assert_eq!(err, ParseError::ResultFormat { line: 1 });
    }

    #[test]
    fn empty_input_has_no_data() {
        assert_eq!(parse_results_text("  \n "), Err(ParseError::NoData));
        assert_eq!(parse_odds_text("Time\tEvent"), Err(ParseError::NoData));
    }

    #[test]
    fn odds_legacy_layout_is_detected_from_header() {
        let input = "Time\tEvent\t1\tX\t2\tGoals\tOver\tUnder\n\
                     05:36\tFCA - HDH\t1.55\t4.10\t5.20\t2.5\t1.72\t2.05";
        let rows = parse_odds_text(input).expect("should parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].home_team, "FCA");
        assert_eq!(rows[0].away_team, "HDH");
        assert_eq!(rows[0].match_date, None);
        assert!((rows[0].home_odd - 1.55).abs() < 1e-9);
        assert!(rows[0].is_line(2.5));
    }

    #[test]
    fn odds_dated_layout_is_detected_from_header() {
        let input = "Date\tTime\tEvent\t1\tX\t2\tGoals\tOver\tUnder\n\
                     26/01/2026\t05:36\tFCA - HDH\t1.55\t4.10\t5.20\t2.5\t1.72\t2.05";
        let rows = parse_odds_text(input).expect("should parse");
        assert_eq!(rows[0].match_date, NaiveDate::from_ymd_opt(2026, 1, 26));
        assert_eq!(rows[0].block_time, "05:36");
        assert!((rows[0].under_odd - 2.05).abs() < 1e-9);
    }

    #[test]
    fn dated_header_with_short_rows_reports_column_count() {
        let input = "Date\tTime\tEvent\t1\tX\t2\tGoals\tOver\tUnder\n\
                     05:36\tFCA - HDH\t1.55\t4.10\t5.20\t2.5\t1.72\t2.05";
        let err = parse_odds_text(input).unwrap_err();
        assert_eq!(
            err,
            ParseError::ColumnCount {
                line: 2,
                expected: 9,
                got: 8
            }
        );
    }

    #[test]
    fn odds_non_numeric_and_bad_event_are_rejected() {
        let bad_number = "Time\tEvent\t1\tX\t2\tGoals\tOver\tUnder\n\
                          05:36\tFCA - HDH\tabc\t4.10\t5.20\t2.5\t1.72\t2.05";
        assert!(matches!(
            parse_odds_text(bad_number),
            Err(ParseError::Numeric { line: 2, .. })
        ));

        let bad_event = "Time\tEvent\t1\tX\t2\tGoals\tOver\tUnder\n\
                         05:36\tFCA vs HDH\t1.5\t4.10\t5.20\t2.5\t1.72\t2.05";
        assert_eq!(
            parse_odds_text(bad_event),
            Err(ParseError::EventFormat { line: 2 })
        );
    }

    #[test]
    fn score_split_requires_exactly_two_numbers() {
        assert_eq!(split_score("2:1", ':'), Some((2, 1)));
        assert_eq!(split_score(" 0 : 0 ", ':'), Some((0, 0)));
        assert_eq!(split_score("2:1:0", ':'), None);
        assert_eq!(split_score("x:1", ':'), None);
        assert_eq!(split_score("21", ':'), None);
        assert_eq!(split_score("65535:0", ':'), Some((65535, 0)));
        assert_eq!(split_score("65536:0", ':'), None);
    }

    #[test]
    fn oversized_score_rejects_the_batch() {
        let err = parse_results_text("08:00\tA 4294967295-1 B").unwrap_err();
        assert_eq!(
            err,
            ParseError::Score {
                line: 1,
                raw: "4294967295-1".to_string()
            }
        );
    }
}
