use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::overall_stats;
use crate::buckets::OddsDimension;
use crate::config::AppConfig;
use crate::model::{
    BucketPerformance, BucketedResult, HistoricalStats, MatchResult, OddsPattern, OddsQuote,
    PredictionLabel, PredictionStatus, StreakType,
};
use crate::over25::{Confidence, Over25Analysis, UpcomingMatch, UpcomingMatchInput};
use crate::tracker::{NewPrediction, PredictionRecord, Resolution, StoredResult, reconcile};

const PAGE_SIZE: usize = 1000;
const DATE_FMT: &str = "%Y-%m-%d";
/// `bucketed_results.block_id` is part of a UNIQUE key, so a missing block is
/// stored as the empty string rather than NULL.
const NO_BLOCK: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InsertSummary {
    pub count: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkSummary {
    pub pending: usize,
    pub resolved: usize,
}

/// Persistent state: results, odds, predictions and the over 2.5 tables.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        debug!(path = %path.display(), "store opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_configured(config: &AppConfig) -> Result<Self> {
        let path = config
            .db_path
            .as_deref()
            .ok_or_else(|| anyhow!("store not initialized: set EAGLE_EYE_DB or HOME"))?;
        Self::open(path)
    }

    // ---- results ----

    pub fn insert_results(&mut self, results: &[MatchResult]) -> Result<InsertSummary> {
        let created_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().context("begin results transaction")?;
        let mut count = 0usize;
        for r in results {
            count += tx
                .execute(
                    r#"
                    INSERT OR IGNORE INTO results (
                        block_time, match_date, home_team, away_team,
                        home_goals, away_goals, total_goals, over_15, over_25, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        r.block_time,
                        date_to_sql(r.match_date),
                        r.home_team,
                        r.away_team,
                        i64::from(r.home_goals()),
                        i64::from(r.away_goals()),
                        i64::from(r.total_goals()),
                        bool_to_i64(r.over_15()),
                        bool_to_i64(r.over_25()),
                        created_at,
                    ],
                )
                .context("insert result")?;
        }
        tx.commit().context("commit results transaction")?;

        let summary = InsertSummary {
            count,
            duplicates: results.len() - count,
        };
        info!(
            inserted = summary.count,
            duplicates = summary.duplicates,
            "results stored"
        );
        Ok(summary)
    }

    /// Every stored result, oldest first, read in pages.
    pub fn all_results(&self) -> Result<Vec<MatchResult>> {
        Ok(self
            .stored_results()?
            .into_iter()
            .map(|s| s.result)
            .collect())
    }

    /// [`Store::all_results`] with the time each row was ingested.
    pub fn stored_results(&self) -> Result<Vec<StoredResult>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT block_time, match_date, home_team, away_team, home_goals, away_goals,
                       created_at
                FROM results
                ORDER BY id ASC
                LIMIT ?1 OFFSET ?2
                "#,
            )
            .context("prepare results page query")?;

        let mut out = Vec::new();
        loop {
            let rows = stmt
                .query_map(params![PAGE_SIZE as i64, out.len() as i64], |row| {
                    Ok(StoredResult {
                        stored_at: timestamp_from_sql(6, row.get(6)?)?,
                        result: MatchResult::new(
                            row.get::<_, String>(0)?,
                            date_from_sql(row.get(1)?),
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            goals_from_sql(row, 4)?,
                            goals_from_sql(row, 5)?,
                        ),
                    })
                })
                .context("query results page")?;
            let mut page = 0usize;
            for row in rows {
                out.push(row.context("decode result row")?);
                page += 1;
            }
            if page < PAGE_SIZE {
                break;
            }
        }
        Ok(out)
    }

    pub fn historical_stats(&self) -> Result<HistoricalStats> {
        Ok(overall_stats(&self.all_results()?))
    }

    // ---- odds ----

    pub fn insert_odds(&mut self, quotes: &[OddsQuote]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin odds transaction")?;
        insert_odds_tx(&tx, quotes)?;
        tx.commit().context("commit odds transaction")?;
        Ok(quotes.len())
    }

    pub fn all_odds(&self) -> Result<Vec<OddsQuote>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT block_time, match_date, home_team, away_team,
                       home_odd, draw_odd, away_odd, goal_line, over_odd, under_odd
                FROM odds
                ORDER BY id ASC
                "#,
            )
            .context("prepare odds query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OddsQuote {
                    block_time: row.get(0)?,
                    match_date: date_from_sql(row.get(1)?),
                    home_team: row.get(2)?,
                    away_team: row.get(3)?,
                    home_odd: row.get(4)?,
                    draw_odd: row.get(5)?,
                    away_odd: row.get(6)?,
                    goal_line: row.get(7)?,
                    over_odd: row.get(8)?,
                    under_odd: row.get(9)?,
                })
            })
            .context("query odds")?;
        collect_rows(rows, "decode odds row")
    }

    pub fn clear_odds(&self) -> Result<usize> {
        self.conn
            .execute("DELETE FROM odds", [])
            .context("clear odds")
    }

    /// Swaps the stored odds for `quotes` in one transaction.
    pub fn replace_odds(&mut self, quotes: &[OddsQuote]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin odds transaction")?;
        let cleared = tx.execute("DELETE FROM odds", []).context("clear odds")?;
        insert_odds_tx(&tx, quotes)?;
        tx.commit().context("commit odds transaction")?;
        info!(cleared, inserted = quotes.len(), "odds replaced");
        Ok(quotes.len())
    }

    // ---- predictions ----

    pub fn insert_prediction(&self, p: &NewPrediction) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO predictions (
                    created_at, match_date, block_time, home_team, away_team,
                    label, confidence, status, predicted_probability, market_odd
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    Utc::now().to_rfc3339(),
                    date_to_sql(p.match_date),
                    p.block_time,
                    p.home_team,
                    p.away_team,
                    p.label.as_str(),
                    i64::from(p.confidence),
                    p.status.as_str(),
                    p.predicted_probability,
                    p.market_odd,
                ],
            )
            .context("insert prediction")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Stores `p` unless the same fixture (teams, date and block time) already
    /// has a pending prediction. Returns the new id, or `None` when skipped.
    pub fn record_prediction(&self, p: &NewPrediction) -> Result<Option<i64>> {
        let inserted = self
            .conn
            .execute(
                r#"
                INSERT INTO predictions (
                    created_at, match_date, block_time, home_team, away_team,
                    label, confidence, status, predicted_probability, market_odd
                )
                SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
                WHERE NOT EXISTS (
                    SELECT 1 FROM predictions
                    WHERE resolved_at IS NULL
                      AND match_date IS ?2
                      AND block_time = ?3
                      AND lower(home_team) = lower(?4)
                      AND lower(away_team) = lower(?5)
                )
                "#,
                params![
                    Utc::now().to_rfc3339(),
                    date_to_sql(p.match_date),
                    p.block_time,
                    p.home_team,
                    p.away_team,
                    p.label.as_str(),
                    i64::from(p.confidence),
                    p.status.as_str(),
                    p.predicted_probability,
                    p.market_odd,
                ],
            )
            .context("record prediction")?;
        if inserted == 0 {
            debug!(
                home = %p.home_team,
                away = %p.away_team,
                block = %p.block_time,
                "prediction already pending"
            );
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    /// Most recent predictions first. `usize::MAX` reads them all.
    pub fn predictions(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = i64::try_from(limit).unwrap_or(-1);
        let sql = format!("{PREDICTION_SELECT} ORDER BY created_at DESC, id DESC LIMIT ?1");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("prepare predictions query")?;
        let rows = stmt
            .query_map(params![limit], prediction_from_row)
            .context("query predictions")?;
        collect_rows(rows, "decode prediction row")
    }

    pub fn pending_predictions(&self) -> Result<Vec<PredictionRecord>> {
        let sql = format!("{PREDICTION_SELECT} WHERE resolved_at IS NULL ORDER BY id ASC");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("prepare pending predictions query")?;
        let rows = stmt
            .query_map([], prediction_from_row)
            .context("query pending predictions")?;
        collect_rows(rows, "decode prediction row")
    }

    /// Latest prediction for a fixture; the date only narrows when given.
    pub fn prediction_by_match(
        &self,
        home_team: &str,
        away_team: &str,
        match_date: Option<NaiveDate>,
    ) -> Result<Option<PredictionRecord>> {
        let sql = format!(
            "{PREDICTION_SELECT}
             WHERE lower(home_team) = lower(?1)
               AND lower(away_team) = lower(?2)
               AND (?3 IS NULL OR match_date = ?3)
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        self.conn
            .query_row(
                &sql,
                params![home_team, away_team, date_to_sql(match_date)],
                prediction_from_row,
            )
            .optional()
            .context("query prediction by match")
    }

    /// Records the outcome. Returns false when the row was already resolved.
    pub fn resolve_prediction(&self, id: i64, res: &Resolution) -> Result<bool> {
        resolve_on(&self.conn, id, res)
    }

    /// Resolves every pending prediction whose result has been ingested.
    pub fn link_results_to_predictions(&mut self) -> Result<LinkSummary> {
        let pending = self.pending_predictions()?;
        if pending.is_empty() {
            return Ok(LinkSummary::default());
        }
        let results = self.stored_results()?;
        let resolutions = reconcile(&pending, &results);

        let tx = self.conn.transaction().context("begin link transaction")?;
        let mut resolved = 0usize;
        for (id, res) in &resolutions {
            if resolve_on(&tx, *id, res)? {
                resolved += 1;
            }
        }
        tx.commit().context("commit link transaction")?;

        info!(pending = pending.len(), resolved, "predictions linked to results");
        Ok(LinkSummary {
            pending: pending.len(),
            resolved,
        })
    }

    // ---- upcoming matches ----

    pub fn insert_upcoming_match(
        &self,
        input: &UpcomingMatchInput,
        analysis: &Over25Analysis,
    ) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO upcoming_matches (
                    created_at, match_date, block_id, home_team, away_team,
                    home_odd, away_odd, over25_odd, under25_odd,
                    bucket_home, bucket_over25, pattern_hash, historical_over25_rate,
                    total_in_bucket, current_streak, streak_type,
                    confidence_indicator, recommendation
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                "#,
                params![
                    Utc::now().to_rfc3339(),
                    date_to_sql(input.match_date),
                    input.block_id,
                    input.home_team,
                    input.away_team,
                    input.home_odd,
                    input.away_odd,
                    input.over25_odd,
                    input.under25_odd,
                    analysis.bucket_home,
                    analysis.bucket_over25,
                    analysis.pattern_hash,
                    analysis.historical_over25_rate,
                    analysis.total_in_bucket as i64,
                    analysis.current_streak as i64,
                    analysis.streak_type.as_str(),
                    analysis.confidence_indicator.as_str(),
                    analysis.recommendation,
                ],
            )
            .context("insert upcoming match")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn upcoming_matches(&self) -> Result<Vec<UpcomingMatch>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, created_at, match_date, block_id, home_team, away_team,
                       home_odd, away_odd, over25_odd, under25_odd,
                       bucket_home, bucket_over25, pattern_hash, historical_over25_rate,
                       total_in_bucket, current_streak, streak_type,
                       confidence_indicator, recommendation
                FROM upcoming_matches
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .context("prepare upcoming matches query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UpcomingMatch {
                    id: row.get(0)?,
                    created_at: timestamp_from_sql(1, row.get(1)?)?,
                    input: UpcomingMatchInput {
                        match_date: date_from_sql(row.get(2)?),
                        block_id: row.get(3)?,
                        home_team: row.get(4)?,
                        away_team: row.get(5)?,
                        home_odd: row.get(6)?,
                        away_odd: row.get(7)?,
                        over25_odd: row.get(8)?,
                        under25_odd: row.get(9)?,
                    },
                    analysis: Over25Analysis {
                        bucket_home: row.get(10)?,
                        bucket_over25: row.get(11)?,
                        pattern_hash: row.get(12)?,
                        historical_over25_rate: row.get(13)?,
                        total_in_bucket: count_from_sql(row, 14)?,
                        current_streak: count_from_sql(row, 15)?,
                        streak_type: StreakType::parse(&row.get::<_, String>(16)?),
                        confidence_indicator: text_col(row, 17, Confidence::parse)?,
                        recommendation: row.get(18)?,
                    },
                })
            })
            .context("query upcoming matches")?;
        collect_rows(rows, "decode upcoming match row")
    }

    pub fn clear_upcoming_matches(&self) -> Result<usize> {
        self.conn
            .execute("DELETE FROM upcoming_matches", [])
            .context("clear upcoming matches")
    }

    // ---- over 2.5 history ----

    pub fn insert_bucketed_results(&mut self, records: &[BucketedResult]) -> Result<InsertSummary> {
        let tx = self
            .conn
            .transaction()
            .context("begin bucketed results transaction")?;
        let mut count = 0usize;
        for r in records {
            count += tx
                .execute(
                    r#"
                    INSERT OR IGNORE INTO bucketed_results (
                        match_date, block_id, home_team, away_team,
                        home_odd, away_odd, over25_odd, under25_odd,
                        home_goals, away_goals, result_over25
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        r.match_date.format(DATE_FMT).to_string(),
                        r.block_id.as_deref().unwrap_or(NO_BLOCK),
                        r.home_team,
                        r.away_team,
                        r.home_odd,
                        r.away_odd,
                        r.over25_odd,
                        r.under25_odd,
                        i64::from(r.home_goals),
                        i64::from(r.away_goals),
                        bool_to_i64(r.result_over25),
                    ],
                )
                .context("insert bucketed result")?;
        }
        tx.commit().context("commit bucketed results transaction")?;
        debug!(inserted = count, total = records.len(), "bucketed results stored");
        Ok(InsertSummary {
            count,
            duplicates: records.len() - count,
        })
    }

    /// Newest first; same-day rows in reverse insertion order.
    pub fn bucketed_results(&self) -> Result<Vec<BucketedResult>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT match_date, block_id, home_team, away_team,
                       home_odd, away_odd, over25_odd, under25_odd,
                       home_goals, away_goals, result_over25
                FROM bucketed_results
                ORDER BY match_date DESC, id DESC
                "#,
            )
            .context("prepare bucketed results query")?;
        let rows = stmt
            .query_map([], |row| {
                let block_id: String = row.get(1)?;
                Ok(BucketedResult {
                    match_date: text_col(row, 0, parse_date)?,
                    block_id: (block_id != NO_BLOCK).then_some(block_id),
                    home_team: row.get(2)?,
                    away_team: row.get(3)?,
                    home_odd: row.get(4)?,
                    away_odd: row.get(5)?,
                    over25_odd: row.get(6)?,
                    under25_odd: row.get(7)?,
                    home_goals: goals_from_sql(row, 8)?,
                    away_goals: goals_from_sql(row, 9)?,
                    result_over25: row.get::<_, i64>(10)? != 0,
                })
            })
            .context("query bucketed results")?;
        collect_rows(rows, "decode bucketed result row")
    }

    /// Replaces the cached rows of one dimension.
    pub fn upsert_bucket_stats(
        &mut self,
        dimension: OddsDimension,
        rows: &[BucketPerformance],
    ) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction()
            .context("begin bucket stats transaction")?;
        tx.execute(
            "DELETE FROM bucket_stats WHERE dimension = ?1",
            params![dimension.as_str()],
        )
        .context("clear bucket stats")?;
        for b in rows {
            tx.execute(
                r#"
                INSERT INTO bucket_stats (
                    dimension, bucket_range, total_matches, over25_hits, over25_rate,
                    current_streak, streak_type, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    dimension.as_str(),
                    b.bucket_range,
                    b.total_matches as i64,
                    b.over25_hits as i64,
                    b.over25_rate,
                    b.current_streak as i64,
                    b.streak_type.as_str(),
                    updated_at,
                ],
            )
            .context("insert bucket stats")?;
        }
        tx.commit().context("commit bucket stats transaction")?;
        Ok(())
    }

    pub fn bucket_stats(&self, dimension: OddsDimension) -> Result<Vec<BucketPerformance>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT bucket_range, total_matches, over25_hits, over25_rate,
                       current_streak, streak_type
                FROM bucket_stats
                WHERE dimension = ?1
                ORDER BY total_matches DESC, bucket_range ASC
                "#,
            )
            .context("prepare bucket stats query")?;
        let rows = stmt
            .query_map(params![dimension.as_str()], |row| {
                Ok(BucketPerformance {
                    bucket_range: row.get(0)?,
                    total_matches: count_from_sql(row, 1)?,
                    over25_hits: count_from_sql(row, 2)?,
                    over25_rate: row.get(3)?,
                    current_streak: count_from_sql(row, 4)?,
                    streak_type: StreakType::parse(&row.get::<_, String>(5)?),
                })
            })
            .context("query bucket stats")?;
        collect_rows(rows, "decode bucket stats row")
    }

    pub fn upsert_odds_pattern(&self, p: &OddsPattern) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO odds_patterns (
                    pattern_hash, home_odd_range, over25_odd_range, total_matches,
                    over25_hits, over25_rate, current_streak, streak_type, last_seen, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(pattern_hash) DO UPDATE SET
                    home_odd_range = excluded.home_odd_range,
                    over25_odd_range = excluded.over25_odd_range,
                    total_matches = excluded.total_matches,
                    over25_hits = excluded.over25_hits,
                    over25_rate = excluded.over25_rate,
                    current_streak = excluded.current_streak,
                    streak_type = excluded.streak_type,
                    last_seen = excluded.last_seen,
                    updated_at = excluded.updated_at
                "#,
                params![
                    p.pattern_hash,
                    p.home_odd_range,
                    p.over25_odd_range,
                    p.total_matches as i64,
                    p.over25_hits as i64,
                    p.over25_rate,
                    p.current_streak as i64,
                    p.streak_type.as_str(),
                    p.last_seen.format(DATE_FMT).to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("upsert odds pattern")?;
        Ok(())
    }

    pub fn odds_patterns(&self) -> Result<Vec<OddsPattern>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT pattern_hash, home_odd_range, over25_odd_range, total_matches,
                       over25_hits, over25_rate, current_streak, streak_type, last_seen
                FROM odds_patterns
                ORDER BY total_matches DESC, pattern_hash ASC
                "#,
            )
            .context("prepare odds patterns query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OddsPattern {
                    pattern_hash: row.get(0)?,
                    home_odd_range: row.get(1)?,
                    over25_odd_range: row.get(2)?,
                    total_matches: count_from_sql(row, 3)?,
                    over25_hits: count_from_sql(row, 4)?,
                    over25_rate: row.get(5)?,
                    current_streak: count_from_sql(row, 6)?,
                    streak_type: StreakType::parse(&row.get::<_, String>(7)?),
                    last_seen: text_col(row, 8, parse_date)?,
                })
            })
            .context("query odds patterns")?;
        collect_rows(rows, "decode odds pattern row")
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            block_time TEXT NOT NULL,
            match_date TEXT,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NOT NULL,
            away_goals INTEGER NOT NULL,
            total_goals INTEGER NOT NULL,
            over_15 INTEGER NOT NULL,
            over_25 INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (block_time, home_team, away_team, home_goals, away_goals)
        );
        CREATE INDEX IF NOT EXISTS idx_results_block ON results(block_time);
        CREATE TABLE IF NOT EXISTS odds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            block_time TEXT NOT NULL,
            match_date TEXT,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_odd REAL NOT NULL,
            draw_odd REAL NOT NULL,
            away_odd REAL NOT NULL,
            goal_line REAL NOT NULL,
            over_odd REAL NOT NULL,
            under_odd REAL NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            match_date TEXT,
            block_time TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            label TEXT NOT NULL,
            confidence INTEGER NOT NULL,
            status TEXT NOT NULL,
            predicted_probability REAL NOT NULL,
            market_odd REAL,
            home_goals INTEGER,
            away_goals INTEGER,
            actual_over15 INTEGER,
            actual_over25 INTEGER,
            is_correct INTEGER,
            profit_loss REAL,
            resolved_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_predictions_pending ON predictions(resolved_at);
        CREATE TABLE IF NOT EXISTS upcoming_matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            match_date TEXT,
            block_id TEXT,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_odd REAL NOT NULL,
            away_odd REAL NOT NULL,
            over25_odd REAL NOT NULL,
            under25_odd REAL NOT NULL,
            bucket_home TEXT NOT NULL,
            bucket_over25 TEXT NOT NULL,
            pattern_hash TEXT NOT NULL,
            historical_over25_rate REAL NOT NULL,
            total_in_bucket INTEGER NOT NULL,
            current_streak INTEGER NOT NULL,
            streak_type TEXT NOT NULL,
            confidence_indicator TEXT NOT NULL,
            recommendation TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS bucketed_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_date TEXT NOT NULL,
            block_id TEXT NOT NULL DEFAULT '',
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_odd REAL,
            away_odd REAL,
            over25_odd REAL,
            under25_odd REAL,
            home_goals INTEGER NOT NULL,
            away_goals INTEGER NOT NULL,
            result_over25 INTEGER NOT NULL,
            UNIQUE (match_date, block_id, home_team, away_team)
        );
        CREATE TABLE IF NOT EXISTS bucket_stats (
            dimension TEXT NOT NULL,
            bucket_range TEXT NOT NULL,
            total_matches INTEGER NOT NULL,
            over25_hits INTEGER NOT NULL,
            over25_rate REAL NOT NULL,
            current_streak INTEGER NOT NULL,
            streak_type TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (dimension, bucket_range)
        );
        CREATE TABLE IF NOT EXISTS odds_patterns (
            pattern_hash TEXT PRIMARY KEY,
            home_odd_range TEXT NOT NULL,
            over25_odd_range TEXT NOT NULL,
            total_matches INTEGER NOT NULL,
            over25_hits INTEGER NOT NULL,
            over25_rate REAL NOT NULL,
            current_streak INTEGER NOT NULL,
            streak_type TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .context("init sqlite schema")?;
    Ok(())
}

const PREDICTION_SELECT: &str = r#"
    SELECT id, created_at, match_date, block_time, home_team, away_team,
           label, confidence, status, predicted_probability, market_odd,
           home_goals, away_goals, actual_over15, actual_over25,
           is_correct, profit_loss, resolved_at
    FROM predictions"#;

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<PredictionRecord> {
    let resolved_at = match row.get::<_, Option<String>>(17)? {
        Some(raw) => Some(timestamp_from_sql(17, raw)?),
        None => None,
    };
    let resolution = match resolved_at {
        Some(_) => Some(Resolution {
            home_goals: goals_from_sql(row, 11)?,
            away_goals: goals_from_sql(row, 12)?,
            actual_over15: row.get::<_, i64>(13)? != 0,
            actual_over25: row.get::<_, i64>(14)? != 0,
            is_correct: row.get::<_, Option<i64>>(15)?.map(|v| v != 0),
            profit_loss: row.get(16)?,
        }),
        None => None,
    };
    let confidence: i64 = row.get(7)?;
    Ok(PredictionRecord {
        id: row.get(0)?,
        created_at: timestamp_from_sql(1, row.get(1)?)?,
        prediction: NewPrediction {
            match_date: date_from_sql(row.get(2)?),
            block_time: row.get(3)?,
            home_team: row.get(4)?,
            away_team: row.get(5)?,
            label: text_col(row, 6, PredictionLabel::parse)?,
            confidence: u8::try_from(confidence.clamp(0, 100)).unwrap_or(0),
            status: text_col(row, 8, PredictionStatus::parse)?,
            predicted_probability: row.get(9)?,
            market_odd: row.get(10)?,
        },
        resolution,
        resolved_at,
    })
}

fn resolve_on(conn: &Connection, id: i64, res: &Resolution) -> Result<bool> {
    let updated = conn
        .execute(
            r#"
            UPDATE predictions
            SET home_goals = ?1, away_goals = ?2, actual_over15 = ?3, actual_over25 = ?4,
                is_correct = ?5, profit_loss = ?6, resolved_at = ?7
            WHERE id = ?8 AND resolved_at IS NULL
            "#,
            params![
                i64::from(res.home_goals),
                i64::from(res.away_goals),
                bool_to_i64(res.actual_over15),
                bool_to_i64(res.actual_over25),
                res.is_correct.map(bool_to_i64),
                res.profit_loss,
                Utc::now().to_rfc3339(),
                id,
            ],
        )
        .with_context(|| format!("resolve prediction {id}"))?;
    Ok(updated > 0)
}

fn insert_odds_tx(tx: &Transaction<'_>, quotes: &[OddsQuote]) -> Result<()> {
    let created_at = Utc::now().to_rfc3339();
    for q in quotes {
        tx.execute(
            r#"
            INSERT INTO odds (
                block_time, match_date, home_team, away_team,
                home_odd, draw_odd, away_odd, goal_line, over_odd, under_odd, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                q.block_time,
                date_to_sql(q.match_date),
                q.home_team,
                q.away_team,
                q.home_odd,
                q.draw_odd,
                q.away_odd,
                q.goal_line,
                q.over_odd,
                q.under_odd,
                created_at,
            ],
        )
        .context("insert odds")?;
    }
    Ok(())
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    what: &'static str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context(what)?);
    }
    Ok(out)
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}

fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FMT).to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT).ok()
}

fn date_from_sql(raw: Option<String>) -> Option<NaiveDate> {
    raw.as_deref().and_then(parse_date)
}

fn timestamp_from_sql(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn goals_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let v: i64 = row.get(idx)?;
    u32::try_from(v)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}

fn count_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let v: i64 = row.get(idx)?;
    usize::try_from(v)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}

fn text_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value {raw:?}").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, 1, d)
    }

    #[test]
    fn duplicate_results_are_counted_not_inserted() {
        let mut store = Store::open_in_memory().unwrap();
        let rows = vec![
            MatchResult::new("08:00", day(26), "LEV", "HSV", 2, 1),
            MatchResult::new("08:00", day(26), "LEV", "HSV", 2, 1),
            MatchResult::new("08:00", day(26), "FCA", "HDH", 0, 0),
        ];
        let summary = store.insert_results(&rows).unwrap();
        assert_eq!(summary, InsertSummary { count: 2, duplicates: 1 });

        let again = store.insert_results(&rows[..1]).unwrap();
        assert_eq!(again, InsertSummary { count: 0, duplicates: 1 });
        assert_eq!(store.all_results().unwrap().len(), 2);
    }

    #[test]
    fn all_results_reads_past_one_page() {
        let mut store = Store::open_in_memory().unwrap();
        let rows: Vec<MatchResult> = (0..(PAGE_SIZE as u32 + 5))
            .map(|i| MatchResult::new("09:00", None, format!("H{i}"), "A", i % 4, 1))
            .collect();
        store.insert_results(&rows).unwrap();
        let back = store.all_results().unwrap();
        assert_eq!(back.len(), PAGE_SIZE + 5);
        assert_eq!(back[PAGE_SIZE + 4].home_team, format!("H{}", PAGE_SIZE + 4));
        assert_eq!(back[0].over_15(), back[0].total_goals() >= 2);
    }

    #[test]
    fn replace_odds_swaps_the_whole_set() {
        let mut store = Store::open_in_memory().unwrap();
        let quote = |home: &str| OddsQuote {
            block_time: "08:00".to_string(),
            match_date: None,
            home_team: home.to_string(),
            away_team: "B".to_string(),
            home_odd: 1.5,
            draw_odd: 3.5,
            away_odd: 5.0,
            goal_line: 2.5,
            over_odd: 1.7,
            under_odd: 2.1,
        };
        store.insert_odds(&[quote("A"), quote("C")]).unwrap();
        store.replace_odds(&[quote("D")]).unwrap();
        let odds = store.all_odds().unwrap();
        assert_eq!(odds.len(), 1);
        assert_eq!(odds[0].home_team, "D");
        assert_eq!(store.clear_odds().unwrap(), 1);
        assert!(store.all_odds().unwrap().is_empty());
    }

    #[test]
    fn resolution_applies_once() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_prediction(&NewPrediction {
                match_date: day(26),
                block_time: "08:00".to_string(),
                home_team: "LEV".to_string(),
                away_team: "HSV".to_string(),
                label: PredictionLabel::Over15,
                confidence: 80,
                status: PredictionStatus::Safe,
                predicted_probability: 0.8,
                market_odd: Some(1.3),
            })
            .unwrap();
        let res = Resolution {
            home_goals: 2,
            away_goals: 0,
            actual_over15: true,
            actual_over25: false,
            is_correct: Some(true),
            profit_loss: Some(0.3),
        };
        assert!(store.resolve_prediction(id, &res).unwrap());
        assert!(!store.resolve_prediction(id, &res).unwrap());
        assert!(store.pending_predictions().unwrap().is_empty());

        let rec = store
            .prediction_by_match("lev", "hsv", day(26))
            .unwrap()
            .expect("stored");
        assert_eq!(rec.resolution, Some(res));
        assert!(store.prediction_by_match("LEV", "HSV", day(27)).unwrap().is_none());
    }

    #[test]
    fn recording_skips_fixtures_already_pending() {
        let store = Store::open_in_memory().unwrap();
        let p = NewPrediction {
            match_date: None,
            block_time: "08:00".to_string(),
            home_team: "LEV".to_string(),
            away_team: "HSV".to_string(),
            label: PredictionLabel::Over15,
            confidence: 80,
            status: PredictionStatus::Safe,
            predicted_probability: 0.8,
            market_odd: Some(1.3),
        };
        let first = store.record_prediction(&p).unwrap().expect("first is stored");
        assert_eq!(store.record_prediction(&p).unwrap(), None);

        let relabelled = NewPrediction {
            home_team: "lev".to_string(),
            label: PredictionLabel::Over25,
            ..p.clone()
        };
        assert_eq!(store.record_prediction(&relabelled).unwrap(), None);

        let dated = NewPrediction {
            match_date: day(26),
            ..p.clone()
        };
        assert!(store.record_prediction(&dated).unwrap().is_some());
        assert_eq!(store.pending_predictions().unwrap().len(), 2);

        let res = Resolution {
            home_goals: 1,
            away_goals: 1,
            actual_over15: true,
            actual_over25: false,
            is_correct: Some(true),
            profit_loss: Some(0.3),
        };
        assert!(store.resolve_prediction(first, &res).unwrap());
        assert!(store.record_prediction(&p).unwrap().is_some());
    }

    #[test]
    fn bucketed_results_unique_on_date_block_and_teams() {
        let mut store = Store::open_in_memory().unwrap();
        let row = BucketedResult {
            match_date: day(5).unwrap(),
            block_id: None,
            home_team: "H".to_string(),
            away_team: "A".to_string(),
            home_odd: Some(1.5),
            away_odd: Some(4.0),
            over25_odd: None,
            under25_odd: None,
            home_goals: 2,
            away_goals: 2,
            result_over25: true,
        };
        let summary = store
            .insert_bucketed_results(&[row.clone(), row.clone()])
            .unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(store.bucketed_results().unwrap(), vec![row]);
    }
}
