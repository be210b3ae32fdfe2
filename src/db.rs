use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::metrics::{CreditRating, FinancialMetrics, HealthStatus};

/// One recorded analysis.
/// Append-only: never updated or deleted once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Row id (0 until inserted)
    #[serde(default)]
    pub id: i64,

    /// Stable identity (UUID) returned to callers
    pub assessment_id: String,

    pub industry: String,
    pub revenue: f64,
    pub profit: f64,
    pub health: HealthStatus,
    pub credit_score: CreditRating,
    pub timestamp: DateTime<Utc>,

    // ========================================================================
    // PROVENANCE
    // ========================================================================
    /// Uploaded filename as given by the client
    pub source_file: String,

    /// SHA-256 of the uploaded bytes; the bytes themselves are never stored
    pub content_sha256: String,
}

impl Assessment {
    /// Build a new, not yet inserted assessment from computed metrics
    pub fn from_metrics(metrics: &FinancialMetrics, source_file: &str, content_sha256: &str) -> Self {
        Assessment {
            id: 0,
            assessment_id: uuid::Uuid::new_v4().to_string(),
            industry: metrics.industry.clone(),
            revenue: metrics.revenue,
            profit: metrics.profit,
            health: metrics.health,
            credit_score: metrics.credit_rating,
            timestamp: Utc::now(),
            source_file: source_file.to_string(),
            content_sha256: content_sha256.to_string(),
        }
    }
}

/// Hex SHA-256 fingerprint of an upload
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            assessment_id TEXT UNIQUE NOT NULL,
            industry TEXT NOT NULL,
            revenue REAL NOT NULL,
            profit REAL NOT NULL,
            health TEXT NOT NULL,
            credit_score TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            source_file TEXT NOT NULL,
            content_sha256 TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_industry ON assessments(industry)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_timestamp ON assessments(timestamp)",
        [],
    )?;

    Ok(())
}

/// Append one assessment, returning its row id
pub fn insert_assessment(conn: &Connection, assessment: &Assessment) -> Result<i64> {
    conn.execute(
        "INSERT INTO assessments (
            assessment_id, industry, revenue, profit, health, credit_score,
            timestamp, source_file, content_sha256
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            assessment.assessment_id,
            assessment.industry,
            assessment.revenue,
            assessment.profit,
            assessment.health.as_str(),
            assessment.credit_score.as_str(),
            assessment.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            assessment.source_file,
            assessment.content_sha256,
        ],
    )
    .context("Failed to insert assessment")?;

    let row_id = conn.last_insert_rowid();
    log::info!(
        "💾 Recorded assessment {} ({}, {})",
        assessment.assessment_id,
        assessment.industry,
        assessment.health
    );

    Ok(row_id)
}

const ASSESSMENT_COLUMNS: &str = "id, assessment_id, industry, revenue, profit, health,
     credit_score, timestamp, source_file, content_sha256";

fn text_conversion_error(idx: usize, err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
}

fn assessment_from_row(row: &Row) -> rusqlite::Result<Assessment> {
    let health: String = row.get(5)?;
    let credit_score: String = row.get(6)?;
    let timestamp: String = row.get(7)?;

    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_conversion_error(7, e.into()))?;

    Ok(Assessment {
        id: row.get(0)?,
        assessment_id: row.get(1)?,
        industry: row.get(2)?,
        revenue: row.get(3)?,
        profit: row.get(4)?,
        health: health.parse().map_err(|e| text_conversion_error(5, e))?,
        credit_score: credit_score.parse().map_err(|e| text_conversion_error(6, e))?,
        timestamp,
        source_file: row.get(8)?,
        content_sha256: row.get(9)?,
    })
}

/// All assessments, newest first
pub fn get_all_assessments(conn: &Connection) -> Result<Vec<Assessment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM assessments ORDER BY timestamp DESC, id DESC",
        ASSESSMENT_COLUMNS
    ))?;

    let assessments = stmt
        .query_map([], assessment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(assessments)
}

/// Assessments for one industry (case-insensitive), newest first
pub fn get_assessments_by_industry(conn: &Connection, industry: &str) -> Result<Vec<Assessment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM assessments
         WHERE industry = ?1 COLLATE NOCASE
         ORDER BY timestamp DESC, id DESC",
        ASSESSMENT_COLUMNS
    ))?;

    let assessments = stmt
        .query_map([industry.trim()], assessment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(assessments)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM assessments", [], |row| row.get(0))?;

    Ok(count)
}

/// Industry statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryStat {
    pub industry: String,
    pub assessment_count: i64,
    pub average_revenue: f64,
    pub average_profit: f64,
    pub high_credit_count: i64,
}

/// Get statistics grouped by industry
pub fn get_industry_stats(conn: &Connection) -> Result<Vec<IndustryStat>> {
    let mut stmt = conn.prepare(
        "SELECT
            industry,
            COUNT(*) as count,
            AVG(revenue) as avg_revenue,
            AVG(profit) as avg_profit,
            SUM(CASE WHEN credit_score = 'High' THEN 1 ELSE 0 END) as high_credit
         FROM assessments
         GROUP BY industry
         ORDER BY count DESC, industry",
    )?;

    let stats = stmt
        .query_map([], |row| {
            Ok(IndustryStat {
                industry: row.get(0)?,
                assessment_count: row.get(1)?,
                average_revenue: row.get(2)?,
                average_profit: row.get(3)?,
                high_credit_count: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(stats)
}
