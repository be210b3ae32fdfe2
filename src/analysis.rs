// 🔎 Analysis Pipeline
// Upload bytes → normalized rows → metrics → recorded assessment → report

use rusqlite::Connection;
use serde::Serialize;

use crate::benchmarks::AnalysisConfig;
use crate::db::{compute_content_hash, insert_assessment, Assessment};
use crate::error::AnalysisError;
use crate::metrics::{compute_metrics, CreditRating, FinancialMetrics, HealthStatus};
use crate::parser::{normalize_statement, StatementRow};

/// Reported in every successful response
pub const SECURITY_STATUS: &str =
    "Processed in memory; only the SHA-256 fingerprint and derived figures are stored";

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

/// Outcome of parsing and computing, before anything is stored
#[derive(Debug, Clone)]
pub struct StatementAnalysis {
    pub source_file: String,
    pub content_sha256: String,
    pub rows: Vec<StatementRow>,
    pub metrics: FinancialMetrics,
}

/// Holds the analysis config; shared read-only across requests
#[derive(Debug, Clone, Default)]
pub struct StatementAnalyzer {
    config: AnalysisConfig,
}

impl StatementAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        StatementAnalyzer { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse and compute without storing anything
    pub fn analyze(
        &self,
        content: &[u8],
        filename: &str,
        industry: &str,
    ) -> AnalysisResult<StatementAnalysis> {
        let rows = normalize_statement(content, filename)?;
        let metrics = compute_metrics(&rows, industry, &self.config);

        log::info!(
            "📊 {}: {} rows, revenue {} expense {} margin {}% ({})",
            filename,
            rows.len(),
            metrics.revenue,
            metrics.expense,
            metrics.margin,
            metrics.health
        );

        Ok(StatementAnalysis {
            source_file: filename.to_string(),
            content_sha256: compute_content_hash(content),
            rows,
            metrics,
        })
    }
}

/// Append the assessment for an analysis; returns the stored record
pub fn record_analysis(conn: &Connection, analysis: &StatementAnalysis) -> AnalysisResult<Assessment> {
    let mut assessment =
        Assessment::from_metrics(&analysis.metrics, &analysis.source_file, &analysis.content_sha256);

    assessment.id = insert_assessment(conn, &assessment).map_err(AnalysisError::Persistence)?;

    Ok(assessment)
}

/// Analyze an upload and record it. Nothing is stored on failure.
pub fn analyze_and_record(
    conn: &Connection,
    analyzer: &StatementAnalyzer,
    content: &[u8],
    filename: &str,
    industry: &str,
) -> AnalysisResult<AnalysisReport> {
    let analysis = analyzer.analyze(content, filename, industry)?;
    let assessment = record_analysis(conn, &analysis)?;

    Ok(AnalysisReport::new(&analysis.metrics, Some(assessment.assessment_id)))
}

// ============================================================================
// RESPONSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    pub en: String,
}

/// The response payload for one analyzed statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub industry: String,
    pub revenue: f64,
    pub expense: f64,
    pub profit: f64,
    pub margin: f64,
    pub target_margin: f64,
    pub tax_estimate: f64,
    pub forecast: f64,
    pub health: HealthStatus,
    pub credit_rating: CreditRating,
    pub security: String,
    pub advice: Advice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
}

impl AnalysisReport {
    pub fn new(metrics: &FinancialMetrics, assessment_id: Option<String>) -> Self {
        AnalysisReport {
            industry: metrics.industry.clone(),
            revenue: metrics.revenue,
            expense: metrics.expense,
            profit: metrics.profit,
            margin: metrics.margin,
            target_margin: metrics.target_margin,
            tax_estimate: metrics.tax_estimate,
            forecast: metrics.forecast,
            health: metrics.health,
            credit_rating: metrics.credit_rating,
            security: SECURITY_STATUS.to_string(),
            advice: Advice {
                en: metrics.advice.clone(),
            },
            assessment_id,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_all_assessments, setup_database, verify_count};

    const EXAMPLE_CSV: &[u8] = b"type,category,amount\nRevenue,Sales,1000\nExpense,Rent,400\n";

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_analyze_and_record_example() {
        let conn = test_db();
        let analyzer = StatementAnalyzer::default();

        let report = analyze_and_record(&conn, &analyzer, EXAMPLE_CSV, "q1.csv", "Retail").unwrap();

        assert_eq!(report.revenue, 1000.0);
        assert_eq!(report.expense, 400.0);
        assert_eq!(report.profit, 600.0);
        assert_eq!(report.margin, 60.0);
        assert_eq!(report.target_margin, 15.0);
        assert_eq!(report.tax_estimate, 108.0);
        assert_eq!(report.forecast, 1120.0);
        assert_eq!(report.health, HealthStatus::Excellent);
        assert_eq!(report.credit_rating, CreditRating::High);

        let stored = get_all_assessments(&conn).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(Some(stored[0].assessment_id.clone()), report.assessment_id);
        assert_eq!(stored[0].industry, "Retail");
        assert_eq!(stored[0].profit, 600.0);
        assert_eq!(stored[0].source_file, "q1.csv");
        assert_eq!(stored[0].content_sha256, compute_content_hash(EXAMPLE_CSV));
    }

    #[test]
    fn test_report_json_schema() {
        let analyzer = StatementAnalyzer::default();
        let analysis = analyzer.analyze(EXAMPLE_CSV, "q1.csv", "Retail").unwrap();
        let json = serde_json::to_value(AnalysisReport::new(&analysis.metrics, None)).unwrap();

        for key in [
            "revenue", "expense", "profit", "margin", "tax_estimate", "forecast",
            "health", "credit_rating", "security", "advice",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        assert!(json.get("assessment_id").is_none());
        assert!(json.get("tax_est").is_none());
        assert_eq!(json["health"], "Excellent");
        assert_eq!(json["credit_rating"], "High");
        assert!(json["advice"]["en"]
            .as_str()
            .unwrap()
            .starts_with("As a Retail enterprise"));
    }

    #[test]
    fn test_failures_store_nothing() {
        let conn = test_db();
        let analyzer = StatementAnalyzer::default();

        let err = analyze_and_record(&conn, &analyzer, EXAMPLE_CSV, "q1.txt", "Retail").unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedFormat(_)));

        let err = analyze_and_record(&conn, &analyzer, b"foo,bar\n1,2\n", "q1.csv", "Retail").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));

        assert_eq!(verify_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_persistence_failure_is_reported() {
        // No schema: the insert fails
        let conn = Connection::open_in_memory().unwrap();
        let analyzer = StatementAnalyzer::default();

        let err = analyze_and_record(&conn, &analyzer, EXAMPLE_CSV, "q1.csv", "Retail").unwrap_err();

        assert_eq!(err.kind(), "persistence_error");
        assert!(err.to_string().contains("could not store assessment"));
    }

    #[test]
    fn test_default_industry() {
        let analyzer = StatementAnalyzer::default();
        let analysis = analyzer.analyze(EXAMPLE_CSV, "q1.csv", "  ").unwrap();

        assert_eq!(analysis.metrics.industry, "General");
        assert_eq!(analysis.metrics.target_margin, 20.0);
        assert_eq!(analysis.rows.len(), 2);
    }
}
