// SME FinHealth - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod analysis;
pub mod benchmarks;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod parser;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use analysis::{
    analyze_and_record, record_analysis,
    Advice, AnalysisReport, StatementAnalysis, StatementAnalyzer, SECURITY_STATUS,
};
pub use benchmarks::{AnalysisConfig, BenchmarkTable, IndustryBenchmark, DEFAULT_TARGET_MARGIN};
pub use config::Config;
pub use db::{
    Assessment, IndustryStat,
    compute_content_hash, setup_database, insert_assessment,
    get_all_assessments, get_assessments_by_industry, get_industry_stats, verify_count,
};
pub use error::{AnalysisError, ErrorResponse};
pub use metrics::{
    compute_metrics, CreditRating, FinancialMetrics, HealthStatus, DEFAULT_INDUSTRY,
};
pub use parser::{
    StatementParser, StatementFormat, StatementRow,
    detect_format, get_parser, normalize_statement, parse_amount,
    CsvStatementParser, SpreadsheetStatementParser, PdfStatementParser,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
