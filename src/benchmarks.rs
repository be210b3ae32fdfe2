// 📐 Industry Benchmarks - Thresholds as Data
// Target margins per industry plus the rates the calculator applies

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fallback target margin for unrecognized industries
pub const DEFAULT_TARGET_MARGIN: f64 = 20.0;

// ============================================================================
// BENCHMARK DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryBenchmark {
    /// Industry name as shown to users ("Retail", "E-commerce", ...)
    pub industry: String,

    /// Expected profit margin, in percent
    pub target_margin: f64,
}

impl IndustryBenchmark {
    pub fn new(industry: &str, target_margin: f64) -> Self {
        IndustryBenchmark {
            industry: industry.to_string(),
            target_margin,
        }
    }

    /// Case-insensitive match against an industry label
    pub fn matches(&self, industry: &str) -> bool {
        self.industry.eq_ignore_ascii_case(industry.trim())
    }
}

// ============================================================================
// BENCHMARK TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkTable {
    #[serde(default = "default_target_margin")]
    pub default_target_margin: f64,

    #[serde(default)]
    pub benchmarks: Vec<IndustryBenchmark>,
}

fn default_target_margin() -> f64 {
    DEFAULT_TARGET_MARGIN
}

impl BenchmarkTable {
    /// Empty table: every lookup falls back to the default
    pub fn new() -> Self {
        BenchmarkTable {
            default_target_margin: DEFAULT_TARGET_MARGIN,
            benchmarks: Vec::new(),
        }
    }

    /// The built-in SME benchmarks
    pub fn builtin() -> Self {
        BenchmarkTable::from_benchmarks(vec![
            IndustryBenchmark::new("Retail", 15.0),
            IndustryBenchmark::new("Manufacturing", 20.0),
            IndustryBenchmark::new("Services", 40.0),
            IndustryBenchmark::new("Agriculture", 12.0),
            IndustryBenchmark::new("Logistics", 10.0),
            IndustryBenchmark::new("E-commerce", 18.0),
            IndustryBenchmark::new("General", 20.0),
        ])
    }

    pub fn from_benchmarks(benchmarks: Vec<IndustryBenchmark>) -> Self {
        BenchmarkTable {
            default_target_margin: DEFAULT_TARGET_MARGIN,
            benchmarks,
        }
    }

    /// Add or replace the benchmark for an industry
    pub fn set(&mut self, benchmark: IndustryBenchmark) {
        match self.benchmarks.iter_mut().find(|b| b.matches(&benchmark.industry)) {
            Some(existing) => *existing = benchmark,
            None => self.benchmarks.push(benchmark),
        }
    }

    pub fn get(&self, industry: &str) -> Option<&IndustryBenchmark> {
        self.benchmarks.iter().find(|b| b.matches(industry))
    }

    /// Target margin for an industry, falling back to the default when unknown
    pub fn target_margin(&self, industry: &str) -> f64 {
        self.get(industry)
            .map(|b| b.target_margin)
            .unwrap_or(self.default_target_margin)
    }

    pub fn len(&self) -> usize {
        self.benchmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndustryBenchmark> {
        self.benchmarks.iter()
    }
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// ANALYSIS CONFIG
// ============================================================================

/// Everything the metric calculator needs besides the rows themselves.
///
/// Built once by the caller and passed in explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub benchmarks: BenchmarkTable,

    /// Share of positive profit owed as tax (GST estimate)
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    /// Expected revenue growth for the next quarter
    #[serde(default = "default_growth_rate")]
    pub growth_rate: f64,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_tax_rate() -> f64 {
    0.18
}

fn default_growth_rate() -> f64 {
    0.12
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

impl AnalysisConfig {
    /// Load config from a JSON file; absent keys take the built-in values
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read analysis config: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: AnalysisConfig =
            serde_json::from_str(content).context("Failed to parse analysis config JSON")?;

        if config.tax_rate < 0.0 || config.growth_rate <= -1.0 {
            anyhow::bail!(
                "Invalid rates in analysis config: tax_rate={}, growth_rate={}",
                config.tax_rate,
                config.growth_rate
            );
        }

        Ok(config)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            benchmarks: BenchmarkTable::builtin(),
            tax_rate: default_tax_rate(),
            growth_rate: default_growth_rate(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
