// 📊 Metric Calculator
// Revenue/expense totals, margin, tax, forecast and the health/credit ratings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::benchmarks::AnalysisConfig;
use crate::parser::StatementRow;

/// Industry used when the caller supplies none
pub const DEFAULT_INDUSTRY: &str = "General";

/// Margin (percent) above which a business below its benchmark is still "Stable"
pub const STABLE_MARGIN_FLOOR: f64 = 5.0;

// ============================================================================
// RATINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Stable,
    #[serde(rename = "At Risk")]
    AtRisk,
}

impl HealthStatus {
    /// Excellent at or above target, Stable above the floor, At Risk otherwise
    pub fn classify(margin: f64, target_margin: f64) -> Self {
        if margin >= target_margin {
            HealthStatus::Excellent
        } else if margin > STABLE_MARGIN_FLOOR {
            HealthStatus::Stable
        } else {
            HealthStatus::AtRisk
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Stable => "Stable",
            HealthStatus::AtRisk => "At Risk",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "Excellent" => Ok(HealthStatus::Excellent),
            "Stable" => Ok(HealthStatus::Stable),
            "At Risk" => Ok(HealthStatus::AtRisk),
            other => Err(anyhow::anyhow!("Unknown health status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditRating {
    High,
    Low,
}

impl CreditRating {
    /// High needs a profit and at least half the target margin
    pub fn classify(profit: f64, margin: f64, target_margin: f64) -> Self {
        if profit > 0.0 && margin >= target_margin / 2.0 {
            CreditRating::High
        } else {
            CreditRating::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreditRating::High => "High",
            CreditRating::Low => "Low",
        }
    }
}

impl fmt::Display for CreditRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditRating {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "High" => Ok(CreditRating::High),
            "Low" => Ok(CreditRating::Low),
            other => Err(anyhow::anyhow!("Unknown credit rating: {}", other)),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub industry: String,
    pub revenue: f64,
    pub expense: f64,
    pub profit: f64,
    /// Profit as a percentage of revenue, 2 decimals
    pub margin: f64,
    pub target_margin: f64,
    pub tax_estimate: f64,
    pub forecast: f64,
    pub health: HealthStatus,
    pub credit_rating: CreditRating,
    pub advice: String,

    pub revenue_rows: usize,
    pub expense_rows: usize,
    pub ignored_rows: usize,
}

/// Round to 2 decimals, exact ties to even: 0.125 -> 0.12, 0.375 -> 0.38
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Render a figure the way the advice sentence shows it: "60.0", "1120.5"
pub fn format_figure(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Blank industry labels become "General"
pub fn normalize_industry(industry: &str) -> String {
    let trimmed = industry.trim();
    if trimmed.is_empty() {
        DEFAULT_INDUSTRY.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn compute_metrics(
    rows: &[StatementRow],
    industry: &str,
    config: &AnalysisConfig,
) -> FinancialMetrics {
    let industry = normalize_industry(industry);

    let mut revenue = 0.0;
    let mut expense = 0.0;
    let mut revenue_rows = 0;
    let mut expense_rows = 0;
    let mut ignored_rows = 0;

    for row in rows {
        if row.is_revenue() {
            revenue += row.amount;
            revenue_rows += 1;
        } else if row.is_expense() {
            expense += row.amount;
            expense_rows += 1;
        } else {
            ignored_rows += 1;
        }
    }

    let profit = revenue - expense;
    let margin = if revenue > 0.0 {
        round2(profit / revenue * 100.0)
    } else {
        0.0
    };
    let tax_estimate = if profit > 0.0 {
        round2(profit * config.tax_rate)
    } else {
        0.0
    };
    let forecast = round2(revenue * (1.0 + config.growth_rate));

    let target_margin = config.benchmarks.target_margin(&industry);
    let health = HealthStatus::classify(margin, target_margin);
    let credit_rating = CreditRating::classify(profit, margin, target_margin);

    // Figures that were not computed print as a bare "0"
    let margin_text = if revenue > 0.0 { format_figure(margin) } else { "0".to_string() };
    let tax_text = if profit > 0.0 { format_figure(tax_estimate) } else { "0".to_string() };

    let advice = format!(
        "As a {} enterprise, your profit margin of {}% is {}. \
         Your estimated GST liability is {}{}. \
         Next quarter revenue is forecasted at {}{}.",
        industry,
        margin_text,
        health,
        config.currency_symbol,
        tax_text,
        config.currency_symbol,
        format_figure(forecast),
    );

    FinancialMetrics {
        industry,
        revenue,
        expense,
        profit,
        margin,
        target_margin,
        tax_estimate,
        forecast,
        health,
        credit_rating,
        advice,
        revenue_rows,
        expense_rows,
        ignored_rows,
    }
}

// ============================================================================
// TESTS
// ============================================================================
