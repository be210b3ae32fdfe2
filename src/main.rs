use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use finhealth::{
    analyze_and_record, get_all_assessments, get_assessments_by_industry, get_industry_stats,
    setup_database, verify_count, AnalysisConfig, AnalysisError, AnalysisReport, Config,
    ErrorResponse, StatementAnalyzer, DEFAULT_INDUSTRY,
};

#[derive(Parser)]
#[command(
    name = "finhealth",
    version,
    about = "Financial health assessment for small-business statements (CSV, XLS/XLSX, PDF)"
)]
struct Cli {
    /// SQLite database path (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Analysis config JSON (overrides FINHEALTH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a statement file and record the assessment
    Analyze {
        file: PathBuf,

        #[arg(short, long, default_value = DEFAULT_INDUSTRY)]
        industry: String,

        /// Print the JSON response instead of a summary
        #[arg(long)]
        json: bool,

        /// Compute only; do not record an assessment
        #[arg(long)]
        no_store: bool,
    },
    /// List recorded assessments, newest first
    History {
        #[arg(short, long)]
        industry: Option<String>,
    },
    /// Per-industry statistics
    Stats,
    /// Show the benchmark table in effect
    Benchmarks,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(path) = cli.config {
        config.analysis_config_path = Some(path);
    }

    match cli.command {
        Command::Analyze {
            file,
            industry,
            json,
            no_store,
        } => run_analyze(&config, &file, &industry, json, no_store),
        Command::History { industry } => run_history(&config, industry.as_deref()),
        Command::Stats => run_stats(&config),
        Command::Benchmarks => run_benchmarks(&config),
    }
}

fn open_database(config: &Config) -> Result<Connection> {
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn run_analyze(config: &Config, file: &Path, industry: &str, json: bool, no_store: bool) -> Result<()> {
    let content = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();

    let analyzer = StatementAnalyzer::new(config.load_analysis_config()?);

    let result: Result<AnalysisReport, AnalysisError> = if no_store {
        analyzer
            .analyze(&content, &filename, industry)
            .map(|analysis| AnalysisReport::new(&analysis.metrics, None))
    } else {
        let conn = open_database(config)?;
        analyze_and_record(&conn, &analyzer, &content, &filename, industry)
    };

    match result {
        Ok(report) if json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Ok(report) => print_report(&filename, &report, analyzer.config()),
        Err(e) if json => {
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_report(filename: &str, report: &AnalysisReport, analysis_config: &AnalysisConfig) {
    let sym = &analysis_config.currency_symbol;

    println!("📊 FinHealth Assessment - {}", filename);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Industry:        {} (target margin {}%)", report.industry, report.target_margin);
    println!("Revenue:         {}{:.2}", sym, report.revenue);
    println!("Expense:         {}{:.2}", sym, report.expense);
    println!("Profit:          {}{:.2}", sym, report.profit);
    println!("Margin:          {:.2}%", report.margin);
    println!("Tax estimate:    {}{:.2}", sym, report.tax_estimate);
    println!("Forecast:        {}{:.2}", sym, report.forecast);
    println!("Health:          {}", report.health);
    println!("Credit rating:   {}", report.credit_rating);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("💡 {}", report.advice.en);

    match &report.assessment_id {
        Some(id) => println!("\n✓ Recorded as assessment {}", id),
        None => println!("\n(not recorded)"),
    }
}

fn run_history(config: &Config, industry: Option<&str>) -> Result<()> {
    let conn = open_database(config)?;
    let assessments = match industry {
        Some(industry) => get_assessments_by_industry(&conn, industry)?,
        None => get_all_assessments(&conn)?,
    };

    println!("🗄️  Assessments ({} of {})", assessments.len(), verify_count(&conn)?);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for a in &assessments {
        println!(
            "{}  {:<14} revenue {:>12.2}  profit {:>12.2}  {:<9} credit {:<4}  {}",
            a.timestamp.format("%Y-%m-%d %H:%M"),
            a.industry,
            a.revenue,
            a.profit,
            a.health.as_str(),
            a.credit_score.as_str(),
            a.source_file
        );
    }

    Ok(())
}

fn run_stats(config: &Config) -> Result<()> {
    let conn = open_database(config)?;
    let stats = get_industry_stats(&conn)?;

    println!("📈 Industry statistics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if stats.is_empty() {
        println!("No assessments recorded yet.");
    }

    for stat in &stats {
        println!(
            "{:<14} {:>4} assessments  avg revenue {:>12.2}  avg profit {:>12.2}  high credit {}",
            stat.industry,
            stat.assessment_count,
            stat.average_revenue,
            stat.average_profit,
            stat.high_credit_count
        );
    }

    Ok(())
}

fn run_benchmarks(config: &Config) -> Result<()> {
    let analysis_config = config.load_analysis_config()?;

    println!("📐 Industry benchmarks");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for benchmark in analysis_config.benchmarks.iter() {
        println!("{:<14} {:>6.1}%", benchmark.industry, benchmark.target_margin);
    }
    println!(
        "{:<14} {:>6.1}%",
        "(other)", analysis_config.benchmarks.default_target_margin
    );
    println!(
        "\nTax rate {:.0}%, growth forecast {:+.0}%",
        analysis_config.tax_rate * 100.0,
        analysis_config.growth_rate * 100.0
    );

    Ok(())
}
