// 🏗️ Statement Parser Framework
// Normalizes CSV, spreadsheet and PDF statements into (type, category, amount) rows

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::AnalysisError;

// ============================================================================
// CORE TYPES
// ============================================================================

/// StatementFormat - Which reader handles an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementFormat {
    Csv,
    Spreadsheet,
    Pdf,
}

impl StatementFormat {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            StatementFormat::Csv => "CSV",
            StatementFormat::Spreadsheet => "Spreadsheet",
            StatementFormat::Pdf => "PDF",
        }
    }

    /// Detect format from the filename extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<StatementFormat> {
        let extension = filename.trim().rsplit_once('.')?.1.to_lowercase();

        match extension.as_str() {
            "csv" => Some(StatementFormat::Csv),
            "xls" | "xlsx" => Some(StatementFormat::Spreadsheet),
            "pdf" => Some(StatementFormat::Pdf),
            _ => None,
        }
    }
}

/// StatementRow - One normalized line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    /// "revenue", "expense", or anything else (ignored by the calculator)
    #[serde(rename = "type")]
    pub row_type: String,
    pub category: String,
    pub amount: f64,
}

impl StatementRow {
    pub fn new(row_type: &str, category: &str, amount: f64) -> Self {
        StatementRow {
            row_type: row_type.trim().to_string(),
            category: category.trim().to_string(),
            amount,
        }
    }

    pub fn is_revenue(&self) -> bool {
        self.row_type.trim().eq_ignore_ascii_case("revenue")
    }

    pub fn is_expense(&self) -> bool {
        self.row_type.trim().eq_ignore_ascii_case("expense")
    }
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// StatementParser - One implementation per input format
pub trait StatementParser: Send + Sync {
    /// Parse raw upload bytes into normalized rows.
    ///
    /// Rows whose amount is missing or unparseable are already dropped.
    fn parse(&self, content: &[u8]) -> Result<Vec<StatementRow>>;

    /// Get the format this parser handles
    fn format(&self) -> StatementFormat;

    /// Get parser version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect statement format from the uploaded filename
pub fn detect_format(filename: &str) -> std::result::Result<StatementFormat, AnalysisError> {
    StatementFormat::from_filename(filename)
        .ok_or_else(|| AnalysisError::UnsupportedFormat(filename.to_string()))
}

/// Get appropriate parser for a format
pub fn get_parser(format: StatementFormat) -> Box<dyn StatementParser> {
    match format {
        StatementFormat::Csv => Box::new(CsvStatementParser::new()),
        StatementFormat::Spreadsheet => Box::new(SpreadsheetStatementParser::new()),
        StatementFormat::Pdf => Box::new(PdfStatementParser::new()),
    }
}

/// Bytes + filename → normalized rows
pub fn normalize_statement(
    content: &[u8],
    filename: &str,
) -> std::result::Result<Vec<StatementRow>, AnalysisError> {
    let format = detect_format(filename)?;
    let parser = get_parser(format);

    let rows = parser
        .parse(content)
        .with_context(|| format!("Failed to read {} statement {}", format.name(), filename))
        .map_err(AnalysisError::Parse)?;

    log::debug!(
        "📄 {} parser v{} read {} rows from {}",
        format.name(),
        parser.version(),
        rows.len(),
        filename
    );

    Ok(rows)
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Coerce a textual amount to a number.
///
/// Accepts thousands separators, currency symbols and accounting negatives
/// ("(1,200.50)"). Anything else becomes missing.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let parenthesized = text.starts_with('(') && text.ends_with(')') && text.len() > 2;
    if parenthesized {
        text = &text[1..text.len() - 1];
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '₹' | '$' | '€' | '£'))
        .collect();

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(if parenthesized { -value } else { value })
}

fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Positions of the normalized columns in a header row
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnMap {
    row_type: usize,
    category: Option<usize>,
    amount: usize,
}

impl ColumnMap {
    fn from_headers<I, S>(headers: I) -> Result<ColumnMap>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = headers
            .into_iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();
        let find = |wanted: &str| names.iter().position(|n| n == wanted);

        Ok(ColumnMap {
            row_type: find("type").ok_or_else(|| anyhow!("missing column 'type'"))?,
            category: find("category"),
            amount: find("amount").ok_or_else(|| anyhow!("missing column 'amount'"))?,
        })
    }
}

// ============================================================================
// CSV
// ============================================================================

pub struct CsvStatementParser;

impl CsvStatementParser {
    pub fn new() -> Self {
        CsvStatementParser
    }
}

impl Default for CsvStatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for CsvStatementParser {
    fn parse(&self, content: &[u8]) -> Result<Vec<StatementRow>> {
        use csv::{ReaderBuilder, Trim};

        // Invalid UTF-8 sequences are dropped, not replaced
        let text: String = String::from_utf8_lossy(content)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect();

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers().context("Failed to read CSV header")?.clone();
        let columns = ColumnMap::from_headers(headers.iter())?;

        let mut rows = Vec::new();
        for (line_num, result) in reader.records().enumerate() {
            let record =
                result.with_context(|| format!("Failed to parse CSV line {}", line_num + 2))?;

            let amount = match record.get(columns.amount).and_then(parse_amount) {
                Some(amount) => amount,
                None => continue,
            };

            let row_type = record.get(columns.row_type).unwrap_or("");
            let category = columns
                .category
                .and_then(|idx| record.get(idx))
                .unwrap_or("");

            rows.push(StatementRow::new(row_type, category, amount));
        }

        Ok(rows)
    }

    fn format(&self) -> StatementFormat {
        StatementFormat::Csv
    }
}

// ============================================================================
// SPREADSHEET (xls / xlsx)
// ============================================================================

pub struct SpreadsheetStatementParser;

impl SpreadsheetStatementParser {
    pub fn new() -> Self {
        SpreadsheetStatementParser
    }
}

impl Default for SpreadsheetStatementParser {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_amount(cell: &calamine::Data) -> Option<f64> {
    use calamine::Data;

    match cell {
        Data::Float(value) if value.is_finite() => Some(*value),
        Data::Int(value) => Some(*value as f64),
        Data::String(text) => parse_amount(text),
        _ => None,
    }
}

impl StatementParser for SpreadsheetStatementParser {
    fn parse(&self, content: &[u8]) -> Result<Vec<StatementRow>> {
        use calamine::{open_workbook_auto_from_rs, Reader};

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec()))
            .context("Failed to open spreadsheet")?;

        // First sheet only
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("spreadsheet has no worksheets"))?
            .context("Failed to read first worksheet")?;

        let mut sheet_rows = range.rows();
        let header = sheet_rows
            .next()
            .ok_or_else(|| anyhow!("first worksheet is empty"))?;
        let columns = ColumnMap::from_headers(header.iter().map(|cell| cell.to_string()))?;

        let mut rows = Vec::new();
        for cells in sheet_rows {
            let amount = match cells.get(columns.amount).and_then(cell_amount) {
                Some(amount) => amount,
                None => continue,
            };

            let row_type = cells
                .get(columns.row_type)
                .map(|c| c.to_string())
                .unwrap_or_default();
            let category = columns
                .category
                .and_then(|idx| cells.get(idx))
                .map(|c| c.to_string())
                .unwrap_or_default();

            rows.push(StatementRow::new(&row_type, &category, amount));
        }

        Ok(rows)
    }

    fn format(&self) -> StatementFormat {
        StatementFormat::Spreadsheet
    }
}

// ============================================================================
// PDF
// ============================================================================

pub struct PdfStatementParser;

impl PdfStatementParser {
    pub fn new() -> Self {
        PdfStatementParser
    }
}

impl Default for PdfStatementParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Text of every page, in page order
fn extract_pdf_pages(content: &[u8]) -> Result<Vec<String>> {
    let bytes = content.to_vec();

    // pdf-extract panics on some malformed documents
    match std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem_by_pages(&bytes)) {
        Ok(result) => result.map_err(|e| anyhow!("Failed to extract PDF text: {}", e)),
        Err(_) => bail!("PDF text extraction aborted on a malformed document"),
    }
}

/// Split one line of extracted text into table cells.
///
/// Tabs and runs of two or more spaces separate columns. When that yields
/// fewer than three cells the line is split on any whitespace instead.
fn split_cells(line: &str) -> Vec<String> {
    let spaced = line.replace('\t', "  ");
    let cells: Vec<String> = spaced
        .split("  ")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    if cells.len() >= 3 {
        return cells;
    }

    line.split_whitespace().map(str::to_string).collect()
}

/// Table rows on one page: every line with at least three cells
pub fn extract_table_rows(page_text: &str) -> Vec<Vec<String>> {
    page_text
        .lines()
        .map(split_cells)
        .filter(|cells| cells.len() >= 3)
        .collect()
}

/// Map a table row onto the fixed columns: type, category..., amount
fn table_row_to_statement(cells: &[String]) -> Option<StatementRow> {
    let (amount_cell, rest) = cells.split_last()?;
    let (type_cell, category_cells) = rest.split_first()?;
    let amount = parse_amount(amount_cell)?;

    Some(StatementRow::new(type_cell, &category_cells.join(" "), amount))
}

/// Rows from already-extracted page texts; each page starts its own table
pub fn rows_from_pdf_pages<I, S>(pages: I) -> Vec<StatementRow>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .flat_map(|page| {
            extract_table_rows(page.as_ref())
                .into_iter()
                .skip(1) // header row on every page
                .filter_map(|cells| table_row_to_statement(&cells))
                .collect::<Vec<_>>()
        })
        .collect()
}

impl StatementParser for PdfStatementParser {
    fn parse(&self, content: &[u8]) -> Result<Vec<StatementRow>> {
        let pages = extract_pdf_pages(content)?;
        log::debug!("📄 PDF has {} pages", pages.len());
        Ok(rows_from_pdf_pages(&pages))
    }

    fn format(&self) -> StatementFormat {
        StatementFormat::Pdf
    }
}

// ============================================================================
// TESTS
// ============================================================================
