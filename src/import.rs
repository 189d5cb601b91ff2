// 🏦 Bank Statement Import
// CSV exports from Brazilian banks → classified transactions in SQLite

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::db::{insert_transaction, Transaction, TransactionKind};
use crate::engine::ClassificationEngine;

// ============================================================================
// FORMATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankFormat {
    Nubank,
    Itau,
    Bradesco,
    Santander,
}

impl BankFormat {
    pub const ALL: [BankFormat; 4] = [
        BankFormat::Nubank,
        BankFormat::Itau,
        BankFormat::Bradesco,
        BankFormat::Santander,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BankFormat::Nubank => "Nubank",
            BankFormat::Itau => "Itaú",
            BankFormat::Bradesco => "Bradesco",
            BankFormat::Santander => "Santander",
        }
    }

    /// Short code used on the command line and in file names
    pub fn code(&self) -> &'static str {
        match self {
            BankFormat::Nubank => "nubank",
            BankFormat::Itau => "itau",
            BankFormat::Bradesco => "bradesco",
            BankFormat::Santander => "santander",
        }
    }

    pub fn date_column(&self) -> &'static str {
        match self {
            BankFormat::Nubank => "date",
            _ => "Data",
        }
    }

    pub fn description_column(&self) -> &'static str {
        match self {
            BankFormat::Nubank => "description",
            BankFormat::Bradesco => "Histórico",
            BankFormat::Itau | BankFormat::Santander => "Descrição",
        }
    }

    pub fn amount_column(&self) -> &'static str {
        match self {
            BankFormat::Nubank => "amount",
            _ => "Valor",
        }
    }

    pub fn date_format(&self) -> &'static str {
        match self {
            BankFormat::Nubank => "%Y-%m-%d",
            _ => "%d/%m/%Y",
        }
    }

    pub fn from_code(code: &str) -> Result<BankFormat> {
        let code = code.trim().to_lowercase();
        BankFormat::ALL
            .iter()
            .copied()
            .find(|f| f.code() == code || f.name().to_lowercase() == code)
            .ok_or_else(|| anyhow!("Unsupported bank: {} (supported: nubank, itau, bradesco, santander)", code))
    }
}

/// Guess the bank from a statement file name
///
/// ```
/// use std::path::Path;
/// use transaction_classifier::import::{detect_format, BankFormat};
///
/// assert_eq!(detect_format(Path::new("nubank_2024_03.csv")).unwrap(), BankFormat::Nubank);
/// ```
pub fn detect_format(file_path: &Path) -> Result<BankFormat> {
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let filename_lower = filename.to_lowercase();

    if filename_lower.contains("nubank") || filename_lower.contains("nu_") {
        return Ok(BankFormat::Nubank);
    }

    if filename_lower.contains("itau") || filename_lower.contains("itaú") {
        return Ok(BankFormat::Itau);
    }

    if filename_lower.contains("bradesco") {
        return Ok(BankFormat::Bradesco);
    }

    if filename_lower.contains("santander") {
        return Ok(BankFormat::Santander);
    }

    Err(anyhow!("Could not detect bank from filename: {}", filename))
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse "R$ 1.234,56"-style or plain "-45.99" amounts.
///
/// A comma is the decimal separator when present; dots before it are
/// thousands separators.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    Decimal::from_str(&normalized).with_context(|| format!("Invalid amount: {}", raw))
}

fn parse_date(raw: &str, format: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    // Some exports carry a time of day after the date
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, &format!("{} %H:%M:%S", format)) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(raw, format)
        .with_context(|| format!("Invalid date: {} (expected {})", raw, format))?;

    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid date: {}", raw))
}

/// Rows of one statement: parsed transactions plus per-line errors
#[derive(Debug, Default)]
pub struct ParsedStatement {
    pub transactions: Vec<Transaction>,
    pub errors: Vec<String>,
}

/// Read a statement. Negative amounts are expenses, positive ones income;
/// stored amounts are absolute values.
pub fn parse_statement<R: Read>(reader: R, format: BankFormat, company_id: i64) -> Result<ParsedStatement> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == name)
            .ok_or_else(|| anyhow!("Missing column '{}' for {} statement", name, format.name()))
    };

    let date_idx = column(format.date_column())?;
    let description_idx = column(format.description_column())?;
    let amount_idx = column(format.amount_column())?;

    let mut statement = ParsedStatement::default();

    for (index, result) in reader.records().enumerate() {
        // 1-indexed + header row
        let line = index + 2;

        let parsed = result
            .map_err(anyhow::Error::from)
            .and_then(|record| {
                let date = parse_date(record.get(date_idx).unwrap_or(""), format.date_format())?;
                let description = record.get(description_idx).unwrap_or("").to_string();
                let amount = parse_amount(record.get(amount_idx).unwrap_or(""))?;

                let kind = if amount < Decimal::ZERO {
                    TransactionKind::Expense
                } else {
                    TransactionKind::Income
                };

                Ok(Transaction::new(company_id, &description, amount.abs(), date, kind))
            });

        match parsed {
            Ok(tx) => statement.transactions.push(tx),
            Err(e) => statement.errors.push(format!("Line {}: {:#}", line, e)),
        }
    }

    Ok(statement)
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub duplicated: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Classify and store every row of a parsed statement, skipping duplicates
pub fn import_statement(
    conn: &Connection,
    engine: &ClassificationEngine,
    statement: ParsedStatement,
) -> Result<ImportReport> {
    let mut report = ImportReport {
        errors: statement.errors,
        ..Default::default()
    };

    conn.execute_batch("BEGIN").context("Failed to begin import")?;

    for mut tx in statement.transactions {
        engine.classify_transaction(&mut tx);

        match insert_transaction(conn, &tx) {
            Ok(true) => report.imported += 1,
            Ok(false) => report.duplicated += 1,
            Err(e) => {
                tracing::warn!(description = %tx.description, error = %e, "import row failed");
                report.errors.push(format!("{}: {:#}", tx.description, e));
            }
        }
    }

    conn.execute_batch("COMMIT").context("Failed to commit import")?;

    tracing::info!(
        imported = report.imported,
        duplicated = report.duplicated,
        errors = report.errors.len(),
        "statement imported"
    );

    Ok(report)
}

/// Open a statement file, parse it in the given format and import it
pub fn import_file(
    conn: &Connection,
    engine: &ClassificationEngine,
    file_path: &Path,
    format: BankFormat,
    company_id: i64,
) -> Result<ImportReport> {
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let statement = parse_statement(file, format, company_id)
        .with_context(|| format!("Failed to parse {}", file_path.display()))?;

    import_statement(conn, engine, statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;
    use crate::db::{get_events_for_entity, verify_count};
    use std::io::Write;

    const NUBANK_CSV: &str = "\
date,description,amount
2024-03-12,Compra no Mercado Central,-85.00
2024-03-12,Pagamento fornecedor,-4500.00
2024-03-14,Venda cliente,2500.00
";

    const ITAU_CSV: &str = "\
Data,Descrição,Valor
12/03/2024,Farmacia Droga Raia,\"R$ -42,90\"
13/03/2024,Aluguel casa,\"-1.800,00\"
";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("/tmp/nubank_marco.csv")).unwrap(), BankFormat::Nubank);
        assert_eq!(detect_format(Path::new("extrato_ITAU.csv")).unwrap(), BankFormat::Itau);
        assert_eq!(detect_format(Path::new("bradesco-03.csv")).unwrap(), BankFormat::Bradesco);
        assert_eq!(detect_format(Path::new("Santander.csv")).unwrap(), BankFormat::Santander);
        assert!(detect_format(Path::new("statement.csv")).is_err());
    }

    #[test]
    fn test_from_code() {
        assert_eq!(BankFormat::from_code("Itaú").unwrap(), BankFormat::Itau);
        assert_eq!(BankFormat::from_code("NUBANK").unwrap(), BankFormat::Nubank);
        assert!(BankFormat::from_code("caixa").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("-45.99").unwrap(), dec("-45.99"));
        assert_eq!(parse_amount("R$ 120,50").unwrap(), dec("120.50"));
        assert_eq!(parse_amount("-1.234,56").unwrap(), dec("-1234.56"));
        assert_eq!(parse_amount(" 3000 ").unwrap(), dec("3000"));
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_parse_nubank_statement() {
        let statement = parse_statement(NUBANK_CSV.as_bytes(), BankFormat::Nubank, 7).unwrap();

        assert!(statement.errors.is_empty());
        assert_eq!(statement.transactions.len(), 3);

        let market = &statement.transactions[0];
        assert_eq!(market.company_id, 7);
        assert_eq!(market.kind, TransactionKind::Expense);
        assert_eq!(market.amount, dec("85.00"));
        assert_eq!(market.timestamp.format("%Y-%m-%d %H:%M").to_string(), "2024-03-12 00:00");

        assert_eq!(statement.transactions[2].kind, TransactionKind::Income);
    }

    #[test]
    fn test_parse_itau_statement_with_brazilian_amounts() {
        let statement = parse_statement(ITAU_CSV.as_bytes(), BankFormat::Itau, 1).unwrap();

        assert!(statement.errors.is_empty(), "{:?}", statement.errors);
        assert_eq!(statement.transactions[0].amount, dec("42.90"));
        assert_eq!(statement.transactions[1].amount, dec("1800.00"));
        assert_eq!(statement.transactions[1].description, "Aluguel casa");
    }

    #[test]
    fn test_bad_lines_are_collected() {
        let csv = "date,description,amount\n2024-13-45,Broken date,-10.00\n2024-03-12,Broken amount,abc\n2024-03-12,Padaria,-12.00\n";
        let statement = parse_statement(csv.as_bytes(), BankFormat::Nubank, 1).unwrap();

        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(statement.errors.len(), 2);
        assert!(statement.errors[0].starts_with("Line 2"));
        assert!(statement.errors[1].starts_with("Line 3"));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let err = parse_statement(NUBANK_CSV.as_bytes(), BankFormat::Bradesco, 1).unwrap_err();
        assert!(err.to_string().contains("Data"));
    }

    #[test]
    fn test_import_classifies_and_deduplicates() {
        let conn = test_db();
        let engine = ClassificationEngine::default();

        let mut file = tempfile::Builder::new()
            .prefix("nubank_")
            .suffix(".csv")
            .tempfile()
            .unwrap();
        file.write_all(NUBANK_CSV.as_bytes()).unwrap();

        let format = detect_format(file.path()).unwrap();
        let first = import_file(&conn, &engine, file.path(), format, 1).unwrap();
        println!("First import: {:?}", first);

        assert_eq!(first.imported, 3);
        assert_eq!(first.duplicated, 0);
        assert!(first.success());

        let second = import_file(&conn, &engine, file.path(), format, 1).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.duplicated, 3);
        assert_eq!(verify_count(&conn).unwrap(), 3);

        let stored: Vec<(String, Option<String>, Option<bool>)> = conn
            .prepare("SELECT id, category, is_personal FROM transactions ORDER BY timestamp, description")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(stored.iter().all(|(_, category, origin)| category.is_some() && origin.is_some()));
        assert_eq!(stored[0].1.as_deref(), Some("Food"));
        assert_eq!(get_events_for_entity(&conn, "transaction", &stored[0].0).unwrap().len(), 1);
    }
}
