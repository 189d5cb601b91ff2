use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use rust_decimal::Decimal;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use transaction_classifier::config::{DEFAULT_ANALYSIS_DAYS, DEFAULT_BATCH_LIMIT};
use transaction_classifier::db::TIMESTAMP_FORMAT;
use transaction_classifier::import::import_file;
use transaction_classifier::{
    init_tracing, open_database, verify_count, BankFormat, ClassificationEngine, ClassifierConfig,
    SqliteTransactionStore, TransactionKind, VERSION,
};

const DEFAULT_DB_PATH: &str = "transactions.db";
const DEFAULT_COMPANY_ID: i64 = 1;

const USAGE: &str = "\
Usage:
  transaction-classifier import <bank> <csv> [company]
  transaction-classifier categorize [company] [limit]
  transaction-classifier separate [company] [limit]
  transaction-classifier report [company] [days]
  transaction-classifier classify <description> <amount> <kind> [timestamp]

Environment:
  CLASSIFIER_DB      SQLite database path (default: transactions.db)
  CLASSIFIER_CONFIG  JSON taxonomy file (default: built-in tables)
  RUST_LOG           log filter (default: transaction_classifier=info)";

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let rest: &[String] = args.get(2..).unwrap_or(&[]);

    match command {
        "import" => run_import(rest),
        "categorize" => run_categorize(rest),
        "separate" => run_separate(rest),
        "report" => run_report(rest),
        "classify" => run_classify(rest),
        "version" | "--version" => {
            println!("transaction-classifier {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("❌ Unknown command: {}\n", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

// ============================================================================
// SETUP
// ============================================================================

fn db_path() -> String {
    env::var("CLASSIFIER_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

fn load_engine() -> Result<ClassificationEngine> {
    let config_path = env::var("CLASSIFIER_CONFIG").ok().map(PathBuf::from);
    let config = ClassifierConfig::load(config_path.as_deref())?;
    Ok(ClassificationEngine::new(config))
}

fn arg_or<T: FromStr>(args: &[String], index: usize, default: T, name: &str) -> Result<T> {
    match args.get(index) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("Invalid {}: {}", name, raw)),
        None => Ok(default),
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_import(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("import needs <bank> <csv>\n\n{}", USAGE);
    }

    let csv_path = Path::new(&args[1]);
    let format = match args[0].as_str() {
        "auto" => transaction_classifier::detect_format(csv_path)?,
        code => BankFormat::from_code(code)?,
    };
    let company_id = arg_or(args, 2, DEFAULT_COMPANY_ID, "company id")?;

    println!("🏦 Importing {} statement: {}", format.name(), csv_path.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&db_path())?;
    let engine = load_engine()?;

    let report = import_file(&conn, &engine, csv_path, format, company_id)?;

    println!("✓ Imported: {}", report.imported);
    println!("✓ Skipped duplicates: {}", report.duplicated);
    for error in &report.errors {
        println!("⚠️  {}", error);
    }
    println!("✓ Database contains {} transactions", verify_count(&conn)?);

    Ok(())
}

fn run_categorize(args: &[String]) -> Result<()> {
    let company_id = arg_or(args, 0, DEFAULT_COMPANY_ID, "company id")?;
    let limit = arg_or(args, 1, DEFAULT_BATCH_LIMIT, "limit")?;

    let conn = open_database(&db_path())?;
    let store = SqliteTransactionStore::new(&conn);
    let stats = load_engine()?.reclassify_categories(&store, company_id, limit)?;

    println!("🗂️  Category pass for company {}", company_id);
    println!("✓ Processed:   {}", stats.processed);
    println!("✓ Categorized: {}", stats.categorized);
    println!("✓ Skipped:     {}", stats.skipped);
    if stats.failed > 0 {
        println!("⚠️  Failed:      {}", stats.failed);
    }

    Ok(())
}

fn run_separate(args: &[String]) -> Result<()> {
    let company_id = arg_or(args, 0, DEFAULT_COMPANY_ID, "company id")?;
    let limit = arg_or(args, 1, DEFAULT_BATCH_LIMIT, "limit")?;

    let conn = open_database(&db_path())?;
    let store = SqliteTransactionStore::new(&conn);
    let stats = load_engine()?.reclassify_origins(&store, company_id, limit)?;

    println!("🏢 Personal/business pass for company {}", company_id);
    println!("✓ Processed:      {}", stats.processed);
    println!("✓ Business:       {}", stats.business);
    println!("✓ Personal:       {}", stats.personal);
    println!("✓ Low confidence: {}", stats.low_confidence);
    println!("✓ Skipped:        {}", stats.skipped);

    Ok(())
}

fn run_report(args: &[String]) -> Result<()> {
    let company_id = arg_or(args, 0, DEFAULT_COMPANY_ID, "company id")?;
    let days = arg_or(args, 1, DEFAULT_ANALYSIS_DAYS, "days")?;

    let conn = open_database(&db_path())?;
    let store = SqliteTransactionStore::new(&conn);
    let report = load_engine()?.analyze_patterns(&store, company_id, days)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_classify(args: &[String]) -> Result<()> {
    if args.len() < 3 {
        bail!("classify needs <description> <amount> <kind>\n\n{}", USAGE);
    }

    let description = &args[0];
    let amount = Decimal::from_str(&args[1]).with_context(|| format!("Invalid amount: {}", args[1]))?;
    let kind: TransactionKind = args[2].parse()?;
    let timestamp = match args.get(3) {
        Some(raw) => NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .with_context(|| format!("Invalid timestamp: {} (expected YYYY-MM-DD HH:MM:SS)", raw))?,
        None => Local::now().naive_local(),
    };

    let engine = load_engine()?;
    let categories = engine.suggest_categories(description, amount, kind, 3);
    let category = engine.classify_category(description, amount, kind);
    let origin = engine.suggest_origin(description, amount, timestamp, kind);

    let output = serde_json::json!({
        "category": category,
        "category_suggestions": categories,
        "origin": origin,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
