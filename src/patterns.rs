// 📊 Pattern Analyzer
// Read-only aggregates over one company's recent transactions

use anyhow::Result;
use chrono::{Duration, Local, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::category::round_to;
use crate::config::REVIEW_BELOW;
use crate::db::{Transaction, TransactionKind, TransactionStore};

const SAMPLE_DESCRIPTIONS: usize = 5;
const LOWEST_CONFIDENCE_CATEGORIES: usize = 3;
const PEAK_HOURS: usize = 3;
const COMMON_DESCRIPTIONS: usize = 5;
const PREFIX_WORDS: usize = 3;

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPattern {
    pub category: String,
    pub count: usize,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub average_confidence: f64,
    pub sample_descriptions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingPatterns {
    /// One entry per category, sorted by name
    pub categories: Vec<CategoryPattern>,
    pub categorized_expenses: usize,
    pub overall_average_confidence: f64,
    pub most_frequent_category: Option<String>,
    pub highest_spending_category: Option<String>,
    /// Up to three categories, least confident first
    pub lowest_confidence_categories: Vec<String>,
}

/// Transactions seen in one hour of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPatterns {
    pub total_classified: usize,
    pub business_count: usize,
    pub personal_count: usize,
    pub business_percentage: f64,
    pub personal_percentage: f64,
    pub average_business_amount: Decimal,
    pub average_personal_amount: Decimal,
    /// Labelled rows whose stored category confidence is below 0.6 (missing counts as 0)
    pub low_confidence_count: usize,
    pub business_peak_hours: Vec<HourCount>,
    pub personal_peak_hours: Vec<HourCount>,
    pub common_business_descriptions: Vec<String>,
    pub common_personal_descriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub period_days: i64,
    pub transaction_count: usize,
    pub spending: SpendingPatterns,
    pub classification: ClassificationPatterns,
}

// ============================================================================
// ANALYZER
// ============================================================================

pub struct PatternAnalyzer;

impl PatternAnalyzer {
    /// Fetch the last `days` days of a company's transactions and summarize them
    pub fn analyze_patterns<S: TransactionStore + ?Sized>(
        store: &S,
        company_id: i64,
        days: i64,
    ) -> Result<PatternReport> {
        let since = window_start(Local::now().naive_local(), days);
        let transactions = store.fetch_transactions_for_analysis(company_id, since)?;

        let report = Self::summarize(&transactions, days);
        tracing::info!(
            company_id,
            days,
            transactions = report.transaction_count,
            "pattern analysis finished"
        );

        Ok(report)
    }

    /// Pure summary of an already-fetched window
    pub fn summarize(transactions: &[Transaction], days: i64) -> PatternReport {
        PatternReport {
            period_days: days,
            transaction_count: transactions.len(),
            spending: spending_patterns(transactions),
            classification: classification_patterns(transactions),
        }
    }
}

/// Start of a `days`-long window ending at `now`; too long a window is unbounded
fn window_start(now: NaiveDateTime, days: i64) -> NaiveDateTime {
    Duration::try_days(days.max(0))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(NaiveDateTime::MIN)
}

// ============================================================================
// SPENDING
// ============================================================================

#[derive(Default)]
struct CategoryAccumulator {
    count: usize,
    total: Decimal,
    confidence_sum: f64,
    samples: Vec<String>,
}

fn spending_patterns(transactions: &[Transaction]) -> SpendingPatterns {
    let mut by_category: BTreeMap<&str, CategoryAccumulator> = BTreeMap::new();
    let mut confidence_sum = 0.0;
    let mut categorized = 0;

    for tx in transactions {
        let category = match (&tx.category, tx.kind) {
            (Some(category), TransactionKind::Expense) => category.as_str(),
            _ => continue,
        };

        let confidence = tx.ml_confidence.unwrap_or(0.0);
        let acc = by_category.entry(category).or_default();
        acc.count += 1;
        acc.total += tx.amount;
        acc.confidence_sum += confidence;
        if acc.samples.len() < SAMPLE_DESCRIPTIONS {
            acc.samples.push(tx.description.clone());
        }

        confidence_sum += confidence;
        categorized += 1;
    }

    if categorized == 0 {
        return SpendingPatterns::default();
    }

    let categories: Vec<CategoryPattern> = by_category
        .into_iter()
        .map(|(category, acc)| CategoryPattern {
            category: category.to_string(),
            count: acc.count,
            total_amount: acc.total,
            average_amount: average(acc.total, acc.count),
            average_confidence: acc.confidence_sum / acc.count as f64,
            sample_descriptions: acc.samples,
        })
        .collect();

    // Strictly greater keeps the alphabetically first category on ties
    let mut most_frequent: Option<&CategoryPattern> = None;
    let mut highest_spending: Option<&CategoryPattern> = None;
    for pattern in &categories {
        if most_frequent.map_or(true, |best| pattern.count > best.count) {
            most_frequent = Some(pattern);
        }
        if highest_spending.map_or(true, |best| pattern.total_amount > best.total_amount) {
            highest_spending = Some(pattern);
        }
    }

    let mut by_confidence: Vec<&CategoryPattern> = categories.iter().collect();
    by_confidence.sort_by(|a, b| a.average_confidence.total_cmp(&b.average_confidence));
    let lowest_confidence_categories = by_confidence
        .into_iter()
        .take(LOWEST_CONFIDENCE_CATEGORIES)
        .map(|p| p.category.clone())
        .collect();

    SpendingPatterns {
        most_frequent_category: most_frequent.map(|p| p.category.clone()),
        highest_spending_category: highest_spending.map(|p| p.category.clone()),
        lowest_confidence_categories,
        categorized_expenses: categorized,
        overall_average_confidence: confidence_sum / categorized as f64,
        categories,
    }
}

// ============================================================================
// PERSONAL / BUSINESS
// ============================================================================

fn classification_patterns(transactions: &[Transaction]) -> ClassificationPatterns {
    let (personal, business): (Vec<&Transaction>, Vec<&Transaction>) = transactions
        .iter()
        .filter(|tx| tx.is_personal.is_some())
        .partition(|tx| tx.is_personal == Some(true));

    let total = business.len() + personal.len();
    if total == 0 {
        return ClassificationPatterns::default();
    }

    let low_confidence_count = business
        .iter()
        .chain(personal.iter())
        .filter(|tx| tx.ml_confidence.unwrap_or(0.0) < REVIEW_BELOW)
        .count();

    ClassificationPatterns {
        total_classified: total,
        business_count: business.len(),
        personal_count: personal.len(),
        business_percentage: percentage(business.len(), total),
        personal_percentage: percentage(personal.len(), total),
        average_business_amount: average_of(&business),
        average_personal_amount: average_of(&personal),
        low_confidence_count,
        business_peak_hours: peak_hours(&business),
        personal_peak_hours: peak_hours(&personal),
        common_business_descriptions: common_prefixes(&business),
        common_personal_descriptions: common_prefixes(&personal),
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    round_to(part as f64 * 100.0 / total as f64, 1)
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (total / Decimal::from(count)).round_dp(2)
}

fn average_of(transactions: &[&Transaction]) -> Decimal {
    let total: Decimal = transactions.iter().map(|tx| tx.amount).sum();
    average(total, transactions.len())
}

/// Most frequent keys first; equal counts ordered by key
fn top_by_count<K: Ord>(counts: HashMap<K, usize>, n: usize) -> Vec<(K, usize)> {
    let mut entries: Vec<(K, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

fn peak_hours(transactions: &[&Transaction]) -> Vec<HourCount> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for tx in transactions {
        *counts.entry(tx.timestamp.hour()).or_insert(0) += 1;
    }
    top_by_count(counts, PEAK_HOURS)
        .into_iter()
        .map(|(hour, count)| HourCount { hour, count })
        .collect()
}

fn common_prefixes(transactions: &[&Transaction]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for tx in transactions {
        let lower = tx.description.to_lowercase();
        let prefix = lower
            .split_whitespace()
            .take(PREFIX_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        if !prefix.is_empty() {
            *counts.entry(prefix).or_insert(0) += 1;
        }
    }
    top_by_count(counts, COMMON_DESCRIPTIONS)
        .into_iter()
        .map(|(prefix, _)| prefix)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{create_test_transaction, test_db, ts};
    use crate::db::{insert_transactions, SqliteTransactionStore};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn labelled(
        description: &str,
        amount: &str,
        hour: u32,
        kind: TransactionKind,
        category: Option<(&str, f64)>,
        is_personal: Option<bool>,
    ) -> Transaction {
        let mut tx = create_test_transaction(1, description, amount, ts(2024, 3, 12, hour, 0), kind);
        if let Some((name, confidence)) = category {
            tx.category = Some(name.to_string());
            tx.ml_confidence = Some(confidence);
        }
        tx.is_personal = is_personal;
        tx
    }

    fn sample() -> Vec<Transaction> {
        vec![
            labelled("Mercado Central loja 1", "80.00", 10, TransactionKind::Expense, Some(("Food", 0.9)), Some(true)),
            labelled("Mercado Central loja 2", "40.00", 10, TransactionKind::Expense, Some(("Food", 0.7)), Some(true)),
            labelled("Aluguel escritorio", "3000.00", 9, TransactionKind::Expense, Some(("Housing", 0.4)), Some(false)),
            labelled("Uber", "25.50", 22, TransactionKind::Expense, Some(("Transport", 0.5)), Some(true)),
            labelled("Venda cliente", "5000.00", 14, TransactionKind::Income, Some(("Services", 1.0)), Some(false)),
            labelled("qwxz", "10.00", 11, TransactionKind::Expense, None, None),
        ]
    }

    #[test]
    fn test_empty_window_is_zeroed() {
        let report = PatternAnalyzer::summarize(&[], 30);

        assert_eq!(report.period_days, 30);
        assert_eq!(report.transaction_count, 0);
        assert_eq!(report.spending, SpendingPatterns::default());
        assert_eq!(report.classification, ClassificationPatterns::default());
        assert_eq!(report.classification.average_business_amount, Decimal::ZERO);
    }

    #[test]
    fn test_spending_patterns() {
        let report = PatternAnalyzer::summarize(&sample(), 30);
        let spending = &report.spending;

        // Income and uncategorized rows are ignored
        assert_eq!(spending.categorized_expenses, 4);
        let names: Vec<&str> = spending.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Food", "Housing", "Transport"]);

        let food = &spending.categories[0];
        assert_eq!(food.count, 2);
        assert_eq!(food.total_amount, dec("120.00"));
        assert_eq!(food.average_amount, dec("60.00"));
        assert!((food.average_confidence - 0.8).abs() < 1e-9);
        assert_eq!(food.sample_descriptions.len(), 2);

        assert!((spending.overall_average_confidence - 0.625).abs() < 1e-9);
        assert_eq!(spending.most_frequent_category.as_deref(), Some("Food"));
        assert_eq!(spending.highest_spending_category.as_deref(), Some("Housing"));
        assert_eq!(spending.lowest_confidence_categories, vec!["Housing", "Transport", "Food"]);
    }

    #[test]
    fn test_missing_confidence_counts_as_zero() {
        let mut tx = labelled("Farmacia", "30.00", 10, TransactionKind::Expense, None, None);
        tx.category = Some("Health".to_string());

        let report = PatternAnalyzer::summarize(&[tx], 7);
        assert_eq!(report.spending.categories[0].average_confidence, 0.0);
        assert_eq!(report.spending.overall_average_confidence, 0.0);
    }

    #[test]
    fn test_classification_patterns() {
        let report = PatternAnalyzer::summarize(&sample(), 30);
        let split = &report.classification;

        assert_eq!(split.total_classified, 5);
        assert_eq!(split.business_count, 2);
        assert_eq!(split.personal_count, 3);
        assert_eq!(split.business_percentage, 40.0);
        assert_eq!(split.personal_percentage, 60.0);
        assert_eq!(split.average_business_amount, dec("4000.00"));
        assert_eq!(split.average_personal_amount, dec("48.50"));

        // 0.4 and 0.5 are below the review threshold
        assert_eq!(split.low_confidence_count, 2);

        assert_eq!(
            split.personal_peak_hours,
            vec![HourCount { hour: 10, count: 2 }, HourCount { hour: 22, count: 1 }]
        );
        assert_eq!(
            split.business_peak_hours,
            vec![HourCount { hour: 9, count: 1 }, HourCount { hour: 14, count: 1 }]
        );
        assert_eq!(
            split.common_personal_descriptions,
            vec!["mercado central loja".to_string(), "uber".to_string()]
        );
    }

    #[test]
    fn test_origin_only_labels_count_as_low_confidence() {
        // Labelled by the origin pass only: no category confidence stored
        let txs = vec![
            labelled("Uber", "20.00", 8, TransactionKind::Expense, None, Some(true)),
            labelled("Venda cliente", "900.00", 15, TransactionKind::Income, None, Some(false)),
            labelled("Padaria", "9.00", 7, TransactionKind::Expense, Some(("Food", 0.9)), Some(true)),
        ];

        let split = PatternAnalyzer::summarize(&txs, 30).classification;
        assert_eq!(split.total_classified, 3);
        assert_eq!(split.low_confidence_count, 2);
    }

    #[test]
    fn test_percentages_round_to_one_decimal() {
        let txs = vec![
            labelled("a", "1", 10, TransactionKind::Expense, None, Some(true)),
            labelled("b", "1", 10, TransactionKind::Expense, None, Some(true)),
            labelled("c", "1", 10, TransactionKind::Expense, None, Some(false)),
        ];

        let split = PatternAnalyzer::summarize(&txs, 30).classification;
        assert_eq!(split.personal_percentage, 66.7);
        assert_eq!(split.business_percentage, 33.3);
    }

    #[test]
    fn test_analyze_patterns_reads_recent_window() {
        let conn = test_db();
        let store = SqliteTransactionStore::new(&conn);

        let now = Local::now().naive_local();
        let mut recent = create_test_transaction(1, "Padaria", "12.00", now - Duration::days(2), TransactionKind::Expense);
        recent.category = Some("Food".to_string());
        recent.ml_confidence = Some(1.0);
        let old = create_test_transaction(1, "Padaria", "15.00", now - Duration::days(90), TransactionKind::Expense);
        insert_transactions(&conn, &[recent, old]).unwrap();

        let report = PatternAnalyzer::analyze_patterns(&store, 1, 30).unwrap();
        assert_eq!(report.transaction_count, 1);
        assert_eq!(report.spending.most_frequent_category.as_deref(), Some("Food"));

        let empty = PatternAnalyzer::analyze_patterns(&store, 99, 30).unwrap();
        assert_eq!(empty.transaction_count, 0);
    }

    #[test]
    fn test_huge_window_covers_everything() {
        let conn = test_db();
        let store = SqliteTransactionStore::new(&conn);

        let now = Local::now().naive_local();
        let ancient = create_test_transaction(1, "Padaria", "15.00", ts(1990, 5, 2, 8, 0), TransactionKind::Expense);
        let recent = create_test_transaction(1, "Padaria", "12.00", now - Duration::days(1), TransactionKind::Expense);
        insert_transactions(&conn, &[ancient, recent]).unwrap();

        for days in [1_000_000_000, i64::MAX] {
            let report = PatternAnalyzer::analyze_patterns(&store, 1, days).unwrap();
            assert_eq!(report.period_days, days);
            assert_eq!(report.transaction_count, 2);
        }
    }

    #[test]
    fn test_window_start() {
        let now = ts(2024, 3, 12, 10, 0);

        assert_eq!(window_start(now, 11), ts(2024, 3, 1, 10, 0));
        assert_eq!(window_start(now, -5), now);
        assert_eq!(window_start(now, i64::MAX), NaiveDateTime::MIN);
        assert_eq!(window_start(now, 1_000_000_000), NaiveDateTime::MIN);
    }
}
