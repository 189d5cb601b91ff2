// 🧠 Classification Engine
// Owns both classifiers and exposes every caller-facing operation

use anyhow::Result;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::batch::{CategoryBatchStats, OriginBatchStats, Reclassifier};
use crate::category::{CategoryClassifier, CategoryResult, CategorySuggestion};
use crate::config::ClassifierConfig;
use crate::db::{Transaction, TransactionKind, TransactionStore};
use crate::origin::{OriginClassifier, OriginResult, OriginSuggestion, OriginWeights};
use crate::patterns::{PatternAnalyzer, PatternReport};

/// Both results of a create-time classification pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionClassification {
    pub category: CategoryResult,
    pub origin: OriginResult,
}

pub struct ClassificationEngine {
    category: CategoryClassifier,
    origin: OriginClassifier,
}

impl ClassificationEngine {
    pub fn new(config: ClassifierConfig) -> Self {
        ClassificationEngine {
            category: CategoryClassifier::new(config.category),
            origin: OriginClassifier::new(config.origin),
        }
    }

    pub fn classify_category(&self, description: &str, amount: Decimal, kind: TransactionKind) -> CategoryResult {
        self.category.classify(description, amount, kind)
    }

    pub fn classify_origin(
        &self,
        description: &str,
        amount: Decimal,
        timestamp: NaiveDateTime,
        kind: TransactionKind,
        weights: Option<&OriginWeights>,
    ) -> OriginResult {
        self.origin.classify(description, amount, timestamp, kind, weights)
    }

    pub fn suggest_categories(
        &self,
        description: &str,
        amount: Decimal,
        kind: TransactionKind,
        top_n: usize,
    ) -> Vec<CategorySuggestion> {
        self.category.suggest(description, amount, kind, top_n)
    }

    pub fn suggest_origin(
        &self,
        description: &str,
        amount: Decimal,
        timestamp: NaiveDateTime,
        kind: TransactionKind,
    ) -> OriginSuggestion {
        self.origin.suggest(description, amount, timestamp, kind)
    }

    /// Run both classifiers and write the results onto a not-yet-stored record
    pub fn classify_transaction(&self, tx: &mut Transaction) -> TransactionClassification {
        let category = self.category.classify(&tx.description, tx.amount, tx.kind);
        let origin = self
            .origin
            .classify(&tx.description, tx.amount, tx.timestamp, tx.kind, None);

        tx.category = Some(category.category.to_string());
        tx.ml_confidence = Some(category.confidence);
        tx.is_personal = Some(!origin.is_business);

        TransactionClassification { category, origin }
    }

    pub fn reclassify_categories<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        company_id: i64,
        limit: usize,
    ) -> Result<CategoryBatchStats> {
        self.reclassifier().reclassify_categories(store, company_id, limit)
    }

    pub fn reclassify_origins<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        company_id: i64,
        limit: usize,
    ) -> Result<OriginBatchStats> {
        self.reclassifier().reclassify_origins(store, company_id, limit)
    }

    pub fn analyze_patterns<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        company_id: i64,
        days: i64,
    ) -> Result<PatternReport> {
        PatternAnalyzer::analyze_patterns(store, company_id, days)
    }

    fn reclassifier(&self) -> Reclassifier<'_> {
        Reclassifier::new(&self.category, &self.origin)
    }
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{create_test_transaction, test_db, ts};
    use crate::db::{insert_transaction, SqliteTransactionStore};
    use crate::taxonomy::{Category, CategoryBucket, CategoryTaxonomy};
    use std::str::FromStr;

    #[test]
    fn test_classify_transaction_projects_both_results() {
        let engine = ClassificationEngine::default();
        let mut tx = create_test_transaction(
            1,
            "Pagamento fornecedor",
            "4500.00",
            ts(2024, 3, 12, 10, 0),
            TransactionKind::Expense,
        );

        let result = engine.classify_transaction(&mut tx);

        assert!(result.origin.is_business);
        assert_eq!(tx.is_personal, Some(false));
        assert_eq!(tx.category.as_deref(), Some(result.category.category.as_str()));
        assert_eq!(tx.ml_confidence, Some(result.category.confidence));
    }

    #[test]
    fn test_engine_uses_configured_tables() {
        let config = ClassifierConfig {
            category: CategoryTaxonomy {
                buckets: vec![CategoryBucket::new(Category::Leisure, &["feira"])],
            },
            ..Default::default()
        };
        let engine = ClassificationEngine::new(config);

        let result = engine.classify_category("Feira de domingo", Decimal::from_str("30").unwrap(), TransactionKind::Expense);
        assert_eq!(result.category, Category::Leisure);
    }

    #[test]
    fn test_batch_and_report_through_engine() {
        let conn = test_db();
        let store = SqliteTransactionStore::new(&conn);
        let engine = ClassificationEngine::default();

        let tx = create_test_transaction(1, "Uber para reuniao", "32.50", ts(2024, 3, 12, 9, 0), TransactionKind::Expense);
        insert_transaction(&conn, &tx).unwrap();

        let categories = engine.reclassify_categories(&store, 1, 10).unwrap();
        let origins = engine.reclassify_origins(&store, 1, 10).unwrap();
        assert_eq!(categories.categorized, 1);
        assert_eq!(origins.processed, 1);

        let report = engine.analyze_patterns(&store, 1, 36500).unwrap();
        assert_eq!(report.transaction_count, 1);
        assert_eq!(report.classification.total_classified, 1);
    }
}
