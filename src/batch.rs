// 🔁 Batch Reclassifier
// Re-runs the classifiers over stored transactions of one company and writes
// results back. Monotonic for categories, idempotent for both passes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::category::CategoryClassifier;
use crate::config::REVIEW_BELOW;
use crate::db::{FieldUpdate, Transaction, TransactionStore};
use crate::origin::{OriginClassifier, OriginResult};

/// Only replace a stored confidence with a strictly higher one
pub fn should_overwrite(existing: Option<f64>, new: f64) -> bool {
    new > existing.unwrap_or(0.0)
}

/// What happened to one transaction in a batch
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Updated,
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBatchStats {
    pub processed: usize,
    pub categorized: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginBatchStats {
    pub processed: usize,
    pub business: usize,
    pub personal: usize,
    pub low_confidence: usize,
    pub skipped: usize,
}

pub struct Reclassifier<'a> {
    category: &'a CategoryClassifier,
    origin: &'a OriginClassifier,
}

impl<'a> Reclassifier<'a> {
    pub fn new(category: &'a CategoryClassifier, origin: &'a OriginClassifier) -> Self {
        Reclassifier { category, origin }
    }

    /// Categorize transactions with no category or a low-confidence one
    pub fn reclassify_categories<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        company_id: i64,
        limit: usize,
    ) -> Result<CategoryBatchStats> {
        let transactions = store.fetch_transactions_needing_category(company_id, limit)?;
        let mut stats = CategoryBatchStats::default();

        in_batch(store, || {
            for tx in &transactions {
                stats.processed += 1;

                match self.categorize_one(store, tx) {
                    ItemOutcome::Updated => stats.categorized += 1,
                    ItemOutcome::Unchanged => stats.skipped += 1,
                    ItemOutcome::Failed(reason) => {
                        tracing::warn!(id = %tx.id, %reason, "category update failed");
                        stats.failed += 1;
                        stats.skipped += 1;
                    }
                }
            }
        })?;

        tracing::info!(
            company_id,
            processed = stats.processed,
            categorized = stats.categorized,
            skipped = stats.skipped,
            failed = stats.failed,
            "category batch finished"
        );

        Ok(stats)
    }

    /// Label every transaction that has no personal/business flag yet
    pub fn reclassify_origins<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        company_id: i64,
        limit: usize,
    ) -> Result<OriginBatchStats> {
        let transactions = store.fetch_transactions_needing_origin(company_id, limit)?;
        let mut stats = OriginBatchStats::default();

        in_batch(store, || {
            for tx in &transactions {
                stats.processed += 1;

                let (outcome, result) = self.separate_one(store, tx);
                match outcome {
                    ItemOutcome::Failed(reason) => {
                        tracing::warn!(id = %tx.id, %reason, "origin update failed");
                        stats.skipped += 1;
                    }
                    _ => {
                        if result.is_business {
                            stats.business += 1;
                        } else {
                            stats.personal += 1;
                        }
                        if result.confidence < REVIEW_BELOW {
                            stats.low_confidence += 1;
                        }
                    }
                }
            }
        })?;

        tracing::info!(
            company_id,
            processed = stats.processed,
            business = stats.business,
            personal = stats.personal,
            low_confidence = stats.low_confidence,
            skipped = stats.skipped,
            "origin batch finished"
        );

        Ok(stats)
    }

    fn categorize_one<S: TransactionStore + ?Sized>(&self, store: &S, tx: &Transaction) -> ItemOutcome {
        let result = self.category.classify(&tx.description, tx.amount, tx.kind);

        if !should_overwrite(tx.ml_confidence, result.confidence) {
            return ItemOutcome::Unchanged;
        }

        let update = FieldUpdate {
            transaction_id: tx.id.clone(),
            category: Some(result.category.to_string()),
            ml_confidence: Some(result.confidence),
            is_personal: None,
        };

        match store.persist_transaction_fields(&update) {
            Ok(()) => ItemOutcome::Updated,
            Err(e) => ItemOutcome::Failed(format!("{:#}", e)),
        }
    }

    fn separate_one<S: TransactionStore + ?Sized>(&self, store: &S, tx: &Transaction) -> (ItemOutcome, OriginResult) {
        let result = self
            .origin
            .classify(&tx.description, tx.amount, tx.timestamp, tx.kind, None);

        let update = FieldUpdate {
            transaction_id: tx.id.clone(),
            is_personal: Some(!result.is_business),
            ..Default::default()
        };

        let outcome = match store.persist_transaction_fields(&update) {
            Ok(()) => ItemOutcome::Updated,
            Err(e) => ItemOutcome::Failed(format!("{:#}", e)),
        };

        (outcome, result)
    }
}

/// Run `work` inside one store batch; the commit error (if any) propagates
fn in_batch<S, F>(store: &S, work: F) -> Result<()>
where
    S: TransactionStore + ?Sized,
    F: FnOnce(),
{
    store.begin_batch()?;
    work();

    if let Err(e) = store.commit_batch() {
        if let Err(rollback) = store.rollback_batch() {
            tracing::warn!(error = %rollback, "rollback after failed commit also failed");
        }
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{block_classified_events, create_test_transaction, test_db, ts};
    use crate::db::{get_transaction, insert_transactions, SqliteTransactionStore, TransactionKind};
    use chrono::NaiveDateTime;
    use rusqlite::Connection;

    fn classifiers() -> (CategoryClassifier, OriginClassifier) {
        (CategoryClassifier::default(), OriginClassifier::default())
    }

    fn seed(conn: &Connection) -> Vec<Transaction> {
        let txs = vec![
            create_test_transaction(1, "Compra no Mercado Central", "85.00", ts(2024, 3, 12, 10, 0), TransactionKind::Expense),
            create_test_transaction(1, "Pagamento fornecedor", "4500.00", ts(2024, 3, 12, 11, 0), TransactionKind::Expense),
            create_test_transaction(1, "qwxz", "300.00", ts(2024, 3, 13, 9, 0), TransactionKind::Expense),
            create_test_transaction(1, "cinema com a família", "45.00", ts(2024, 3, 16, 15, 30), TransactionKind::Expense),
        ];
        insert_transactions(conn, &txs).unwrap();
        txs
    }

    /// Store that refuses to persist one specific transaction
    struct FailingStore<'a> {
        inner: SqliteTransactionStore<'a>,
        poisoned_id: String,
    }

    impl<'a> TransactionStore for FailingStore<'a> {
        fn fetch_transactions_needing_category(&self, company_id: i64, limit: usize) -> Result<Vec<Transaction>> {
            self.inner.fetch_transactions_needing_category(company_id, limit)
        }

        fn fetch_transactions_needing_origin(&self, company_id: i64, limit: usize) -> Result<Vec<Transaction>> {
            self.inner.fetch_transactions_needing_origin(company_id, limit)
        }

        fn fetch_transactions_for_analysis(&self, company_id: i64, since: NaiveDateTime) -> Result<Vec<Transaction>> {
            self.inner.fetch_transactions_for_analysis(company_id, since)
        }

        fn persist_transaction_fields(&self, update: &FieldUpdate) -> Result<()> {
            if update.transaction_id == self.poisoned_id {
                anyhow::bail!("disk full");
            }
            self.inner.persist_transaction_fields(update)
        }
    }

    #[test]
    fn test_should_overwrite() {
        assert!(should_overwrite(None, 0.1));
        assert!(should_overwrite(Some(0.3), 0.31));
        assert!(!should_overwrite(Some(0.8), 0.4));
        assert!(!should_overwrite(Some(0.5), 0.5));
        assert!(!should_overwrite(None, 0.0));
    }

    #[test]
    fn test_category_batch_classifies_everything_once() {
        let conn = test_db();
        let txs = seed(&conn);
        let store = SqliteTransactionStore::new(&conn);
        let (category, origin) = classifiers();
        let reclassifier = Reclassifier::new(&category, &origin);

        let stats = reclassifier.reclassify_categories(&store, 1, 100).unwrap();
        println!("First run: {:?}", stats);

        assert_eq!(stats.processed, 4);
        assert_eq!(stats.categorized, 4);
        assert_eq!(stats.failed, 0);

        let market = get_transaction(&conn, &txs[0].id).unwrap().unwrap();
        assert_eq!(market.category.as_deref(), Some("Food"));
        assert!(market.ml_confidence.unwrap() >= 0.3);
        assert_eq!(market.is_personal, None);

        let unknown = get_transaction(&conn, &txs[2].id).unwrap().unwrap();
        assert_eq!(unknown.category.as_deref(), Some("Other"));
        assert_eq!(unknown.ml_confidence, Some(0.1));
    }

    #[test]
    fn test_category_batch_second_run_changes_nothing() {
        let conn = test_db();
        let txs = seed(&conn);
        let store = SqliteTransactionStore::new(&conn);
        let (category, origin) = classifiers();
        let reclassifier = Reclassifier::new(&category, &origin);

        reclassifier.reclassify_categories(&store, 1, 100).unwrap();
        let snapshot: Vec<Transaction> = txs
            .iter()
            .map(|t| get_transaction(&conn, &t.id).unwrap().unwrap())
            .collect();

        let second = reclassifier.reclassify_categories(&store, 1, 100).unwrap();
        println!("Second run: {:?}", second);

        assert_eq!(second.categorized, 0);
        assert_eq!(second.skipped, second.processed);
        for before in snapshot {
            assert_eq!(get_transaction(&conn, &before.id).unwrap().unwrap(), before);
        }
    }

    #[test]
    fn test_category_batch_never_lowers_confidence() {
        let conn = test_db();
        let store = SqliteTransactionStore::new(&conn);

        // Selected (below 0.5) but the recomputed "Other" 0.1 is weaker
        let mut tx = create_test_transaction(1, "qwxz", "300.00", ts(2024, 3, 13, 9, 0), TransactionKind::Expense);
        tx.category = Some("Food".to_string());
        tx.ml_confidence = Some(0.45);
        insert_transactions(&conn, &[tx.clone()]).unwrap();

        let (category, origin) = classifiers();
        let stats = Reclassifier::new(&category, &origin)
            .reclassify_categories(&store, 1, 100)
            .unwrap();

        assert_eq!(stats, CategoryBatchStats { processed: 1, categorized: 0, skipped: 1, failed: 0 });
        let stored = get_transaction(&conn, &tx.id).unwrap().unwrap();
        assert_eq!(stored.category.as_deref(), Some("Food"));
        assert_eq!(stored.ml_confidence, Some(0.45));
    }

    #[test]
    fn test_category_batch_respects_limit() {
        let conn = test_db();
        seed(&conn);
        let store = SqliteTransactionStore::new(&conn);
        let (category, origin) = classifiers();

        let stats = Reclassifier::new(&category, &origin)
            .reclassify_categories(&store, 1, 2)
            .unwrap();
        assert_eq!(stats.processed, 2);
    }

    #[test]
    fn test_failed_item_does_not_abort_batch() {
        let conn = test_db();
        let txs = seed(&conn);
        let store = FailingStore {
            inner: SqliteTransactionStore::new(&conn),
            poisoned_id: txs[1].id.clone(),
        };
        let (category, origin) = classifiers();
        let reclassifier = Reclassifier::new(&category, &origin);

        let stats = reclassifier.reclassify_categories(&store, 1, 100).unwrap();
        assert_eq!(stats, CategoryBatchStats { processed: 4, categorized: 3, skipped: 1, failed: 1 });

        let origins = reclassifier.reclassify_origins(&store, 1, 100).unwrap();
        assert_eq!(origins.processed, 4);
        assert_eq!(origins.skipped, 1);
        assert_eq!(origins.business + origins.personal, 3);

        let poisoned = get_transaction(&conn, &txs[1].id).unwrap().unwrap();
        assert_eq!(poisoned.category, None);
        assert_eq!(poisoned.is_personal, None);
    }

    #[test]
    fn test_failed_audit_write_leaves_row_untouched() {
        let conn = test_db();
        let txs = seed(&conn);
        block_classified_events(&conn);
        let store = SqliteTransactionStore::new(&conn);
        let (category, origin) = classifiers();
        let reclassifier = Reclassifier::new(&category, &origin);

        let stats = reclassifier.reclassify_categories(&store, 1, 1).unwrap();
        assert_eq!(stats, CategoryBatchStats { processed: 1, categorized: 0, skipped: 1, failed: 1 });

        let origins = reclassifier.reclassify_origins(&store, 1, 1).unwrap();
        assert_eq!(origins.skipped, 1);

        assert_eq!(get_transaction(&conn, &txs[0].id).unwrap().unwrap(), txs[0]);
    }

    #[test]
    fn test_origin_batch_labels_and_counts() {
        let conn = test_db();
        let txs = seed(&conn);
        let store = SqliteTransactionStore::new(&conn);
        let (category, origin) = classifiers();
        let reclassifier = Reclassifier::new(&category, &origin);

        let stats = reclassifier.reclassify_origins(&store, 1, 100).unwrap();
        println!("Origin run: {:?}", stats);

        assert_eq!(stats.processed, 4);
        assert_eq!(stats.business + stats.personal, 4);
        assert!(stats.business >= 1);
        assert!(stats.personal >= 1);

        let supplier = get_transaction(&conn, &txs[1].id).unwrap().unwrap();
        assert_eq!(supplier.is_personal, Some(false));
        // Origin pass leaves the category confidence alone
        assert_eq!(supplier.ml_confidence, None);

        let cinema = get_transaction(&conn, &txs[3].id).unwrap().unwrap();
        assert_eq!(cinema.is_personal, Some(true));

        let second = reclassifier.reclassify_origins(&store, 1, 100).unwrap();
        assert_eq!(second, OriginBatchStats::default());
    }

    #[test]
    fn test_other_companies_untouched() {
        let conn = test_db();
        seed(&conn);
        let foreign = create_test_transaction(2, "Padaria", "12.00", ts(2024, 3, 12, 7, 0), TransactionKind::Expense);
        insert_transactions(&conn, &[foreign.clone()]).unwrap();

        let store = SqliteTransactionStore::new(&conn);
        let (category, origin) = classifiers();
        let reclassifier = Reclassifier::new(&category, &origin);
        reclassifier.reclassify_categories(&store, 1, 100).unwrap();
        reclassifier.reclassify_origins(&store, 1, 100).unwrap();

        assert_eq!(get_transaction(&conn, &foreign.id).unwrap().unwrap(), foreign);
    }
}
