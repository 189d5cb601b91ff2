// Transaction Classifier - Core Library
// Category and personal/business classification for financial transactions.
// Exposes all modules for use in CLI, API server, and tests

pub mod normalizer;
pub mod keywords;
pub mod value_range;
pub mod temporal;
pub mod taxonomy;
pub mod config;
pub mod category;
pub mod origin;
pub mod db;
pub mod batch;
pub mod patterns;
pub mod import;
pub mod engine;

use std::sync::Once;

// Re-export commonly used types
pub use normalizer::normalize_description;
pub use keywords::{keyword_score, matched_keywords};
pub use value_range::{value_range_score, ValueBand, ValueProfile, ValueRangeTable};
pub use temporal::{is_business_hours, is_weekend, temporal_score};
pub use taxonomy::{
    Category, CategoryBucket, CategoryTaxonomy,
    Origin, OriginBucket, OriginKeywordBucket, OriginTaxonomy,
};
pub use config::ClassifierConfig;
pub use category::{CategoryClassifier, CategoryResult, CategorySuggestion};
pub use origin::{
    OriginClassifier, OriginResult, OriginRule, OriginScores, OriginSuggestion, OriginWeights,
};
pub use db::{
    Transaction, TransactionKind, FieldUpdate, Event, InsertSummary,
    TransactionStore, SqliteTransactionStore,
    setup_database, open_database, insert_transaction, insert_transactions,
    get_transaction, verify_count, insert_event, get_events_for_entity,
};
pub use batch::{should_overwrite, CategoryBatchStats, ItemOutcome, OriginBatchStats, Reclassifier};
pub use patterns::{
    CategoryPattern, ClassificationPatterns, HourCount, PatternAnalyzer, PatternReport, SpendingPatterns,
};
pub use import::{BankFormat, ImportReport, ParsedStatement, detect_format, parse_amount};
pub use engine::{ClassificationEngine, TransactionClassification};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber once; `RUST_LOG` overrides the default level
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("transaction_classifier=info,classifier_server=info"));

        fmt().with_env_filter(filter).init();
    });
}
