// ⚙️ Classifier Configuration
// Taxonomy tables (loadable from JSON) and the hand-tuned thresholds.
//
// The thresholds below are behavioral contracts: changing any of them changes
// classification output for existing data.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::taxonomy::{CategoryTaxonomy, OriginTaxonomy};

// ============================================================================
// CATEGORY THRESHOLDS
// ============================================================================

/// Minimum keyword-driven score accepted as a category decision
pub const MIN_CATEGORY_CONFIDENCE: f64 = 0.3;

/// Confidence assigned by the value-only fallback
pub const VALUE_FALLBACK_CONFIDENCE: f64 = 0.4;

/// Confidence of the "Other" fallback
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Minimum score for an entry in `suggest_categories`
pub const SUGGESTION_THRESHOLD: f64 = 0.1;

/// Value-only fallback amounts (expenses only)
pub const HOUSING_FALLBACK_ABOVE: i64 = 1000;
pub const SERVICES_FALLBACK_ABOVE: i64 = 500;
pub const FOOD_FALLBACK_MIN: i64 = 50;
pub const FOOD_FALLBACK_MAX: i64 = 200;
pub const TRANSPORT_FALLBACK_BELOW: i64 = 20;

// ============================================================================
// ORIGIN THRESHOLDS
// ============================================================================

/// Relative share one side must exceed to win outright
pub const DOMINANT_SHARE: f64 = 0.6;

/// Confidence reported by every tie-break rule
pub const TIE_BREAK_CONFIDENCE: f64 = 0.5;

/// Upper bound on each side's raw score
pub const MAX_ORIGIN_SCORE: f64 = 2.0;

pub const BUSINESS_TEMPORAL_WEIGHT: f64 = 0.3;
pub const BUSINESS_VALUE_WEIGHT: f64 = 0.4;
pub const PERSONAL_TEMPORAL_WEIGHT: f64 = 0.2;
pub const PERSONAL_VALUE_WEIGHT: f64 = 0.3;

/// Flat bonus added to the business score of income
pub const INCOME_BUSINESS_BONUS: f64 = 0.5;

/// Flat bonus added to the personal score of small expenses
pub const SMALL_EXPENSE_PERSONAL_BONUS: f64 = 0.3;

/// Expenses below this amount count as small (bonus and tie-break rule 4)
pub const SMALL_EXPENSE_LIMIT: i64 = 100;

/// Tie-break rule 1: amounts above this are business
pub const LARGE_AMOUNT_LIMIT: i64 = 10000;

/// Suggestions at or above this confidence are flagged high confidence
pub const HIGH_CONFIDENCE: f64 = 0.7;

/// Results below this confidence should be reviewed by a human
pub const REVIEW_BELOW: f64 = 0.6;

// ============================================================================
// BATCH THRESHOLDS
// ============================================================================

/// Category batch re-selects transactions whose stored confidence is below this
pub const RECLASSIFY_BELOW: f64 = 0.5;

/// Default batch size when the caller gives none
pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// Default lookback window for pattern analysis
pub const DEFAULT_ANALYSIS_DAYS: i64 = 30;

// ============================================================================
// CONFIG FILE
// ============================================================================

/// Immutable tables handed to a classification engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub category: CategoryTaxonomy,

    #[serde(default)]
    pub origin: OriginTaxonomy,
}

impl ClassifierConfig {
    /// Load tables from a JSON file; sections left out keep the built-in defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read classifier config: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: ClassifierConfig =
            serde_json::from_str(content).context("Failed to parse classifier config JSON")?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the built-in tables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize classifier config")
    }
}
