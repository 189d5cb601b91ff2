// 🗂️ Category Classifier
// Keyword + value-range scoring to pick a spending category

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{
    FALLBACK_CONFIDENCE, FOOD_FALLBACK_MAX, FOOD_FALLBACK_MIN, HOUSING_FALLBACK_ABOVE,
    MIN_CATEGORY_CONFIDENCE, SERVICES_FALLBACK_ABOVE, SUGGESTION_THRESHOLD,
    TRANSPORT_FALLBACK_BELOW, VALUE_FALLBACK_CONFIDENCE,
};
use crate::db::TransactionKind;
use crate::keywords::{keyword_score, matched_keywords};
use crate::normalizer::normalize_description;
use crate::taxonomy::{Category, CategoryBucket, CategoryTaxonomy};
use crate::value_range::value_range_score;

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,

    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl CategoryResult {
    /// Lowest-confidence answer: "Other" at 0.1
    pub fn fallback() -> Self {
        CategoryResult {
            category: Category::Other,
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    pub category: Category,
    pub confidence: f64,
    pub confidence_percentage: f64,
    pub matched_keywords: Vec<String>,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct CategoryClassifier {
    taxonomy: CategoryTaxonomy,
}

impl CategoryClassifier {
    pub fn new(taxonomy: CategoryTaxonomy) -> Self {
        CategoryClassifier { taxonomy }
    }

    pub fn taxonomy(&self) -> &CategoryTaxonomy {
        &self.taxonomy
    }

    /// Pick the best category for a transaction.
    ///
    /// Never fails: empty descriptions and non-positive amounts get
    /// [`CategoryResult::fallback`].
    pub fn classify(&self, description: &str, amount: Decimal, kind: TransactionKind) -> CategoryResult {
        let normalized = normalize_description(description);
        if normalized.is_empty() || amount <= Decimal::ZERO {
            return CategoryResult::fallback();
        }

        // Strictly greater keeps the earlier bucket on ties
        let mut best: Option<(Category, f64)> = None;
        for (bucket, score) in self.scored_buckets(&normalized, amount, kind) {
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((bucket.category, score));
            }
        }

        if let Some((category, score)) = best {
            let confidence = score.min(1.0);
            if confidence >= MIN_CATEGORY_CONFIDENCE {
                tracing::debug!(%category, confidence, "category from keywords");
                return CategoryResult { category, confidence };
            }
        }

        if let Some(category) = categorize_by_value(amount, kind) {
            tracing::debug!(%category, "category from value range");
            return CategoryResult {
                category,
                confidence: VALUE_FALLBACK_CONFIDENCE,
            };
        }

        CategoryResult::fallback()
    }

    /// Top `top_n` categories by score, each at least [`SUGGESTION_THRESHOLD`]
    pub fn suggest(
        &self,
        description: &str,
        amount: Decimal,
        kind: TransactionKind,
        top_n: usize,
    ) -> Vec<CategorySuggestion> {
        let normalized = normalize_description(description);
        if normalized.is_empty() || amount <= Decimal::ZERO {
            return Vec::new();
        }

        let mut scored: Vec<(&CategoryBucket, f64)> = self
            .scored_buckets(&normalized, amount, kind)
            .map(|(bucket, score)| (bucket, score.min(1.0)))
            .collect();

        // Stable sort: equal scores keep taxonomy order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(top_n)
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .map(|(bucket, score)| CategorySuggestion {
                category: bucket.category,
                confidence: round_to(score, 2),
                confidence_percentage: round_to(score * 100.0, 1),
                matched_keywords: matched_keywords(&normalized, &bucket.keywords),
            })
            .collect()
    }

    /// Buckets with a non-zero keyword score and their adjusted score, in taxonomy order
    fn scored_buckets<'a>(
        &'a self,
        normalized: &'a str,
        amount: Decimal,
        kind: TransactionKind,
    ) -> impl Iterator<Item = (&'a CategoryBucket, f64)> + 'a {
        self.taxonomy.buckets.iter().filter_map(move |bucket| {
            let keyword = keyword_score(normalized, &bucket.keywords);
            if keyword <= 0.0 {
                return None;
            }

            let value = value_range_score(amount, &bucket.value_range);
            let score = keyword * bucket.weight * (1.0 + value) * kind_multiplier(kind, bucket.category);
            Some((bucket, score))
        })
    }
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new(CategoryTaxonomy::default())
    }
}

/// Boost applied to a category depending on the transaction kind
pub fn kind_multiplier(kind: TransactionKind, category: Category) -> f64 {
    match (kind, category) {
        (TransactionKind::Income, Category::Investments) => 1.5,
        (TransactionKind::Income, Category::Services) => 1.3,
        (TransactionKind::Expense, Category::Food) => 1.2,
        (TransactionKind::Expense, Category::Transport) => 1.2,
        (TransactionKind::Expense, Category::Housing) => 1.1,
        (TransactionKind::Expense, Category::Health) => 1.1,
        _ => 1.0,
    }
}

/// Value-only heuristic used when no keyword bucket is confident enough
pub fn categorize_by_value(amount: Decimal, kind: TransactionKind) -> Option<Category> {
    if kind != TransactionKind::Expense {
        return None;
    }

    if amount > Decimal::from(HOUSING_FALLBACK_ABOVE) {
        Some(Category::Housing)
    } else if amount > Decimal::from(SERVICES_FALLBACK_ABOVE) {
        Some(Category::Services)
    } else if amount >= Decimal::from(FOOD_FALLBACK_MIN) && amount <= Decimal::from(FOOD_FALLBACK_MAX) {
        Some(Category::Food)
    } else if amount < Decimal::from(TRANSPORT_FALLBACK_BELOW) {
        Some(Category::Transport)
    } else {
        None
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
