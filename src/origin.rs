// 🏢 Origin Classifier - Personal vs Business
// Keyword + value + temporal signals on two competing sides, with a fixed
// tie-break chain when neither side dominates.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::category::round_to;
use crate::config::{
    BUSINESS_TEMPORAL_WEIGHT, BUSINESS_VALUE_WEIGHT, DOMINANT_SHARE, FALLBACK_CONFIDENCE,
    HIGH_CONFIDENCE, INCOME_BUSINESS_BONUS, LARGE_AMOUNT_LIMIT, MAX_ORIGIN_SCORE,
    PERSONAL_TEMPORAL_WEIGHT, PERSONAL_VALUE_WEIGHT, REVIEW_BELOW, SMALL_EXPENSE_LIMIT,
    SMALL_EXPENSE_PERSONAL_BONUS, TIE_BREAK_CONFIDENCE,
};
use crate::db::TransactionKind;
use crate::keywords::keyword_score;
use crate::normalizer::normalize_description;
use crate::taxonomy::{Origin, OriginTaxonomy};
use crate::temporal::{is_business_hours, is_weekend, temporal_score};
use crate::value_range::value_range_score;

// ============================================================================
// RESULTS
// ============================================================================

/// Which rule produced an origin decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginRule {
    EmptyDescription,
    InvalidAmount,
    NoIndicators,
    BusinessScore,
    PersonalScore,
    // Tie-break chain, in evaluation order
    LargeAmount,
    Weekend,
    IncomeInBusinessHours,
    SmallExpense,
    DefaultPersonal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginResult {
    pub is_business: bool,
    pub confidence: f64,
    pub reason: String,
    pub rule: OriginRule,
}

impl OriginResult {
    fn personal_fallback(rule: OriginRule, reason: &str) -> Self {
        OriginResult {
            is_business: false,
            confidence: FALLBACK_CONFIDENCE,
            reason: reason.to_string(),
            rule,
        }
    }

    pub fn origin(&self) -> Origin {
        if self.is_business {
            Origin::Business
        } else {
            Origin::Personal
        }
    }
}

/// Raw side scores, each capped at [`MAX_ORIGIN_SCORE`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OriginScores {
    pub business: f64,
    pub personal: f64,
}

/// Per-tenant multipliers applied to both sides before comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OriginWeights {
    pub business_multiplier: f64,
    pub personal_multiplier: f64,
}

impl Default for OriginWeights {
    fn default() -> Self {
        OriginWeights {
            business_multiplier: 1.0,
            personal_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginSuggestion {
    pub classification: Origin,
    pub confidence: f64,
    pub confidence_percentage: f64,
    pub reason: String,
    pub high_confidence: bool,
    pub review_recommended: bool,
    pub alternative_classification: Origin,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct OriginClassifier {
    taxonomy: OriginTaxonomy,
}

impl OriginClassifier {
    pub fn new(taxonomy: OriginTaxonomy) -> Self {
        OriginClassifier { taxonomy }
    }

    pub fn taxonomy(&self) -> &OriginTaxonomy {
        &self.taxonomy
    }

    /// Decide personal vs business. Never fails.
    pub fn classify(
        &self,
        description: &str,
        amount: Decimal,
        timestamp: NaiveDateTime,
        kind: TransactionKind,
        weights: Option<&OriginWeights>,
    ) -> OriginResult {
        let normalized = normalize_description(description);
        if normalized.is_empty() {
            return OriginResult::personal_fallback(
                OriginRule::EmptyDescription,
                "empty description - assuming personal",
            );
        }
        if amount <= Decimal::ZERO {
            return OriginResult::personal_fallback(
                OriginRule::InvalidAmount,
                "non-positive amount - assuming personal",
            );
        }

        let scores = self.scores(&normalized, amount, &timestamp, kind);
        let weights = weights.copied().unwrap_or_default();
        let business = scores.business * weights.business_multiplier.max(0.0);
        let personal = scores.personal * weights.personal_multiplier.max(0.0);

        let total = business + personal;
        if total <= 0.0 {
            return OriginResult::personal_fallback(
                OriginRule::NoIndicators,
                "no indicators - default personal",
            );
        }

        let business_share = business / total;
        let personal_share = personal / total;

        if business_share > DOMINANT_SHARE {
            return OriginResult {
                is_business: true,
                confidence: business_share,
                reason: format!("business indicators (score: {:.2})", business),
                rule: OriginRule::BusinessScore,
            };
        }

        if personal_share > DOMINANT_SHARE {
            return OriginResult {
                is_business: false,
                confidence: personal_share,
                reason: format!("personal indicators (score: {:.2})", personal),
                rule: OriginRule::PersonalScore,
            };
        }

        let (is_business, rule) = resolve_tie(amount, &timestamp, kind);
        tracing::debug!(business, personal, ?rule, "origin tie resolved");

        OriginResult {
            is_business,
            confidence: TIE_BREAK_CONFIDENCE,
            reason: tie_break_reason(rule).to_string(),
            rule,
        }
    }

    /// Raw business and personal scores for a normalized description
    pub fn scores(
        &self,
        normalized: &str,
        amount: Decimal,
        timestamp: &NaiveDateTime,
        kind: TransactionKind,
    ) -> OriginScores {
        let amount = amount.abs();

        let mut business = self.keyword_total(normalized, Origin::Business);
        business += BUSINESS_TEMPORAL_WEIGHT * temporal_score(timestamp, Origin::Business);
        business += BUSINESS_VALUE_WEIGHT * value_range_score(amount, self.taxonomy.values_for(Origin::Business));
        if kind == TransactionKind::Income {
            business += INCOME_BUSINESS_BONUS;
        }

        let mut personal = self.keyword_total(normalized, Origin::Personal);
        personal += PERSONAL_TEMPORAL_WEIGHT * temporal_score(timestamp, Origin::Personal);
        personal += PERSONAL_VALUE_WEIGHT * value_range_score(amount, self.taxonomy.values_for(Origin::Personal));
        if is_small_expense(amount, kind) {
            personal += SMALL_EXPENSE_PERSONAL_BONUS;
        }

        OriginScores {
            business: business.min(MAX_ORIGIN_SCORE),
            personal: personal.min(MAX_ORIGIN_SCORE),
        }
    }

    /// Classification plus review hints for a UI
    pub fn suggest(
        &self,
        description: &str,
        amount: Decimal,
        timestamp: NaiveDateTime,
        kind: TransactionKind,
    ) -> OriginSuggestion {
        let result = self.classify(description, amount, timestamp, kind, None);
        let classification = result.origin();

        OriginSuggestion {
            classification,
            confidence: round_to(result.confidence, 2),
            confidence_percentage: round_to(result.confidence * 100.0, 1),
            reason: result.reason,
            high_confidence: result.confidence >= HIGH_CONFIDENCE,
            review_recommended: result.confidence < REVIEW_BELOW,
            alternative_classification: classification.opposite(),
        }
    }

    fn keyword_total(&self, normalized: &str, side: Origin) -> f64 {
        self.taxonomy
            .buckets_for(side)
            .map(|bucket| keyword_score(normalized, &bucket.keywords) * bucket.weight)
            .sum()
    }
}

impl Default for OriginClassifier {
    fn default() -> Self {
        Self::new(OriginTaxonomy::default())
    }
}

fn is_small_expense(amount: Decimal, kind: TransactionKind) -> bool {
    kind == TransactionKind::Expense && amount < Decimal::from(SMALL_EXPENSE_LIMIT)
}

/// Ordered tie-break chain; the first matching rule wins.
pub fn resolve_tie(amount: Decimal, timestamp: &NaiveDateTime, kind: TransactionKind) -> (bool, OriginRule) {
    let amount = amount.abs();

    if amount > Decimal::from(LARGE_AMOUNT_LIMIT) {
        return (true, OriginRule::LargeAmount);
    }

    if is_weekend(timestamp) {
        return (false, OriginRule::Weekend);
    }

    if kind == TransactionKind::Income && is_business_hours(timestamp) {
        return (true, OriginRule::IncomeInBusinessHours);
    }

    if is_small_expense(amount, kind) {
        return (false, OriginRule::SmallExpense);
    }

    (false, OriginRule::DefaultPersonal)
}

fn tie_break_reason(rule: OriginRule) -> &'static str {
    match rule {
        OriginRule::LargeAmount => "large amount - likely business",
        OriginRule::Weekend => "weekend - likely personal",
        OriginRule::IncomeInBusinessHours => "income during business hours - likely business",
        OriginRule::SmallExpense => "small expense - likely personal",
        _ => "no clear indicator - assuming personal",
    }
}
