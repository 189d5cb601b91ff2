// 💰 Value-Range Scorer
// Scores a monetary amount against typical ranges for a category or origin

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Business tables: bonus for exact multiples of this value
pub const ROUND_VALUE_STEP: i64 = 100;
pub const ROUND_VALUE_BONUS: f64 = 0.2;

/// Business tables: bonus above this amount
pub const HIGH_VALUE_THRESHOLD: i64 = 5000;
pub const HIGH_VALUE_BONUS: f64 = 0.4;

/// Personal tables: bonus for amounts that are not multiples of this value
pub const IRREGULAR_VALUE_STEP: i64 = 10;
pub const IRREGULAR_VALUE_BONUS: f64 = 0.1;

/// Personal tables: bonus below this amount
pub const LOW_VALUE_THRESHOLD: i64 = 50;
pub const LOW_VALUE_BONUS: f64 = 0.3;

// ============================================================================
// TABLE DEFINITION
// ============================================================================

/// One inclusive amount band: `min <= amount <= max` contributes `confidence`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBand {
    pub min: Decimal,
    pub max: Decimal,
    pub confidence: f64,
}

impl ValueBand {
    pub fn new(min: i64, max: i64, confidence: f64) -> Self {
        ValueBand {
            min: Decimal::from(min),
            max: Decimal::from(max),
            confidence,
        }
    }

    pub fn contains(&self, amount: Decimal) -> bool {
        self.min <= amount && amount <= self.max
    }
}

/// Which style bonuses a table applies on top of its bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueProfile {
    /// Bands only (category tables)
    #[default]
    Plain,
    /// Round and high amounts look like business spending
    Business,
    /// Irregular and small amounts look like personal spending
    Personal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueRangeTable {
    #[serde(default)]
    pub bands: Vec<ValueBand>,

    #[serde(default)]
    pub profile: ValueProfile,

    #[serde(default)]
    pub prefer_round_values: bool,

    #[serde(default)]
    pub prefer_irregular_values: bool,
}

impl ValueRangeTable {
    pub fn plain(bands: Vec<ValueBand>) -> Self {
        ValueRangeTable {
            bands,
            ..Default::default()
        }
    }

    /// Default business table: high and mid-high ranges, round values preferred
    pub fn business() -> Self {
        ValueRangeTable {
            bands: vec![ValueBand::new(1000, 50000, 0.7), ValueBand::new(500, 5000, 0.4)],
            profile: ValueProfile::Business,
            prefer_round_values: true,
            prefer_irregular_values: false,
        }
    }

    /// Default personal table: everyday ranges, irregular values preferred
    pub fn personal() -> Self {
        ValueRangeTable {
            bands: vec![ValueBand::new(5, 500, 0.6), ValueBand::new(500, 2000, 0.3)],
            profile: ValueProfile::Personal,
            prefer_round_values: false,
            prefer_irregular_values: true,
        }
    }
}

// ============================================================================
// SCORING
// ============================================================================

/// Score an amount against a table. The sign of `amount` is ignored.
pub fn value_range_score(amount: Decimal, table: &ValueRangeTable) -> f64 {
    let amount = amount.abs();

    let mut score: f64 = table
        .bands
        .iter()
        .filter(|band| band.contains(amount))
        .map(|band| band.confidence)
        .sum();

    match table.profile {
        ValueProfile::Plain => {}
        ValueProfile::Business => {
            if table.prefer_round_values && is_multiple_of(amount, ROUND_VALUE_STEP) {
                score += ROUND_VALUE_BONUS;
            }
            if amount > Decimal::from(HIGH_VALUE_THRESHOLD) {
                score += HIGH_VALUE_BONUS;
            }
        }
        ValueProfile::Personal => {
            if table.prefer_irregular_values && !is_multiple_of(amount, IRREGULAR_VALUE_STEP) {
                score += IRREGULAR_VALUE_BONUS;
            }
            if amount < Decimal::from(LOW_VALUE_THRESHOLD) {
                score += LOW_VALUE_BONUS;
            }
        }
    }

    score.clamp(0.0, 1.0)
}

fn is_multiple_of(amount: Decimal, step: i64) -> bool {
    (amount % Decimal::from(step)).is_zero()
}
