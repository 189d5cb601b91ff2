// ⏰ Temporal Scorer
// Business-hours heuristics for the personal/business classifier
//
// Business hours: 08:00:00 through 18:00:00 (both inclusive), Monday to Friday.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::taxonomy::Origin;

pub const BUSINESS_HOURS_START: u32 = 8;
pub const BUSINESS_HOURS_END: u32 = 18;

/// Score returned for a business context inside business hours
pub const BUSINESS_HOURS_SCORE: f64 = 0.5;

/// Score returned for a personal context outside business hours
pub const OFF_HOURS_SCORE: f64 = 0.3;

pub fn is_weekend(timestamp: &NaiveDateTime) -> bool {
    matches!(timestamp.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Time of day within the business window, ignoring the weekday
pub fn is_within_business_time(timestamp: &NaiveDateTime) -> bool {
    let time = timestamp.time();
    let hour = time.hour();

    if hour < BUSINESS_HOURS_START || hour > BUSINESS_HOURS_END {
        return false;
    }

    // 18:00:00 exactly is still inside; 18:00:00.001 is not
    hour < BUSINESS_HOURS_END
        || (time.minute() == 0 && time.second() == 0 && time.nanosecond() == 0)
}

/// Weekday and time of day both inside the business window
pub fn is_business_hours(timestamp: &NaiveDateTime) -> bool {
    !is_weekend(timestamp) && is_within_business_time(timestamp)
}

/// Score a timestamp for the given origin context
pub fn temporal_score(timestamp: &NaiveDateTime, context: Origin) -> f64 {
    let inside = is_business_hours(timestamp);

    match context {
        Origin::Business if inside => BUSINESS_HOURS_SCORE,
        Origin::Personal if !inside => OFF_HOURS_SCORE,
        _ => 0.0,
    }
}
