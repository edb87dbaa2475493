//! Recurrence math.
//!
//! Pure date arithmetic for regenerating tasks: interval validation at rule
//! creation and next-occurrence calculation at generation time. Monthly
//! arithmetic clamps to month end, so a rule anchored on Jan 31 lands on
//! Feb 28/29 rather than skipping a month.

use chrono::{DateTime, Duration, Months, Utc};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::RecurrencePattern;

/// Validate a pattern/interval pair. Out-of-range intervals are rejected
/// here, at rule creation, never at generation time.
pub fn validate_interval(pattern: RecurrencePattern, interval: u32) -> EngineResult<()> {
    let (min, max) = pattern.interval_range();
    if interval < min || interval > max {
        return Err(EngineError::InvalidInterval {
            pattern,
            interval,
            min,
            max,
        });
    }
    Ok(())
}

/// Build a rule, rejecting out-of-range intervals up front so generation
/// time never sees an invalid one.
pub fn create_rule(
    task_id: uuid::Uuid,
    pattern: RecurrencePattern,
    interval: u32,
) -> EngineResult<crate::domain::models::RecurrenceRule> {
    validate_interval(pattern, interval)?;
    Ok(crate::domain::models::RecurrenceRule::new(
        task_id, pattern, interval,
    ))
}

/// Compute the occurrence after `current` for a validated rule.
pub fn next_occurrence(
    current: DateTime<Utc>,
    pattern: RecurrencePattern,
    interval: u32,
) -> EngineResult<DateTime<Utc>> {
    let next = match pattern {
        RecurrencePattern::Daily | RecurrencePattern::Custom => {
            current.checked_add_signed(Duration::days(i64::from(interval)))
        }
        RecurrencePattern::Weekly => {
            current.checked_add_signed(Duration::weeks(i64::from(interval)))
        }
        RecurrencePattern::Monthly => current.checked_add_months(Months::new(interval)),
    };

    next.ok_or_else(|| {
        EngineError::Validation(format!(
            "next occurrence overflows the calendar: {} + {} {}",
            current, interval, pattern
        ))
    })
}
