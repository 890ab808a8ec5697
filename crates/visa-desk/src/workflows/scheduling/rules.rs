use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Weekday};
use tracing::debug;

use crate::config::SchedulingConfig;

/// The specific booking rule a requested start breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotViolation {
    #[error("appointments can only start between {open:02}:00 and {close:02}:00")]
    OutsideOfficeHours { open: u32, close: u32 },
    #[error("appointments cannot be booked on {weekday}")]
    ClosedWeekday { weekday: Weekday },
    #[error("appointments cannot be booked in the past")]
    InPast,
    #[error("appointments can only be booked up to {weeks} weeks ahead")]
    BeyondHorizon { weeks: u32 },
}

/// Checks `start` against office hours, business days, the past and the look-ahead horizon,
/// in that order, using the local offset of `now`.
pub fn validate_slot(
    config: &SchedulingConfig,
    now: DateTime<FixedOffset>,
    start: DateTime<FixedOffset>,
) -> Result<(), SlotViolation> {
    let local = start.with_timezone(now.offset());
    debug!(%local, %now, "validating requested slot");

    let hour = local.hour();
    if hour < config.office_open_hour || hour >= config.office_close_hour {
        return Err(SlotViolation::OutsideOfficeHours {
            open: config.office_open_hour,
            close: config.office_close_hour,
        });
    }

    let weekday = local.weekday();
    if !config.is_business_day(weekday) {
        return Err(SlotViolation::ClosedWeekday { weekday });
    }

    if start < now {
        return Err(SlotViolation::InPast);
    }

    let horizon = now.date_naive() + Duration::weeks(i64::from(config.max_weeks_ahead));
    if local.date_naive() > horizon {
        return Err(SlotViolation::BeyondHorizon {
            weeks: config.max_weeks_ahead,
        });
    }

    Ok(())
}

/// Whole calendar days between today and the appointment's local date.
pub fn days_until_start(now: DateTime<FixedOffset>, start: DateTime<FixedOffset>) -> i64 {
    let start_date = start.with_timezone(now.offset()).date_naive();
    (start_date - now.date_naive()).num_days()
}
