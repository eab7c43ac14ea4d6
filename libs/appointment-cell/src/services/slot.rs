// libs/appointment-cell/src/services/slot.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::models::AppointmentError;

/// Rejects slots that are already behind the wall clock. `now` is injected so
/// callers (and tests) control what "today" means.
pub fn validate_slot(
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
) -> Result<(), AppointmentError> {
    let today = now.date();

    if date < today {
        debug!("Slot {} {} rejected: date before {}", date, time, today);
        return Err(AppointmentError::PastDate);
    }

    if date == today && time <= now.time() {
        debug!("Slot {} {} rejected: time not after {}", date, time, now.time());
        return Err(AppointmentError::PastTimeToday);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn earlier_dates_are_past_regardless_of_time() {
        let yesterday = NaiveDate::from_ymd_opt(2025, 8, 14).unwrap();
        for time in [at(0, 0), at(10, 1), at(23, 59)] {
            assert_eq!(validate_slot(yesterday, time, now()), Err(AppointmentError::PastDate));
        }

        let last_year = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(validate_slot(last_year, at(12, 0), now()), Err(AppointmentError::PastDate));
    }

    #[test]
    fn today_requires_a_strictly_later_time() {
        let today = now().date();
        assert_eq!(validate_slot(today, at(9, 59), now()), Err(AppointmentError::PastTimeToday));
        assert_eq!(validate_slot(today, at(10, 0), now()), Err(AppointmentError::PastTimeToday));
        assert_eq!(validate_slot(today, at(10, 1), now()), Ok(()));
    }

    #[test]
    fn seconds_of_now_count_against_the_current_minute() {
        let now = now().date().and_hms_opt(10, 0, 30).unwrap();
        assert_eq!(validate_slot(now.date(), at(10, 0), now), Err(AppointmentError::PastTimeToday));
        assert_eq!(validate_slot(now.date(), at(10, 1), now), Ok(()));
    }

    #[test]
    fn future_dates_accept_any_time() {
        let tomorrow = NaiveDate::from_ymd_opt(2025, 8, 16).unwrap();
        assert_eq!(validate_slot(tomorrow, at(0, 0), now()), Ok(()));
        assert_eq!(validate_slot(tomorrow, at(9, 0), now()), Ok(()));
    }
}
