//! Utility functions and helpers

use chrono::{DateTime, Duration, Utc};

use crate::shared::errors::IntentError;

/// Longest deadline window a batch may carry
pub const MAX_DEADLINE_MINUTES: i64 = 24 * 60;

/// Generate unique ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Deadline window from a user-supplied number of minutes, within `1..=MAX_DEADLINE_MINUTES`
pub fn deadline_window(minutes: i64) -> Result<Duration, IntentError> {
    if !(1..=MAX_DEADLINE_MINUTES).contains(&minutes) {
        return Err(IntentError::InvalidDeadline(format!(
            "{} minutes, expected 1 to {}",
            minutes, MAX_DEADLINE_MINUTES
        )));
    }
    Duration::try_minutes(minutes)
        .ok_or_else(|| IntentError::InvalidDeadline(format!("{} minutes", minutes)))
}

/// Canister deadline: `now + window`, in nanoseconds since the epoch
pub fn generate_deadline(now: DateTime<Utc>, window: Duration) -> Result<u64, IntentError> {
    now.checked_add_signed(window)
        .and_then(|deadline| deadline.timestamp_nanos_opt())
        .and_then(|nanos| u64::try_from(nanos).ok())
        .ok_or_else(|| IntentError::InvalidDeadline(format!("{} past {}", window, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_deadline() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let deadline = generate_deadline(now, Duration::minutes(5)).unwrap();
        assert_eq!(deadline, 1_700_000_300_000_000_000);
    }

    #[test]
    fn test_generate_deadline_overflow_is_an_error() {
        let far = Duration::try_minutes(1_000_000_000_000).unwrap();
        assert!(matches!(
            generate_deadline(Utc::now(), far),
            Err(IntentError::InvalidDeadline(_))
        ));
        // past the range of i64 nanoseconds
        assert!(generate_deadline(Utc::now(), Duration::days(365 * 400)).is_err());
    }

    #[test]
    fn test_deadline_window_bounds() {
        assert_eq!(deadline_window(5).unwrap(), Duration::minutes(5));
        assert_eq!(deadline_window(MAX_DEADLINE_MINUTES).unwrap(), Duration::days(1));
        assert!(deadline_window(0).is_err());
        assert!(deadline_window(-3).is_err());
        assert!(deadline_window(MAX_DEADLINE_MINUTES + 1).is_err());
        assert!(deadline_window(i64::MAX).is_err());
    }

    #[test]
    fn test_generate_id_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
