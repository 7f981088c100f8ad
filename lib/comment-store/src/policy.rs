//! Defaults and validators for comment fields.
//!
//! Lengths are byte lengths of the UTF-8 encoding, so the nine-byte
//! placeholder name leaves eleven bytes of headroom under the limit.

use thiserror::Error;

use crate::{Clock, StorageDatetime};

/// Name stored when the caller leaves `name` unset ("no name").
pub const DEFAULT_NAME: &str = "名無し";
/// Text stored when the caller leaves `text` unset. Always fails validation.
pub const DEFAULT_TEXT: &str = "";

pub const NAME_MAX_LEN: usize = 20;
pub const TEXT_MIN_LEN: usize = 1;
pub const TEXT_MAX_LEN: usize = 200;

/// Why a value was rejected by a length validator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthViolation {
    #[error("value is less than the required length")]
    TooShort,

    #[error("value is greater than the required length")]
    TooLong,
}

fn check_len(value: &str, min: usize, max: usize) -> Result<(), LengthViolation> {
    if value.len() < min {
        return Err(LengthViolation::TooShort);
    }
    if value.len() > max {
        return Err(LengthViolation::TooLong);
    }
    Ok(())
}

pub fn validate_name(value: &str) -> Result<(), LengthViolation> {
    check_len(value, 0, NAME_MAX_LEN)
}

pub fn validate_text(value: &str) -> Result<(), LengthViolation> {
    check_len(value, TEXT_MIN_LEN, TEXT_MAX_LEN)
}

pub fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

pub fn default_text() -> String {
    DEFAULT_TEXT.to_string()
}

pub fn default_created(clock: &dyn Clock) -> StorageDatetime {
    clock.now()
}

/// Used both on create and, unconditionally, on every update.
pub fn default_updated(clock: &dyn Clock) -> StorageDatetime {
    clock.now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;

    #[test]
    fn name_limits() {
        assert_eq!(validate_name(""), Ok(()));
        assert_eq!(validate_name(&"a".repeat(20)), Ok(()));
        assert_eq!(
            validate_name(&"a".repeat(21)),
            Err(LengthViolation::TooLong)
        );
    }

    #[test]
    fn text_limits() {
        assert_eq!(validate_text(""), Err(LengthViolation::TooShort));
        assert_eq!(validate_text("x"), Ok(()));
        assert_eq!(validate_text(&"x".repeat(200)), Ok(()));
        assert_eq!(
            validate_text(&"x".repeat(201)),
            Err(LengthViolation::TooLong)
        );
    }

    #[test]
    fn lengths_count_bytes() {
        assert_eq!(DEFAULT_NAME.len(), 9);
        assert_eq!(validate_name(DEFAULT_NAME), Ok(()));
        // seven three-byte characters
        assert_eq!(
            validate_name("名無し名無し名"),
            Err(LengthViolation::TooLong)
        );
    }

    #[test]
    fn default_text_never_validates() {
        assert_eq!(validate_text(&default_text()), Err(LengthViolation::TooShort));
    }

    #[test]
    fn timestamp_defaults_come_from_the_clock() {
        let clock = FixedClock::new(chrono::DateTime::from_timestamp(42, 0).unwrap());
        assert_eq!(default_created(&clock), default_updated(&clock));
        assert_eq!(default_created(&clock).inner().timestamp(), 42);
    }

    #[test]
    fn violation_messages() {
        assert_eq!(
            LengthViolation::TooShort.to_string(),
            "value is less than the required length"
        );
        assert_eq!(
            LengthViolation::TooLong.to_string(),
            "value is greater than the required length"
        );
    }
}
