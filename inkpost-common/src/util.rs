use thiserror::Error;
use time::Duration;

/// A strictly positive span of time, used for token lifetimes.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    pub fn minutes(minutes: i64) -> Result<Self, InvalidDurationError> {
        let seconds = minutes
            .checked_mul(60)
            .ok_or(InvalidDurationError::OutOfRange(minutes))?;

        Duration::seconds(seconds).try_into()
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidDurationError {
    #[error("The duration is not positive: {0}")]
    NonPositive(Duration),
    #[error("{0} minutes is out of range")]
    OutOfRange(i64),
}

impl TryFrom<Duration> for PositiveDuration {
    type Error = InvalidDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidDurationError::NonPositive(value))
    }
}
