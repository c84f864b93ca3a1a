//! Per-cycle wait timeout

use std::fmt::Debug;
use std::time::Duration;

/// How long a listener waits for activity before each cycle gives up
///
/// Values are seconds. Zero, negative and NaN mean "poll without blocking";
/// positive infinity waits without a deadline, like [`Timeout::Never`].
pub enum Timeout {
    Fixed(f64),
    /// Re-evaluated before every wait
    Dynamic(Box<dyn FnMut() -> f64 + Send>),
    Never,
}

impl Timeout {
    pub fn dynamic<F>(producer: F) -> Self
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        Timeout::Dynamic(Box::new(producer))
    }

    /// Deadline for the next wait; `None` waits indefinitely
    pub(crate) fn resolve(&mut self) -> Option<Duration> {
        match self {
            Timeout::Fixed(seconds) => deadline(*seconds),
            Timeout::Dynamic(producer) => deadline(producer()),
            Timeout::Never => None,
        }
    }
}

fn deadline(seconds: f64) -> Option<Duration> {
    if seconds.is_nan() || seconds <= 0.0 {
        return Some(Duration::ZERO);
    }
    Duration::try_from_secs_f64(seconds).ok()
}

impl Debug for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeout::Fixed(seconds) => f.debug_tuple("Fixed").field(seconds).finish(),
            Timeout::Dynamic(_) => f.write_str("Dynamic(..)"),
            Timeout::Never => f.write_str("Never"),
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::Fixed(5.0)
    }
}

impl From<f64> for Timeout {
    fn from(seconds: f64) -> Self {
        Timeout::Fixed(seconds)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::Fixed(duration.as_secs_f64())
    }
}

impl From<Option<f64>> for Timeout {
    fn from(seconds: Option<f64>) -> Self {
        seconds.map_or(Timeout::Never, Timeout::Fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_resolution() {
        assert_eq!(
            Timeout::Fixed(0.25).resolve(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(Timeout::from(Duration::from_secs(3)).resolve(), Some(Duration::from_secs(3)));
        assert_eq!(Timeout::Never.resolve(), None);
        assert_eq!(Timeout::from(None).resolve(), None);
        assert_eq!(Timeout::Fixed(f64::INFINITY).resolve(), None);
    }

    #[test]
    fn test_non_positive_polls() {
        assert_eq!(Timeout::Fixed(0.0).resolve(), Some(Duration::ZERO));
        assert_eq!(Timeout::Fixed(-1.0).resolve(), Some(Duration::ZERO));
        assert_eq!(Timeout::Fixed(f64::NAN).resolve(), Some(Duration::ZERO));
    }

    #[test]
    fn test_dynamic_reevaluated() {
        let mut next = 2.0;
        let mut timeout = Timeout::dynamic(move || {
            next -= 1.0;
            next
        });

        assert_eq!(timeout.resolve(), Some(Duration::from_secs(1)));
        assert_eq!(timeout.resolve(), Some(Duration::ZERO));
        assert_eq!(timeout.resolve(), Some(Duration::ZERO));
        assert_eq!(format!("{:?}", timeout), "Dynamic(..)");
    }
}
