use crate::executor::error::ConfigurationError;
use std::fmt;
use std::num::NonZeroUsize;

/// Raw value callers pass to request the runtime default worker count.
pub const AUTO_PARALLELISM: i32 = -1;

/// Maximum number of workers a batch may run concurrently.
///
/// Constructed from the integer callers configure: `-1` asks for the runtime
/// default (available CPU parallelism), any positive value is an explicit cap.
/// Everything else is rejected before a batch dispatches any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DegreeOfParallelism(Option<NonZeroUsize>);

impl DegreeOfParallelism {
    /// Lets the runtime pick the worker count.
    pub const AUTO: Self = Self(None);

    pub fn new(value: i32) -> Result<Self, ConfigurationError> {
        if value == AUTO_PARALLELISM {
            return Ok(Self::AUTO);
        }

        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(|workers| Self(Some(workers)))
            .ok_or(ConfigurationError::InvalidParallelism(value))
    }

    pub fn fixed(workers: NonZeroUsize) -> Self {
        Self(Some(workers))
    }

    pub fn is_auto(&self) -> bool {
        self.0.is_none()
    }

    /// Upper bound on concurrently active workers, resolving `AUTO` against the host.
    pub fn max_workers(&self) -> usize {
        match self.0 {
            Some(workers) => workers.get(),
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    /// Number of workers to spawn for a batch; never more than there are requests.
    pub fn worker_count(&self, batch_len: usize) -> usize {
        self.max_workers().min(batch_len)
    }
}

impl TryFrom<i32> for DegreeOfParallelism {
    type Error = ConfigurationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for DegreeOfParallelism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(workers) => write!(f, "{workers}"),
            None => write!(f, "auto"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_auto_and_positive_values() {
        assert!(DegreeOfParallelism::new(-1).unwrap().is_auto());
        assert_eq!(DegreeOfParallelism::new(1).unwrap().max_workers(), 1);
        assert_eq!(DegreeOfParallelism::new(8).unwrap().max_workers(), 8);
    }

    #[test]
    fn rejects_zero_and_values_below_auto() {
        for value in [0, -2, i32::MIN] {
            let err = DegreeOfParallelism::new(value).unwrap_err();
            assert_eq!(err, ConfigurationError::InvalidParallelism(value));
        }
    }

    #[test]
    fn worker_count_is_capped_by_batch_len() {
        let dop = DegreeOfParallelism::try_from(4).unwrap();
        assert_eq!(dop.worker_count(100), 4);
        assert_eq!(dop.worker_count(3), 3);
        assert_eq!(dop.worker_count(0), 0);
        assert!(DegreeOfParallelism::AUTO.worker_count(1) <= 1);
    }

    #[test]
    fn displays_auto_and_fixed() {
        assert_eq!(DegreeOfParallelism::AUTO.to_string(), "auto");
        assert_eq!(DegreeOfParallelism::new(3).unwrap().to_string(), "3");
    }
}
