use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Which participant of the shared surface a lock handle belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LockSide {
    /// The device that composites the surface into the presented frame.
    Owner,
    /// The device that draws auxiliary (2D/text) content into the surface.
    Guest,
}

impl LockSide {
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            Self::Owner => Self::Guest,
            Self::Guest => Self::Owner,
        }
    }
}

impl fmt::Display for LockSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Owner => "owner",
            Self::Guest => "guest",
        })
    }
}

/// How long an acquire may block.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum LockTimeout {
    #[default]
    Infinite,
    After(Duration),
}

impl LockTimeout {
    /// Poll once, never block.
    pub const IMMEDIATE: Self = Self::After(Duration::ZERO);

    /// Native "wait forever" millisecond value.
    pub const INFINITE_MS: u32 = u32::MAX;

    #[inline]
    pub const fn from_millis(ms: u32) -> Self {
        if ms == Self::INFINITE_MS {
            Self::Infinite
        } else {
            Self::After(Duration::from_millis(ms as u64))
        }
    }

    /// Milliseconds as taken by native keyed-mutex APIs.
    ///
    /// Finite timeouts saturate just below the infinite sentinel.
    pub fn as_millis_u32(self) -> u32 {
        match self {
            Self::Infinite => Self::INFINITE_MS,
            Self::After(d) => d.as_millis().min((Self::INFINITE_MS - 1) as u128) as u32,
        }
    }

    #[inline]
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::After(d) => Some(d),
        }
    }
}

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => f.write_str("infinite"),
            Self::After(d) => write!(f, "{} ms", d.as_millis()),
        }
    }
}

/// Outcome of a non-failing acquire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use]
pub enum AcquireStatus {
    Acquired,
    TimedOut,
}

impl AcquireStatus {
    #[inline]
    pub const fn is_acquired(self) -> bool {
        matches!(self, Self::Acquired)
    }
}

/// GPU-resident keyed mutual exclusion bound to one device's view of a
/// shared resource.
///
/// Semantics follow DXGI keyed mutexes: the resource starts released with key
/// `0`; `acquire(key)` succeeds once the resource has been released with the
/// same `key`; only the device that acquired may release.
pub trait KeyedMutex {
    fn acquire(&self, key: u64, timeout: LockTimeout) -> Result<AcquireStatus>;
    fn release(&self, key: u64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_round_trips_through_native_millis() {
        assert_eq!(LockTimeout::from_millis(u32::MAX), LockTimeout::Infinite);
        assert_eq!(LockTimeout::Infinite.as_millis_u32(), u32::MAX);
    }

    #[test]
    fn long_finite_timeouts_never_become_infinite() {
        let t = LockTimeout::After(Duration::from_secs(60 * 60 * 24 * 365));
        assert_eq!(t.as_millis_u32(), u32::MAX - 1);
    }

    #[test]
    fn immediate_is_zero_millis() {
        assert_eq!(LockTimeout::IMMEDIATE.as_millis_u32(), 0);
        assert_eq!(LockTimeout::IMMEDIATE.to_string(), "0 ms");
    }

    #[test]
    fn sides_are_each_others_other() {
        assert_eq!(LockSide::Owner.other(), LockSide::Guest);
        assert_eq!(LockSide::Guest.other(), LockSide::Owner);
    }
}
