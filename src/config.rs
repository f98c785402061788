//! # Engine configuration.
//!
//! Provides [`Config`], the settings of one [`Debouncer`](crate::Debouncer).
//!
//! ## Sentinel values
//! - `debounce = 0s` → no quiet period: every invocation dispatches immediately
//!   (superseded work is still cancelled and filtered)
//! - capacities are clamped to a minimum of 1

use std::time::Duration;

/// Configuration of a single engine instance.
///
/// ## Field semantics
/// - `debounce`: quiet period during which repeated invocations for a key are coalesced
/// - `bus_capacity`: diagnostic event bus ring buffer size (min 1)
/// - `result_capacity`: result/failure broadcast ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// Quiet period between the first invocation and the next admitted one.
    ///
    /// An invocation arriving within `debounce` of the sequence currently
    /// initializing or active for its key waits out the period; only the most
    /// recent waiting invocation is released afterwards.
    pub debounce: Duration,

    /// Capacity of the diagnostic event bus.
    ///
    /// Slow event receivers that lag behind more than `bus_capacity` messages
    /// observe `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Capacity of the result and failure broadcast channels.
    pub result_capacity: usize,
}

impl Config {
    /// Returns a default config with the given quiet period in milliseconds.
    ///
    /// # Example
    /// ```
    /// use supersede::Config;
    /// use std::time::Duration;
    ///
    /// let cfg = Config::with_debounce_ms(200);
    /// assert_eq!(cfg.debounce, Duration::from_millis(200));
    /// ```
    pub fn with_debounce_ms(ms: u64) -> Self {
        Self {
            debounce: Duration::from_millis(ms),
            ..Self::default()
        }
    }

    /// Returns the quiet period as whole milliseconds on the sequence clock.
    #[inline]
    pub fn debounce_window(&self) -> u64 {
        self.debounce.as_millis().min(u128::from(u64::MAX)) as u64
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a result capacity clamped to a minimum of 1.
    #[inline]
    pub fn result_capacity_clamped(&self) -> usize {
        self.result_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `debounce = 0s` (immediate pass-through)
    /// - `bus_capacity = 1024`
    /// - `result_capacity = 256`
    fn default() -> Self {
        Self {
            debounce: Duration::ZERO,
            bus_capacity: 1024,
            result_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_through() {
        let cfg = Config::default();
        assert_eq!(cfg.debounce_window(), 0);
        assert_eq!(cfg.bus_capacity_clamped(), 1024);
        assert_eq!(cfg.result_capacity_clamped(), 256);
    }

    #[test]
    fn zero_capacities_clamp_to_one() {
        let cfg = Config {
            bus_capacity: 0,
            result_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.result_capacity_clamped(), 1);
    }

    #[test]
    fn window_truncates_sub_millisecond_part() {
        let cfg = Config {
            debounce: Duration::from_micros(1500),
            ..Config::default()
        };
        assert_eq!(cfg.debounce_window(), 1);
    }
}
