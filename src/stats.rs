//! Per-run statistics
//!
//! Counters reflect what was reported, not what was attempted:
//! suppressed optional sites count nowhere, and `bindings_registered`
//! counts bindings accepted during configuration, including ones that
//! later fail validation.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Counters for one resolution run (or a merged batch)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub scopes_processed: u64,
    pub bindings_registered: u64,
    pub sites_injected: u64,
    pub missing_bindings: u64,
    pub invalid_bindings: u64,
    pub missing_dependencies: u64,
    pub unused_bindings: u64,
    /// Wall-clock time (ms)
    pub elapsed_ms: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another run into this one; elapsed times add
    pub fn merge(&mut self, other: &RunStats) {
        self.scopes_processed += other.scopes_processed;
        self.bindings_registered += other.bindings_registered;
        self.sites_injected += other.sites_injected;
        self.missing_bindings += other.missing_bindings;
        self.invalid_bindings += other.invalid_bindings;
        self.missing_dependencies += other.missing_dependencies;
        self.unused_bindings += other.unused_bindings;
        self.elapsed_ms += other.elapsed_ms;
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis() as u64;
    }

    /// Any error-level counter non-zero
    pub fn has_failures(&self) -> bool {
        self.missing_bindings + self.invalid_bindings + self.missing_dependencies > 0
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scopes, {} bindings, {} sites injected, \
             {} missing bindings, {} invalid, {} missing deps, {} unused ({}ms)",
            self.scopes_processed,
            self.bindings_registered,
            self.sites_injected,
            self.missing_bindings,
            self.invalid_bindings,
            self.missing_dependencies,
            self.unused_bindings,
            self.elapsed_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_every_counter() {
        let mut a = RunStats {
            scopes_processed: 1,
            bindings_registered: 2,
            sites_injected: 3,
            missing_bindings: 1,
            invalid_bindings: 0,
            missing_dependencies: 1,
            unused_bindings: 2,
            elapsed_ms: 10,
        };
        let b = RunStats {
            scopes_processed: 2,
            bindings_registered: 1,
            sites_injected: 4,
            missing_bindings: 0,
            invalid_bindings: 3,
            missing_dependencies: 0,
            unused_bindings: 1,
            elapsed_ms: 5,
        };
        a.merge(&b);
        assert_eq!(a.scopes_processed, 3);
        assert_eq!(a.bindings_registered, 3);
        assert_eq!(a.sites_injected, 7);
        assert_eq!(a.missing_bindings, 1);
        assert_eq!(a.invalid_bindings, 3);
        assert_eq!(a.missing_dependencies, 1);
        assert_eq!(a.unused_bindings, 3);
        assert_eq!(a.elapsed_ms, 15);
    }

    #[test]
    fn has_failures_ignores_warnings_and_time() {
        let mut stats = RunStats::new();
        stats.unused_bindings = 5;
        stats.elapsed_ms = 100;
        assert!(!stats.has_failures());
        stats.invalid_bindings = 1;
        assert!(stats.has_failures());
    }

    #[test]
    fn display_summary_is_one_line() {
        let stats = RunStats {
            scopes_processed: 2,
            sites_injected: 7,
            ..Default::default()
        };
        let line = stats.to_string();
        assert!(line.contains("2 scopes"));
        assert!(line.contains("7 sites injected"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn serializes_to_flat_json() {
        let stats = RunStats { missing_bindings: 2, ..Default::default() };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["missing_bindings"], 2);
        assert_eq!(json["elapsed_ms"], 0);
    }
}
