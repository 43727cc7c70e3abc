//! Session-scoped serial numbers.
//!
//! Every grammar entity (cluster, trend, cell, matrix row) receives a
//! monotonically increasing serial when it is created. Serials are used for
//! ordering and debugging output only, never for equality: two entities with
//! different serials can still be structurally equal.
//!
//! The counter lives on the session (the aggregation or the parser), not in a
//! process-wide static, so independent sessions stay deterministic.

use serde::Serialize;

/// Issues monotonically increasing serial numbers for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialCounter {
    next: u64,
}

impl SerialCounter {
    /// Start a fresh sequence at 1. Zero is reserved for "never issued".
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue the next serial.
    pub fn issue(&mut self) -> u64 {
        let n = self.next;
        self.next += 1;
        n
    }

    /// How many serials have been issued so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

impl Default for SerialCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_are_monotonic() {
        let mut counter = SerialCounter::new();
        let a = counter.issue();
        let b = counter.issue();
        let c = counter.issue();
        assert!(a < b && b < c);
        assert_eq!(counter.issued(), 3);
    }

    #[test]
    fn independent_counters_do_not_interfere() {
        let mut left = SerialCounter::new();
        let mut right = SerialCounter::new();
        left.issue();
        left.issue();
        assert_eq!(right.issue(), 1);
    }
}
