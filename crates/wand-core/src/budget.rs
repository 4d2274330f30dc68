//! Turn budget

use serde::{Deserialize, Serialize};

/// Interaction allowance for one session
///
/// Charged once per menu turn and refunded when the turn did nothing.
/// May go negative only through misuse; the loop stops at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnBudget {
    initial: i64,
    remaining: i64,
}

impl TurnBudget {
    /// Create new budget
    #[inline]
    #[must_use]
    pub fn new(initial: i64) -> Self {
        Self {
            initial,
            remaining: initial,
        }
    }

    /// Turns left
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Turns consumed so far
    #[inline]
    #[must_use]
    pub fn consumed(&self) -> i64 {
        self.initial - self.remaining
    }

    /// No turns left
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0
    }

    /// Take one turn
    #[inline]
    pub fn charge(&mut self) {
        self.remaining -= 1;
    }

    /// Give one turn back
    #[inline]
    pub fn refund(&mut self) {
        self.remaining += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_and_refund_net_zero() {
        let mut b = TurnBudget::new(3);
        b.charge();
        b.refund();
        assert_eq!(b.remaining(), 3);
        b.charge();
        assert_eq!(b.remaining(), 2);
        assert_eq!(b.consumed(), 1);
    }

    #[test]
    fn exhausted_at_zero() {
        let mut b = TurnBudget::new(1);
        assert!(!b.is_exhausted());
        b.charge();
        assert!(b.is_exhausted());
    }
}
