//! Resource budget declared by the predicate circuit

use serde::{Deserialize, Serialize};

/// Fixed data capacity of a circuit definition
///
/// The budget determines the fixed-size padding the constraint system is
/// keyed for. Binding more live instances of any category than budgeted is
/// rejected at input construction, before any proving work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Maximum number of receipt instances
    pub max_receipts: usize,
    /// Maximum number of storage slot instances
    pub max_storage_slots: usize,
    /// Maximum number of transaction instances
    pub max_transactions: usize,
}

impl ResourceBudget {
    pub const fn new(
        max_receipts: usize,
        max_storage_slots: usize,
        max_transactions: usize,
    ) -> Self {
        Self { max_receipts, max_storage_slots, max_transactions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_const_constructible() {
        const BUDGET: ResourceBudget = ResourceBudget::new(0, 0, 1);
        assert_eq!(BUDGET.max_transactions, 1);
        assert_eq!(BUDGET.max_receipts, 0);
        assert_eq!(BUDGET.max_storage_slots, 0);
    }
}
