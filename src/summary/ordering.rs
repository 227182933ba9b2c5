//! Creation order over one owner's snacks.

use crate::types::{Snack, SnackId, Timestamp};

/// Sort key: creation time, then id for snacks logged in the same tick.
pub fn ordering_key(snack: &Snack) -> (Timestamp, SnackId) {
    (snack.created_at, snack.id)
}

/// Put snacks into creation order.
pub fn order_by_creation(mut snacks: Vec<Snack>) -> Vec<Snack> {
    snacks.sort_unstable_by_key(ordering_key);
    snacks
}

/// Whether snacks are already in strict creation order.
pub fn is_creation_ordered(snacks: &[Snack]) -> bool {
    snacks
        .windows(2)
        .all(|pair| ordering_key(&pair[0]) < ordering_key(&pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn snack(id: u64, created_at: i64) -> Snack {
        Snack {
            id: SnackId(id),
            owner: UserId(1),
            name: format!("snack {}", id),
            description: String::new(),
            created_at: Timestamp(created_at),
            on_diet: true,
        }
    }

    #[test]
    fn test_orders_by_created_at() {
        let ordered = order_by_creation(vec![snack(1, 300), snack(2, 100), snack(3, 200)]);
        let ids: Vec<_> = ordered.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(is_creation_ordered(&ordered));
    }

    #[test]
    fn test_ties_broken_by_id() {
        let ordered = order_by_creation(vec![snack(9, 100), snack(4, 100), snack(6, 50)]);
        let ids: Vec<_> = ordered.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![6, 4, 9]);
    }

    #[test]
    fn test_keeps_cardinality() {
        assert!(order_by_creation(Vec::new()).is_empty());
        assert_eq!(order_by_creation(vec![snack(1, 1); 3]).len(), 3);
    }

    #[test]
    fn test_detects_unordered() {
        assert!(!is_creation_ordered(&[snack(2, 10), snack(1, 10)]));
        assert!(is_creation_ordered(&[snack(1, 10)]));
    }
}
