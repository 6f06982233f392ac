//! Data models.

pub mod counter;
pub mod entity;

pub use counter::Counter;
pub use entity::{Entity, RelatedItem, SearchResult};

use uuid::Uuid;

/// Identifier prefix for Entities.
pub const ENTITY_ID_PREFIX: &str = "id_";

/// Identifier prefix for Counters.
pub const COUNTER_ID_PREFIX: &str = "cnt_";

/// Generate an opaque identifier with the given kind prefix.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::now_v7().simple())
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix_and_are_unique() {
        let a = generate_id(COUNTER_ID_PREFIX);
        let b = generate_id(COUNTER_ID_PREFIX);
        assert!(a.starts_with("cnt_"));
        assert_ne!(a, b);
        assert_eq!(a.len(), "cnt_".len() + 32);
    }
}
