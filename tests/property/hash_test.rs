// tests/property/hash_test.rs

use proptest::prelude::*;
use shardproxy::core::hash::key_to_slot;

proptest! {
    #[test]
    fn same_key_always_hashes_to_the_same_slot(key in ".{0,200}", max_hash in 1u32..=1024) {
        let a = key_to_slot(key.as_bytes(), max_hash);
        let b = key_to_slot(key.as_bytes(), max_hash);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn slot_is_always_within_range(key in ".{0,200}", max_hash in 1u32..=1024) {
        let slot = key_to_slot(key.as_bytes(), max_hash);
        prop_assert!(slot < max_hash);
    }
}
