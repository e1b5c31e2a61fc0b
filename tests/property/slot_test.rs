// tests/property/slot_test.rs

use proptest::prelude::*;
use shardproxy::core::group::{Group, GroupPolicy};
use shardproxy::core::slot::{SlotTable, MAX_HASH_VALUE};
use std::sync::Arc;
use std::time::Duration;

fn group(name: &str, id: usize) -> Arc<Group> {
    Arc::new(Group::new(name.into(), id, GroupPolicy::MasterOnly, vec![], vec![], false, false, Duration::from_secs(1)))
}

proptest! {
    #[test]
    fn tiling_every_slot_to_one_group_makes_the_table_fully_owned(max_hash in 1u32..=256) {
        let table = SlotTable::new(max_hash);
        let g = group("g0", 0);
        for slot in 0..table.max_hash() {
            table.set_owner(slot, g.clone());
        }
        prop_assert!(table.all_slots_owned());
    }

    #[test]
    fn requested_max_hash_is_always_capped_and_floored(requested in 0u32..5000) {
        let table = SlotTable::new(requested);
        prop_assert!(table.max_hash() >= 1);
        prop_assert!(table.max_hash() <= MAX_HASH_VALUE);
    }

    #[test]
    fn key_override_always_wins_regardless_of_slot_owner(key in "[a-zA-Z0-9]{1,40}", max_hash in 1u32..=256) {
        let table = SlotTable::new(max_hash);
        let owner = group("owner", 0);
        let pinned = group("pinned", 1);
        let slot = table.slot_for_key(key.as_bytes());
        table.set_owner(slot, owner);
        table.add_key_override(bytes::Bytes::copy_from_slice(key.as_bytes()), pinned.clone());
        prop_assert_eq!(table.resolve_group(key.as_bytes()).unwrap().name.clone(), pinned.name.clone());
    }

    #[test]
    fn migration_overlay_never_reports_a_slot_with_no_target_set(max_hash in 1u32..=64, migrated_slot in 0u32..64) {
        let migrated_slot = migrated_slot % max_hash;
        let table = SlotTable::new(max_hash);
        let target = group("target", 0);
        table.start_migration(migrated_slot, target);
        let overlay = table.migration_overlay();
        prop_assert_eq!(overlay.len(), 1);
        prop_assert_eq!(overlay[0].0, migrated_slot);
    }
}
