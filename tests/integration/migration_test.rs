// tests/integration/migration_test.rs

//! Exercises the migration gate end to end (§4.6, §8 invariant 7, seed
//! scenario 4): `YMIGRATE` marks a slot migrating, and the next request
//! touching that slot issues `MIGRATE` to the source before forwarding the
//! original command to the target.

use super::fixtures::TestContext;
use shardproxy::core::protocol::RespValue;

#[tokio::test]
async fn ymigrate_then_get_routes_through_migrate_to_the_target() {
    let ctx = TestContext::new().await;
    let target_addr = ctx.spawn_migration_target().await;

    let slot = ctx.state.slot_table.slot_for_key(b"foo");
    let reply = ctx
        .roundtrip(&["YMIGRATE", &slot.to_string(), &target_addr.ip().to_string(), &target_addr.port().to_string()])
        .await;
    assert_eq!(reply, RespValue::simple("OK"));

    assert_eq!(ctx.state.slot_table.migration_overlay().len(), 1);

    // The key now resolves through the migration gate: a MIGRATE is issued
    // to the original owner first, then GET foo is answered by the target.
    let reply = ctx.roundtrip(&["GET", "foo"]).await;
    assert_eq!(reply, RespValue::bulk(bytes::Bytes::from_static(b"target-value")));
}

#[tokio::test]
async fn migstat_lists_the_migrating_slot() {
    let ctx = TestContext::new().await;
    let target_addr = ctx.spawn_migration_target().await;

    let slot = ctx.state.slot_table.slot_for_key(b"foo");
    ctx.roundtrip(&["YMIGRATE", &slot.to_string(), &target_addr.ip().to_string(), &target_addr.port().to_string()])
        .await;

    let reply = ctx.roundtrip(&["MIGSTAT"]).await;
    match reply {
        RespValue::SimpleString(body) => {
            let text = String::from_utf8(body.to_vec()).unwrap();
            assert!(text.contains(&format!("{slot}->migration-target-")));
        }
        other => panic!("expected simple string, got {other:?}"),
    }
}

#[tokio::test]
async fn key_override_bypasses_an_active_migration() {
    let ctx = TestContext::new().await;
    let target_addr = ctx.spawn_migration_target().await;

    let slot = ctx.state.slot_table.slot_for_key(b"foo");
    ctx.roundtrip(&["YMIGRATE", &slot.to_string(), &target_addr.ip().to_string(), &target_addr.port().to_string()])
        .await;
    ctx.roundtrip(&["ADDKEYMAPPING", "g0", "foo"]).await;

    // The key-override pins "foo" back to the original group, so the
    // migration overlay for its slot is never consulted (§4.6 tie-break).
    let reply = ctx.roundtrip(&["GET", "foo"]).await;
    assert_eq!(reply, RespValue::bulk(bytes::Bytes::from_static(b"fake-value")));
}
