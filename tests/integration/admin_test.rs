// tests/integration/admin_test.rs

use super::fixtures::TestContext;
use shardproxy::core::protocol::RespValue;

#[tokio::test]
async fn ping_replies_pong() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["PING"]).await;
    assert_eq!(reply, RespValue::simple("PONG"));
}

#[tokio::test]
async fn showmapping_lists_the_configured_group() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["SHOWMAPPING"]).await;
    match reply {
        RespValue::BulkString(body) => {
            let text = String::from_utf8(body.to_vec()).unwrap();
            assert!(text.contains("0-15: g0"));
        }
        other => panic!("expected bulk string, got {other:?}"),
    }
}

#[tokio::test]
async fn poolinfo_reports_the_one_backend() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["POOLINFO"]).await;
    match reply {
        RespValue::BulkString(body) => {
            let text = String::from_utf8(body.to_vec()).unwrap();
            assert!(text.contains("g0"));
            assert!(text.contains(&ctx.backend_addr.to_string()));
        }
        other => panic!("expected bulk string, got {other:?}"),
    }
}

#[tokio::test]
async fn hashmapping_is_disabled() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["HASHMAPPING"]).await;
    assert!(matches!(reply, RespValue::Error(_)));
}

#[tokio::test]
async fn addkeymapping_then_delkeymapping_round_trip() {
    let ctx = TestContext::new().await;

    let reply = ctx.roundtrip(&["ADDKEYMAPPING", "g0", "pinned"]).await;
    assert_eq!(reply, RespValue::simple("OK"));
    assert!(ctx.state.slot_table.key_overrides_snapshot().iter().any(|(k, _)| k.as_ref() == b"pinned"));

    let reply = ctx.roundtrip(&["DELKEYMAPPING", "pinned"]).await;
    assert_eq!(reply, RespValue::simple("OK"));
    assert!(ctx.state.slot_table.key_overrides_snapshot().is_empty());
}

#[tokio::test]
async fn log_command_reads_and_sets_the_level() {
    let ctx = TestContext::new().await;

    let reply = ctx.roundtrip(&["LOG"]).await;
    assert_eq!(reply, RespValue::simple("info"));

    let reply = ctx.roundtrip(&["LOG", "debug"]).await;
    assert_eq!(reply, RespValue::simple("debug"));
}
