// tests/integration/fanout_test.rs

use super::fixtures::TestContext;
use bytes::Bytes;
use shardproxy::core::protocol::RespValue;

#[tokio::test]
async fn mget_assembles_replies_in_declared_key_order() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["MGET", "a", "missing1", "b"]).await;
    match reply {
        RespValue::Array(items) => {
            assert_eq!(items.len(), 3);
            assert_eq!(items[0], RespValue::bulk(Bytes::from_static(b"fake-value")));
            assert_eq!(items[1], RespValue::Null);
            assert_eq!(items[2], RespValue::bulk(Bytes::from_static(b"fake-value")));
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[tokio::test]
async fn mset_fans_out_every_pair_and_reports_ok() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["MSET", "a", "1", "b", "2", "c", "3"]).await;
    assert_eq!(reply, RespValue::simple("OK"));
}

#[tokio::test]
async fn del_sums_per_key_deletions() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["DEL", "a", "b", "c"]).await;
    assert_eq!(reply, RespValue::Integer(3));
}

#[tokio::test]
async fn mget_single_key_takes_the_same_fanout_path() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["MGET", "onlykey"]).await;
    assert_eq!(reply, RespValue::Array(vec![RespValue::bulk(Bytes::from_static(b"fake-value"))]));
}
