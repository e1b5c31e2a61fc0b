// tests/integration/routing_test.rs

use super::fixtures::TestContext;
use shardproxy::core::protocol::RespValue;

#[tokio::test]
async fn get_forwards_to_backend_and_returns_its_reply() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["GET", "somekey"]).await;
    assert_eq!(reply, RespValue::bulk(bytes::Bytes::from_static(b"fake-value")));
}

#[tokio::test]
async fn get_of_a_missing_key_returns_null() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["GET", "missingkey"]).await;
    assert_eq!(reply, RespValue::Null);
}

#[tokio::test]
async fn set_forwards_and_replies_ok() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["SET", "somekey", "somevalue"]).await;
    assert_eq!(reply, RespValue::simple("OK"));
}

#[tokio::test]
async fn connection_serves_multiple_commands_serially() {
    let ctx = TestContext::new().await;
    let mut conn = ctx.connect().await;

    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    for key in ["a", "b", "c"] {
        let request = RespValue::Array(vec![
            RespValue::bulk(Bytes::from_static(b"GET")),
            RespValue::bulk(Bytes::copy_from_slice(key.as_bytes())),
        ]);
        conn.send(request).await.unwrap();
        let reply = conn.next().await.unwrap().unwrap();
        assert_eq!(reply, RespValue::bulk(Bytes::from_static(b"fake-value")));
    }
}

#[tokio::test]
async fn unknown_command_with_no_key_is_a_protocol_error() {
    let ctx = TestContext::new().await;
    let reply = ctx.roundtrip(&["NOTACOMMAND"]).await;
    assert!(matches!(reply, RespValue::Error(_)));
}
