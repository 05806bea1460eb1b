//! End-to-end quote-stream tests against a mock quotecast server.

use std::sync::Arc;

use bm_stream::{QuoteStreamClient, StreamConfig, control_data};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> StreamConfig {
    let mut cfg = StreamConfig::new(server.uri(), 123456);
    cfg.poll_period_ms = 10;
    cfg
}

async fn mount_session(server: &MockServer, session_id: &str) {
    Mock::given(method("POST"))
        .and(path("/request_session"))
        .and(query_param("userToken", "123456"))
        .and(query_param("version", "1.0.20180305"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sessionId": session_id })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn start_requests_session_and_polls_updates() {
    let server = MockServer::start().await;
    mount_session(&server, "sess-1").await;

    Mock::given(method("GET"))
        .and(path("/sess-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "m": "a_req", "v": ["360.BidPrice", 1] },
            { "m": "a_req", "v": ["360.AskPrice", 2] },
            { "m": "a_req", "v": ["360.FullName", 3] },
            { "m": "un", "v": [1, 99.5] },
            { "m": "un", "v": [2, 100.5] },
            { "m": "us", "v": [3, "Acme Corp"] },
            // malformed record in the middle must not poison the batch
            { "m": "un", "v": ["oops"] },
            { "m": "un", "v": [2, 101.0] }
        ])))
        .mount(&server)
        .await;

    let client = Arc::new(QuoteStreamClient::new(config(&server)));
    client.start().await.unwrap();
    client.stop(); // drive the polls manually below
    client.poll_once().await.unwrap();

    let quote = client.get_quote("360");
    assert_eq!(quote.bid_price, dec!(99.5));
    assert_eq!(quote.ask_price, dec!(101.0)); // last write wins
    assert_eq!(quote.full_name, "Acme Corp");
}

#[tokio::test]
async fn never_subscribed_instrument_is_all_zero() {
    let server = MockServer::start().await;
    mount_session(&server, "sess-1").await;

    let client = Arc::new(QuoteStreamClient::new(config(&server)));
    client.start().await.unwrap();
    client.stop();

    let quote = client.get_quote("does-not-exist");
    assert_eq!(quote.bid_price, dec!(0));
    assert_eq!(quote.ask_price, dec!(0));
    assert_eq!(quote.last_price, dec!(0));
    assert_eq!(quote.full_name, "");
}

#[tokio::test]
async fn subscribe_posts_exact_control_string() {
    let server = MockServer::start().await;
    mount_session(&server, "sess-1").await;

    let ids = vec!["A".to_string(), "B".to_string()];
    Mock::given(method("POST"))
        .and(path("/sess-1"))
        .and(body_json(json!({ "controlData": control_data(&ids, true) })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(QuoteStreamClient::new(config(&server)));
    client.start().await.unwrap();
    client.stop();
    client.subscribe(&ids).await.unwrap();
}

#[tokio::test]
async fn session_reset_renews_and_keeps_polling() {
    let server = MockServer::start().await;

    // First session request returns sess-1, later ones sess-2.
    Mock::given(method("POST"))
        .and(path("/request_session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sessionId": "sess-1" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/request_session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sessionId": "sess-2" })))
        .mount(&server)
        .await;

    // sess-1 poll: value update, then a reset, then more updates that must
    // still apply after the renewal.
    Mock::given(method("GET"))
        .and(path("/sess-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "m": "a_req", "v": ["X.LastPrice", 1] },
            { "m": "un", "v": [1, 5.0] },
            { "m": "sr", "v": [] },
            { "m": "un", "v": [1, 6.0] }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sess-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "m": "un", "v": [1, 7.0] }
        ])))
        .mount(&server)
        .await;

    let client = Arc::new(QuoteStreamClient::new(config(&server)));
    client.start().await.unwrap();
    client.stop(); // drive the polls manually below
    client.poll_once().await.unwrap(); // hits sess-1, renews mid-batch
    client.poll_once().await.unwrap(); // now polling sess-2

    // Index map survived the renewal; the sess-2 update overwrote the value.
    assert_eq!(client.get_quote("X").last_price, dec!(7.0));
}
