// tests/slack_http.rs
//
// HTTP-level tests for the Slack adapters against a local axum server that
// plays the Slack Web API with canned responses.
//
// Covered:
// - conversations.history: 429, 500, ok:false, slow server, success
// - fetch_batch over the real adapter (failing channels skipped)
// - chat.postMessage: ok:true, ok:false, 500

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use slack_cluster_pipeline::ingest::fetch_batch;
use slack_cluster_pipeline::ingest::slack::SlackHistorySource;
use slack_cluster_pipeline::ingest::types::MessageSource;
use slack_cluster_pipeline::notify::slack::SlackAlertNotifier;
use slack_cluster_pipeline::notify::{Alert, AlertMux, Delivery, Notifier};

const TOKEN: &str = "xoxb-test";

/// Bind on an ephemeral port and return the base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build reqwest client")
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some("Bearer xoxb-test")
}

async fn history(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return Json(json!({"ok": false, "error": "not_authed"})).into_response();
    }
    match q.get("channel").map(String::as_str) {
        Some("CRATE") => (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "30")], "").into_response(),
        Some("CBOOM") => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        Some("CSLOW") => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"ok": true, "messages": []})).into_response()
        }
        Some("COK") => {
            let limit: usize = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(0);
            let messages: Vec<Value> = (0..3)
                .map(|i| {
                    json!({
                        "user": format!("U{i}"),
                        "text": "hello from the channel",
                        "ts": format!("1700000000.00010{i}"),
                        "reply_count": i,
                        "reactions": [{"name": "eyes", "count": 1}]
                    })
                })
                .take(limit)
                .collect();
            Json(json!({"ok": true, "messages": messages})).into_response()
        }
        _ => Json(json!({"ok": false, "error": "channel_not_found"})).into_response(),
    }
}

async fn slack_api() -> String {
    serve(Router::new().route("/conversations.history", get(history))).await
}

async fn source() -> SlackHistorySource {
    SlackHistorySource::new(TOKEN.into())
        .with_base_url(slack_api().await)
        .with_client(client())
        .with_timeout(1)
}

#[tokio::test]
async fn rate_limited_channel_errors_with_channel_id() {
    let err = source().await.fetch("CRATE", 10).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("rate limited"), "{msg}");
    assert!(msg.contains("CRATE"), "{msg}");
}

#[tokio::test]
async fn server_error_errors_with_channel_id_and_status() {
    let err = source().await.fetch("CBOOM", 10).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("CBOOM"), "{msg}");
    assert!(msg.contains("500"), "{msg}");
}

#[tokio::test]
async fn not_ok_body_errors_with_slack_error_code() {
    let err = source().await.fetch("CGONE", 10).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("channel_not_found"), "{msg}");
    assert!(msg.contains("CGONE"), "{msg}");
}

#[tokio::test]
async fn slow_server_hits_the_request_timeout() {
    let started = std::time::Instant::now();
    let err = source().await.fetch("CSLOW", 10).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(4));
    let msg = format!("{err:#}");
    assert!(msg.contains("conversations.history request for CSLOW"), "{msg}");
}

#[tokio::test]
async fn bad_token_surfaces_not_authed() {
    let src = SlackHistorySource::new("xoxb-wrong".into())
        .with_base_url(slack_api().await)
        .with_client(client());
    let err = src.fetch("COK", 10).await.unwrap_err();
    assert!(format!("{err:#}").contains("not_authed"));
}

#[tokio::test]
async fn history_maps_messages_and_honors_limit() {
    let msgs = source().await.fetch("COK", 2).await.unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[1].author_id, "U1");
    assert_eq!(msgs[1].thread_reply_count, 1);
    assert_eq!(msgs[0].reaction_total, 1);
    assert!(msgs.iter().all(|m| m.channel_id == "COK"));
}

#[tokio::test]
async fn batch_over_http_skips_failing_channels() {
    let src = source().await;
    let channels: Vec<String> = ["COK", "CRATE", "CBOOM", "CGONE"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let (batch, report) = fetch_batch(&src, &channels, 100).await;
    assert_eq!(batch.len(), 3);
    assert_eq!(report.fetched, vec![("COK".to_string(), 3)]);
    assert_eq!(report.failed, vec!["CRATE", "CBOOM", "CGONE"]);
}

type Posted = Arc<Mutex<Vec<Value>>>;

async fn post_message(State(posted): State<Posted>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return Json(json!({"ok": false, "error": "invalid_auth"})).into_response();
    }
    posted.lock().unwrap().push(body.clone());
    match body["channel"].as_str() {
        Some("CALERTS") => Json(json!({"ok": true, "channel": "CALERTS", "ts": "1.2"})).into_response(),
        Some("CDOWN") => (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response(),
        _ => Json(json!({"ok": false, "error": "is_archived"})).into_response(),
    }
}

async fn chat_api() -> (String, Posted) {
    let posted: Posted = Arc::default();
    let app = Router::new()
        .route("/chat.postMessage", post(post_message))
        .with_state(posted.clone());
    (serve(app).await, posted)
}

fn notifier(base: &str, channel: &str) -> SlackAlertNotifier {
    SlackAlertNotifier::new(TOKEN.into(), channel.into())
        .with_base_url(base)
        .with_client(client())
        .with_timeout(1)
}

#[tokio::test]
async fn post_message_sends_channel_and_failure_text() {
    let (base, posted) = chat_api().await;
    let alert = Alert::run_failed("write data/slack_clusters.csv: Permission denied", 4);

    notifier(&base, "CALERTS").send(&alert).await.unwrap();

    let posted = posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["channel"], "CALERTS");
    let text = posted[0]["text"].as_str().unwrap();
    assert!(text.contains("Permission denied"), "{text}");
}

#[tokio::test]
async fn post_message_not_ok_errors_with_code() {
    let (base, _) = chat_api().await;
    let err = notifier(&base, "CARCHIVED")
        .send(&Alert::run_failed("boom", 1))
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("is_archived"), "{msg}");
    assert!(msg.contains("CARCHIVED"), "{msg}");
}

#[tokio::test]
async fn post_message_server_error_is_reported_as_failed_delivery() {
    let (base, _) = chat_api().await;
    let chat: Arc<dyn Notifier> = Arc::new(notifier(&base, "CDOWN"));
    let mux = AlertMux::new(None, Some(chat));

    let report = mux.dispatch(&Alert::run_failed("boom", 1)).await;
    assert_eq!(report.chat, Delivery::Failed);
    assert_eq!(report.email, Delivery::Disabled);
}
