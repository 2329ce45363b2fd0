//! Integration tests: the webhook response is sent before any downstream call completes,
//! and shutdown waits for replies still in flight.
//! The fake resolver blocks until the test releases it, so a handler that answered
//! only after resolving would time out here.

use async_trait::async_trait;
use lib::channels::{ChatId, ChatNotifier, TelegramError};
use lib::gateway::{router, serve, GatewayState, WebhookHandler};
use lib::nlu::{IntentResolver, NluError, Resolution, SessionRef};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

struct BlockingResolver {
    release: Arc<Notify>,
}

#[async_trait]
impl IntentResolver for BlockingResolver {
    async fn detect_intent(
        &self,
        _session: &SessionRef,
        _text: &str,
        _language_code: &str,
    ) -> Result<Resolution, NluError> {
        self.release.notified().await;
        Ok(Resolution {
            fulfillment_text: Some("Hi there!".to_string()),
            intent: Some("greeting".to_string()),
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(ChatId, String)>>,
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), TelegramError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.clone(), text.to_string()));
        Ok(())
    }
}

fn blocking_gateway() -> (Arc<Notify>, Arc<RecordingNotifier>, GatewayState) {
    let release = Arc::new(Notify::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let handler = WebhookHandler::new(
        Arc::new(BlockingResolver {
            release: release.clone(),
        }),
        notifier.clone(),
        "agent-1",
        "en",
    );
    (release, notifier, GatewayState::new(Arc::new(handler), None))
}

async fn post_hello(addr: std::net::SocketAddr) -> reqwest::Response {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .expect("client");
    tokio::time::timeout(
        Duration::from_secs(5),
        client
            .post(format!("http://{}/", addr))
            .body(r#"{"message":{"chat":{"id":42},"text":"hello"}}"#)
            .send(),
    )
    .await
    .expect("webhook response must not wait for the resolver")
    .expect("post")
}

#[tokio::test]
async fn webhook_is_acknowledged_before_resolving() {
    let (release, notifier, state) = blocking_gateway();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let resp = post_hello(addr).await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert!(notifier.sent.lock().unwrap().is_empty());

    // notify_one stores a permit, so the resolver proceeds even if it has not started waiting yet.
    release.notify_one();
    for _ in 0..100 {
        if !notifier.sent.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        notifier.sent.lock().unwrap().clone(),
        vec![(ChatId::Id(42), "Hi there!".to_string())]
    );
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_reply() {
    let (release, notifier, state) = blocking_gateway();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, state, async move {
        let _ = stop_rx.await;
    }));

    let resp = post_hello(addr).await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    drop(resp);

    stop_tx.send(()).expect("server still running");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        !server.is_finished(),
        "server returned while a reply was still pending"
    );
    assert!(notifier.sent.lock().unwrap().is_empty());

    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops once the reply is sent")
        .expect("join")
        .expect("serve");
    assert_eq!(
        notifier.sent.lock().unwrap().clone(),
        vec![(ChatId::Id(42), "Hi there!".to_string())]
    );
}
