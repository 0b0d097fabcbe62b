//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use alpes_core::broker::MessageBroker;
use alpes_core::clock::Clock;
use alpes_core::consumer::ContextConsumer;
use alpes_core::repository::AggregateStore;
use alpes_broker::memory::InMemoryBroker;
use alpes_store::memory::InMemoryStore;
use alpes_test_support::fixed_clock;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use alpes_api::bootstrap;
use alpes_api::routes;
use alpes_api::state::AppState;

/// Redelivery timeout short enough for tests to wait it out.
pub const ACK_WAIT: Duration = Duration::from_millis(100);

/// One in-process deployment: every context over the in-memory store and
/// broker, with a fixed clock.
pub struct TestApp {
    pub store: InMemoryStore,
    pub broker: InMemoryBroker,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        Self::wired(
            store.clone(),
            Arc::new(store),
            InMemoryBroker::with_ack_wait(ACK_WAIT),
        )
    }

    fn wired(store: InMemoryStore, wired: Arc<dyn AggregateStore>, broker: InMemoryBroker) -> Self {
        let shared: Arc<dyn MessageBroker> = Arc::new(broker.clone());
        let clock: Arc<dyn Clock> = Arc::new(fixed_clock());
        let state = bootstrap::wire_contexts(wired, &shared, &clock, "alpes-partners").unwrap();
        Self {
            store,
            broker,
            state,
        }
    }

    /// Another deployment on the same broker whose command handlers write
    /// through `wired` instead of the shared store.
    pub fn sibling(&self, wired: Arc<dyn AggregateStore>) -> Self {
        Self::wired(self.store.clone(), wired, self.broker.clone())
    }

    /// The full router, as served by the API binary.
    pub fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    pub fn consumer(&self) -> ContextConsumer {
        bootstrap::campaign_consumer(
            &self.state,
            Arc::new(self.broker.clone()),
            Duration::from_millis(10),
        )
    }

    pub fn affiliate_consumer(&self) -> ContextConsumer {
        bootstrap::affiliate_consumer(
            &self.state,
            Arc::new(self.broker.clone()),
            Duration::from_millis(10),
        )
    }

    /// Runs the campaign consumer in the background until the returned
    /// handle is stopped.
    pub fn spawn_consumer(&self) -> RunningConsumer {
        RunningConsumer::spawn(self.consumer())
    }

    /// Runs the affiliate-events consumer in the background.
    pub fn spawn_affiliate_consumer(&self) -> RunningConsumer {
        RunningConsumer::spawn(self.affiliate_consumer())
    }

    /// Waits until `condition` holds, polling every few milliseconds.
    pub async fn eventually<F>(&self, condition: F)
    where
        F: Fn(&Self) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition(self) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached within 5s");
    }
}

pub struct RunningConsumer {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunningConsumer {
    fn spawn(consumer: ContextConsumer) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(async move { consumer.run(rx).await.unwrap() });
        Self { shutdown, task }
    }

    pub async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.task.await.unwrap();
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
