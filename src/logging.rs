//! Tracing configuration.
//!
//! Always installs a console layer on stderr (stdout carries the MCP stdio
//! protocol). When `LOGZIO_TOKEN` is set, INFO-and-above records are
//! additionally shipped to the logz.io HTTP listener from a background
//! thread; shipping failures are dropped, never surfaced.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const SHIP_ENDPOINT: &str = "https://listener.logz.io:8071";
const SHIP_COMPONENT: &str = "openapi-mcp";
const SHIP_TIMEOUT: Duration = Duration::from_secs(5);
const SHIP_RETRIES: u32 = 4;
const SHIP_RETRY_DELAY: Duration = Duration::from_secs(2);
const SHIP_BATCH_MAX: usize = 100;

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize process-wide logging. Safe to call more than once; only the
/// first call has any effect.
pub fn setup_logging() {
    if LOGGING_INITIALIZED.get().is_some() {
        return;
    }

    let environment =
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("openapi_mcp_server=debug,warn"));
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_filter(console_filter)
            .boxed(),
    );

    let raw_token = std::env::var("LOGZIO_TOKEN").ok();
    if let Some(token) = shipping_token(raw_token.as_deref()) {
        layers.push(ShipperLayer::spawn(token, &environment).boxed());
    }

    let _ = tracing_subscriber::registry().with(layers).try_init();
    let _ = LOGGING_INITIALIZED.set(());
}

/// The remote sink is configured if and only if a non-empty token is present.
fn shipping_token(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|t| !t.is_empty())
}

/// One shipped log record. Field names follow the collector's conventions.
#[derive(Debug, Clone, Serialize)]
struct ShippedRecord {
    level: String,
    environment: String,
    component: &'static str,
    message: String,
    #[serde(rename = "@timestamp")]
    timestamp: String,
}

/// Tracing layer that forwards INFO-and-above events to the shipper thread.
struct ShipperLayer {
    environment: String,
    tx: Sender<ShippedRecord>,
}

impl ShipperLayer {
    fn spawn(token: &str, environment: &str) -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        let token = token.to_string();
        // thread-spawn failure degrades to console-only logging
        let _ = std::thread::Builder::new()
            .name("log-shipper".to_string())
            .spawn(move || ship_loop(&token, &rx));

        Self {
            environment: environment.to_string(),
            tx,
        }
    }
}

impl<S: Subscriber> Layer<S> for ShipperLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // ERROR is the lowest Level value; anything above INFO is too verbose
        if *metadata.level() > Level::INFO {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = ShippedRecord {
            level: metadata.level().as_str().to_lowercase(),
            environment: self.environment.clone(),
            component: SHIP_COMPONENT,
            message: visitor.message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let _ = self.tx.send(record);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

/// Drain the channel in batches and post them to the collector. Runs until
/// the sending side (the subscriber) is dropped, i.e. process exit.
fn ship_loop(token: &str, rx: &Receiver<ShippedRecord>) {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return;
    };
    let Ok(client) = reqwest::Client::builder().timeout(SHIP_TIMEOUT).build() else {
        return;
    };
    let endpoint = format!("{SHIP_ENDPOINT}/?token={token}&type={SHIP_COMPONENT}");

    while let Ok(first) = rx.recv() {
        let mut batch = vec![first];
        while batch.len() < SHIP_BATCH_MAX {
            match rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }

        // newline-delimited JSON, one record per line
        let body = batch
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect::<Vec<_>>()
            .join("\n");
        if body.is_empty() {
            continue;
        }

        runtime.block_on(send_with_retry(&client, &endpoint, body));
    }
}

async fn send_with_retry(client: &reqwest::Client, endpoint: &str, body: String) {
    for attempt in 0..=SHIP_RETRIES {
        let sent = client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone())
            .send()
            .await;

        match sent {
            Ok(response) if response.status().is_success() => return,
            // records are dropped after the final retry
            _ if attempt == SHIP_RETRIES => return,
            _ => tokio::time::sleep(SHIP_RETRY_DELAY).await,
        }
    }
}
