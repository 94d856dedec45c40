//! Test logging.
//!
//! [`init_test_logging`] installs a global `fmt` subscriber filtered by
//! `RUST_LOG` (default `warn`). [`capture_events`] runs a closure under a
//! thread-local subscriber that records the `message` of every event, so
//! tests can assert on the structured events the crates emit.

use std::sync::{Arc, Mutex};

use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Install the global test subscriber. Safe to call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}").trim_matches('"').to_owned());
        }
    }
}

struct EventCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if let Some(message) = visitor.message
            && let Ok(mut messages) = self.messages.lock()
        {
            messages.push(message);
        }
    }
}

/// Run `f` and return its result with the messages of every event it
/// emitted at any level.
pub fn capture_events<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        messages: Arc::clone(&messages),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    let messages = messages
        .lock()
        .map(|messages| messages.clone())
        .unwrap_or_default();
    (result, messages)
}
