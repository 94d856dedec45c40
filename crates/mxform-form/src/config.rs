use serde::{Deserialize, Serialize};
use serde_json::Value;
use web_time::Duration;

use crate::error::FormError;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_lazy_updates() -> bool {
    true
}

/// Form configuration.
///
/// Deserializes from camelCase JSON:
///
/// ```json
/// { "defaultValues": { "name": "" }, "lazyUpdates": true, "lazyUpdatesTimer": 0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormConfig {
    /// Values restored by `reset_form` and `reset_field`.
    pub default_values: Value,
    /// Coalesce engine notifications and apply them on `poll`/`flush`.
    pub lazy_updates: bool,
    /// Delay before a coalesced update becomes due, in milliseconds.
    #[serde(rename = "lazyUpdatesTimer")]
    pub lazy_updates_timer_ms: u64,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            default_values: empty_object(),
            lazy_updates: default_lazy_updates(),
            lazy_updates_timer_ms: 0,
        }
    }
}

impl FormConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, FormError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_default_values(mut self, values: Value) -> Self {
        self.default_values = values;
        self
    }

    #[must_use]
    pub fn with_lazy_updates(mut self, enabled: bool) -> Self {
        self.lazy_updates = enabled;
        self
    }

    #[must_use]
    pub fn with_lazy_updates_timer(mut self, delay: Duration) -> Self {
        self.lazy_updates_timer_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Delay before a coalesced update is applied.
    #[must_use]
    pub fn lazy_delay(&self) -> Duration {
        Duration::from_millis(self.lazy_updates_timer_ms)
    }
}
