//! Command channel (MQTT topic) naming

use crate::error::{Error, Result};
use std::fmt;

/// Maximum topic length accepted by MQTT brokers
const MAX_TOPIC_BYTES: usize = 65_535;

/// A concrete publish channel, rendered from a template such as
/// `{namespace}/{device_id}/cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    /// Render a template. `{namespace}` and `{device_id}` are substituted;
    /// the result must be a valid publish topic.
    pub fn render(template: &str, namespace: &str, device_id: &str) -> Result<Self> {
        for (field, value) in [("namespace", namespace), ("device_id", device_id)] {
            if value.is_empty() {
                return Err(Error::Channel(format!("{} must not be empty", field)));
            }
            if value.contains('/') {
                return Err(Error::Channel(format!("{} must not contain '/'", field)));
            }
        }

        let topic = template
            .replace("{namespace}", namespace)
            .replace("{device_id}", device_id);
        Self::new(topic)
    }

    /// Validate a literal topic.
    pub fn new(topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(Error::Channel("topic must not be empty".to_string()));
        }
        if topic.len() > MAX_TOPIC_BYTES {
            return Err(Error::Channel("topic too long".to_string()));
        }
        if topic.contains('+') || topic.contains('#') {
            return Err(Error::Channel(format!(
                "wildcards are not allowed in a publish topic: '{}'",
                topic
            )));
        }
        if topic.contains('{') || topic.contains('}') {
            return Err(Error::Channel(format!("unresolved placeholder in '{}'", topic)));
        }
        if topic.contains('\0') {
            return Err(Error::Channel("topic contains a NUL byte".to_string()));
        }
        if topic.split('/').any(|segment| segment.is_empty()) {
            return Err(Error::Channel(format!("empty segment in '{}'", topic)));
        }
        Ok(Self(topic))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
