//! Pending records and the record builder.

use crate::event::{Event, Template};
use crate::producer::ProducerClient;
use relay_config_and_utils::RelayConfig;
use std::collections::HashMap;

/// A message ready to be sent but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    key: Option<String>,
    payload: Vec<u8>,
    properties: HashMap<String, String>,
}

impl PendingRecord {
    pub fn new(
        key: Option<String>,
        payload: Vec<u8>,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            key,
            payload,
            properties,
        }
    }

    /// Routing / partition key.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Split the record into `(key, payload, properties)`.
    pub fn into_parts(self) -> (Option<String>, Vec<u8>, HashMap<String, String>) {
        (self.key, self.payload, self.properties)
    }
}

/// Turns an encoded event into a pending record.
///
/// Holds the static property map and the optional key template, both fixed at
/// startup. Building performs no I/O and cannot fail.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    properties: HashMap<String, String>,
    key_template: Option<Template>,
}

impl RecordBuilder {
    pub fn new(properties: HashMap<String, String>, key_template: Option<&str>) -> Self {
        Self {
            properties,
            key_template: key_template.map(Template::parse),
        }
    }

    /// Builder for `message_properties` and `message_key`.
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.message_properties.clone(),
            config.message_key.as_deref(),
        )
    }

    /// Whether records get a key.
    pub fn has_key(&self) -> bool {
        self.key_template.is_some()
    }

    /// Build the record for `event` through the producer's record API.
    pub fn build<P>(&self, producer: &P, event: &Event, payload: Vec<u8>) -> PendingRecord
    where
        P: ProducerClient + ?Sized,
    {
        let key = self
            .key_template
            .as_ref()
            .map(|template| template.render(event));
        producer.build_record(key, payload, self.properties.clone())
    }
}
