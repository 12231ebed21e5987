//! Event serialization into record payloads.

use crate::error::CodecResult;
use crate::event::{Event, Template};
use relay_config_and_utils::{CodecKind, RelayConfig};

/// Line format used by the plain codec when none is configured.
pub const DEFAULT_PLAIN_FORMAT: &str = "%{@timestamp} %{host} %{message}";

/// Turns an event into payload bytes.
#[derive(Debug, Clone)]
pub enum Codec {
    /// Interpolated text.
    Plain { format: Template },
    /// The event's fields as a JSON document.
    Json,
}

impl Codec {
    /// Plain codec with the default line format.
    pub fn plain() -> Self {
        Self::Plain {
            format: Template::parse(DEFAULT_PLAIN_FORMAT),
        }
    }

    /// Build the codec selected by `codec` / `codec_format`.
    pub fn from_config(config: &RelayConfig) -> Self {
        match config.codec {
            CodecKind::Plain => Self::Plain {
                format: Template::parse(
                    config.codec_format.as_deref().unwrap_or(DEFAULT_PLAIN_FORMAT),
                ),
            },
            CodecKind::Json => Self::Json,
        }
    }

    /// Serialize one event.
    pub fn encode(&self, event: &Event) -> CodecResult<Vec<u8>> {
        match self {
            Self::Plain { format } => Ok(format.render(event).into_bytes()),
            Self::Json => Ok(serde_json::to_vec(event)?),
        }
    }
}
