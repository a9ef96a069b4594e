//! Invocation event exchanged between the CLI and the sandbox

use serde::{Deserialize, Serialize};

/// Payload a deployed function receives on every invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationEvent {
    /// Container image reference to run
    pub image: String,
    /// Script reference: an http(s)/file URL, an absolute path or `base64:<data>`
    pub script: String,
}

impl InvocationEvent {
    pub fn new(image: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            script: script.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Two string fields always serialize
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = InvocationEvent::new("alpine:3.19", "base64:ZWNobyBoaQ==");
        let json = String::from_utf8(event.to_bytes()).unwrap();
        assert_eq!(json, r#"{"image":"alpine:3.19","script":"base64:ZWNobyBoaQ=="}"#);
        assert_eq!(InvocationEvent::from_slice(json.as_bytes()).unwrap(), event);
    }

    #[test]
    fn test_event_requires_both_fields() {
        assert!(InvocationEvent::from_slice(br#"{"image":"alpine"}"#).is_err());
    }
}
