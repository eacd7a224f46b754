//! Raw socket payloads, exactly as the transport hands them over.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One payload received from the socket worker: an integer event code
/// and an opaque body that only the normalizer may interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub code: i32,
    #[serde(default)]
    pub data: Value,
}

impl InboundEnvelope {
    pub fn new(code: i32, data: Value) -> Self {
        Self { code, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_socket_frame() {
        let env: InboundEnvelope =
            serde_json::from_str(r#"{"code":2001,"data":{"fromId":"u1"}}"#).unwrap();
        assert_eq!(env.code, 2001);
        assert_eq!(env.data["fromId"], "u1");
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let env: InboundEnvelope = serde_json::from_str(r#"{"code":1004}"#).unwrap();
        assert_eq!(env.code, 1004);
        assert!(env.data.is_null());
    }
}
