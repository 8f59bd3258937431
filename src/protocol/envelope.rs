//! Payloads carried inside the opaque `message` field.
//!
//! The relay routes both kinds identically; only clients tell key material
//! apart from ciphertext.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content of a chat envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EnvelopePayload {
    /// An exported public key, sent once per counterpart.
    PublicKey { key: String },
    /// A sealed message, base64 encoded.
    Ciphertext { data: String },
}

impl EnvelopePayload {
    /// Wraps raw ciphertext bytes.
    pub fn ciphertext(bytes: &[u8]) -> Self {
        Self::Ciphertext {
            data: BASE64.encode(bytes),
        }
    }

    /// Decodes the ciphertext bytes, `None` for key material.
    pub fn ciphertext_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            Self::Ciphertext { data } => Some(BASE64.decode(data)),
            Self::PublicKey { .. } => None,
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_public_key_shape() {
        let payload = EnvelopePayload::PublicKey {
            key: "a2V5".to_string(),
        };

        let value = payload.to_value().unwrap();
        assert_eq!(value, json!({"type": "public-key", "key": "a2V5"}));
        assert_eq!(EnvelopePayload::from_value(&value).unwrap(), payload);
    }

    #[test]
    fn test_ciphertext_shape() {
        let payload = EnvelopePayload::ciphertext(b"sealed");

        assert_eq!(
            payload.to_value().unwrap(),
            json!({"type": "ciphertext", "data": "c2VhbGVk"})
        );
    }

    #[test]
    fn test_ciphertext_bytes() {
        let payload = EnvelopePayload::ciphertext(&[1, 2, 3]);

        assert_eq!(payload.ciphertext_bytes().unwrap().unwrap(), vec![1, 2, 3]);
        assert!(EnvelopePayload::PublicKey { key: String::new() }
            .ciphertext_bytes()
            .is_none());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(EnvelopePayload::from_value(&json!({"type": "emoji"})).is_err());
        assert!(EnvelopePayload::from_value(&json!([1, 2, 3])).is_err());
    }
}
