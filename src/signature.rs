use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::PaymentError;

/// Signs and verifies the processor's message-authentication scheme:
/// signature = base64(SHA-256(payload || secret)), over the transport-encoded
/// body on both the outbound and inbound side.
#[derive(Clone)]
pub struct SignatureCodec {
    secret: String,
}

impl SignatureCodec {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.update(self.secret.as_bytes());
        BASE64.encode(hasher.finalize())
    }

    /// Recompute and compare. Fails closed: a malformed or wrong-length
    /// signature is simply `false`, never an error.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let expected = self.sign(payload);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    /// Transport-encode a body: base64 over compact JSON.
    pub fn encode_body<T: Serialize>(&self, body: &T) -> Result<String, PaymentError> {
        let json = serde_json::to_vec(body)
            .map_err(|e| PaymentError::Internal(format!("encode body: {}", e)))?;
        Ok(BASE64.encode(json))
    }

    /// Decode a transport-encoded body. Any decode failure is a
    /// `MalformedPayload`, reported before any state is touched.
    pub fn decode_body<T: DeserializeOwned>(&self, body: &str) -> Result<T, PaymentError> {
        let raw = BASE64
            .decode(body.trim())
            .map_err(|e| PaymentError::MalformedPayload(format!("base64: {}", e)))?;
        serde_json::from_slice(&raw)
            .map_err(|e| PaymentError::MalformedPayload(format!("json: {}", e)))
    }
}

/// Compare without short-circuiting on the first mismatching byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Probe {
        user_order: String,
        amount: String,
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let codec = SignatureCodec::new("demo_secret_key_456".to_string());
        let payload = b"eyJ1c2VyT3JkZXIiOiJ0b3B1cF8xXzAxIn0=";

        let sig = codec.sign(payload);
        assert!(codec.verify(payload, &sig));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let codec = SignatureCodec::new("demo_secret_key_456".to_string());
        let sig = codec.sign(b"original");
        assert!(!codec.verify(b"tampered", &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let signer = SignatureCodec::new("secret_a".to_string());
        let verifier = SignatureCodec::new("secret_b".to_string());
        let sig = signer.sign(b"payload");
        assert!(!verifier.verify(b"payload", &sig));
    }

    #[test]
    fn test_verify_fails_closed_on_garbage() {
        let codec = SignatureCodec::new("s".to_string());
        assert!(!codec.verify(b"payload", ""));
        assert!(!codec.verify(b"payload", "not-base64-%%%"));
    }

    #[test]
    fn test_body_roundtrip() {
        let codec = SignatureCodec::new("s".to_string());
        let probe = Probe { user_order: "topup_1_01".to_string(), amount: "100".to_string() };

        let encoded = codec.encode_body(&probe).unwrap();
        let decoded: Probe = codec.decode_body(&encoded).unwrap();
        assert_eq!(decoded, probe);
    }

    #[test]
    fn test_decode_malformed() {
        let codec = SignatureCodec::new("s".to_string());

        let err = codec.decode_body::<Probe>("%%%not base64%%%").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_PAYLOAD");

        // Valid base64, invalid JSON
        let garbage = BASE64.encode(b"not json at all");
        let err = codec.decode_body::<Probe>(&garbage).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_PAYLOAD");
    }
}
