//! # Capture signature format
//!
//! When a customer completes a checkout, the browser receives the gateway's intent id, a capture (payment) id and a
//! signature. The browser forwards all three to us, so none of them can be trusted as-is. The gateway signs the pair
//! with the merchant's key secret, which the browser never sees, so a valid signature proves that the gateway really
//! captured a payment against that intent.
//!
//! ## Message format
//!
//! ```text
//!    {intent_id}|{capture_id}
//! ```
//!
//! The signature is HMAC-SHA256 over the message, keyed by the key secret, and encoded as lowercase hexadecimal.
//! Verification is performed in constant time.
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error)]
#[error("Invalid capture signature: {0}")]
pub struct CaptureSignatureError(String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSignature {
    pub intent_id: String,
    pub capture_id: String,
    pub signature: String,
}

impl CaptureSignature {
    /// Signs the given intent/capture pair. Only gateways (and tests) hold the secret needed to do this.
    pub fn create(intent_id: &str, capture_id: &str, secret: &str) -> Result<Self, CaptureSignatureError> {
        let signature = sign_capture(intent_id, capture_id, secret)?;
        Ok(Self { intent_id: intent_id.to_string(), capture_id: capture_id.to_string(), signature })
    }

    pub fn new(intent_id: &str, capture_id: &str, signature: &str) -> Self {
        Self { intent_id: intent_id.to_string(), capture_id: capture_id.to_string(), signature: signature.to_string() }
    }

    pub fn message(&self) -> String {
        signature_message(&self.intent_id, &self.capture_id)
    }

    pub fn is_valid(&self, secret: &str) -> bool {
        verify_capture(&self.intent_id, &self.capture_id, &self.signature, secret)
    }
}

pub fn signature_message(intent_id: &str, capture_id: &str) -> String {
    format!("{intent_id}|{capture_id}")
}

pub fn sign_capture(intent_id: &str, capture_id: &str, secret: &str) -> Result<String, CaptureSignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| CaptureSignatureError(e.to_string()))?;
    mac.update(signature_message(intent_id, capture_id).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` against the expected HMAC for the pair. Malformed hex, a blank secret or any mismatch all
/// return `false`.
pub fn verify_capture(intent_id: &str, capture_id: &str, signature: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(signature_message(intent_id, capture_id).as_bytes());
    mac.verify_slice(&expected).is_ok()
}
