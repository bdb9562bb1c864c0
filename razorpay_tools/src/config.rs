use std::time::Duration;

use log::*;
use opg_common::Secret;

pub const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    /// The public key id. This is handed out to browsers so that checkout can be opened against an order.
    pub key_id: String,
    /// The key secret. Used for basic auth against the REST API, and as the HMAC key for payment signatures.
    pub key_secret: Secret<String>,
    /// Base url of the REST API, without the `/v1` suffix.
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for RazorpayConfig {
    fn default() -> Self {
        Self {
            key_id: String::default(),
            key_secret: Secret::default(),
            api_url: DEFAULT_RAZORPAY_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl RazorpayConfig {
    pub fn new_from_env_or_default() -> Self {
        let key_id = std::env::var("OPG_RAZORPAY_KEY_ID").unwrap_or_else(|_| {
            warn!("🪛️ OPG_RAZORPAY_KEY_ID not set. Online payments will fail until it is configured.");
            String::default()
        });
        let key_secret = Secret::new(std::env::var("OPG_RAZORPAY_KEY_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ OPG_RAZORPAY_KEY_SECRET not set. Every payment signature will be rejected.");
            String::default()
        }));
        let api_url = std::env::var("OPG_RAZORPAY_API_URL").unwrap_or_else(|_| {
            info!("🪛️ OPG_RAZORPAY_API_URL not set, using {DEFAULT_RAZORPAY_API_URL}");
            DEFAULT_RAZORPAY_API_URL.to_string()
        });
        let timeout = std::env::var("OPG_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid value for OPG_GATEWAY_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        Self { key_id, key_secret, api_url: api_url.trim_end_matches('/').to_string(), timeout }
    }
}
