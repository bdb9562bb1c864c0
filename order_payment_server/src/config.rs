use std::{env, io::Write, str::FromStr, time::Duration};

use log::*;
use opg_common::{helpers::parse_boolean_flag, Money, Secret, DEFAULT_CURRENCY_CODE};
use order_payment_engine::{FlowOptions, PricingPolicy, DEFAULT_GATEWAY_TIMEOUT, DEFAULT_MAX_SAVE_RETRIES};
use rand::{thread_rng, RngCore};
use razorpay_tools::RazorpayConfig;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_OPG_HOST: &str = "127.0.0.1";
const DEFAULT_OPG_PORT: u16 = 8380;
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// ISO code of the currency that payment intents are created in.
    pub currency: String,
    /// Upper bound on every call to the payment gateway.
    pub gateway_timeout: Duration,
    /// How often a conflicting order save is retried before giving up.
    pub max_save_retries: u32,
    pub pricing: PricingPolicy,
    /// How often the refund worker retries outstanding refunds. The worker is not started when this is `None`.
    pub refund_retry_interval: Option<Duration>,
    pub razorpay: RazorpayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OPG_HOST.to_string(),
            port: DEFAULT_OPG_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            max_save_retries: DEFAULT_MAX_SAVE_RETRIES,
            pricing: PricingPolicy::default(),
            refund_retry_interval: None,
            razorpay: RazorpayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OPG_HOST").ok().unwrap_or_else(|| DEFAULT_OPG_HOST.into());
        let port = env::var("OPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for OPG_PORT. {e} Using the default, {DEFAULT_OPG_PORT}, instead."
                    );
                    DEFAULT_OPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_OPG_PORT);
        let database_url = env::var("OPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ OPG_DATABASE_URL is not set. Please set it to the URL for the order database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("OPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("OPG_USE_FORWARDED").ok(), false);
        let currency = env::var("OPG_CURRENCY")
            .map(|s| s.trim().to_uppercase())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let gateway_timeout = parse_var::<u64>("OPG_GATEWAY_TIMEOUT_SECS", env::var("OPG_GATEWAY_TIMEOUT_SECS").ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT);
        let max_save_retries = parse_var::<u32>("OPG_MAX_SAVE_RETRIES", env::var("OPG_MAX_SAVE_RETRIES").ok())
            .unwrap_or(DEFAULT_MAX_SAVE_RETRIES);
        let pricing = configure_pricing();
        let refund_retry_interval =
            parse_var::<u64>("OPG_REFUND_RETRY_INTERVAL_SECS", env::var("OPG_REFUND_RETRY_INTERVAL_SECS").ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs);
        match refund_retry_interval {
            Some(d) => info!("🪛️ Outstanding refunds will be retried every {}s", d.as_secs()),
            None => info!("🪛️ OPG_REFUND_RETRY_INTERVAL_SECS is not set. The refund worker is disabled."),
        }
        Self {
            host,
            port,
            database_url,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            currency,
            gateway_timeout,
            max_save_retries,
            pricing,
            refund_retry_interval,
            razorpay: RazorpayConfig::new_from_env_or_default(),
        }
    }

    /// The tunables handed to each engine API.
    pub fn flow_options(&self) -> FlowOptions {
        FlowOptions {
            currency: self.currency.clone(),
            gateway_timeout: self.gateway_timeout,
            max_save_retries: self.max_save_retries,
            pricing: self.pricing,
        }
    }
}

fn configure_pricing() -> PricingPolicy {
    let shipping_fee =
        parse_var::<Money>("OPG_SHIPPING_FEE", env::var("OPG_SHIPPING_FEE").ok()).unwrap_or_default();
    let free_shipping_threshold =
        parse_var::<Money>("OPG_FREE_SHIPPING_THRESHOLD", env::var("OPG_FREE_SHIPPING_THRESHOLD").ok());
    let tax_rate_bps = parse_var::<i64>("OPG_TAX_RATE_BPS", env::var("OPG_TAX_RATE_BPS").ok()).unwrap_or(0);
    let policy = PricingPolicy { shipping_fee, free_shipping_threshold, tax_rate_bps };
    debug!("🪛️ Pricing policy: {policy:?}");
    policy
}

/// Parses an optional environment value, logging (and discarding) anything that does not parse.
fn parse_var<T>(name: &str, value: Option<String>) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = value?;
    value
        .trim()
        .parse::<T>()
        .map_err(|e| warn!("🪛️ Invalid configuration value for {name} ({value}). {e}. Using the default."))
        .ok()
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 key used to validate access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this, since no externally issued token will be accepted. 🚨️🚨️🚨️"
        );
        let mut key = [0u8; 32];
        thread_rng().fill_bytes(&mut key);
        let secret = hex::encode(key);
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the OPG_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new(jwt_secret: &str) -> Result<Self, ServerError> {
        if jwt_secret.trim().len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "The JWT secret must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self { jwt_secret: Secret::new(jwt_secret.trim().to_string()) })
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("OPG_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [OPG_JWT_SECRET]")))?;
        Self::new(&secret)
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
