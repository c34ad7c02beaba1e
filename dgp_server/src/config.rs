use std::{env, time::Duration};

use dgp_common::{helpers::parse_boolean_flag, Secret};
use dgp_engine::order_objects::FlowConfig;
use log::*;

const DEFAULT_DGP_HOST: &str = "127.0.0.1";
const DEFAULT_DGP_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/dgp_store.db";
const DEFAULT_CURRENCY_LABEL: &str = "USD";
const DEFAULT_OPERATOR_SESSION: &str = "operator";
const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_STOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// The header that carries the base64-encoded HMAC-SHA256 of the request body.
pub const HMAC_HEADER: &str = "X-DGP-Hmac-SHA256";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Where buyers send their payments. Quoted in the payment instructions.
    pub payment_address: String,
    pub currency_label: String,
    /// Upper bound for every inventory and notification call.
    pub collaborator_timeout: Duration,
    /// How often the cached stock counts are refreshed. `None` disables the background refresh.
    pub stock_refresh_interval: Option<Duration>,
    pub notifier: NotifierConfig,
    pub hmac: HmacConfig,
}

#[derive(Clone, Debug, Default)]
pub struct NotifierConfig {
    /// Buyer messages and operator alerts are POSTed here. If `None`, they are only logged.
    pub webhook_url: Option<String>,
    /// The session that operator alerts are addressed to.
    pub operator_session: String,
}

#[derive(Clone, Debug, Default)]
pub struct HmacConfig {
    pub frontend_secret: Secret<String>,
    pub operator_secret: Secret<String>,
    /// If false, requests are not signature-checked at all. **DANGER**
    pub checks_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DGP_HOST.to_string(),
            port: DEFAULT_DGP_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            payment_address: String::default(),
            currency_label: DEFAULT_CURRENCY_LABEL.to_string(),
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
            stock_refresh_interval: Some(DEFAULT_STOCK_REFRESH_INTERVAL),
            notifier: NotifierConfig { webhook_url: None, operator_session: DEFAULT_OPERATOR_SESSION.to_string() },
            hmac: HmacConfig { checks_enabled: true, ..HmacConfig::default() },
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DGP_HOST").ok().unwrap_or_else(|| DEFAULT_DGP_HOST.into());
        let port = env::var("DGP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DGP_PORT. {e} Using the default, {DEFAULT_DGP_PORT}, instead."
                    );
                    DEFAULT_DGP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DGP_PORT);
        let database_url = env::var("DGP_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ DGP_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let payment_address = env::var("DGP_PAYMENT_ADDRESS").ok().unwrap_or_else(|| {
            warn!("🪛️ DGP_PAYMENT_ADDRESS is not set. Payment instructions will not say where to send the money.");
            String::default()
        });
        let currency_label = env::var("DGP_CURRENCY_LABEL").ok().unwrap_or_else(|| DEFAULT_CURRENCY_LABEL.into());
        let collaborator_timeout = configure_collaborator_timeout();
        let stock_refresh_interval = configure_stock_refresh();
        let notifier = NotifierConfig::from_env_or_defaults();
        let hmac = HmacConfig::from_env_or_defaults();
        Self {
            host,
            port,
            database_url,
            payment_address,
            currency_label,
            collaborator_timeout,
            stock_refresh_interval,
            notifier,
            hmac,
        }
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            collaborator_timeout: self.collaborator_timeout,
            payment_address: self.payment_address.clone(),
            currency_label: self.currency_label.clone(),
        }
    }
}

impl NotifierConfig {
    pub fn from_env_or_defaults() -> Self {
        let webhook_url = env::var("DGP_NOTIFY_URL").ok().filter(|s| !s.trim().is_empty());
        if webhook_url.is_none() {
            warn!(
                "🪛️ DGP_NOTIFY_URL is not set. Buyer messages and operator alerts will only be written to the log, \
                 and buyers will NOT receive their units."
            );
        }
        let operator_session =
            env::var("DGP_OPERATOR_SESSION").ok().unwrap_or_else(|| DEFAULT_OPERATOR_SESSION.to_string());
        Self { webhook_url, operator_session }
    }
}

impl HmacConfig {
    pub fn from_env_or_defaults() -> Self {
        let frontend_secret = env::var("DGP_FRONTEND_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ DGP_FRONTEND_HMAC_SECRET is not set. Please set it to the secret the front end signs with.");
            String::default()
        });
        let operator_secret = env::var("DGP_OPERATOR_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ DGP_OPERATOR_HMAC_SECRET is not set. Please set it to the secret the operator signs with.");
            String::default()
        });
        let checks_enabled = parse_boolean_flag(env::var("DGP_HMAC_CHECKS").ok(), true);
        if !checks_enabled {
            warn!("🚨️ HMAC checks are DISABLED. Anyone who can reach the server can record payments.");
        }
        Self { frontend_secret: Secret::new(frontend_secret), operator_secret: Secret::new(operator_secret), checks_enabled }
    }
}

fn configure_collaborator_timeout() -> Duration {
    env::var("DGP_COLLABORATOR_TIMEOUT_MS")
        .map_err(|_| {
            info!(
                "🪛️ DGP_COLLABORATOR_TIMEOUT_MS is not set. Using the default value of {} ms.",
                DEFAULT_COLLABORATOR_TIMEOUT.as_millis()
            )
        })
        .and_then(|s| {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| warn!("🪛️ Invalid configuration value for DGP_COLLABORATOR_TIMEOUT_MS. {e}"))
        })
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or(DEFAULT_COLLABORATOR_TIMEOUT)
}

fn configure_stock_refresh() -> Option<Duration> {
    let secs = env::var("DGP_STOCK_REFRESH_SECS")
        .map_err(|_| {
            info!(
                "🪛️ DGP_STOCK_REFRESH_SECS is not set. Using the default value of {} s.",
                DEFAULT_STOCK_REFRESH_INTERVAL.as_secs()
            )
        })
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for DGP_STOCK_REFRESH_SECS. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_STOCK_REFRESH_INTERVAL.as_secs());
    if secs == 0 {
        info!("🪛️ The background stock refresh is disabled");
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
