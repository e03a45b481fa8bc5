use std::env::VarError;

use tracing_subscriber::EnvFilter;

use crate::amount::{Denomination, Precision};
use crate::errors::{AppError, Result as AppResult};

const DEFAULT_COIN_DECIMALS: u32 = 6;
const DEFAULT_HOUR_DECIMALS: u32 = 0;
const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub coin_decimals: u32,
    pub hour_decimals: u32,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            coin_decimals: DEFAULT_COIN_DECIMALS,
            hour_decimals: DEFAULT_HOUR_DECIMALS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| std::env::var(name))
    }

    fn from_vars(var: impl Fn(&str) -> Result<String, VarError>) -> AppResult<Self> {
        let config = Config {
            coin_decimals: read_decimals(&var, "WALLET_COIN_DECIMALS", DEFAULT_COIN_DECIMALS)?,
            hour_decimals: read_decimals(&var, "WALLET_HOUR_DECIMALS", DEFAULT_HOUR_DECIMALS)?,
            log_filter: read_env(&var, "WALLET_LOG")?
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        };
        config.denomination()?;
        Ok(config)
    }

    pub fn denomination(&self) -> AppResult<Denomination> {
        Ok(Denomination {
            coins: Precision::new(self.coin_decimals)?,
            hours: Precision::new(self.hour_decimals)?,
        })
    }
}

/// Optional variable: `None` when unset, an error when set but unusable.
fn read_env(
    var: &impl Fn(&str) -> Result<String, VarError>,
    name: &str,
) -> AppResult<Option<String>> {
    match var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                Err(AppError::EmptyEnv(name.to_string()))
            } else {
                Ok(Some(trimmed))
            }
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidEnv(name.to_string())),
    }
}

fn read_decimals(
    var: &impl Fn(&str) -> Result<String, VarError>,
    name: &str,
    default: u32,
) -> AppResult<u32> {
    let Some(value) = read_env(var, name)? else {
        return Ok(default);
    };
    value.parse().map_err(|e: std::num::ParseIntError| AppError::InvalidValue {
        name: name.to_string(),
        value,
        reason: e.to_string(),
    })
}

/// Install the global `tracing` subscriber using the configured filter.
pub fn init_tracing(config: &Config) -> AppResult<()> {
    let filter = EnvFilter::try_new(&config.log_filter).map_err(|e| AppError::InvalidValue {
        name: "WALLET_LOG".to_string(),
        value: config.log_filter.clone(),
        reason: e.to_string(),
    })?;

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    tracing::info!(
        coin_decimals = config.coin_decimals,
        hour_decimals = config.hour_decimals,
        "Wallet model configured"
    );
    Ok(())
}
