use crate::error::{AppError, Result};

/// Offset of the reference zone (America/Sao_Paulo, no DST) from UTC, in seconds.
/// Every day/month/year boundary and bucket key is computed in this zone.
pub const REFERENCE_UTC_OFFSET_SECS: i32 = -3 * 3_600;

/// Header carrying the trusted owner id supplied by the auth layer.
pub const OWNER_HEADER: &str = "x-user-id";

/// Decimal places kept for stake/payout and for every figure we report.
pub const MONEY_DP: u32 = 2;

/// Largest stake or payout accepted, in whole currency units.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// A bet placed with a bare `YYYY-MM-DD` lands at this hour of the reference zone,
/// keeping it well away from either day boundary.
pub const DATE_ONLY_PLACEMENT_HOUR: u32 = 12;

/// Which `BetRepository` implementation the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::Config(format!(
                "STORAGE_BACKEND must be `sqlite` or `memory`, got `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Storage implementation picked once at startup (STORAGE_BACKEND)
    pub storage_backend: StorageBackend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: lookup("DB_PATH").unwrap_or_else(|| "bets.db".to_string()),
            api_port: lookup("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            storage_backend: lookup("STORAGE_BACKEND")
                .unwrap_or_else(|| "sqlite".to_string())
                .parse()?,
        })
    }
}
