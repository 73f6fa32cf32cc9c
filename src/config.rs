//! Runtime configuration
//!
//! Every field can be overridden through the environment:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | INVENTORY_DB_PATH | inventory.db | sled database directory |
//! | INVENTORY_SELL_POLICY | retain-last-unit | `retain-last-unit` or `allow-depletion` |
//! | INVENTORY_FLUSH_MS | 500 | sled background flush interval |
//! | INVENTORY_ARGON2_MEMORY_KIB | 19456 | argon2 memory cost |
//! | INVENTORY_ARGON2_ITERATIONS | 2 | argon2 time cost |
//! | INVENTORY_ARGON2_PARALLELISM | 1 | argon2 lanes |
//! | INVENTORY_LOG | inventory_ledger=info | fallback filter when RUST_LOG is unset |
use std::path::PathBuf;
use std::str::FromStr;

/// How a sale is checked against the quantity on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SellPolicy {
    /// A sale must leave at least one unit behind: selling `q >= on hand` fails.
    #[default]
    RetainLastUnit,
    /// A sale may empty the row: only `q > on hand` fails.
    AllowDepletion,
}

impl FromStr for SellPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain-last-unit" => Ok(SellPolicy::RetainLastUnit),
            "allow-depletion" => Ok(SellPolicy::AllowDepletion),
            other => Err(anyhow::anyhow!("unknown sell policy '{other}'")),
        }
    }
}

/// argon2id cost parameters used when hashing new passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl PasswordCost {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

impl Default for PasswordCost {
    fn default() -> Self {
        Self::new(
            argon2::Params::DEFAULT_M_COST,
            argon2::Params::DEFAULT_T_COST,
            argon2::Params::DEFAULT_P_COST,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub sell_policy: SellPolicy,
    pub flush_every_ms: Option<u64>,
    pub password_cost: PasswordCost,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("inventory.db"),
            sell_policy: SellPolicy::default(),
            flush_every_ms: Some(500),
            password_cost: PasswordCost::default(),
            log_filter: "inventory_ledger=info".into(),
        }
    }
}

impl Config {
    /// Load from environment variables, keeping the default for anything
    /// unset or malformed. Malformed values are reported with `warn!`, so
    /// install the subscriber first.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            db_path: lookup("INVENTORY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            sell_policy: parse_var(&lookup, "INVENTORY_SELL_POLICY").unwrap_or(defaults.sell_policy),
            flush_every_ms: parse_var(&lookup, "INVENTORY_FLUSH_MS")
                .map(Some)
                .unwrap_or(defaults.flush_every_ms),
            password_cost: PasswordCost {
                memory_kib: parse_var(&lookup, "INVENTORY_ARGON2_MEMORY_KIB")
                    .unwrap_or(defaults.password_cost.memory_kib),
                iterations: parse_var(&lookup, "INVENTORY_ARGON2_ITERATIONS")
                    .unwrap_or(defaults.password_cost.iterations),
                parallelism: parse_var(&lookup, "INVENTORY_ARGON2_PARALLELISM")
                    .unwrap_or(defaults.password_cost.parallelism),
            },
            log_filter: log_filter_from(&lookup),
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
    pub fn with_sell_policy(mut self, policy: SellPolicy) -> Self {
        self.sell_policy = policy;
        self
    }
    pub fn with_password_cost(mut self, cost: PasswordCost) -> Self {
        self.password_cost = cost;
        self
    }

    /// Open (or create) the sled database this config points at.
    pub fn open_db(&self) -> anyhow::Result<sled::Db> {
        let db = sled::Config::new()
            .path(&self.db_path)
            .flush_every_ms(self.flush_every_ms)
            .open()?;
        Ok(db)
    }
}

/// Fallback log filter when `RUST_LOG` is unset: `INVENTORY_LOG` or the default.
pub fn log_filter_from_env() -> String {
    log_filter_from(&|key: &str| std::env::var(key).ok())
}

fn log_filter_from(lookup: &impl Fn(&str) -> Option<String>) -> String {
    lookup("INVENTORY_LOG").unwrap_or_else(|| Config::default().log_filter)
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring malformed {key}={raw}, using default");
            None
        }
    }
}
