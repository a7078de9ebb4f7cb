use crate::executor::ExecutionOptions;
use crate::storage::TransactionOptions;
use crate::transaction::AutoTransactionBehavior;
use std::time::Duration;

/// How `save_changes` writes a unit of work.
///
/// Builder-style, like a connection configuration:
///
/// ```
/// use docsave::{AutoTransactionBehavior, SaveChangesConfig};
/// use std::time::Duration;
///
/// let config = SaveChangesConfig::new()
///     .auto_transaction(AutoTransactionBehavior::Always)
///     .max_commit_time(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SaveChangesConfig {
    /// When to wrap the batches in a transaction
    pub auto_transaction: AutoTransactionBehavior,

    /// Accept tracked changes after a successful save
    pub accept_all_changes_on_success: bool,

    /// Upper bound the storage engine may spend committing
    pub max_commit_time: Option<Duration>,
}

impl SaveChangesConfig {
    pub fn new() -> Self {
        Self {
            auto_transaction: AutoTransactionBehavior::WhenNeeded,
            accept_all_changes_on_success: true,
            max_commit_time: None,
        }
    }

    pub fn auto_transaction(mut self, behavior: AutoTransactionBehavior) -> Self {
        self.auto_transaction = behavior;
        self
    }

    pub fn accept_all_changes_on_success(mut self, accept: bool) -> Self {
        self.accept_all_changes_on_success = accept;
        self
    }

    pub fn max_commit_time(mut self, timeout: Duration) -> Self {
        self.max_commit_time = Some(timeout);
        self
    }

    /// Parse `key=value` pairs separated by `;`
    ///
    /// Format: `auto_transaction=always;accept_all_changes=false;max_commit_time_ms=500`
    pub fn from_options(options: &str) -> Result<Self, String> {
        let mut config = Self::new();
        for pair in options.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid option '{}': expected key=value", pair))?;
            let value = value.trim();
            match key.trim() {
                "auto_transaction" => {
                    config.auto_transaction = value.parse().map_err(|e| format!("{}", e))?;
                }
                "accept_all_changes" => {
                    config.accept_all_changes_on_success = value
                        .parse()
                        .map_err(|_| format!("Invalid boolean for accept_all_changes: '{}'", value))?;
                }
                "max_commit_time_ms" => {
                    let millis: u64 = value
                        .parse()
                        .map_err(|_| format!("Invalid max_commit_time_ms: '{}'", value))?;
                    config.max_commit_time = Some(Duration::from_millis(millis));
                }
                other => return Err(format!("Unknown option '{}'", other)),
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_commit_time == Some(Duration::ZERO) {
            return Err("max_commit_time must be > 0".to_string());
        }
        Ok(())
    }

    pub(crate) fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            auto_transaction: self.auto_transaction,
            transaction: TransactionOptions {
                max_commit_time: self.max_commit_time,
            },
        }
    }
}

impl Default for SaveChangesConfig {
    fn default() -> Self {
        Self::new()
    }
}
