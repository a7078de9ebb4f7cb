use crate::core::SaveError;
use std::fmt;
use std::str::FromStr;

/// When a save wraps its batches in a storage transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoTransactionBehavior {
    Always,
    Never,
    /// Only when more than one root document is written
    #[default]
    WhenNeeded,
}

impl AutoTransactionBehavior {
    pub fn should_transact(&self, root_operations: usize) -> bool {
        match self {
            AutoTransactionBehavior::Always => true,
            AutoTransactionBehavior::Never => false,
            AutoTransactionBehavior::WhenNeeded => root_operations > 1,
        }
    }
}

impl fmt::Display for AutoTransactionBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoTransactionBehavior::Always => write!(f, "always"),
            AutoTransactionBehavior::Never => write!(f, "never"),
            AutoTransactionBehavior::WhenNeeded => write!(f, "when_needed"),
        }
    }
}

impl FromStr for AutoTransactionBehavior {
    type Err = SaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(AutoTransactionBehavior::Always),
            "never" => Ok(AutoTransactionBehavior::Never),
            "when_needed" | "whenneeded" => Ok(AutoTransactionBehavior::WhenNeeded),
            other => Err(SaveError::InvalidConfig(format!(
                "Unknown auto-transaction behavior '{}'",
                other
            ))),
        }
    }
}
