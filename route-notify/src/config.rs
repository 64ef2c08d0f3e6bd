use crate::error::{Result, RouteTableError};
use serde::{Deserialize, Serialize};

const DEFAULT_DESCRIPTION: &str = "Route Table";

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
/// Tunables for one [`RouteRegistry`](crate::RouteRegistry).
pub struct RegistryConfig {
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub duplicate_subscription: DuplicateSubscriptionPolicy,
    /// Upper bound on linked entries, placeholders included.
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub max_subscribers_per_entry: Option<usize>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
/// How a second subscribe with the same subscriber id on the same key is treated.
pub enum DuplicateSubscriptionPolicy {
    #[default]
    Reject,
    Idempotent,
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            description: default_description(),
            duplicate_subscription: DuplicateSubscriptionPolicy::default(),
            max_entries: None,
            max_subscribers_per_entry: None,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(RouteTableError::InvalidArgument {
                field: "description",
                reason: "must not be empty",
            });
        }
        if self.max_entries == Some(0) {
            return Err(RouteTableError::InvalidArgument {
                field: "max_entries",
                reason: "must be greater than zero",
            });
        }
        if self.max_subscribers_per_entry == Some(0) {
            return Err(RouteTableError::InvalidArgument {
                field: "max_subscribers_per_entry",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}
