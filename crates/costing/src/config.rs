//! Costing configuration.
//!
//! Defaults can be overridden from the environment:
//! - `PRINTERP_DEFAULT_TAX_PERCENT` (default `18`)
//! - `PRINTERP_CLONE_SUFFIX` (default `" - Copy"`)

use serde::{Deserialize, Serialize};

pub const DEFAULT_TAX_PERCENT: f64 = 18.0;
pub const DEFAULT_CLONE_SUFFIX: &str = " - Copy";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostingConfig {
    /// Tax rate seeded for taxable (or unflagged) finished products.
    pub default_tax_percent: f64,
    /// Appended to a variant's name when it is cloned.
    pub clone_suffix: String,
}

impl Default for CostingConfig {
    fn default() -> Self {
        Self {
            default_tax_percent: DEFAULT_TAX_PERCENT,
            clone_suffix: DEFAULT_CLONE_SUFFIX.to_string(),
        }
    }
}

impl CostingConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable or negative values fall back to
    /// the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("PRINTERP_DEFAULT_TAX_PERCENT") {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => config.default_tax_percent = v,
                _ => tracing::warn!(
                    value = %raw,
                    "PRINTERP_DEFAULT_TAX_PERCENT is not a non-negative number; using {DEFAULT_TAX_PERCENT}"
                ),
            }
        }

        if let Some(suffix) = lookup("PRINTERP_CLONE_SUFFIX") {
            if !suffix.is_empty() {
                config.clone_suffix = suffix;
            }
        }

        config
    }
}
