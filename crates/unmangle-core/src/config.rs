//! Resolver configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | variable                             | field                             |
//! |--------------------------------------|-----------------------------------|
//! | `UNMANGLE_RECURSION_LIMIT`           | `recursion_limit`                 |
//! | `UNMANGLE_CONCURRENCY_ABBREVIATIONS` | `allow_concurrency_abbreviations` |
//! | `UNMANGLE_PUNYCODE`                  | `use_punycode`                    |

use tracing::warn;

/// Budget for one context walk when nothing else is configured.
pub const DEFAULT_RECURSION_LIMIT: usize = 50;

/// Upper bound for any configured budget.
pub const MAX_RECURSION_LIMIT: usize = 1024;

pub const RECURSION_LIMIT_VAR: &str = "UNMANGLE_RECURSION_LIMIT";
pub const CONCURRENCY_ABBREVIATIONS_VAR: &str = "UNMANGLE_CONCURRENCY_ABBREVIATIONS";
pub const PUNYCODE_VAR: &str = "UNMANGLE_PUNYCODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig
{
    /// Parent links followed before a walk gives up.
    pub recursion_limit: usize,
    /// Accept the `Sc<c>` standard abbreviations when demangling.
    pub allow_concurrency_abbreviations: bool,
    /// Escape non-ASCII identifiers with Punycode when encoding.
    pub use_punycode: bool,
}

impl Default for ResolverConfig
{
    fn default() -> Self
    {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            allow_concurrency_abbreviations: true,
            use_punycode: true,
        }
    }
}

impl ResolverConfig
{
    /// Set the recursion limit, clamped to `1..=MAX_RECURSION_LIMIT`.
    #[must_use]
    pub fn with_recursion_limit(mut self, limit: usize) -> Self
    {
        self.recursion_limit = limit.clamp(1, MAX_RECURSION_LIMIT);
        self
    }

    /// Defaults overridden by `UNMANGLE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self
    {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(RECURSION_LIMIT_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(limit) => config = config.with_recursion_limit(limit),
                Err(_) => warn!(variable = RECURSION_LIMIT_VAR, value = %raw, "ignoring invalid recursion limit"),
            }
        }
        if let Some(raw) = lookup(CONCURRENCY_ABBREVIATIONS_VAR) {
            match parse_bool(&raw) {
                Some(value) => config.allow_concurrency_abbreviations = value,
                None => warn!(variable = CONCURRENCY_ABBREVIATIONS_VAR, value = %raw, "ignoring invalid flag"),
            }
        }
        if let Some(raw) = lookup(PUNYCODE_VAR) {
            match parse_bool(&raw) {
                Some(value) => config.use_punycode = value,
                None => warn!(variable = PUNYCODE_VAR, value = %raw, "ignoring invalid flag"),
            }
        }

        config
    }
}

fn parse_bool(raw: &str) -> Option<bool>
{
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ResolverConfig
    {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        ResolverConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults()
    {
        let config = ResolverConfig::default();
        assert_eq!(config.recursion_limit, 50);
        assert!(config.allow_concurrency_abbreviations);
        assert!(config.use_punycode);
        assert_eq!(config_from(&[]), config);
    }

    #[test]
    fn test_overrides()
    {
        let config = config_from(&[
            (RECURSION_LIMIT_VAR, " 12 "),
            (CONCURRENCY_ABBREVIATIONS_VAR, "off"),
            (PUNYCODE_VAR, "FALSE"),
        ]);
        assert_eq!(config.recursion_limit, 12);
        assert!(!config.allow_concurrency_abbreviations);
        assert!(!config.use_punycode);
    }

    #[test]
    fn test_invalid_values_are_ignored()
    {
        let config = config_from(&[(RECURSION_LIMIT_VAR, "lots"), (PUNYCODE_VAR, "maybe")]);
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_limit_is_clamped()
    {
        assert_eq!(ResolverConfig::default().with_recursion_limit(0).recursion_limit, 1);
        assert_eq!(
            ResolverConfig::default().with_recursion_limit(1 << 20).recursion_limit,
            MAX_RECURSION_LIMIT
        );
        assert_eq!(config_from(&[(RECURSION_LIMIT_VAR, "5000")]).recursion_limit, MAX_RECURSION_LIMIT);
    }
}
