//! Derivation-path parsing with the `i` address-index placeholder.
//!
//! Template HD variables carry derivation paths such as `m/0'/1/i`, where
//! `i` is substituted with a per-address index at compile time. Private
//! paths begin with `m`; public paths begin with `M` and may not contain
//! hardened steps when derivation actually runs.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::node::HARDENED_OFFSET;
use crate::HdError;

static RE_DERIVATION_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[mM](?:/(?:[0-9]+|i)'?)*$").unwrap());

/// A single step in a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep {
    /// A fixed non-hardened child index.
    Normal(u32),
    /// A fixed hardened child index (value before the hardened offset).
    Hardened(u32),
    /// The `i` placeholder, substituted with the address index.
    Placeholder,
    /// The `i'` placeholder, substituted and hardened.
    HardenedPlaceholder,
}

/// A parsed derivation path.
///
/// `public` indicates an `M/...` path (public derivation); otherwise the
/// path is `m/...` (private derivation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    /// Whether this is a public (`M`) path.
    pub public: bool,
    /// The ordered derivation steps after the prefix.
    pub steps: Vec<PathStep>,
}

impl DerivationPath {
    /// Substitute the `i` placeholder and produce raw child indexes.
    ///
    /// Hardened steps carry the hardened offset in the returned values.
    ///
    /// # Arguments
    /// * `address_index` - The value substituted for each `i` placeholder.
    ///
    /// # Returns
    /// The raw child indexes, or an error if a fixed index overflows into
    /// the hardened range.
    pub fn instantiate(&self, address_index: u32) -> Result<Vec<u32>, HdError> {
        self.steps
            .iter()
            .map(|step| {
                let (value, hardened) = match step {
                    PathStep::Normal(value) => (*value, false),
                    PathStep::Hardened(value) => (*value, true),
                    PathStep::Placeholder => (address_index, false),
                    PathStep::HardenedPlaceholder => (address_index, true),
                };
                if value >= HARDENED_OFFSET {
                    return Err(HdError::InvalidChildIndex(value));
                }
                Ok(if hardened { value + HARDENED_OFFSET } else { value })
            })
            .collect()
    }

    /// Return the public (`M/...`) form of this path.
    ///
    /// Only the prefix changes; hardened steps are preserved and will be
    /// rejected if public derivation is later attempted through them.
    pub fn to_public_form(&self) -> DerivationPath {
        DerivationPath {
            public: true,
            steps: self.steps.clone(),
        }
    }

    /// Whether the path contains any hardened step or hardened placeholder.
    pub fn has_hardened_steps(&self) -> bool {
        self.steps.iter().any(|step| {
            matches!(step, PathStep::Hardened(_) | PathStep::HardenedPlaceholder)
        })
    }
}

impl FromStr for DerivationPath {
    type Err = HdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !RE_DERIVATION_PATH.is_match(s) {
            return Err(HdError::InvalidPath(s.to_string()));
        }
        let public = s.starts_with('M');
        let mut steps = Vec::new();
        for segment in s.split('/').skip(1) {
            let (body, hardened) = match segment.strip_suffix('\'') {
                Some(body) => (body, true),
                None => (segment, false),
            };
            let step = if body == "i" {
                if hardened {
                    PathStep::HardenedPlaceholder
                } else {
                    PathStep::Placeholder
                }
            } else {
                let value: u32 = body
                    .parse()
                    .map_err(|_| HdError::InvalidPath(s.to_string()))?;
                if value >= HARDENED_OFFSET {
                    return Err(HdError::InvalidChildIndex(value));
                }
                if hardened {
                    PathStep::Hardened(value)
                } else {
                    PathStep::Normal(value)
                }
            };
            steps.push(step);
        }
        Ok(DerivationPath { public, steps })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.public { 'M' } else { 'm' })?;
        for step in &self.steps {
            match step {
                PathStep::Normal(value) => write!(f, "/{}", value)?,
                PathStep::Hardened(value) => write!(f, "/{}'", value)?,
                PathStep::Placeholder => write!(f, "/i")?,
                PathStep::HardenedPlaceholder => write!(f, "/i'")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        for path in ["m", "M", "m/0", "m/0'/1/i", "M/44/0/i", "m/2147483647'"] {
            let parsed: DerivationPath = path.parse().unwrap();
            assert_eq!(parsed.to_string(), path);
        }
    }

    #[test]
    fn test_rejects_malformed_paths() {
        for path in ["", "n/0", "m/", "m//0", "m/x", "m/0h", "0/1", "m/i/"] {
            assert!(path.parse::<DerivationPath>().is_err(), "accepted {:?}", path);
        }
    }

    #[test]
    fn test_rejects_overflowing_index() {
        assert!("m/2147483648".parse::<DerivationPath>().is_err());
    }

    #[test]
    fn test_instantiate_substitutes_placeholder() {
        let path: DerivationPath = "m/0/i".parse().unwrap();
        assert_eq!(path.instantiate(5).unwrap(), vec![0, 5]);
        let hardened: DerivationPath = "m/0'/i'".parse().unwrap();
        assert_eq!(
            hardened.instantiate(3).unwrap(),
            vec![HARDENED_OFFSET, HARDENED_OFFSET + 3]
        );
    }

    #[test]
    fn test_public_form_changes_prefix_only() {
        let path: DerivationPath = "m/0/i".parse().unwrap();
        let public = path.to_public_form();
        assert_eq!(public.to_string(), "M/0/i");
        assert_eq!(public.steps, path.steps);
    }

    #[test]
    fn test_has_hardened_steps() {
        let soft: DerivationPath = "m/0/i".parse().unwrap();
        assert!(!soft.has_hardened_steps());
        let hard: DerivationPath = "m/0'/i".parse().unwrap();
        assert!(hard.has_hardened_steps());
    }
}
