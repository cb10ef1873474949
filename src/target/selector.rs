use super::Target;
use anyhow::bail;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Resolves which targets a run should profile.
///
/// Implementations return each target at most once. An empty result is not an
/// error here; the collector reports it as nothing to profile.
pub trait TargetSelector {
    fn select(&self, selection: &Selection) -> anyhow::Result<Vec<Target>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Restricts the lookup to one namespace. `None` looks everywhere.
    pub namespace: Option<String>,
    pub by: SelectBy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectBy {
    /// Explicit target names. Names that cannot be found are skipped.
    Names(Vec<String>),
    Labels(LabelSelector),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Equals(key, value) => labels.get(key) == Some(value),
            Self::NotEquals(key, value) => labels.get(key) != Some(value),
            Self::Exists(key) => labels.contains_key(key),
            Self::DoesNotExist(key) => !labels.contains_key(key),
        }
    }
}

/// Equality-based label selector: `app=checkout,tier!=batch,canary,!legacy`.
///
/// All requirements must hold. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements = Vec::new();

        for term in s.split(',').map(str::trim) {
            if term.is_empty() {
                if s.trim().is_empty() {
                    continue;
                }
                bail!("empty term in label selector {:?}", s);
            }

            let requirement = if let Some((key, value)) = term.split_once("!=") {
                Requirement::NotEquals(valid_key(key, s)?, value.trim().to_string())
            } else if let Some((key, value)) = term.split_once("==") {
                Requirement::Equals(valid_key(key, s)?, value.trim().to_string())
            } else if let Some((key, value)) = term.split_once('=') {
                Requirement::Equals(valid_key(key, s)?, value.trim().to_string())
            } else if let Some(key) = term.strip_prefix('!') {
                Requirement::DoesNotExist(valid_key(key, s)?)
            } else {
                Requirement::Exists(valid_key(term, s)?)
            };

            requirements.push(requirement);
        }

        Ok(Self { requirements })
    }
}

fn valid_key(key: &str, selector: &str) -> anyhow::Result<String> {
    let key = key.trim();
    if key.is_empty() || key.contains(['=', '!', ' ']) {
        bail!("invalid label key {:?} in selector {:?}", key, selector);
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector: LabelSelector = "".parse().unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("app", "checkout")])));
    }

    #[test]
    fn test_requirements() {
        let selector: LabelSelector = "app=checkout, tier!=batch,canary,!legacy".parse().unwrap();

        assert!(selector.matches(&labels(&[("app", "checkout"), ("canary", "")])));
        assert!(selector.matches(&labels(&[
            ("app", "checkout"),
            ("canary", "yes"),
            ("tier", "web"),
        ])));
        assert!(!selector.matches(&labels(&[
            ("app", "checkout"),
            ("canary", "yes"),
            ("tier", "batch"),
        ])));
        assert!(!selector.matches(&labels(&[("app", "checkout")])));
        assert!(!selector.matches(&labels(&[
            ("app", "checkout"),
            ("canary", "yes"),
            ("legacy", "true"),
        ])));
        assert!(!selector.matches(&labels(&[("app", "cart"), ("canary", "yes")])));
    }

    #[test]
    fn test_double_equals() {
        let selector: LabelSelector = "app==checkout".parse().unwrap();
        assert!(selector.matches(&labels(&[("app", "checkout")])));
    }

    #[test]
    fn test_malformed_selectors() {
        for input in ["=checkout", "app=checkout,,tier=web", "!", "a b=c"] {
            assert!(input.parse::<LabelSelector>().is_err(), "input {:?}", input);
        }
    }
}
