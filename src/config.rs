use crate::classifier::classify;
use anyhow::{bail, Context};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

pub const DEFAULT_STORE_URL: &str = "http://localhost:10100";
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_TARGET_TIMEOUT_SECS: u64 = 40;
pub const DEFAULT_PROFILING_PORT: u16 = 6060;
pub const DEFAULT_CPU_PROFILE_SECONDS: u64 = 10;
pub const DEFAULT_PROFILE_KINDS: [&str; 7] = [
    "cpu",
    "heap",
    "allocs",
    "block",
    "mutex",
    "goroutine",
    "threadcreate",
];

/// Settings for one collection run. Built once and handed to the collector,
/// fetcher and store client constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the profefe-compatible store.
    pub store_url: Url,
    /// Number of targets processed concurrently.
    pub workers: usize,
    /// Budget for fetching and submitting everything for one target.
    pub target_timeout: Duration,
    /// Port the pprof endpoints listen on unless a target overrides it.
    pub profiling_port: u16,
    /// How long the CPU profile samples for.
    pub cpu_profile_duration: Duration,
    /// Profile kinds requested from every target, by endpoint name.
    pub profile_kinds: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: Url::parse(DEFAULT_STORE_URL).expect("default store url is valid"),
            workers: DEFAULT_WORKERS,
            target_timeout: Duration::from_secs(DEFAULT_TARGET_TIMEOUT_SECS),
            profiling_port: DEFAULT_PROFILING_PORT,
            cpu_profile_duration: Duration::from_secs(DEFAULT_CPU_PROFILE_SECONDS),
            profile_kinds: DEFAULT_PROFILE_KINDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Config {
    /// Parses the store location, accepting a bare `host:port` as well as a
    /// full URL. The path always ends in `/` so API paths can be joined on.
    pub fn parse_store_url(raw: &str) -> anyhow::Result<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("store url is empty");
        }

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let mut url = Url::parse(&with_scheme)
            .with_context(|| format!("invalid store url {:?}", raw))?;

        if !matches!(url.scheme(), "http" | "https") {
            bail!("store url must be http or https, got {}", url.scheme());
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }

        if self.target_timeout.is_zero() {
            bail!("target timeout must be greater than zero");
        }

        if self.cpu_profile_duration.is_zero() {
            bail!("cpu profile duration must be greater than zero");
        }

        if self.cpu_profile_duration >= self.target_timeout {
            bail!(
                "cpu profile duration ({:?}) must be shorter than the target timeout ({:?})",
                self.cpu_profile_duration,
                self.target_timeout
            );
        }

        if self.profile_kinds.is_empty() {
            bail!("at least one profile kind is required");
        }

        let mut seen = HashSet::new();
        for kind in self.profile_kinds.iter() {
            if kind.is_empty() || kind.contains(['/', '?', '#']) {
                bail!("invalid profile kind {:?}", kind);
            }
            let canonical = classify(kind);
            let key = if canonical.is_known() {
                canonical.as_str().to_string()
            } else {
                kind.trim().to_ascii_lowercase()
            };
            if !seen.insert(key) {
                bail!("profile kind {:?} listed twice", kind);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.workers, 10);
        assert_eq!(config.target_timeout, Duration::from_secs(40));
        assert_eq!(config.store_url.as_str(), "http://localhost:10100/");
    }

    #[test]
    fn test_parse_store_url() {
        assert_eq!(
            Config::parse_store_url("profefe:10100").unwrap().as_str(),
            "http://profefe:10100/"
        );
        assert_eq!(
            Config::parse_store_url("https://store.example.com/profefe")
                .unwrap()
                .as_str(),
            "https://store.example.com/profefe/"
        );
        assert!(Config::parse_store_url("").is_err());
        assert!(Config::parse_store_url("ftp://store").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            cpu_profile_duration: Duration::from_secs(40),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            profile_kinds: vec!["heap".to_string(), "heap".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            profile_kinds: vec!["../heap".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_kinds_naming_the_same_endpoint() {
        for kinds in [["cpu", "profile"], ["heap", "HEAP"], ["fgprof", "FGProf"]] {
            let config = Config {
                profile_kinds: kinds.iter().map(|k| k.to_string()).collect(),
                ..Config::default()
            };
            assert!(config.validate().is_err(), "kinds {:?}", kinds);
        }

        let config = Config {
            profile_kinds: vec!["heap".to_string(), "fgprof".to_string()],
            ..Config::default()
        };
        config.validate().unwrap();
    }
}
