use crate::config::{
    Config, DEFAULT_CPU_PROFILE_SECONDS, DEFAULT_PROFILE_KINDS, DEFAULT_PROFILING_PORT,
    DEFAULT_STORE_URL, DEFAULT_TARGET_TIMEOUT_SECS, DEFAULT_WORKERS,
};
use crate::target::{LabelSelector, SelectBy, Selection};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// evcollect gathers pprof profiles from a set of processes and stores them in
/// a profefe-compatible profile store.
#[derive(Debug, Parser)]
#[command(name = "evcollect", version)]
pub struct Args {
    /// Names of the targets to profile. Without names, targets are picked
    /// with --selector.
    pub names: Vec<String>,

    /// JSON inventory listing the targets that can be profiled.
    #[arg(short, long, env = "EVCOLLECT_INVENTORY")]
    pub inventory: PathBuf,

    /// Label selector, e.g. `app=checkout,tier!=batch`. Ignored when names
    /// are given.
    #[arg(short = 'l', long, default_value = "")]
    pub selector: String,

    /// Only consider targets in this namespace.
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Where the profile store is located.
    #[arg(long, env = "EVCOLLECT_STORE_URL", default_value = DEFAULT_STORE_URL)]
    pub store_url: String,

    /// Number of targets profiled concurrently.
    #[arg(long, env = "EVCOLLECT_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Seconds allowed for fetching and storing one target's profiles.
    #[arg(long, default_value_t = DEFAULT_TARGET_TIMEOUT_SECS)]
    pub target_timeout: u64,

    /// Port of the pprof endpoints, unless a target overrides it.
    #[arg(long, default_value_t = DEFAULT_PROFILING_PORT)]
    pub profiling_port: u16,

    /// Seconds the CPU profile samples for.
    #[arg(long, default_value_t = DEFAULT_CPU_PROFILE_SECONDS)]
    pub cpu_seconds: u64,

    /// Profile kinds to fetch, comma separated.
    #[arg(long = "profiles", value_delimiter = ',', default_values = DEFAULT_PROFILE_KINDS)]
    pub profile_kinds: Vec<String>,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<Config> {
        let config = Config {
            store_url: Config::parse_store_url(&self.store_url)?,
            workers: self.workers,
            target_timeout: Duration::from_secs(self.target_timeout),
            profiling_port: self.profiling_port,
            cpu_profile_duration: Duration::from_secs(self.cpu_seconds),
            profile_kinds: self
                .profile_kinds
                .iter()
                .map(|k| k.trim().to_string())
                .collect(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn selection(&self) -> anyhow::Result<Selection> {
        let by = if self.names.is_empty() {
            SelectBy::Labels(self.selector.parse::<LabelSelector>()?)
        } else {
            SelectBy::Names(self.names.clone())
        };

        Ok(Selection {
            namespace: self.namespace.clone(),
            by,
        })
    }
}
