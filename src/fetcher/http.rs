use super::{FetchError, FetchedProfiles, Fetcher, KindError};
use crate::classifier::{classify, CanonicalProfileKind};
use crate::collector::{ScopeError, TargetScope};
use crate::config::Config;
use crate::profile::RawProfile;
use crate::target::Target;
use anyhow::Context;
use async_trait::async_trait;
use std::io::Read;
use std::time::Duration;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_PROFILE_BYTES: u64 = 64 * 1024 * 1024;
const USER_AGENT: &str = concat!("evcollect/", env!("CARGO_PKG_VERSION"));

/// Fetches profiles from `net/http/pprof` style endpoints.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: ureq::Agent,
    kinds: Vec<String>,
    default_port: u16,
    cpu_seconds: u64,
    max_profile_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            client: ureq::AgentBuilder::new()
                .timeout_connect(CONNECT_TIMEOUT)
                .redirects(2)
                .user_agent(USER_AGENT)
                .build(),
            kinds: config.profile_kinds.clone(),
            default_port: config.profiling_port,
            cpu_seconds: config.cpu_profile_duration.as_secs().max(1),
            max_profile_bytes: MAX_PROFILE_BYTES,
        }
    }

    /// URL a kind is served on, e.g. `http://10.0.0.12:6060/debug/pprof/heap`.
    pub fn endpoint(&self, target: &Target, kind: &str) -> anyhow::Result<Url> {
        let host = if target.address.contains(':') && !target.address.starts_with('[') {
            format!("[{}]", target.address)
        } else {
            target.address.clone()
        };
        let port = target.profiling_port(self.default_port);

        let base = Url::parse(&format!("http://{}:{}/debug/pprof/", host, port))
            .with_context(|| format!("invalid target address {:?}", target.address))?;

        if classify(kind) == CanonicalProfileKind::Cpu {
            let mut url = base.join("profile")?;
            url.query_pairs_mut()
                .append_pair("seconds", &self.cpu_seconds.to_string());
            Ok(url)
        } else {
            Ok(base.join(kind)?)
        }
    }

    async fn fetch_kind(
        &self,
        scope: &TargetScope,
        kind: &str,
        url: Url,
    ) -> Result<RawProfile, KindError> {
        let client = self.client.clone();
        let kind = kind.to_string();
        let max_bytes = self.max_profile_bytes;

        scope
            .blocking(move |remaining| {
                if remaining.is_zero() {
                    return Err(KindError::Scope(ScopeError::DeadlineExceeded));
                }

                let response = client
                    .get(url.as_str())
                    .timeout(remaining)
                    .call()
                    .map_err(|e| match e {
                        ureq::Error::Status(code, _) => KindError::Status(code),
                        ureq::Error::Transport(t) => KindError::Transport(t.to_string()),
                    })?;

                let mut body = Vec::new();
                response
                    .into_reader()
                    .take(max_bytes + 1)
                    .read_to_end(&mut body)
                    .map_err(|e| KindError::Transport(e.to_string()))?;

                if body.len() as u64 > max_bytes {
                    return Err(KindError::TooLarge(max_bytes));
                }

                RawProfile::parse(kind, body).map_err(KindError::Decode)
            })
            .await?
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        scope: &TargetScope,
        target: &Target,
    ) -> Result<FetchedProfiles, FetchError> {
        let mut profiles = FetchedProfiles::new();
        let mut transport_failures = 0;
        let mut last_transport_error = String::new();

        for kind in self.kinds.iter() {
            let url = self
                .endpoint(target, kind)
                .map_err(|e| FetchError::Unreachable {
                    address: target.address.clone(),
                    reason: format!("{:#}", e),
                })?;

            log::debug!("[{}] fetching {} profile from {}", target.id, kind, url);

            let err = match self.fetch_kind(scope, kind, url).await {
                Ok(profile) => {
                    log::debug!(
                        "[{}] fetched {} profile: {} samples of {}, {} bytes, {:?} long, captured at {}",
                        target.id,
                        kind,
                        profile.meta.samples,
                        profile
                            .meta
                            .sample_types
                            .iter()
                            .map(|vt| vt.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                        profile.payload.len(),
                        profile.meta.duration,
                        profile
                            .meta
                            .captured_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "unknown time".to_string())
                    );
                    profiles.insert(kind.clone(), profile);
                    continue;
                }
                Err(err) => err,
            };

            scope.check()?;

            match err {
                KindError::Scope(e) => return Err(e.into()),
                KindError::Transport(reason) => {
                    log::warn!("[{}] could not fetch {} profile: {}", target.id, kind, reason);
                    transport_failures += 1;
                    last_transport_error = reason;
                }
                err => {
                    log::warn!("[{}] skipping {} profile: {}", target.id, kind, err);
                }
            }
        }

        if profiles.is_empty() && transport_failures == self.kinds.len() {
            return Err(FetchError::Unreachable {
                address: format!(
                    "{}:{}",
                    target.address,
                    target.profiling_port(self.default_port)
                ),
                reason: last_transport_error,
            });
        }

        Ok(profiles)
    }
}
