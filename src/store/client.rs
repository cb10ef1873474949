use super::{ProfileSink, SavedProfile, SubmissionRequest, SubmitError};
use crate::collector::{ScopeError, TargetScope};
use crate::config::Config;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PROFILES_PATH: &str = "api/0/profiles";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct SaveResponse {
    body: Option<SaveResponseBody>,
}

#[derive(Debug, Deserialize)]
struct SaveResponseBody {
    #[serde(default)]
    id: String,
}

/// Client for a profefe-compatible profile store.
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: ureq::Agent,
    base: Url,
}

impl StoreClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: ureq::AgentBuilder::new()
                .timeout_connect(CONNECT_TIMEOUT)
                .redirects(0)
                .build(),
            base: config.store_url.clone(),
        }
    }

    fn profiles_url(&self) -> Result<Url, SubmitError> {
        self.base
            .join(PROFILES_PATH)
            .map_err(|e| SubmitError::InvalidRequest(format!("bad store url: {}", e)))
    }

    /// Where a stored profile can be downloaded from.
    pub fn profile_url(&self, id: &str) -> String {
        format!("{}{}/{}", self.base, PROFILES_PATH, id)
    }
}

fn parse_saved_id(body: &str) -> Result<String, SubmitError> {
    let parsed: SaveResponse = serde_json::from_str(body)
        .map_err(|e| SubmitError::MalformedResponse(e.to_string()))?;

    match parsed.body {
        Some(saved) if !saved.id.is_empty() => Ok(saved.id),
        _ => Err(SubmitError::MalformedResponse(
            "response carries no profile id".to_string(),
        )),
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body.trim().to_string()
}

#[async_trait]
impl ProfileSink for StoreClient {
    async fn submit(
        &self,
        scope: &TargetScope,
        request: SubmissionRequest,
    ) -> Result<SavedProfile, SubmitError> {
        let url = self.profiles_url()?;
        let client = self.client.clone();
        let kind = request.kind();

        let id = scope
            .blocking(move |remaining| {
                if remaining.is_zero() {
                    return Err(SubmitError::from(ScopeError::DeadlineExceeded));
                }

                let mut call = client
                    .post(url.as_str())
                    .timeout(remaining)
                    .set("Content-Type", "application/octet-stream")
                    .query("service", request.service_name())
                    .query("instance_id", request.instance_id())
                    .query("type", request.kind().as_str());

                if !request.labels().is_empty() {
                    call = call.query("labels", &request.encoded_labels());
                }

                let response = call.send_bytes(request.payload()).map_err(|e| match e {
                    ureq::Error::Status(status, response) => SubmitError::Rejected {
                        status,
                        body: truncate(response.into_string().unwrap_or_default()),
                    },
                    ureq::Error::Transport(t) => SubmitError::Transport(t.to_string()),
                })?;

                let body = response
                    .into_string()
                    .map_err(|e| SubmitError::MalformedResponse(e.to_string()))?;
                parse_saved_id(&body)
            })
            .await??;

        Ok(SavedProfile {
            url: self.profile_url(&id),
            id,
            kind,
        })
    }
}
