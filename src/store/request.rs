use super::SubmitError;
use crate::classifier::CanonicalProfileKind;
use crate::target::{Target, LABEL_POD};
use std::collections::BTreeMap;

/// One profile on its way to the store.
///
/// Construction enforces what the store relies on: a known kind, a service
/// name, and labels that survive the `k=v,k=v` encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    payload: Vec<u8>,
    service_name: String,
    instance_id: String,
    kind: CanonicalProfileKind,
    labels: BTreeMap<String, String>,
}

impl SubmissionRequest {
    pub fn new(
        payload: Vec<u8>,
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        kind: CanonicalProfileKind,
        labels: BTreeMap<String, String>,
    ) -> Result<Self, SubmitError> {
        let service_name = service_name.into();

        if !kind.is_known() {
            return Err(SubmitError::InvalidRequest(
                "profiles of unknown kind cannot be stored".to_string(),
            ));
        }

        if service_name.trim().is_empty() {
            return Err(SubmitError::InvalidRequest(
                "service name is empty".to_string(),
            ));
        }

        for (key, value) in labels.iter() {
            if key.is_empty() || key.contains([',', '=']) || value.contains([',', '=']) {
                return Err(SubmitError::InvalidRequest(format!(
                    "label {:?}={:?} cannot be encoded",
                    key, value
                )));
            }
        }

        Ok(Self {
            payload,
            service_name,
            instance_id: instance_id.into(),
            kind,
            labels,
        })
    }

    /// Builds the request for a profile collected from `target`.
    ///
    /// A service hint on the target replaces the service name, and the
    /// target's own id is kept as the `pod` label so the profile can still be
    /// found by either.
    pub fn for_target(
        target: &Target,
        kind: CanonicalProfileKind,
        payload: Vec<u8>,
    ) -> Result<Self, SubmitError> {
        let mut labels = target.labels.clone();
        if target.service_hint.is_some() {
            labels.insert(LABEL_POD.to_string(), target.id.clone());
        }

        Self::new(
            payload,
            target.service_name(),
            target.instance_id.clone(),
            kind,
            labels,
        )
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn kind(&self) -> CanonicalProfileKind {
        self.kind
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Labels as the store expects them: `k1=v1,k2=v2`, sorted by key.
    pub fn encoded_labels(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{LABEL_NAMESPACE, LABEL_SOURCE, SOURCE};

    #[test]
    fn test_service_hint_overrides_name_and_keeps_pod() {
        let target = Target::new("checkout-7f9", "10.0.0.12", "192.168.1.4")
            .with_label(LABEL_NAMESPACE, "shop")
            .with_service_hint("checkout");

        let request =
            SubmissionRequest::for_target(&target, CanonicalProfileKind::Heap, vec![1, 2]).unwrap();

        assert_eq!(request.service_name(), "checkout");
        assert_eq!(request.instance_id(), "192.168.1.4");
        assert_eq!(request.kind(), CanonicalProfileKind::Heap);
        assert_eq!(request.payload(), &[1, 2]);
        assert_eq!(
            request.labels().get(LABEL_POD).map(String::as_str),
            Some("checkout-7f9")
        );
        assert_eq!(
            request.encoded_labels(),
            "namespace=shop,pod=checkout-7f9,source=evcollect"
        );
    }

    #[test]
    fn test_no_hint_uses_id_without_pod_label() {
        let target = Target::new("checkout-7f9", "10.0.0.12", "192.168.1.4");

        let request =
            SubmissionRequest::for_target(&target, CanonicalProfileKind::Cpu, vec![]).unwrap();

        assert_eq!(request.service_name(), "checkout-7f9");
        assert!(!request.labels().contains_key(LABEL_POD));
        assert_eq!(request.labels().get(LABEL_SOURCE).map(String::as_str), Some(SOURCE));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let target = Target::new("checkout-7f9", "10.0.0.12", "");
        let err = SubmissionRequest::for_target(&target, CanonicalProfileKind::Unknown, vec![])
            .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidRequest(_)));
    }

    #[test]
    fn test_empty_service_rejected() {
        let err = SubmissionRequest::new(
            vec![],
            " ",
            "",
            CanonicalProfileKind::Cpu,
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidRequest(_)));
    }

    #[test]
    fn test_unencodable_labels_rejected() {
        let mut labels = BTreeMap::new();
        labels.insert("team".to_string(), "a,b".to_string());
        let err = SubmissionRequest::new(
            vec![],
            "checkout",
            "",
            CanonicalProfileKind::Cpu,
            labels,
        )
        .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidRequest(_)));
    }
}
