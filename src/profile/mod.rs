mod decode;

use chrono::{DateTime, TimeZone, Utc};
pub use decode::{decode_profile, validate_pprof_profile};
use std::time::Duration;

use crate::pprofpb;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueType {
    pub type_: String,
    pub unit: String,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_, self.unit)
    }
}

/// What a fetched profile says about itself, read once while validating the
/// payload so the worker can log it without decoding twice.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMeta {
    pub sample_types: Vec<ValueType>,
    pub samples: usize,
    pub captured_at: Option<DateTime<Utc>>,
    pub duration: Duration,
}

impl ProfileMeta {
    pub fn from_pprof(profile: &pprofpb::Profile) -> Self {
        let value_type = |vt: &pprofpb::ValueType| ValueType {
            type_: string_at(&profile.string_table, vt.r#type),
            unit: string_at(&profile.string_table, vt.unit),
        };

        let captured_at = if profile.time_nanos > 0 {
            Some(Utc.timestamp_nanos(profile.time_nanos))
        } else {
            None
        };

        Self {
            sample_types: profile.sample_type.iter().map(value_type).collect(),
            samples: profile.sample.len(),
            captured_at,
            duration: Duration::from_nanos(profile.duration_nanos.max(0) as u64),
        }
    }
}

/// A profile as served by a target, not yet classified.
///
/// `payload` is kept byte-for-byte (usually gzip-compressed pprof) so the
/// store receives exactly what the process produced.
#[derive(Debug, Clone)]
pub struct RawProfile {
    pub kind: String,
    pub payload: Vec<u8>,
    pub meta: ProfileMeta,
}

impl RawProfile {
    /// Decodes and validates `payload`, rejecting anything that is not a
    /// well-formed pprof profile.
    pub fn parse(kind: impl Into<String>, payload: Vec<u8>) -> anyhow::Result<Self> {
        let profile = decode_profile(&payload)?;
        Ok(Self {
            kind: kind.into(),
            meta: ProfileMeta::from_pprof(&profile),
            payload,
        })
    }
}

fn string_at(table: &[String], index: i64) -> String {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .cloned()
        .unwrap_or_default()
}
