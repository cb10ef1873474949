use crate::pprofpb::Profile;
use anyhow::{bail, Context};
use flate2::read::GzDecoder;
use prost::Message;
use std::collections::HashSet;
use std::io::Read;

/// Decodes a pprof body as served by `net/http/pprof`, gzip-compressed or not.
pub fn decode_profile(raw: &[u8]) -> anyhow::Result<Profile> {
    if raw.is_empty() {
        bail!("empty profile body");
    }

    let mut decompressed = Vec::new();
    let bytes = if raw.len() >= 2 && raw[0] == 0x1f && raw[1] == 0x8b {
        GzDecoder::new(raw)
            .read_to_end(&mut decompressed)
            .context("Failed to decompress gzip")?;
        decompressed.as_slice()
    } else {
        raw
    };

    let profile = Profile::decode(bytes).context("Failed to decode profile")?;
    validate_pprof_profile(&profile)?;
    Ok(profile)
}

pub fn validate_pprof_profile(profile: &Profile) -> anyhow::Result<()> {
    match profile.string_table.first() {
        None => bail!("profile has no string table"),
        Some(elem) if !elem.is_empty() => {
            bail!("first string table element is expected to be empty")
        }
        Some(_) => {}
    }

    if profile.sample_type.is_empty() {
        bail!("profile declares no sample types");
    }

    let string_table_len = profile.string_table.len() as i64;
    let in_table = |index: i64| (0..string_table_len).contains(&index);

    for vt in profile.sample_type.iter().chain(profile.period_type.iter()) {
        if !in_table(vt.r#type) || !in_table(vt.unit) {
            bail!("value type index out of bounds");
        }
    }

    let mapping_ids = unique_ids(profile.mapping.iter().map(|m| m.id), "mapping")?;
    for mapping in profile.mapping.iter() {
        if !in_table(mapping.filename) {
            bail!("mapping filename index out of bounds");
        }
        if !in_table(mapping.build_id) {
            bail!("mapping build_id index out of bounds");
        }
    }

    let function_ids = unique_ids(profile.function.iter().map(|f| f.id), "function")?;
    for function in profile.function.iter() {
        if !in_table(function.name)
            || !in_table(function.system_name)
            || !in_table(function.filename)
        {
            bail!("function {} string index out of bounds", function.id);
        }
    }

    let location_ids = unique_ids(profile.location.iter().map(|l| l.id), "location")?;
    for location in profile.location.iter() {
        if location.mapping_id != 0 && !mapping_ids.contains(&location.mapping_id) {
            bail!(
                "location {} references unknown mapping {}",
                location.id,
                location.mapping_id
            );
        }

        for line in location.line.iter() {
            if line.function_id != 0 && !function_ids.contains(&line.function_id) {
                bail!(
                    "location {} references unknown function {}",
                    location.id,
                    line.function_id
                );
            }
        }
    }

    for (i, sample) in profile.sample.iter().enumerate() {
        if sample.value.len() != profile.sample_type.len() {
            bail!(
                "sample {} has {} values, expected {}",
                i,
                sample.value.len(),
                profile.sample_type.len()
            );
        }

        for (j, location) in sample.location_id.iter().enumerate() {
            if !location_ids.contains(location) {
                bail!(
                    "sample {} has unknown location_id {} at index {}",
                    i,
                    location,
                    j
                );
            }
        }

        for (j, label) in sample.label.iter().enumerate() {
            if label.key == 0 || !in_table(label.key) {
                bail!(
                    "sample {} has label key {} at index {}. it must be non zero and less than {}.",
                    i,
                    label.key,
                    j,
                    string_table_len
                );
            }

            if !in_table(label.str) {
                bail!(
                    "sample {} has label str {} at index {}. it must be less than {}.",
                    i,
                    label.str,
                    j,
                    string_table_len
                );
            }
        }
    }

    Ok(())
}

fn unique_ids(ids: impl Iterator<Item = u64>, what: &str) -> anyhow::Result<HashSet<u64>> {
    let mut seen = HashSet::new();
    for id in ids {
        if id == 0 {
            bail!("{} id must be non zero", what);
        }
        if !seen.insert(id) {
            bail!("duplicate {} id {}", what, id);
        }
    }
    Ok(seen)
}
