//! The maek cache file stores each task's key from the end of its last
//! successful run, as a single JSON object mapping target name to key.

use anyhow::Context;
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_PATH: &str = "maek-cache.json";

/// Loads the persisted target→key map.
///
/// A missing file is a cold start (`Ok(None)`); a malformed file is
/// discarded with a warning.  Any other filesystem error is unexpected and
/// propagates.
pub fn load(path: &str) -> anyhow::Result<Option<BTreeMap<String, Value>>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read {}", path)),
    };
    match serde_json::from_slice(&bytes) {
        Ok(map) => Ok(Some(map)),
        Err(err) => {
            log::warn!("ignoring malformed cache file {}: {}", path, err);
            Ok(None)
        }
    }
}

/// Rewrites the cache file with the given entries, atomically with respect
/// to readers: the JSON is written to a sibling temp file and renamed into
/// place.
pub fn save(path: &str, entries: &BTreeMap<String, Value>) -> anyhow::Result<()> {
    let json = serde_json::to_string(entries)?;
    let tmp = format!("{}.tmp", path);
    std::fs::write(&tmp, json).with_context(|| format!("write {}", tmp))?;
    std::fs::rename(&tmp, path).with_context(|| format!("rename {} to {}", tmp, path))?;
    Ok(())
}
