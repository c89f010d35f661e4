//! bko-config
//!
//! Layered desk configuration: a base file plus site overrides, merged in
//! order (later layers win, maps merge deep), then hashed in canonical form
//! so two desks can prove they run identical configuration.
//!
//! The engine's sourcing policy is deliberately NOT configuration: the
//! Store retry ceiling is a fixed constant in bko-fulfilment. Config covers
//! the operational shell only: desk identity, audit log placement, logging.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Leaf pointers the desk actually reads. Anything else in a merged config
/// is either a typo or a leftover and gets flagged.
const KNOWN_POINTERS: &[&str] = &[
    "/desk/desk_id",
    "/audit/path",
    "/audit/hash_chain",
    "/logging/filter",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    Warn,
    Fail,
}

/// The merged configuration with its canonical form and hash.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Typed view of the merged document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskConfig {
    #[serde(default)]
    pub desk: DeskSection,
    #[serde(default)]
    pub audit: AuditSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskSection {
    pub desk_id: String,
}

impl Default for DeskSection {
    fn default() -> Self {
        Self {
            desk_id: "MAIN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSection {
    pub path: PathBuf,
    pub hash_chain: bool,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("audit/desk.jsonl"),
            hash_chain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl DeskConfig {
    /// Extract the typed view from a merged document. Missing sections fall
    /// back to defaults; wrongly-typed values are errors.
    pub fn from_value(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("config does not match desk schema")
    }
}

/// Load and merge config layers from files. Format per file extension:
/// `.yaml`/`.yml` or `.json`. Earlier paths are base, later paths override.
pub fn load_layered(paths: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for p in paths {
        let raw = fs::read_to_string(p).with_context(|| format!("failed to read config: {p}"))?;
        let layer = parse_layer(Path::new(p), &raw)?;
        merged = deep_merge(merged, layer);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Merge in-memory YAML layers. Used by tests and embedded callers.
pub fn load_layered_from_yaml_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn parse_layer(path: &Path, raw: &str) -> Result<Value> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(raw).with_context(|| format!("invalid yaml: {:?}", path))?;
            serde_json::to_value(v).context("yaml->json conversion failed")
        }
        Some("json") => {
            serde_json::from_str(raw).with_context(|| format!("invalid json: {:?}", path))
        }
        other => bail!("unsupported config extension {:?} for {:?}", other, path),
    }
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Canonical form: recursively key-sorted, compact JSON.
fn canonicalize_json(v: &Value) -> Result<String> {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Flag config leaves the desk never reads.
///
/// `Warn` logs each unknown leaf via tracing and returns them; `Fail`
/// errors with a deterministic, copy/paste friendly message.
pub fn report_unknown_keys(config_json: &Value, policy: UnknownKeyPolicy) -> Result<Vec<String>> {
    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unknown: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !KNOWN_POINTERS.contains(&lp.as_str()))
        .collect();
    unknown.sort();
    unknown.dedup();

    match policy {
        UnknownKeyPolicy::Warn => {
            for lp in &unknown {
                tracing::warn!(pointer = %lp, "unknown config key (ignored by the desk)");
            }
            Ok(unknown)
        }
        UnknownKeyPolicy::Fail if unknown.is_empty() => Ok(unknown),
        UnknownKeyPolicy::Fail => bail!(
            "CONFIG_UNKNOWN_KEYS: {} unknown config leaf key(s): {:?}",
            unknown.len(),
            unknown
        ),
    }
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}
