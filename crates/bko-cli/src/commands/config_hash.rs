//! `bko config-hash`: canonical hash of the layered desk configuration.

use anyhow::Result;

use bko_config::{load_layered, report_unknown_keys, DeskConfig, UnknownKeyPolicy};

pub fn run(paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered(&path_refs)?;

    // Typed extraction catches schema drift; unknown keys are warnings here
    // (the desk keeps running on a config with leftovers).
    let _ = DeskConfig::from_value(&loaded.config_json)?;
    report_unknown_keys(&loaded.config_json, UnknownKeyPolicy::Warn)?;

    println!("config_hash {}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}
