use anyhow::{Context, Result};
use geolite2::MmdbBuilder;
use std::fs;
use std::path::PathBuf;

use crate::cli_utils::json_to_data_map;

pub fn cmd_build(input: PathBuf, output: PathBuf, database_type: String) -> Result<()> {
    let text = fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let entries: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", input.display()))?;

    let serde_json::Value::Object(entries) = entries else {
        anyhow::bail!("Expected a top-level JSON object of CIDR -> record");
    };

    let mut builder = MmdbBuilder::new().with_database_type(database_type);
    for (cidr, record) in &entries {
        let data = json_to_data_map(record)
            .with_context(|| format!("Bad record data for {}", cidr))?;
        builder
            .add_ip(cidr, data)
            .with_context(|| format!("Bad entry key {}", cidr))?;
    }

    let blob = builder.build()?;
    fs::write(&output, &blob)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!(
        "Built {} with {} entries ({} bytes)",
        output.display(),
        builder.entry_count(),
        blob.len()
    );
    Ok(())
}
