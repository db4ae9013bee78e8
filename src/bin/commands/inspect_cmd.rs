use anyhow::{Context, Result};
use geolite2::{DatabaseKind, RecordSize, Store};
use serde_json::json;
use std::path::PathBuf;

pub fn cmd_inspect(data_dir: PathBuf, db: String) -> Result<()> {
    // Accept a registered name or a direct file path
    let path = match db.parse::<DatabaseKind>() {
        Ok(kind) => data_dir.join(kind.file_name()),
        Err(_) => PathBuf::from(&db),
    };

    let store = Store::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    let metadata = store.metadata()?;

    let output = json!({
        "path": path.display().to_string(),
        "database_type": metadata.database_type,
        "binary_format_version": format!(
            "{}.{}",
            metadata.binary_format_major_version, metadata.binary_format_minor_version
        ),
        "ip_version": match metadata.ip_version {
            geolite2::IpVersion::V4 => 4,
            geolite2::IpVersion::V6 => 6,
        },
        "node_count": metadata.node_count,
        "record_size": match metadata.record_size {
            RecordSize::Bits24 => 24,
            RecordSize::Bits28 => 28,
            RecordSize::Bits32 => 32,
        },
        "build_epoch": metadata.build_epoch,
        "languages": metadata.languages,
        "description": metadata.description,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
