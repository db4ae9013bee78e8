//! Data directory update strategies
//!
//! Three interchangeable ways to fetch a fresh set of database files, all
//! funneling into the same atomic directory swap: the candidate files are
//! staged in full, copied to a sibling temp path, and only then renamed
//! over the live directory. A failure at any earlier step leaves the live
//! directory untouched; there is no partial update to roll back.

use crate::error::{GeoLiteError, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Upstream repository carrying the database files
pub const UPSTREAM_REPO: &str = "https://github.com/pranavagrawal321/GeoLite2-Python.git";

/// Listing endpoint for the data directory of the upstream repository
pub const LISTING_ENDPOINT: &str =
    "https://api.github.com/repos/pranavagrawal321/GeoLite2-Python/contents/geolite2/data";

/// Path of the data directory inside the upstream repository
const UPSTREAM_DATA_SUBDIR: &str = "geolite2/data";

/// Per-request timeout for the api strategy
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// How to fetch a fresh data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMethod {
    /// Shallow, blob-filtered, sparse clone of the upstream repository
    Git,
    /// File listing + per-file download from the listing endpoint
    Api,
    /// Copy from a local directory
    Local(PathBuf),
}

/// One entry of the listing endpoint's JSON response
#[derive(Debug, serde::Deserialize)]
struct ListingEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

/// Run an update strategy against the live data directory
pub fn run(method: &UpdateMethod, data_path: &Path) -> Result<()> {
    match method {
        UpdateMethod::Git => update_via_git(data_path),
        UpdateMethod::Api => update_via_api(data_path),
        UpdateMethod::Local(source) => update_via_local(source, data_path),
    }
}

/// Clone the upstream repository restricted to its data subdirectory
///
/// `--depth=1 --filter=blob:none --sparse` keeps the transfer to a single
/// commit and only the blobs the sparse checkout actually needs.
fn update_via_git(data_path: &Path) -> Result<()> {
    let scratch = tempfile::tempdir()?;

    run_git(
        &[
            "clone",
            "--depth=1",
            "--filter=blob:none",
            "--sparse",
            UPSTREAM_REPO,
        ],
        Some(scratch.path()),
        None,
    )?;
    run_git(
        &["sparse-checkout", "set", UPSTREAM_DATA_SUBDIR],
        None,
        Some(scratch.path()),
    )?;

    let source = scratch.path().join(UPSTREAM_DATA_SUBDIR);
    if !source.is_dir() {
        return Err(GeoLiteError::Update(format!(
            "Clone did not produce {}",
            UPSTREAM_DATA_SUBDIR
        )));
    }

    replace_data_dir(&source, data_path)
}

fn run_git(args: &[&str], clone_dest: Option<&Path>, cwd: Option<&Path>) -> Result<()> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dest) = clone_dest {
        command.arg(dest);
    }
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let status = command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GeoLiteError::Update("git is not available on this system".to_string())
            } else {
                GeoLiteError::Update(format!("Failed to run git: {}", e))
            }
        })?;

    if !status.success() {
        return Err(GeoLiteError::Update(format!(
            "git {} exited with {}",
            args.first().unwrap_or(&""),
            status
        )));
    }

    Ok(())
}

/// List the upstream data directory and download each file
fn update_via_api(data_path: &Path) -> Result<()> {
    let agent = ureq::AgentBuilder::new()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(concat!("geolite2/", env!("CARGO_PKG_VERSION")))
        .build();

    eprintln!("Fetching file list from {}", LISTING_ENDPOINT);
    let listing: Vec<ListingEntry> = agent
        .get(LISTING_ENDPOINT)
        .call()
        .map_err(|e| GeoLiteError::Update(format!("Listing request failed: {}", e)))?
        .into_json()
        .map_err(|e| GeoLiteError::Update(format!("Listing response not valid JSON: {}", e)))?;

    let scratch = tempfile::tempdir()?;

    for entry in listing.iter().filter(|e| e.kind == "file") {
        let url = entry.download_url.as_deref().ok_or_else(|| {
            GeoLiteError::Update(format!("Listing entry {} has no download URL", entry.name))
        })?;

        eprintln!("Downloading {}", entry.name);
        let mut body = Vec::new();
        agent
            .get(url)
            .call()
            .map_err(|e| GeoLiteError::Update(format!("Download of {} failed: {}", entry.name, e)))?
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| {
                GeoLiteError::Update(format!("Download of {} failed: {}", entry.name, e))
            })?;

        fs::write(scratch.path().join(&entry.name), body)?;
    }

    replace_data_dir(scratch.path(), data_path)
}

/// Use a caller-supplied directory as the new data directory
fn update_via_local(source: &Path, data_path: &Path) -> Result<()> {
    if !source.exists() {
        return Err(GeoLiteError::Update(format!(
            "Local path does not exist: {}",
            source.display()
        )));
    }

    replace_data_dir(source, data_path)
}

/// Atomically replace the live data directory with `source`
///
/// The candidate is copied to a sibling `.tmp` path first; any stale temp
/// directory from an earlier failed run is removed, never merged into.
/// Only after the copy completes is the live directory removed and the
/// temp path renamed into place.
pub fn replace_data_dir(source: &Path, live: &Path) -> Result<()> {
    let tmp = live.with_extension("tmp");

    if tmp.exists() {
        fs::remove_dir_all(&tmp)?;
    }

    copy_dir_recursive(source, &tmp)?;

    if live.exists() {
        fs::remove_dir_all(live)?;
    }
    fs::rename(&tmp, live)?;

    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_missing_source_is_update_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            &UpdateMethod::Local(dir.path().join("nope")),
            &dir.path().join("data"),
        );
        assert!(matches!(result, Err(GeoLiteError::Update(_))));
    }

    #[test]
    fn test_local_replaces_live_directory() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("incoming");
        let live = root.path().join("data");

        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("GeoLite2-ASN.mmdb"), b"new").unwrap();

        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("stale.mmdb"), b"old").unwrap();

        run(&UpdateMethod::Local(source), &live).unwrap();

        assert!(live.join("GeoLite2-ASN.mmdb").exists());
        assert!(!live.join("stale.mmdb").exists());
        assert_eq!(fs::read(live.join("GeoLite2-ASN.mmdb")).unwrap(), b"new");
    }

    #[test]
    fn test_stale_temp_dir_is_removed_not_merged() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("incoming");
        let live = root.path().join("data");
        let tmp = root.path().join("data.tmp");

        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("GeoLite2-City.mmdb"), b"fresh").unwrap();

        // Leftovers from a previous failed run
        fs::create_dir_all(&tmp).unwrap();
        fs::write(tmp.join("leftover.mmdb"), b"half-written").unwrap();

        replace_data_dir(&source, &live).unwrap();

        assert!(!tmp.exists());
        assert!(live.join("GeoLite2-City.mmdb").exists());
        assert!(!live.join("leftover.mmdb").exists());
    }

    #[test]
    fn test_replace_creates_missing_live_directory() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("incoming");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.mmdb"), b"x").unwrap();

        let live = root.path().join("data");
        assert!(!live.exists());

        replace_data_dir(&source, &live).unwrap();
        assert!(live.join("a.mmdb").exists());
    }

    #[test]
    fn test_replace_copies_nested_directories() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("incoming");
        fs::create_dir_all(source.join("checksums")).unwrap();
        fs::write(source.join("GeoLite2-Country.mmdb"), b"db").unwrap();
        fs::write(source.join("checksums").join("GeoLite2-Country.sha256"), b"c").unwrap();

        let live = root.path().join("data");
        replace_data_dir(&source, &live).unwrap();

        assert!(live.join("checksums").join("GeoLite2-Country.sha256").exists());
    }
}
