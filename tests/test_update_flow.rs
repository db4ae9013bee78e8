// Update flow: the local strategy must atomically replace the live data
// directory, and the registry must serve from the fresh files afterwards.

use geolite2::{DataValue, DatabaseKind, GeoLiteError, MmdbBuilder, Parser, UpdateMethod};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn country_db(country: &str) -> Vec<u8> {
    let mut builder = MmdbBuilder::new().with_database_type("GeoLite2-Country");
    let mut data = HashMap::new();
    data.insert(
        "country".to_string(),
        DataValue::String(country.to_string()),
    );
    builder.add_ip("8.8.8.0/24", data).unwrap();
    builder.build().unwrap()
}

fn country_of(parser: &mut Parser) -> String {
    let hit = parser
        .lookup(DatabaseKind::Country, "8.8.8.8".parse().unwrap())
        .unwrap()
        .expect("8.8.8.0/24 should match");
    match hit.data {
        DataValue::Map(map) => match map.get("country") {
            Some(DataValue::String(s)) => s.clone(),
            other => panic!("Unexpected country value: {:?}", other),
        },
        other => panic!("Expected map data, got {:?}", other),
    }
}

fn write_db(dir: &Path, blob: &[u8]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(DatabaseKind::Country.file_name()), blob).unwrap();
}

#[test]
fn test_local_update_replaces_directory_exactly() {
    let root = tempfile::tempdir().unwrap();
    let live = root.path().join("data");
    let incoming = root.path().join("incoming");

    write_db(&live, &country_db("US"));
    fs::write(live.join("extra.txt"), b"left over").unwrap();
    write_db(&incoming, &country_db("DE"));

    let mut parser = Parser::new(&live);
    assert_eq!(country_of(&mut parser), "US");

    parser
        .update(&UpdateMethod::Local(incoming.clone()))
        .unwrap();

    // The live directory now holds exactly the incoming file set
    assert_eq!(country_of(&mut parser), "DE");
    assert!(!live.join("extra.txt").exists());

    // The staging path is gone after the swap
    assert!(!root.path().join("data.tmp").exists());
}

#[test]
fn test_stale_staging_dir_from_failed_run_is_discarded() {
    let root = tempfile::tempdir().unwrap();
    let live = root.path().join("data");
    let incoming = root.path().join("incoming");

    // A previous run died between copy and rename
    let stale = root.path().join("data.tmp");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("GeoLite2-ASN.mmdb"), b"half-written").unwrap();

    write_db(&incoming, &country_db("NL"));

    let mut parser = Parser::new(&live);
    parser.update(&UpdateMethod::Local(incoming)).unwrap();

    // The stale file must not have been merged into the result
    assert!(!live.join("GeoLite2-ASN.mmdb").exists());
    assert_eq!(country_of(&mut parser), "NL");
}

#[test]
fn test_failed_update_leaves_live_directory_untouched() {
    let root = tempfile::tempdir().unwrap();
    let live = root.path().join("data");
    write_db(&live, &country_db("US"));

    let mut parser = Parser::new(&live);
    assert_eq!(country_of(&mut parser), "US");

    let missing = root.path().join("does-not-exist");
    let err = parser
        .update(&UpdateMethod::Local(missing))
        .unwrap_err();
    assert!(matches!(err, GeoLiteError::Update(_)));

    // Old data still served (stores were closed, so this is a fresh open)
    assert_eq!(country_of(&mut parser), "US");
}

#[test]
fn test_update_closes_open_stores_before_swap() {
    let root = tempfile::tempdir().unwrap();
    let live = root.path().join("data");
    let incoming = root.path().join("incoming");

    write_db(&live, &country_db("US"));
    write_db(&incoming, &country_db("FR"));

    let mut parser = Parser::new(&live);
    // Force the country store open so the update has something to close
    assert_eq!(country_of(&mut parser), "US");

    parser.update(&UpdateMethod::Local(incoming)).unwrap();
    assert_eq!(country_of(&mut parser), "FR");
}
