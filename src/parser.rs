//! Named database registry
//!
//! Maps the logical database names (`asn`, `city`, `country`) to their
//! conventional file names inside the data directory, opening each backing
//! store lazily on first lookup. The mapping is a closed enum rather than
//! a runtime registration table, so an unknown name is a typed error and
//! the name-to-file association is checked at compile time.

use crate::error::{GeoLiteError, Result};
use crate::store::{LookupMatch, Store};
use crate::update::{self, UpdateMethod};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Logical database kinds and their backing file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    /// Autonomous system number and organization
    Asn,
    /// City-level geolocation
    City,
    /// Country-level geolocation
    Country,
}

impl DatabaseKind {
    /// Every registered kind
    pub const ALL: [DatabaseKind; 3] = [
        DatabaseKind::Asn,
        DatabaseKind::City,
        DatabaseKind::Country,
    ];

    /// Conventional file name inside the data directory
    pub fn file_name(self) -> &'static str {
        match self {
            DatabaseKind::Asn => "GeoLite2-ASN.mmdb",
            DatabaseKind::City => "GeoLite2-City.mmdb",
            DatabaseKind::Country => "GeoLite2-Country.mmdb",
        }
    }

    /// Lookup name, as accepted by [`DatabaseKind::from_str`]
    pub fn name(self) -> &'static str {
        match self {
            DatabaseKind::Asn => "asn",
            DatabaseKind::City => "city",
            DatabaseKind::Country => "country",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatabaseKind {
    type Err = GeoLiteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asn" => Ok(DatabaseKind::Asn),
            "city" => Ok(DatabaseKind::City),
            "country" => Ok(DatabaseKind::Country),
            other => Err(GeoLiteError::UnknownParserType(other.to_string())),
        }
    }
}

/// IP metadata parser over a directory of database files
///
/// Stores are opened lazily on first lookup and cached until
/// [`Parser::close_stores`] or an update closes them. No network or file
/// access happens on the lookup path after a store is open.
///
/// # Example
/// ```no_run
/// use geolite2::{DatabaseKind, Parser};
///
/// let mut parser = Parser::new("data");
/// let hit = parser.lookup(DatabaseKind::Country, "8.8.8.8".parse()?)?;
/// println!("{:?}", hit);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Parser {
    data_path: PathBuf,
    stores: HashMap<DatabaseKind, Store>,
}

impl Parser {
    /// Create a parser over the given data directory
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            stores: HashMap::new(),
        }
    }

    /// The live data directory
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Look up an IP address in the given database
    ///
    /// Opens the backing file on first use; a missing or corrupt file is a
    /// [`GeoLiteError::DatabaseLoad`] error.
    pub fn lookup(&mut self, kind: DatabaseKind, ip: IpAddr) -> Result<Option<LookupMatch>> {
        Ok(self.store(kind)?.lookup(ip)?)
    }

    /// Look up by database name (`asn`, `city`, `country`)
    ///
    /// Unknown names fail with [`GeoLiteError::UnknownParserType`].
    pub fn lookup_named(&mut self, name: &str, ip: IpAddr) -> Result<Option<LookupMatch>> {
        self.lookup(name.parse()?, ip)
    }

    /// Close all cached stores
    ///
    /// Must happen before the data directory is replaced; open mappings can
    /// pin stale data or block directory removal on some platforms.
    pub fn close_stores(&mut self) {
        for store in self.stores.values_mut() {
            store.close();
        }
        self.stores.clear();
    }

    /// Refresh the data directory with one of the update strategies
    ///
    /// Closes every open store first; the next lookup reopens against the
    /// refreshed files. A failed update leaves the live directory untouched.
    pub fn update(&mut self, method: &UpdateMethod) -> Result<()> {
        self.close_stores();

        eprintln!("Updating GeoLite2 data...");
        update::run(method, &self.data_path)?;
        eprintln!("GeoLite2 data updated successfully.");

        Ok(())
    }

    fn store(&mut self, kind: DatabaseKind) -> Result<&Store> {
        if !self.stores.contains_key(&kind) {
            let path = self.data_path.join(kind.file_name());
            let store = Store::open(&path).map_err(|e| {
                GeoLiteError::DatabaseLoad(format!("{}: {}", path.display(), e))
            })?;
            self.stores.insert(kind, store);
        }

        Ok(&self.stores[&kind])
    }
}
