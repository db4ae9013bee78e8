use anyhow::{Context, Result};
use geolite2::Parser;
use serde_json::json;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::{data_value_to_json, format_cidr};

pub fn cmd_query(data_dir: PathBuf, db: String, ip: String, quiet: bool) -> Result<()> {
    let addr: IpAddr = ip
        .parse()
        .with_context(|| format!("Not a valid IP address: {}", ip))?;

    let mut parser = Parser::new(data_dir);
    let result = parser
        .lookup_named(&db, addr)
        .with_context(|| format!("Query failed for: {}", ip))?;

    let found = result.is_some();

    if quiet {
        std::process::exit(if found { 0 } else { 1 });
    }

    match result {
        Some(hit) => {
            let mut output = data_value_to_json(&hit.data);
            if let serde_json::Value::Object(ref mut map) = output {
                map.insert("cidr".to_string(), json!(format_cidr(&ip, hit.prefix_len)));
                map.insert("prefix_len".to_string(), json!(hit.prefix_len));
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        None => println!("null"),
    }

    std::process::exit(if found { 0 } else { 1 });
}
