use anyhow::{bail, Result};
use geolite2::{Parser, UpdateMethod};
use std::path::PathBuf;

pub fn cmd_update(data_dir: PathBuf, method: String, path: Option<PathBuf>) -> Result<()> {
    let method = match method.as_str() {
        "git" => UpdateMethod::Git,
        "api" => UpdateMethod::Api,
        "local" => match path {
            Some(path) => UpdateMethod::Local(path),
            None => bail!("The local update method requires --path"),
        },
        other => bail!("Unknown update method: {} (expected git, api, or local)", other),
    };

    let mut parser = Parser::new(data_dir);
    parser.update(&method)?;
    Ok(())
}
