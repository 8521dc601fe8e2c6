//! Print the effective configuration

use crate::util;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let (config, source) = util::load_config(config_path)?;

    match source {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# built-in defaults"),
    }
    print!("{}", config.to_toml()?);

    Ok(())
}
