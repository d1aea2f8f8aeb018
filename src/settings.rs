use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

pub const DEFAULT_BASEURL: &str = "https://inspirehep.net/api/";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_POOL_SIZE: usize = 5;

#[derive(Serialize, Deserialize)]
pub struct Config {
    /// Editor command used for interactive repairs; falls back to $EDITOR.
    pub editor: Option<String>,
    pub baseurl: String,
    pub page_size: usize,
    pub pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            editor: None,
            baseurl: DEFAULT_BASEURL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Base data directory (~/.bibcheck), created on first use.
pub fn data_dir() -> Result<PathBuf> {
    let mut dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not resolve home directory"))?;
    dir.push(".bibcheck");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn cache_path() -> Result<PathBuf> {
    let mut path = data_dir()?;
    path.push("fixes.db");
    Ok(path)
}

pub fn config_path() -> Result<PathBuf> {
    let mut path = data_dir()?;
    path.push("config.toml");
    Ok(path)
}

pub fn read_config_file() -> Result<Config> {
    let config_path = config_path()?;
    if config_path.exists() {
        let file = fs::File::open(&config_path)?;
        let mut reader = BufReader::new(file);
        let mut toml_content = String::new();
        reader.read_to_string(&mut toml_content)?;
        let config: Config = toml::from_str(&toml_content)?;
        Ok(config)
    } else {
        // Return default configuration if file doesn't exist
        Ok(Config::default())
    }
}

pub fn save_config_file(config: &Config) -> Result<()> {
    let toml_content = toml::to_string_pretty(config)?;
    let mut file = fs::File::create(config_path()?)?;
    file.write_all(toml_content.as_bytes())?;
    Ok(())
}
