//! Persistent configuration.
//!
//! Stored as TOML in the platform config directory. Every value has a
//! working default, and the deployment-sensitive ones can be overridden
//! through `PASSERELLE_*` environment variables without touching the
//! file.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::constants::{DEFAULT_LISTEN_ADDR, DEFAULT_RELAY_URL, DEFAULT_UPSTREAM_URL};
use crate::core::frame::DEFAULT_MAX_CARRY_BYTES;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base URL of the upstream AI backend the relay forwards to.
    pub upstream_url: Option<String>,
    /// Base URL of the relay, used by the `say` client.
    pub relay_url: Option<String>,
    /// Address the relay binds to.
    pub listen_addr: Option<String>,
    /// Response shape: "stream" (NDJSON) or "single" (buffered JSON).
    pub mode: Option<String>,
    /// Render `say` output as HTML instead of printing raw Markdown.
    pub markdown: Option<bool>,
    /// Frame decoder carry-over cap in bytes.
    pub max_carry_bytes: Option<usize>,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    fn get_config_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "passerelle", "passerelle")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    pub fn upstream_url(&self) -> String {
        env::var("PASSERELLE_UPSTREAM_URL")
            .ok()
            .or_else(|| self.upstream_url.clone())
            .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string())
    }

    pub fn relay_url(&self) -> String {
        env::var("PASSERELLE_RELAY_URL")
            .ok()
            .or_else(|| self.relay_url.clone())
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string())
    }

    pub fn listen_addr(&self) -> String {
        env::var("PASSERELLE_LISTEN_ADDR")
            .ok()
            .or_else(|| self.listen_addr.clone())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
    }

    pub fn mode(&self) -> String {
        env::var("PASSERELLE_MODE")
            .ok()
            .or_else(|| self.mode.clone())
            .unwrap_or_else(|| "stream".to_string())
    }

    pub fn max_carry_bytes(&self) -> usize {
        self.max_carry_bytes.unwrap_or(DEFAULT_MAX_CARRY_BYTES)
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  upstream-url: {}", self.upstream_url());
        println!("  relay-url: {}", self.relay_url());
        println!("  listen-addr: {}", self.listen_addr());
        println!("  mode: {}", self.mode());
        match self.markdown.unwrap_or(false) {
            true => println!("  markdown: on"),
            false => println!("  markdown: off"),
        }
        println!("  max-carry-bytes: {}", self.max_carry_bytes());
    }

    /// Apply one `set` command. Keys use the CLI's kebab-case spelling.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
        match key {
            "upstream-url" => self.upstream_url = Some(value.to_string()),
            "relay-url" => self.relay_url = Some(value.to_string()),
            "listen-addr" => self.listen_addr = Some(value.to_string()),
            "mode" => {
                if value != "stream" && value != "single" {
                    return Err(format!("invalid mode '{value}' (expected 'stream' or 'single')").into());
                }
                self.mode = Some(value.to_string());
            }
            "markdown" => {
                self.markdown = Some(value.parse().map_err(|_| {
                    format!("invalid markdown value '{value}' (expected 'true' or 'false')")
                })?)
            }
            "max-carry-bytes" => {
                self.max_carry_bytes = Some(value.parse().map_err(|_| {
                    format!("invalid max-carry-bytes value '{value}' (expected an integer)")
                })?)
            }
            _ => return Err(format!("unknown configuration key: {key}").into()),
        }
        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> Result<(), Box<dyn std::error::Error>> {
        match key {
            "upstream-url" => self.upstream_url = None,
            "relay-url" => self.relay_url = None,
            "listen-addr" => self.listen_addr = None,
            "mode" => self.mode = None,
            "markdown" => self.markdown = None,
            "max-carry-bytes" => self.max_carry_bytes = None,
            _ => return Err(format!("unknown configuration key: {key}").into()),
        }
        Ok(())
    }
}
