use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use page_extractor::ExtractorConfig;

const DEFAULT_ORIGINS: &str = "http://localhost:5000,http://127.0.0.1:5000";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub results_dir: PathBuf,
    /// Static files served for unmatched paths. Nothing is served when unset.
    pub frontend_dir: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub extractor: ExtractorConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(port) => port.parse().context("PORT must be a valid port number")?,
            Err(_) => 5000,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            results_dir: env::var("RESULTS_DIR")
                .unwrap_or_else(|_| "results".to_string())
                .into(),
            frontend_dir: env::var("FRONTEND_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            allowed_origins: parse_origins(
                &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_ORIGINS.to_string()),
            ),
            extractor: ExtractorConfig::from_env()?,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
