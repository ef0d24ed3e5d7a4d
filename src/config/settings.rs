//! Process settings from environment variables, optionally seeded from `.env` via dotenvy.

use crate::error::ConfigError;
use std::env;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` runs the models against the in-memory session.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub models_path: String,
    pub url_prefix: Option<String>,
    pub readonly: bool,
    pub page_size: u32,
    pub body_limit: usize,
}

impl Settings {
    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "no .env loaded");
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        if bind_addr.trim().is_empty() {
            return Err(ConfigError::Validation("BIND_ADDR cannot be empty".into()));
        }

        let models_path = env::var("MODELS_PATH").unwrap_or_else(|_| "models.json".to_string());

        let url_prefix = match env::var("URL_PREFIX") {
            Ok(p) if !p.trim().is_empty() => {
                let p = p.trim();
                if !p.starts_with('/') {
                    return Err(ConfigError::Validation("URL_PREFIX must start with '/'".into()));
                }
                let p = p.trim_end_matches('/');
                if p.is_empty() {
                    None
                } else {
                    Some(p.to_string())
                }
            }
            _ => None,
        };

        let readonly = match env::var("READONLY") {
            Ok(v) => parse_bool(&v).ok_or_else(|| ConfigError::Validation("READONLY must be true or false".into()))?,
            Err(_) => false,
        };

        let page_size = env::var("PAGE_SIZE")
            .unwrap_or_else(|_| DEFAULT_PAGE_SIZE.to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::Validation("PAGE_SIZE must be a number".into()))?;
        if !(1..=1000).contains(&page_size) {
            return Err(ConfigError::Validation("PAGE_SIZE must be between 1 and 1000".into()));
        }

        let body_limit = env::var("BODY_LIMIT")
            .unwrap_or_else(|_| (1024 * 1024).to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::Validation("BODY_LIMIT must be a number".into()))?;

        Ok(Settings {
            database_url,
            bind_addr,
            models_path,
            url_prefix,
            readonly,
            page_size,
            body_limit,
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
