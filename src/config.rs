//! ALFA Reveal - Configuration
//!
//! Presentation and transport settings, stored as JSON like the rest of the
//! ALFA configs. The autoload threshold can be overridden from the
//! environment.

use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{RevealError, RevealResult};
use crate::fetch::SizeUnits;

/// Environment override for [`RevealConfig::autoload_threshold`]
pub const AUTOLOAD_ENV: &str = "ALFA_REVEAL_AUTOLOAD";

/// Default autoload threshold in bytes
pub const DEFAULT_AUTOLOAD_THRESHOLD: u64 = 50_000;

/// Reveal configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Media at or below this size (bytes) loads without a click
    pub autoload_threshold: u64,
    /// Unit ladder for sizes and progress
    pub size_units: SizeUnits,
    /// Base for relative media sources
    pub base_url: Option<String>,
    /// Whether the page is served from a secure context
    pub secure_context: bool,
    /// User-Agent for media requests
    pub user_agent: String,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            autoload_threshold: DEFAULT_AUTOLOAD_THRESHOLD,
            size_units: SizeUnits::Decimal,
            base_url: None,
            secure_context: true,
            user_agent: format!("alfa-reveal/{}", crate::VERSION),
        }
    }
}

impl RevealConfig {
    /// Load from a JSON file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> RevealResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: RevealConfig = serde_json::from_str(&raw)
            .map_err(|e| RevealError::Config(format!("{}: {}", path.display(), e)))?;

        config.apply_autoload_override(std::env::var(AUTOLOAD_ENV).ok().as_deref())?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());

        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> RevealResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.apply_autoload_override(std::env::var(AUTOLOAD_ENV).ok().as_deref())?;
                Ok(config)
            }
        }
    }

    /// Apply a raw `ALFA_REVEAL_AUTOLOAD` value
    pub fn apply_autoload_override(&mut self, raw: Option<&str>) -> RevealResult<()> {
        if let Some(raw) = raw {
            self.autoload_threshold = raw.trim().parse().map_err(|_| {
                RevealError::Config(format!("{} must be a byte count, got {:?}", AUTOLOAD_ENV, raw))
            })?;
        }
        Ok(())
    }

    /// Check settings that serde cannot
    pub fn validate(&self) -> RevealResult<()> {
        if let Some(base) = &self.base_url {
            Url::parse(base).map_err(|e| RevealError::Config(format!("base_url {}: {}", base, e)))?;
        }
        if self.user_agent.trim().is_empty() {
            return Err(RevealError::Config("user_agent must not be empty".into()));
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> RevealResult<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Where the page is being viewed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// Served over a secure transport (in-place crypto available)
    pub secure_context: bool,
    /// Page query string, with or without the leading `?`
    pub query: String,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            secure_context: true,
            query: String::new(),
        }
    }
}

impl PageContext {
    pub fn from_config(config: &RevealConfig) -> Self {
        Self {
            secure_context: config.secure_context,
            query: String::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Whether `name` appears as a query parameter (with or without value)
    pub fn has_param(&self, name: &str) -> bool {
        self.query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .any(|pair| pair.split('=').next() == Some(name))
    }

    /// In-place decryption is possible: secure context and no `nocrypt`
    pub fn can_decrypt(&self) -> bool {
        self.secure_context && !self.has_param("nocrypt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RevealConfig::default();
        assert_eq!(config.autoload_threshold, 50_000);
        assert_eq!(config.size_units, SizeUnits::Decimal);
        assert!(config.secure_context);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reveal.json");
        std::fs::write(
            &path,
            r#"{"autoload_threshold": 1000, "size_units": "binary", "base_url": "https://alfa.dev/"}"#,
        )
        .unwrap();

        let mut config: RevealConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.autoload_threshold, 1000);
        assert_eq!(config.size_units, SizeUnits::Binary);
        assert!(config.secure_context);

        config.apply_autoload_override(Some(" 2048 ")).unwrap();
        assert_eq!(config.autoload_threshold, 2048);
        assert!(config.apply_autoload_override(Some("lots")).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reveal.json");
        let config = RevealConfig {
            autoload_threshold: 10,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let reloaded: RevealConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_invalid_base_url() {
        let config = RevealConfig {
            base_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RevealError::Config(_))));
    }

    #[test]
    fn test_nocrypt_param() {
        let ctx = PageContext::default();
        assert!(ctx.can_decrypt());

        assert!(!ctx.clone().with_query("?nocrypt").can_decrypt());
        assert!(!ctx.clone().with_query("a=1&nocrypt=yes").can_decrypt());
        assert!(ctx.clone().with_query("?nocrypto=1").can_decrypt());

        let insecure = PageContext {
            secure_context: false,
            query: String::new(),
        };
        assert!(!insecure.can_decrypt());
    }
}
