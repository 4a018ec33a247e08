use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::annotator::AnnotationOptions;
use crate::error::XrefError;

pub const CONFIG_FILE: &str = "gem-xref.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub registry: Option<Utf8PathBuf>,
    #[serde(default)]
    pub xrefs: Option<Utf8PathBuf>,
    #[serde(default)]
    pub include_any_uri: Option<bool>,
    #[serde(default)]
    pub self_references: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub registry: Utf8PathBuf,
    pub xrefs: Option<Utf8PathBuf>,
    pub options: AnnotationOptions,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            registry: default_registry_path(),
            xrefs: None,
            options: AnnotationOptions::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, XrefError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(XrefError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| XrefError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| XrefError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let defaults = AnnotationOptions::default();
        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            registry: config.registry.unwrap_or_else(default_registry_path),
            xrefs: config.xrefs,
            options: AnnotationOptions {
                include_any_uri: config.include_any_uri.unwrap_or(defaults.include_any_uri),
                self_references: config.self_references.unwrap_or(defaults.self_references),
            },
        }
    }
}

/// `~/.cache/gem-xref/identifiers-org-registry.json`, or a relative path when no home
/// directory can be determined.
pub fn default_registry_path() -> Utf8PathBuf {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("gem-xref")).ok()
        })
        .unwrap_or_else(|| Utf8PathBuf::from(".gem-xref"))
        .join("identifiers-org-registry.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default());
        assert_eq!(resolved.schema_version, 1);
        assert!(resolved.xrefs.is_none());
        assert!(!resolved.options.include_any_uri);
        assert!(resolved.options.self_references);
        assert!(resolved.registry.as_str().ends_with("identifiers-org-registry.json"));
    }
}
