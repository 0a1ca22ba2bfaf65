//! Site configuration and feature manifests.
//!
//! Two TOML surfaces live here:
//!
//! - `site.toml` at the source root: the site-wide settings — locales,
//!   default locale, title, base URL. All fields have defaults; unknown
//!   keys are rejected to catch typos early.
//! - `feature.toml` inside each directory under `features/`: the
//!   declarative manifest describing one feature's identity, link, and
//!   category, plus arbitrary display metadata passed through to templates.
//!
//! ## Manifest defaults
//!
//! A feature directory needs no manifest at all: `id` defaults to the
//! directory name and `link` to `/<id>/`. Identifiers must be unique across
//! the whole set, and the discovered list is sorted by identifier so render
//! order and any generated index are stable across builds.
//!
//! ```toml
//! # features/loan-interest/feature.toml
//! id = "loan-interest"
//! link = "/loan-interest/"
//! category = "finance"
//! title = "Loan interest"        # display metadata, schema-free
//! icon = "percent"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Duplicate feature id '{id}' (second occurrence in {})", dir.display())]
    DuplicateFeature { id: String, dir: PathBuf },
}

/// Site-wide configuration loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site title, available to every template as `site.title`.
    pub title: String,
    /// Absolute base URL used by root artifacts (robots, manifest).
    pub base_url: String,
    /// Locales to render every page for, in output order.
    pub locales: Vec<String>,
    /// Locale the root redirect page points at.
    pub default_locale: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Site".to_string(),
            base_url: String::new(),
            locales: vec!["en".to_string()],
            default_locale: "en".to_string(),
        }
    }
}

impl SiteConfig {
    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locales.is_empty() {
            return Err(ConfigError::Validation("locales must not be empty".into()));
        }
        if !self.locales.contains(&self.default_locale) {
            return Err(ConfigError::Validation(format!(
                "default_locale '{}' is not in locales {:?}",
                self.default_locale, self.locales
            )));
        }
        let mut seen = HashSet::new();
        for locale in &self.locales {
            if !seen.insert(locale.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "locale '{locale}' listed twice"
                )));
            }
        }
        Ok(())
    }
}

/// Load `site.toml` from the source root. Defaults apply when absent.
pub fn load_site_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = root.join("site.toml");
    let config = if path.exists() {
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml { path, source })?
    } else {
        SiteConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Well-known directories of a site source tree.
///
/// Computed once and threaded through the build so every component agrees
/// on where things live. Directories are allowed to be absent — a site
/// without features or without global data is valid.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    pub root: PathBuf,
    pub pages_dir: PathBuf,
    pub features_dir: PathBuf,
    pub includes_dir: PathBuf,
    pub locales_dir: PathBuf,
    pub data_dir: PathBuf,
    pub assets_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            pages_dir: root.join("pages"),
            features_dir: root.join("features"),
            includes_dir: root.join("includes"),
            locales_dir: root.join("locales"),
            data_dir: root.join("data"),
            assets_dir: root.join("assets"),
        }
    }
}

/// Raw `feature.toml` shape: everything optional, unknown keys collected
/// as display metadata rather than rejected.
#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    id: Option<String>,
    link: Option<String>,
    category: Option<String>,
    #[serde(flatten)]
    display: toml::Table,
}

/// One feature's declarative record.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureManifest {
    /// Unique identifier; defaults to the directory name.
    pub id: String,
    /// Output link; defaults to `/<id>/`.
    pub link: String,
    /// Navigation category tag.
    pub category: Option<String>,
    /// Schema-free display metadata, passed through to templates.
    pub display: toml::Table,
    /// Directory name under `features/` (locale bundles and assets live
    /// relative to it; may differ from `id` when the manifest overrides it).
    #[serde(skip)]
    pub dir_name: String,
}

/// Discover every feature manifest under the features root.
///
/// Each immediate subdirectory is one feature. An absent `feature.toml`
/// yields a manifest built entirely from defaults. The result is sorted by
/// id; duplicate ids are an error.
pub fn discover_features(features_dir: &Path) -> Result<Vec<FeatureManifest>, ConfigError> {
    let mut manifests = Vec::new();
    if !features_dir.is_dir() {
        return Ok(manifests);
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(features_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        // Dotted directories are editor/VCS noise, not features.
        if dir_name.starts_with('.') {
            continue;
        }

        let manifest_path = dir.join("feature.toml");
        let raw: RawManifest = if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)?;
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: manifest_path.clone(),
                source,
            })?
        } else {
            RawManifest::default()
        };

        let id = raw.id.unwrap_or_else(|| dir_name.clone());
        let link = raw.link.unwrap_or_else(|| format!("/{id}/"));
        manifests.push(FeatureManifest {
            id,
            link,
            category: raw.category,
            display: raw.display,
            dir_name,
        });
    }

    manifests.sort_by(|a, b| a.id.cmp(&b.id));

    let mut seen = HashSet::new();
    for manifest in &manifests {
        if !seen.insert(manifest.id.clone()) {
            return Err(ConfigError::DuplicateFeature {
                id: manifest.id.clone(),
                dir: features_dir.join(&manifest.dir_name),
            });
        }
    }

    Ok(manifests)
}
