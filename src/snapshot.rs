//! The per-build snapshot: aggregated config, locale, and change state.
//!
//! Built exactly once per build, then shared (immutably) by every page
//! render. Holds the merged feature manifest list, one merged translation
//! dictionary per locale, the global template data, and three booleans
//! describing whether any *global* dependency changed since the last build:
//!
//! - `includes_changed` — any file under `includes/`
//! - `global_data_changed` — `site.toml`, any `locales/*.json`, any
//!   `data/*.json`
//! - `features_changed` — any `feature.toml` or per-feature locale bundle
//!
//! # The peek-only invariant
//!
//! Flag computation hashes every file in its category against the build
//! cache using [`BuildCache::peek`] — never `commit`. The (key, digest)
//! pairs seen along the way are retained as *pending* commits and applied
//! by [`Snapshot::commit_globals`] only after the page pass finished with
//! zero failures. Committing eagerly would mark a changed include as "seen"
//! while some page that depends on it still failed to rebuild; that page's
//! own digest is withheld too, but if its source never changed it would
//! never be retried. The deferred commit closes exactly that gap.

use crate::cache::{self, BuildCache};
use crate::config::{self, FeatureManifest, SiteConfig, SiteLayout};
use crate::locale::{self, Dictionary, LocaleError, Translator};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Locale error: {0}")]
    Locale(#[from] LocaleError),
    #[error("JSON parse error in {}: {source}", path.display())]
    Data {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Aggregated per-build state shared by all renders.
#[derive(Debug)]
pub struct Snapshot {
    pub config: SiteConfig,
    pub features: Vec<FeatureManifest>,
    /// Merged dictionary per locale, keyed by locale tag.
    pub dictionaries: BTreeMap<String, Arc<Dictionary>>,
    /// Global template data from `data/*.json`, keyed by file stem.
    pub data: Map<String, Value>,
    /// Feature manifest list pre-rendered as a JSON array for contexts.
    pub features_context: Value,
    pub includes_changed: bool,
    pub global_data_changed: bool,
    pub features_changed: bool,
    /// Digests seen during flag computation, committed after a clean run.
    pending: Vec<(String, String)>,
}

impl Snapshot {
    /// Aggregate everything the build needs, hashing global dependencies
    /// against the cache with peek-only semantics.
    pub fn collect(layout: &SiteLayout, cache: &BuildCache) -> Result<Self, SnapshotError> {
        let config = config::load_site_config(&layout.root)?;
        let features = config::discover_features(&layout.features_dir)?;
        let feature_dirs: Vec<String> = features.iter().map(|f| f.dir_name.clone()).collect();

        let mut dictionaries = BTreeMap::new();
        for locale_tag in &config.locales {
            let sources = locale::dictionary_sources(
                &layout.locales_dir,
                &layout.features_dir,
                &feature_dirs,
                locale_tag,
            );
            let merged = locale::load_dictionary(&sources)?;
            dictionaries.insert(locale_tag.clone(), Arc::new(merged));
        }

        let data = load_data_files(&layout.data_dir)?;
        let features_context = features_context(&features);

        let mut pending = Vec::new();
        let includes_changed =
            hash_category(cache, include_files(layout), &mut pending);
        let global_data_changed =
            hash_category(cache, global_data_files(layout), &mut pending);
        let features_changed =
            hash_category(cache, feature_config_files(layout, &features), &mut pending);

        Ok(Self {
            config,
            features,
            dictionaries,
            data,
            features_context,
            includes_changed,
            global_data_changed,
            features_changed,
            pending,
        })
    }

    /// Whether any global dependency requires every page to rebuild.
    pub fn any_global_changed(&self) -> bool {
        self.includes_changed || self.global_data_changed || self.features_changed
    }

    /// A translator bound to `locale`. Unknown locales get an empty
    /// dictionary, so every lookup echoes its key.
    pub fn translator(&self, locale: &str) -> Translator {
        let dictionary = self
            .dictionaries
            .get(locale)
            .cloned()
            .unwrap_or_else(|| Arc::new(Dictionary::new()));
        Translator::new(locale, dictionary)
    }

    /// Look up a feature manifest by its directory name.
    pub fn feature_by_dir(&self, dir_name: &str) -> Option<&FeatureManifest> {
        self.features.iter().find(|f| f.dir_name == dir_name)
    }

    /// Commit the global-dependency digests observed at collection time.
    ///
    /// Call only when the page pass completed without a single failure;
    /// see the module docs.
    pub fn commit_globals(&self, cache: &mut BuildCache) {
        for (key, digest) in &self.pending {
            cache.commit(key, digest.clone());
        }
    }

}

/// Hash every (key, path) pair against the cache without committing.
/// Unreadable files count as changed and leave nothing to commit.
fn hash_category(
    cache: &BuildCache,
    files: Vec<(String, PathBuf)>,
    pending: &mut Vec<(String, String)>,
) -> bool {
    let mut changed = false;
    for (key, path) in files {
        match cache::digest_file(&path) {
            Ok(digest) => {
                if cache.peek(&key, &digest) {
                    changed = true;
                }
                pending.push((key, digest));
            }
            Err(_) => changed = true,
        }
    }
    changed
}

/// Every file under `includes/`, keyed as `include/<rel>`.
fn include_files(layout: &SiteLayout) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    if !layout.includes_dir.is_dir() {
        return files;
    }
    for entry in WalkDir::new(&layout.includes_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if let Ok(rel) = entry.path().strip_prefix(&layout.includes_dir) {
            files.push((cache::cache_key("include/", rel), entry.path().to_path_buf()));
        }
    }
    files
}

/// `site.toml`, top-level locale modules, and `data/*.json`.
fn global_data_files(layout: &SiteLayout) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    let site_toml = layout.root.join("site.toml");
    if site_toml.is_file() {
        files.push(("data/site.toml".to_string(), site_toml));
    }
    for dir in [&layout.locales_dir, &layout.data_dir] {
        for path in sorted_files(dir) {
            if let Ok(rel) = path.strip_prefix(&layout.root) {
                let namespace = if dir == &layout.locales_dir {
                    "locale/"
                } else {
                    "data/"
                };
                // Key by the path inside the category directory.
                let inner = rel.components().skip(1).collect::<PathBuf>();
                files.push((cache::cache_key(namespace, &inner), path));
            }
        }
    }
    files
}

/// Per-feature manifests and locale bundles, keyed `config/<dir>/<file>`.
fn feature_config_files(
    layout: &SiteLayout,
    features: &[FeatureManifest],
) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    for feature in features {
        let dir = layout.features_dir.join(&feature.dir_name);
        let namespace = format!("config/{}/", feature.dir_name);
        let manifest = dir.join("feature.toml");
        if manifest.is_file() {
            files.push((
                cache::cache_key(&namespace, Path::new("feature.toml")),
                manifest,
            ));
        }
        for path in sorted_files(&dir.join("locales")) {
            if let Some(name) = path.file_name() {
                let rel = Path::new("locales").join(name);
                files.push((cache::cache_key(&namespace, &rel), path));
            }
        }
    }
    files
}

/// Regular files directly inside `dir`, sorted for deterministic hashing.
fn sorted_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

/// Parse `data/*.json` into a map keyed by file stem.
fn load_data_files(data_dir: &Path) -> Result<Map<String, Value>, SnapshotError> {
    let mut data = Map::new();
    for path in sorted_files(data_dir) {
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = std::fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&content).map_err(|source| {
            SnapshotError::Data {
                path: path.clone(),
                source,
            }
        })?;
        data.insert(stem, value);
    }
    Ok(data)
}

/// One manifest as a JSON object: display metadata first, then the schema
/// fields (so `id`/`link`/`category` always win).
pub fn feature_value(feature: &FeatureManifest) -> Value {
    let mut obj = Map::new();
    for (key, value) in &feature.display {
        let json = serde_json::to_value(value).unwrap_or(Value::Null);
        obj.insert(key.clone(), json);
    }
    obj.insert("id".to_string(), Value::String(feature.id.clone()));
    obj.insert("link".to_string(), Value::String(feature.link.clone()));
    if let Some(category) = &feature.category {
        obj.insert("category".to_string(), Value::String(category.clone()));
    }
    Value::Object(obj)
}

/// Pre-render the manifest list as a JSON array for template contexts.
fn features_context(features: &[FeatureManifest]) -> Value {
    Value::Array(features.iter().map(feature_value).collect())
}
