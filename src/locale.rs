//! Translation dictionaries and locale-bound lookup.
//!
//! Dictionaries are JSON files of nested string trees. One merged
//! dictionary is assembled per locale from an explicit ordered list of
//! sources, with documented precedence (earlier entries are weaker):
//!
//! 1. `locales/base.json` — locale-independent defaults
//! 2. `locales/<locale>.json` — the locale's own module
//! 3. `features/<dir>/locales/<locale>.json` — per-feature bundles, in
//!    feature id order
//!
//! Later sources overwrite earlier ones **at the top level key** — a
//! feature bundle that defines `loan` replaces the whole `loan` subtree, it
//! does not deep-merge into it. This keeps ownership obvious: whichever
//! source defines a top-level group last owns it entirely.
//!
//! Lookup never fails: a missing key (or a key whose value is not a
//! string) resolves to the key itself, so a half-translated locale ships
//! with visible placeholder keys instead of crashing the build.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocaleError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON parse error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Dictionary root in {} is not a JSON object", .0.display())]
    NotAnObject(PathBuf),
}

/// Merged key→value tree for one locale.
pub type Dictionary = Map<String, Value>;

/// Load and merge a dictionary from an ordered list of source files.
///
/// Missing files are skipped (a locale without a per-feature bundle is
/// normal); unparsable files are an error surfaced to the operator.
pub fn load_dictionary(sources: &[PathBuf]) -> Result<Dictionary, LocaleError> {
    let mut merged = Dictionary::new();
    for path in sources {
        if !path.exists() {
            continue;
        }
        let content = std::fs::read_to_string(path).map_err(|source| LocaleError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&content).map_err(|source| LocaleError::Json {
                path: path.clone(),
                source,
            })?;
        let Value::Object(table) = value else {
            return Err(LocaleError::NotAnObject(path.clone()));
        };
        merge_top_level(&mut merged, table);
    }
    Ok(merged)
}

/// Overlay `overlay` onto `base`, replacing at the top-level key.
fn merge_top_level(base: &mut Dictionary, overlay: Dictionary) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// Translation lookup bound to one locale's merged dictionary.
///
/// Cheap to clone (the dictionary is shared behind an `Arc`), which lets
/// template engines move a copy into registered helper functions.
#[derive(Debug, Clone)]
pub struct Translator {
    locale: String,
    dictionary: Arc<Dictionary>,
}

impl Translator {
    pub fn new(locale: &str, dictionary: Arc<Dictionary>) -> Self {
        Self {
            locale: locale.to_string(),
            dictionary,
        }
    }

    /// The locale this translator resolves against.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Resolve a dotted key (`nav.home`) to its string value.
    ///
    /// Falls back to the literal key when any path segment is missing or
    /// the final value is not a string.
    pub fn lookup(&self, key: &str) -> String {
        let mut segments = key.split('.');
        let mut current = match segments.next().and_then(|s| self.dictionary.get(s)) {
            Some(value) => value,
            None => return key.to_string(),
        };
        for segment in segments {
            match current.as_object().and_then(|o| o.get(segment)) {
                Some(value) => current = value,
                None => return key.to_string(),
            }
        }
        match current {
            Value::String(s) => s.clone(),
            _ => key.to_string(),
        }
    }
}

/// The ordered dictionary source list for one locale.
///
/// `feature_dirs` are the feature directory names in manifest (id) order,
/// so bundle precedence is deterministic across builds.
pub fn dictionary_sources(
    locales_dir: &Path,
    features_dir: &Path,
    feature_dirs: &[String],
    locale: &str,
) -> Vec<PathBuf> {
    let mut sources = vec![
        locales_dir.join("base.json"),
        locales_dir.join(format!("{locale}.json")),
    ];
    for dir in feature_dirs {
        sources.push(
            features_dir
                .join(dir)
                .join("locales")
                .join(format!("{locale}.json")),
        );
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dict(pairs: &[(&str, Value)]) -> Arc<Dictionary> {
        let mut map = Dictionary::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Arc::new(map)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[test]
    fn flat_key_resolves() {
        let t = Translator::new("en", dict(&[("hello", Value::String("Hello".into()))]));
        assert_eq!(t.lookup("hello"), "Hello");
    }

    #[test]
    fn dotted_key_resolves() {
        let t = Translator::new(
            "en",
            dict(&[("nav", serde_json::json!({"home": "Home", "tools": "Tools"}))]),
        );
        assert_eq!(t.lookup("nav.home"), "Home");
        assert_eq!(t.lookup("nav.tools"), "Tools");
    }

    #[test]
    fn deep_key_resolves() {
        let t = Translator::new(
            "en",
            dict(&[("a", serde_json::json!({"b": {"c": "deep"}}))]),
        );
        assert_eq!(t.lookup("a.b.c"), "deep");
    }

    #[test]
    fn missing_key_returns_key() {
        let t = Translator::new("en", dict(&[]));
        assert_eq!(t.lookup("nav.missing"), "nav.missing");
    }

    #[test]
    fn missing_intermediate_segment_returns_key() {
        let t = Translator::new("en", dict(&[("nav", serde_json::json!({"home": "Home"}))]));
        assert_eq!(t.lookup("nav.tools.title"), "nav.tools.title");
    }

    #[test]
    fn non_string_leaf_returns_key() {
        let t = Translator::new("en", dict(&[("nav", serde_json::json!({"count": 3}))]));
        assert_eq!(t.lookup("nav.count"), "nav.count");
        assert_eq!(t.lookup("nav"), "nav");
    }

    #[test]
    fn translator_reports_locale() {
        let t = Translator::new("vi", dict(&[]));
        assert_eq!(t.locale(), "vi");
    }

    // =========================================================================
    // Merging
    // =========================================================================

    fn write_json(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn later_source_wins_at_top_level() {
        let tmp = TempDir::new().unwrap();
        let base = write_json(&tmp, "base.json", r#"{"nav": {"home": "Home"}}"#);
        let vi = write_json(&tmp, "vi.json", r#"{"nav": {"home": "Trang chủ"}}"#);

        let merged = load_dictionary(&[base, vi]).unwrap();
        let t = Translator::new("vi", Arc::new(merged));
        assert_eq!(t.lookup("nav.home"), "Trang chủ");
    }

    #[test]
    fn top_level_replacement_is_not_a_deep_merge() {
        let tmp = TempDir::new().unwrap();
        let base = write_json(
            &tmp,
            "base.json",
            r#"{"nav": {"home": "Home", "tools": "Tools"}}"#,
        );
        let vi = write_json(&tmp, "vi.json", r#"{"nav": {"home": "Trang chủ"}}"#);

        let merged = load_dictionary(&[base, vi]).unwrap();
        let t = Translator::new("vi", Arc::new(merged));
        // The whole `nav` subtree was replaced, so `tools` is gone.
        assert_eq!(t.lookup("nav.tools"), "nav.tools");
    }

    #[test]
    fn untouched_top_level_keys_survive() {
        let tmp = TempDir::new().unwrap();
        let base = write_json(&tmp, "base.json", r#"{"site": {"name": "Calc"}}"#);
        let vi = write_json(&tmp, "vi.json", r#"{"nav": {"home": "Trang chủ"}}"#);

        let merged = load_dictionary(&[base, vi]).unwrap();
        let t = Translator::new("vi", Arc::new(merged));
        assert_eq!(t.lookup("site.name"), "Calc");
        assert_eq!(t.lookup("nav.home"), "Trang chủ");
    }

    #[test]
    fn missing_sources_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let base = write_json(&tmp, "base.json", r#"{"x": "y"}"#);
        let absent = tmp.path().join("nope.json");

        let merged = load_dictionary(&[absent, base]).unwrap();
        assert_eq!(merged.get("x").and_then(|v| v.as_str()), Some("y"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let bad = write_json(&tmp, "bad.json", "{ not json");
        assert!(matches!(
            load_dictionary(&[bad]),
            Err(LocaleError::Json { .. })
        ));
    }

    #[test]
    fn non_object_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let bad = write_json(&tmp, "list.json", "[1, 2, 3]");
        assert!(matches!(
            load_dictionary(&[bad]),
            Err(LocaleError::NotAnObject(_))
        ));
    }

    // =========================================================================
    // Source ordering
    // =========================================================================

    #[test]
    fn sources_ordered_base_then_locale_then_features() {
        let sources = dictionary_sources(
            Path::new("site/locales"),
            Path::new("site/features"),
            &["bmi".to_string(), "loan".to_string()],
            "vi",
        );
        let rendered: Vec<String> = sources
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "site/locales/base.json",
                "site/locales/vi.json",
                "site/features/bmi/locales/vi.json",
                "site/features/loan/locales/vi.json",
            ]
        );
    }
}
