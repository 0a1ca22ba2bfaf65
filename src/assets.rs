//! The asset pipeline: transform, fingerprint, and cache-bust CSS/JS.
//!
//! Every stylesheet and script — global (`assets/`) or per-feature
//! (`features/<dir>/assets/`) — is transformed into the output tree
//! independently, driven by the same change-detection contract as pages.
//! Unlike pages, assets commit their digest immediately: each one is a
//! self-contained unit of work with no cross-asset dependency.
//!
//! ## Transform strength and fallback
//!
//! The `--secure` build mode asks for the strongest transform; failure
//! falls back to the next-weaker one, logged but never fatal:
//!
//! ```text
//! scripts:      terser (external, --compress --mangle) → line-comment strip → raw copy
//! stylesheets:  lightningcss minify → raw copy
//! ```
//!
//! The `terser` call is a blocking shell-out; a machine without node
//! tooling simply degrades to the internal minifier. Plain builds skip the
//! shell-out entirely.
//!
//! ## Fingerprinting
//!
//! Cache-busting fingerprints are computed from the **destination** bytes,
//! not the source — whatever transform path was taken, the fingerprint
//! reflects exactly what will be served. [`AssetHashCache`] computes them
//! lazily the first time a page references an asset and memoizes for the
//! rest of the build.

use crate::cache::{self, BuildCache};
use crate::config::{FeatureManifest, SiteLayout};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Asset classification by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Stylesheet,
    Script,
}

impl AssetKind {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "css" => Some(AssetKind::Stylesheet),
            "js" => Some(AssetKind::Script),
            _ => None,
        }
    }
}

/// One asset that exists in the output tree after the pipeline ran.
#[derive(Debug, Clone)]
pub struct EmittedAsset {
    /// Output-relative path, forward slashes.
    pub out_rel: String,
    pub kind: AssetKind,
    /// Owning feature directory for per-feature assets.
    pub feature_dir: Option<String>,
}

/// A discovered asset source awaiting processing.
#[derive(Debug)]
struct AssetSource {
    source: PathBuf,
    out_rel: String,
    kind: AssetKind,
    feature_dir: Option<String>,
}

/// Pipeline result: what exists in the output, and how much work was done.
#[derive(Debug, Default)]
pub struct AssetOutcome {
    pub emitted: Vec<EmittedAsset>,
    pub transformed: usize,
    pub skipped: usize,
}

/// Run the pipeline over every discovered asset.
///
/// Failures are logged and the offending asset skipped; the build never
/// aborts here.
pub fn process_assets(
    layout: &SiteLayout,
    features: &[FeatureManifest],
    output_root: &Path,
    secure: bool,
    cache: &mut BuildCache,
) -> AssetOutcome {
    let mut outcome = AssetOutcome::default();

    for asset in discover_assets(layout, features) {
        let key = format!("asset/{}", asset.out_rel);
        let changed = match cache::digest_file(&asset.source) {
            Ok(digest) => {
                let changed = cache.peek(&key, &digest);
                // Assets commit immediately: no cross-asset dependency.
                cache.commit(&key, digest);
                changed
            }
            Err(e) => {
                warn!(asset = %asset.out_rel, error = %e, "asset source unreadable, treating as changed");
                true
            }
        };

        let dest = output_root.join(&asset.out_rel);
        if !changed && dest.exists() {
            outcome.skipped += 1;
            outcome.emitted.push(asset.into_emitted());
            continue;
        }

        match transform_asset(&asset.source, &dest, asset.kind, secure) {
            Ok(label) => {
                debug!(asset = %asset.out_rel, transform = label, "asset written");
                outcome.transformed += 1;
                outcome.emitted.push(asset.into_emitted());
            }
            Err(e) => {
                warn!(asset = %asset.out_rel, error = %e, "asset write failed, skipping");
            }
        }
    }

    outcome
}

impl AssetSource {
    fn into_emitted(self) -> EmittedAsset {
        EmittedAsset {
            out_rel: self.out_rel,
            kind: self.kind,
            feature_dir: self.feature_dir,
        }
    }
}

/// Enumerate global and per-feature asset sources, deterministically
/// ordered. Global assets keep their path under `assets/`; feature assets
/// land at `assets/<feature dir>/…` so URLs stay locale-independent.
fn discover_assets(layout: &SiteLayout, features: &[FeatureManifest]) -> Vec<AssetSource> {
    let mut sources = Vec::new();

    for entry in walk_files(&layout.assets_dir) {
        if let Some(kind) = AssetKind::from_path(&entry)
            && let Ok(rel) = entry.strip_prefix(&layout.assets_dir)
        {
            sources.push(AssetSource {
                out_rel: format!("assets/{}", slashed(rel)),
                source: entry,
                kind,
                feature_dir: None,
            });
        }
    }

    for feature in features {
        let dir = layout.features_dir.join(&feature.dir_name).join("assets");
        for entry in walk_files(&dir) {
            if let Some(kind) = AssetKind::from_path(&entry)
                && let Ok(rel) = entry.strip_prefix(&dir)
            {
                sources.push(AssetSource {
                    out_rel: format!("assets/{}/{}", feature.dir_name, slashed(rel)),
                    source: entry,
                    kind,
                    feature_dir: Some(feature.dir_name.clone()),
                });
            }
        }
    }

    sources.sort_by(|a, b| a.out_rel.cmp(&b.out_rel));
    sources
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn slashed(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

// ============================================================================
// Transforms
// ============================================================================

/// Transform one asset into its destination, strongest-first with fallback.
/// Returns a label describing which transform actually ran.
fn transform_asset(
    source_path: &Path,
    dest: &Path,
    kind: AssetKind,
    secure: bool,
) -> io::Result<&'static str> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let source = std::fs::read_to_string(source_path)?;

    let (output, label) = match kind {
        AssetKind::Stylesheet => match minify_css(&source) {
            Ok(css) => (css, "minified"),
            Err(e) => {
                warn!(asset = %source_path.display(), error = %e, "CSS minify failed, copying raw");
                (source, "copied")
            }
        },
        AssetKind::Script => {
            if secure {
                match obfuscate_js(&source) {
                    Ok(js) => (js, "obfuscated"),
                    Err(e) => {
                        warn!(asset = %source_path.display(), error = %e, "obfuscation failed, falling back to minify");
                        (strip_js(&source), "minified")
                    }
                }
            } else {
                (strip_js(&source), "minified")
            }
        }
    };

    std::fs::write(dest, output)?;
    Ok(label)
}

/// Minify a stylesheet with lightningcss: parse → minify → print.
fn minify_css(source: &str) -> Result<String, String> {
    let mut stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| format!("CSS parse error: {e:?}"))?;
    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| format!("CSS minify error: {e:?}"))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| format!("CSS print error: {e:?}"))?;
    Ok(result.code)
}

/// Obfuscate a script by piping it through `terser`.
///
/// Blocking call; any spawn, pipe, or exit failure is reported as an error
/// so the caller can fall back.
fn obfuscate_js(source: &str) -> Result<String, String> {
    let mut child = Command::new("terser")
        .args(["--compress", "--mangle"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn terser: {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(source.as_bytes())
            .map_err(|e| format!("failed to write to terser: {e}"))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("terser did not finish: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "terser exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    String::from_utf8(output.stdout).map_err(|e| format!("terser produced non-UTF-8: {e}"))
}

/// Light script minification: drop whole-line comments and blank lines,
/// trim trailing whitespace. Deliberately conservative — anything smarter
/// belongs to the obfuscation path.
fn strip_js(source: &str) -> String {
    source
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with("//")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Fingerprinting
// ============================================================================

/// Length of the cache-busting fingerprint, in hex characters.
const FINGERPRINT_LEN: usize = 8;

/// Build-scoped memo of output-asset fingerprints.
///
/// Populated lazily on first reference; an asset whose destination can't be
/// read memoizes `None` so its URL is emitted without a version parameter
/// instead of being re-probed for every page.
#[derive(Debug, Default)]
pub struct AssetHashCache {
    fingerprints: HashMap<String, Option<String>>,
}

impl AssetHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint of the built asset at `out_rel`, from destination bytes.
    pub fn fingerprint(&mut self, output_root: &Path, out_rel: &str) -> Option<String> {
        if let Some(memoized) = self.fingerprints.get(out_rel) {
            return memoized.clone();
        }
        let fingerprint = match std::fs::read(output_root.join(out_rel)) {
            Ok(bytes) => {
                let digest = cache::digest_bytes(&bytes);
                Some(digest[..FINGERPRINT_LEN].to_string())
            }
            Err(e) => {
                debug!(asset = out_rel, error = %e, "no built asset to fingerprint");
                None
            }
        };
        self.fingerprints
            .insert(out_rel.to_string(), fingerprint.clone());
        fingerprint
    }

    /// Page-relative URL for an asset, with a cache-busting `?v=` parameter
    /// when the built file exists.
    pub fn url(&mut self, output_root: &Path, root_path: &str, out_rel: &str) -> String {
        match self.fingerprint(output_root, out_rel) {
            Some(fp) => format!("{root_path}{out_rel}?v={fp}"),
            None => format!("{root_path}{out_rel}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::site_fixture;
    use std::fs;
    use tempfile::TempDir;

    fn run(site: &Path, out: &Path, secure: bool, cache: &mut BuildCache) -> AssetOutcome {
        let layout = SiteLayout::new(site);
        let features = crate::config::discover_features(&layout.features_dir).unwrap();
        process_assets(&layout, &features, out, secure, cache)
    }

    // =========================================================================
    // Discovery and output layout
    // =========================================================================

    #[test]
    fn global_and_feature_assets_are_emitted() {
        let site = site_fixture();
        let out = TempDir::new().unwrap();
        let mut cache = BuildCache::empty(false);

        let outcome = run(site.path(), out.path(), false, &mut cache);
        let rels: Vec<&str> = outcome.emitted.iter().map(|a| a.out_rel.as_str()).collect();
        assert!(rels.contains(&"assets/app.css"));
        assert!(rels.contains(&"assets/app.js"));
        assert!(rels.contains(&"assets/loan-interest/calc.js"));
        assert!(out.path().join("assets/app.css").exists());
        assert!(out.path().join("assets/loan-interest/calc.js").exists());
    }

    #[test]
    fn feature_assets_carry_their_owner() {
        let site = site_fixture();
        let out = TempDir::new().unwrap();
        let mut cache = BuildCache::empty(false);

        let outcome = run(site.path(), out.path(), false, &mut cache);
        let calc = outcome
            .emitted
            .iter()
            .find(|a| a.out_rel == "assets/loan-interest/calc.js")
            .unwrap();
        assert_eq!(calc.feature_dir.as_deref(), Some("loan-interest"));
        assert_eq!(calc.kind, AssetKind::Script);
    }

    // =========================================================================
    // Change detection
    // =========================================================================

    #[test]
    fn second_run_transforms_nothing() {
        let site = site_fixture();
        let out = TempDir::new().unwrap();
        let mut cache = BuildCache::empty(false);

        let first = run(site.path(), out.path(), false, &mut cache);
        assert!(first.transformed > 0);
        assert_eq!(first.skipped, 0);

        let second = run(site.path(), out.path(), false, &mut cache);
        assert_eq!(second.transformed, 0);
        assert_eq!(second.skipped, first.transformed);
    }

    #[test]
    fn changed_source_is_retransformed() {
        let site = site_fixture();
        let out = TempDir::new().unwrap();
        let mut cache = BuildCache::empty(false);
        run(site.path(), out.path(), false, &mut cache);

        fs::write(site.path().join("assets/app.css"), "body { color: #000000 }").unwrap();
        let second = run(site.path(), out.path(), false, &mut cache);
        assert_eq!(second.transformed, 1);
    }

    #[test]
    fn missing_destination_is_rebuilt_even_when_unchanged() {
        let site = site_fixture();
        let out = TempDir::new().unwrap();
        let mut cache = BuildCache::empty(false);
        run(site.path(), out.path(), false, &mut cache);

        fs::remove_file(out.path().join("assets/app.css")).unwrap();
        let second = run(site.path(), out.path(), false, &mut cache);
        assert_eq!(second.transformed, 1);
        assert!(out.path().join("assets/app.css").exists());
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    #[test]
    fn css_is_minified() {
        let out = minify_css("body {\n  color: #ffffff;\n}\n").unwrap();
        assert!(out.len() < "body { color: #ffffff; }".len());
        assert!(!out.contains('\n'));
    }

    #[test]
    fn invalid_css_falls_back_to_raw_copy() {
        let site = site_fixture();
        let out = TempDir::new().unwrap();
        let mut cache = BuildCache::empty(false);
        let broken = "?? { color: red; }";
        fs::write(site.path().join("assets/app.css"), broken).unwrap();

        run(site.path(), out.path(), false, &mut cache);
        let written = fs::read_to_string(out.path().join("assets/app.css")).unwrap();
        assert_eq!(written, broken);
    }

    #[test]
    fn strip_js_drops_comment_and_blank_lines() {
        let out = strip_js("// header\n\nlet a = 1;  \n  // note\nlet b = 2;\n");
        assert_eq!(out, "let a = 1;\nlet b = 2;");
    }

    #[test]
    fn strip_js_keeps_inline_comment_lines_intact() {
        // A trailing comment may sit after real code inside a string or URL;
        // the light minifier leaves such lines alone.
        let out = strip_js("let url = \"https://example.com\"; // keep\n");
        assert!(out.contains("https://example.com"));
    }

    #[test]
    fn secure_mode_always_produces_output() {
        // terser may or may not exist on this machine; either way the
        // fallback chain must end with a written destination.
        let site = site_fixture();
        let out = TempDir::new().unwrap();
        let mut cache = BuildCache::empty(false);

        run(site.path(), out.path(), true, &mut cache);
        assert!(out.path().join("assets/app.js").exists());
        assert!(out.path().join("assets/loan-interest/calc.js").exists());
    }

    // =========================================================================
    // Fingerprinting
    // =========================================================================

    #[test]
    fn fingerprint_matches_destination_bytes() {
        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("assets")).unwrap();
        fs::write(out.path().join("assets/app.css"), "body{}").unwrap();

        let mut hashes = AssetHashCache::new();
        let fp = hashes.fingerprint(out.path(), "assets/app.css").unwrap();
        assert_eq!(fp, &cache::digest_bytes(b"body{}")[..FINGERPRINT_LEN]);
    }

    #[test]
    fn fingerprint_is_memoized() {
        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("assets")).unwrap();
        fs::write(out.path().join("assets/app.css"), "body{}").unwrap();

        let mut hashes = AssetHashCache::new();
        let first = hashes.fingerprint(out.path(), "assets/app.css");
        // Deleting the file doesn't change the memoized answer.
        fs::remove_file(out.path().join("assets/app.css")).unwrap();
        assert_eq!(hashes.fingerprint(out.path(), "assets/app.css"), first);
    }

    #[test]
    fn url_includes_version_parameter() {
        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("assets")).unwrap();
        fs::write(out.path().join("assets/app.css"), "body{}").unwrap();

        let mut hashes = AssetHashCache::new();
        let url = hashes.url(out.path(), "../", "assets/app.css");
        assert!(url.starts_with("../assets/app.css?v="));
        assert_eq!(url.len(), "../assets/app.css?v=".len() + FINGERPRINT_LEN);
    }

    #[test]
    fn url_without_built_file_has_no_version() {
        let out = TempDir::new().unwrap();
        let mut hashes = AssetHashCache::new();
        assert_eq!(
            hashes.url(out.path(), "../", "assets/missing.css"),
            "../assets/missing.css"
        );
    }
}
