//! Content hashing and the persisted build cache.
//!
//! Rendering every page for every locale on every build would make the edit
//! loop unbearable on a site with hundreds of pages. This module lets the
//! planner and the asset pipeline skip work whose inputs haven't changed
//! since the last successful build.
//!
//! # Design
//!
//! The cache is a flat mapping from **cache key** to **content digest**.
//! Keys are namespaced strings (`page/guides/rounding.tera`,
//! `include/layout.tera`, `config/loan-interest/feature.toml`, ...) built by
//! [`cache_key`], so a config file and a page file with the same relative
//! path can never collide. Digests are SHA-256 of file contents —
//! content-based rather than mtime-based so caching survives `git checkout`
//! (which resets modification times).
//!
//! ## Two-phase check/commit
//!
//! The cache deliberately exposes a *pair* of operations instead of a single
//! "check and record" call:
//!
//! - [`BuildCache::peek`] answers "did this change?" without mutating
//!   anything.
//! - [`BuildCache::commit`] records a digest once the caller's unit of work
//!   has actually succeeded.
//!
//! A page is only committed after **all** of its locale renders succeed; a
//! shared include is only committed after every page that depended on it has
//! been rebuilt. Collapsing the two calls into one would mark inputs as
//! "seen" before the work they gate has happened, and a failed render would
//! never be retried on the next run.
//!
//! ## Storage
//!
//! The cache is a JSON file at `<output_dir>/.build-cache.json` with a
//! `_version` stamp. It lives in the output directory so it travels with the
//! built site when CI caches `dist/`. A missing file, unparsable file, or
//! version mismatch all load as an empty cache — equivalent to a full
//! rebuild, never an error. The file is rewritten once, at the very end of a
//! build, via a temp-file + rename so a crash mid-build leaves the previous
//! cache intact.
//!
//! ## Bypassing the cache
//!
//! `--force` loads an empty cache *and* makes every [`BuildCache::peek`]
//! report "changed" without comparing digests, so a forced build regenerates
//! everything while still committing fresh digests for the next run.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache file within the output directory.
const CACHE_FILENAME: &str = ".build-cache.json";

/// Version stamp recorded in the cache file. A release that changes key
/// layout or digest inputs bumps the package version and thereby invalidates
/// every existing cache.
pub const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// On-disk shape of the cache file.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CacheFile {
    #[serde(rename = "_version")]
    version: String,
    entries: BTreeMap<String, String>,
}

/// Persisted key→digest mapping driving all change detection.
///
/// Invariant: a key present in the cache always holds the digest of the
/// source file *as it existed the last time that file was successfully
/// processed* — not merely the last time it was looked at.
#[derive(Debug)]
pub struct BuildCache {
    entries: BTreeMap<String, String>,
    force: bool,
}

impl BuildCache {
    /// Create an empty cache (first build, `--force`, or load failure).
    pub fn empty(force: bool) -> Self {
        Self {
            entries: BTreeMap::new(),
            force,
        }
    }

    /// Load from the output directory.
    ///
    /// Returns an empty cache if the file doesn't exist, can't be parsed, or
    /// carries a different version stamp. With `force` set the file is not
    /// even read.
    pub fn load(output_dir: &Path, force: bool) -> Self {
        Self::load_with_version(output_dir, force, CACHE_VERSION)
    }

    /// Version-parameterized variant of [`BuildCache::load`].
    pub fn load_with_version(output_dir: &Path, force: bool, version: &str) -> Self {
        if force {
            return Self::empty(true);
        }
        let path = output_dir.join(CACHE_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(false),
        };
        let file: CacheFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(_) => return Self::empty(false),
        };
        if file.version != version {
            return Self::empty(false);
        }
        Self {
            entries: file.entries,
            force: false,
        }
    }

    /// Persist to the output directory, atomically.
    ///
    /// Written via a temp file + rename so an interrupted build never leaves
    /// a half-written cache behind; the previous file stays authoritative
    /// until the rename lands.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        self.save_with_version(output_dir, CACHE_VERSION)
    }

    /// Version-parameterized variant of [`BuildCache::save`].
    pub fn save_with_version(&self, output_dir: &Path, version: &str) -> io::Result<()> {
        let file = CacheFile {
            version: version.to_string(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let path = output_dir.join(CACHE_FILENAME);
        let tmp = output_dir.join(format!("{CACHE_FILENAME}.tmp"));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)
    }

    /// Query whether `digest` differs from the recorded digest for `key`.
    ///
    /// Never mutates the cache. Under `--force` every key reports changed.
    pub fn peek(&self, key: &str, digest: &str) -> bool {
        if self.force {
            return true;
        }
        self.entries.get(key).map(String::as_str) != Some(digest)
    }

    /// Record `digest` for `key`.
    ///
    /// Call only after the unit of work gated by this key has fully
    /// succeeded; see the module docs for why this is split from
    /// [`BuildCache::peek`].
    pub fn commit(&mut self, key: &str, digest: String) {
        self.entries.insert(key.to_string(), digest);
    }

    /// Whether this cache was loaded under `--force`.
    pub fn is_forced(&self) -> bool {
        self.force
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a key has a recorded digest.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Build a cache key from a namespace prefix and a path relative to the
/// source root. Separators are normalized to `/` so keys are identical
/// across platforms.
pub fn cache_key(namespace: &str, relative: &Path) -> String {
    let mut key = String::from(namespace);
    for (i, component) in relative.components().enumerate() {
        if i > 0 {
            key.push('/');
        }
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    key
}

/// SHA-256 digest of a byte slice, as a hex string.
pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 digest of a file's contents, as a hex string.
///
/// Callers treat an `Err` (missing or unreadable file) as "changed" so a
/// vanished source forces regeneration instead of silently skipping.
pub fn digest_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(digest_bytes(&bytes))
}

/// Resolve the cache file path for an output directory.
pub fn cache_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_FILENAME)
}
