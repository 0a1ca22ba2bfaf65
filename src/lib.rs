//! # Polysite
//!
//! An incremental multi-locale static site builder. Templated pages,
//! per-feature manifests, and translation dictionaries go in; a fully
//! localized tree of clean-URL HTML comes out — and repeat builds only redo
//! the work whose inputs actually changed.
//!
//! # Architecture: One Pass, One Context
//!
//! A build is a single synchronous pass over one explicit context value:
//!
//! ```text
//! 1. Snapshot   manifests + dictionaries + global change flags
//! 2. Assets     transform & fingerprint CSS/JS (independent units)
//! 3. Plan       walk page roots, decide per page, render × locales
//! 4. Emit       root artifacts + default-locale redirect
//! 5. Commit     global digests (only on a clean run), flush the cache
//! ```
//!
//! There is no parallelism and no shared mutable globals: the
//! [`generate::BuildContext`] is threaded through every component, which
//! keeps the pipeline trivially testable — construct a fresh context per
//! test and inspect the report.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`cache`] | SHA-256 content digests and the persisted build cache with its two-phase `peek`/`commit` contract |
//! | [`snapshot`] | Per-build aggregation: feature manifests, merged dictionaries, global data, and the three global change flags |
//! | [`config`] | `site.toml`, the source-tree layout, and `feature.toml` manifest discovery |
//! | [`locale`] | Ordered dictionary merging and the `t(dotted.key)` translator |
//! | [`plan`] | Tagged-root traversal and the per-page rebuild decision/render loop |
//! | [`render`] | The [`render::TemplateEngine`] seam, the Tera implementation, and page composition |
//! | [`assets`] | CSS/JS transforms with graceful fallback and destination-bytes fingerprinting |
//! | [`write`] | Output tree writes, the root redirect, and templated root artifacts |
//! | [`generate`] | Build orchestration, options, context, and the report |
//! | [`naming`] | The clean-URL output-path law and `root_path` computation |
//! | [`output`] | CLI report formatting — pure `format_*` functions plus `print_*` wrappers |
//! | [`types`] | Shared descriptors (`PageDescriptor`, `SourceRoot`) |
//!
//! # Design Decisions
//!
//! ## Content Hashes Over Mtimes
//!
//! Change detection compares SHA-256 digests of file contents, never
//! modification times. Checking out an old commit, re-saving an identical
//! file, or restoring from CI cache all leave digests — and therefore the
//! incremental build — unaffected.
//!
//! ## Two-Phase Cache Commits
//!
//! Every "did this change?" question is answered without touching the
//! cache; digests are recorded only after the dependent work succeeded. A
//! page whose Vietnamese render failed keeps its old cache entry and is
//! retried wholesale next build, while its successfully-built siblings are
//! not re-rendered. The same rule applies one level up: a changed include
//! is only marked "seen" after *every* page rebuilt against it.
//!
//! ## The Engine Is a Seam
//!
//! The builder never parses templates itself. It hands source text, a JSON
//! context, and a locale-bound translator to a [`render::TemplateEngine`]
//! and takes back an HTML string. Production uses Tera; the test suite
//! injects a recording mock, so every pipeline property — idempotence,
//! point invalidation, retry-on-failure — is asserted without template
//! syntax in the way.
//!
//! ## Failure Isolation
//!
//! A broken page template costs exactly that page. A missing `terser`
//! binary costs exactly the obfuscation step (the asset falls back to the
//! internal minifier, then to a raw copy). A corrupt cache file costs one
//! full rebuild. The only fatal errors are the ones nothing downstream
//! could absorb: an unreadable source root or output-directory I/O.
//!
//! ## Fingerprints From Built Bytes
//!
//! Cache-busting query parameters are derived from the bytes at the
//! asset's *output* path, computed lazily on first reference and memoized
//! per build. Whatever transform path an asset took, the fingerprint in
//! every page matches what will actually be served.

pub mod assets;
pub mod cache;
pub mod config;
pub mod generate;
pub mod locale;
pub mod naming;
pub mod output;
pub mod plan;
pub mod render;
pub mod snapshot;
pub mod types;
pub mod write;

#[cfg(test)]
pub(crate) mod test_helpers;
