//! Build orchestration.
//!
//! Wires the whole pipeline together, in order:
//!
//! 1. Load the build cache (forced-empty under `--force`, which also clears
//!    the output directory first).
//! 2. Collect the [`Snapshot`] — manifests, dictionaries, global data, and
//!    the three global change flags (peek-only).
//! 3. Run the asset pipeline (assets commit digests immediately).
//! 4. Run the rebuild planner over both page roots.
//! 5. Emit root artifacts and the root redirect.
//! 6. Commit the global-dependency digests **only if no page failed**, then
//!    flush the cache file once, atomically.
//!
//! The deferred cache flush makes the cache file a commit record: a crash
//! anywhere before step 6 leaves the previous build's cache on disk, so the
//! next run conservatively re-evaluates everything the interrupted run
//! touched.
//!
//! All state lives in one [`BuildContext`] threaded through the components
//! — no module-level globals — so tests construct a fresh pipeline per
//! case.

use crate::assets::{self, AssetHashCache, EmittedAsset};
use crate::cache::BuildCache;
use crate::config::SiteLayout;
use crate::plan;
use crate::render::{EngineError, LAYOUT_FILE, TemplateEngine};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::types::PageDescriptor;
use crate::write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Source directory not found: {}", .0.display())]
    SourceMissing(PathBuf),
}

/// Operator-facing build parameters.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Site source directory.
    pub source: PathBuf,
    /// Output directory.
    pub output: PathBuf,
    /// Strong asset transforms (obfuscation) requested.
    pub secure: bool,
    /// Bypass all change detection and clear the output directory first.
    pub force: bool,
}

/// What happened to one page this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    Rendered,
    Skipped,
    Failed,
}

/// Per-page outcome line for the report.
#[derive(Debug)]
pub struct PageOutcome {
    pub page: String,
    pub action: PageAction,
}

/// One failed (page, locale) render.
#[derive(Debug)]
pub struct RenderFailure {
    pub page: String,
    pub locale: String,
    pub reason: String,
}

/// Aggregated result of a build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub pages: Vec<PageOutcome>,
    pub failures: Vec<RenderFailure>,
    /// Successful (page, locale) renders.
    pub renders: usize,
    pub pages_skipped: usize,
    pub assets_transformed: usize,
    pub assets_skipped: usize,
    pub artifacts_written: usize,
    pub redirect_written: bool,
}

impl BuildReport {
    pub fn record_skipped(&mut self, desc: &PageDescriptor) {
        self.pages_skipped += 1;
        self.pages.push(PageOutcome {
            page: desc.name(),
            action: PageAction::Skipped,
        });
    }

    pub fn record_rendered(&mut self, desc: &PageDescriptor) {
        self.pages.push(PageOutcome {
            page: desc.name(),
            action: PageAction::Rendered,
        });
    }

    pub fn record_failed(&mut self, desc: &PageDescriptor) {
        self.pages.push(PageOutcome {
            page: desc.name(),
            action: PageAction::Failed,
        });
    }

    pub fn record_failure(&mut self, page: String, locale: &str, reason: String) {
        self.failures.push(RenderFailure {
            page,
            locale: locale.to_string(),
            reason,
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// The single mutable value threaded through every component of a build.
pub struct BuildContext<'a> {
    pub options: &'a BuildOptions,
    pub layout: SiteLayout,
    pub snapshot: Snapshot,
    pub cache: BuildCache,
    pub engine: &'a dyn TemplateEngine,
    /// Source of `includes/layout.tera`, when present.
    pub layout_source: Option<String>,
    /// Assets that exist in the output tree after the pipeline ran.
    pub assets: Vec<EmittedAsset>,
    pub asset_hashes: AssetHashCache,
    pub report: BuildReport,
}

/// Run a full build.
///
/// Per-page and per-asset failures are recorded in the report; only
/// orchestration-level problems (unreadable source root, output I/O,
/// snapshot aggregation) surface as an error.
pub fn build(options: &BuildOptions, engine: &dyn TemplateEngine) -> Result<BuildReport, BuildError> {
    let layout = SiteLayout::new(&options.source);
    if !layout.root.is_dir() {
        return Err(BuildError::SourceMissing(options.source.clone()));
    }

    if options.force && options.output.exists() {
        info!(output = %options.output.display(), "force: clearing output directory");
        std::fs::remove_dir_all(&options.output)?;
    }
    std::fs::create_dir_all(&options.output)?;

    let mut cache = BuildCache::load(&options.output, options.force);
    let snapshot = Snapshot::collect(&layout, &cache)?;
    let layout_source = read_layout_source(&layout);

    let asset_outcome = assets::process_assets(
        &layout,
        &snapshot.features,
        &options.output,
        options.secure,
        &mut cache,
    );

    let mut ctx = BuildContext {
        options,
        layout,
        snapshot,
        cache,
        engine,
        layout_source,
        assets: asset_outcome.emitted,
        asset_hashes: AssetHashCache::new(),
        report: BuildReport::default(),
    };
    ctx.report.assets_transformed = asset_outcome.transformed;
    ctx.report.assets_skipped = asset_outcome.skipped;

    plan::run(&mut ctx);
    write::emit_root_artifacts(&mut ctx);

    match write::write_root_redirect(
        &ctx.options.output,
        &ctx.snapshot.config.default_locale,
        ctx.options.force,
    ) {
        Ok(written) => ctx.report.redirect_written = written,
        Err(e) => warn!(error = %e, "root redirect write failed"),
    }

    if ctx.report.has_failures() {
        warn!(
            failures = ctx.report.failures.len(),
            "withholding global-dependency commits so failed pages retry next build"
        );
    } else {
        ctx.snapshot.commit_globals(&mut ctx.cache);
    }

    ctx.cache.save(&ctx.options.output)?;
    Ok(ctx.report)
}

/// Read the shared layout template, if the site has one. An unreadable
/// layout is logged and treated as absent — pages then ship unwrapped.
fn read_layout_source(layout: &SiteLayout) -> Option<String> {
    let path = layout.includes_dir.join(LAYOUT_FILE);
    if !path.is_file() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(source) => Some(source),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "layout unreadable, rendering pages bare");
            None
        }
    }
}
