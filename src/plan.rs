//! The rebuild planner: traversal, change decisions, and the render loop.
//!
//! Walks each page source root — the generic `pages/` tree and the
//! `features/` tree, each a tagged [`SourceRoot`] establishing its own
//! relative-path base — and decides per page whether a rebuild is required:
//!
//! ```text
//! must_rebuild = own file changed
//!              OR any include changed
//!              OR any global data/locale file changed
//!              OR any feature manifest/bundle changed
//! ```
//!
//! A page that must rebuild is rendered for **every** configured locale.
//! Its digest is committed to the cache only when all locale renders (and
//! writes) succeeded; a partial failure leaves the cache entry untouched so
//! the next build retries the whole page. A page that succeeded is never
//! re-rendered merely because a sibling failed — that is the point of the
//! check/commit split.
//!
//! Traversal order is deterministic (sorted) for log readability only;
//! correctness does not depend on any ordering between pages.

use crate::cache;
use crate::config::SiteLayout;
use crate::generate::BuildContext;
use crate::render::Composer;
use crate::types::{PageDescriptor, RootKind, SourceRoot};
use crate::write;
use std::path::{Component, Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension identifying page templates.
pub const TEMPLATE_EXTENSION: &str = "tera";

/// The page source roots present in this site.
pub fn source_roots(layout: &SiteLayout) -> Vec<SourceRoot> {
    let mut roots = Vec::new();
    if layout.pages_dir.is_dir() {
        roots.push(SourceRoot {
            kind: RootKind::Pages,
            base: layout.pages_dir.clone(),
        });
    }
    if layout.features_dir.is_dir() {
        roots.push(SourceRoot {
            kind: RootKind::Features,
            base: layout.features_dir.clone(),
        });
    }
    roots
}

/// Discover every leaf template under a root.
///
/// In the features tree, `locales/` and `assets/` subtrees belong to the
/// aggregator and the asset pipeline respectively, not to page traversal.
pub fn collect_pages(root: &SourceRoot) -> Vec<PageDescriptor> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(&root.base)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path
            .extension()
            .map(|e| e != TEMPLATE_EXTENSION)
            .unwrap_or(true)
        {
            continue;
        }
        let Ok(relative) = path.strip_prefix(&root.base) else {
            continue;
        };
        if root.kind == RootKind::Features && in_reserved_subtree(relative) {
            continue;
        }
        let feature_dir = match root.kind {
            RootKind::Features => first_directory(relative),
            RootKind::Pages => None,
        };
        pages.push(PageDescriptor {
            source: path.to_path_buf(),
            relative: relative.to_path_buf(),
            kind: root.kind,
            feature_dir,
            must_rebuild: false,
        });
    }
    pages
}

/// True when a feature-relative path sits under `locales/` or `assets/`.
fn in_reserved_subtree(relative: &Path) -> bool {
    relative
        .components()
        .skip(1) // the feature directory itself
        .any(|c| matches!(c, Component::Normal(n) if n == "locales" || n == "assets"))
}

/// First directory component of a relative path, if the path has one.
fn first_directory(relative: &Path) -> Option<String> {
    let mut components = relative.components();
    let first = components.next()?;
    components.next()?;
    Some(first.as_os_str().to_string_lossy().to_string())
}

/// Walk every root, decide, render, write, and commit.
pub fn run(ctx: &mut BuildContext) {
    for root in source_roots(&ctx.layout) {
        for mut desc in collect_pages(&root) {
            process_page(ctx, &mut desc);
        }
    }
}

fn process_page(ctx: &mut BuildContext, desc: &mut PageDescriptor) {
    let key = desc.cache_key();
    let digest = cache::digest_file(&desc.source).ok();
    let file_changed = match &digest {
        Some(d) => ctx.cache.peek(&key, d),
        // A vanished source forces regeneration rather than a silent skip.
        None => true,
    };
    desc.must_rebuild = file_changed || ctx.snapshot.any_global_changed();

    if !desc.must_rebuild {
        debug!(page = %desc.name(), "up to date");
        ctx.report.record_skipped(desc);
        return;
    }

    let source = match std::fs::read_to_string(&desc.source) {
        Ok(s) => s,
        Err(e) => {
            warn!(page = %desc.name(), error = %e, "page source unreadable");
            for locale in ctx.snapshot.config.locales.clone() {
                ctx.report
                    .record_failure(desc.name(), &locale, format!("source unreadable: {e}"));
            }
            ctx.report.record_failed(desc);
            return;
        }
    };

    let composer = Composer {
        snapshot: &ctx.snapshot,
        engine: ctx.engine,
        layout_source: ctx.layout_source.as_deref(),
        output_root: &ctx.options.output,
        assets: &ctx.assets,
    };

    let locales = ctx.snapshot.config.locales.clone();
    let mut all_ok = true;
    for locale in &locales {
        match composer.compose(desc, &source, locale, &mut ctx.asset_hashes) {
            Ok(page) => {
                match write::write_page(&ctx.options.output, &page.output_relative, &page.html) {
                    Ok(()) => ctx.report.renders += 1,
                    Err(e) => {
                        all_ok = false;
                        warn!(page = %desc.name(), locale = %locale, error = %e, "page write failed");
                        ctx.report
                            .record_failure(desc.name(), locale, format!("write failed: {e}"));
                    }
                }
            }
            Err(e) => {
                all_ok = false;
                warn!(page = %desc.name(), locale = %locale, error = %e, "render failed");
                ctx.report
                    .record_failure(desc.name(), locale, e.to_string());
            }
        }
    }

    if all_ok {
        // The page retries next build unless every locale landed.
        if let Some(d) = digest {
            ctx.cache.commit(&key, d);
        }
        ctx.report.record_rendered(desc);
    } else {
        ctx.report.record_failed(desc);
    }
}
