//! Page composition and the template-engine seam.
//!
//! Rendering is backend-agnostic: the [`TemplateEngine`] trait is the only
//! thing the rest of the build knows about templating. The production
//! implementation is [`TeraEngine`]; tests inject a mock that records
//! renders and fails on demand, so pipeline logic is exercised without
//! depending on template syntax.
//!
//! ## Composition
//!
//! A page is rendered in two steps: the page body first, then the shared
//! `includes/layout.tera` with the body embedded as `content`. Both steps
//! see the same context:
//!
//! ```text
//! site       site.toml values (title, base_url, locales, default_locale)
//! data       data/*.json keyed by file stem
//! features   the sorted manifest list
//! feature    this page's own manifest (feature pages only)
//! page       locale, root_path, path, slug, category, output
//! assets     styles/scripts URL lists, fingerprinted
//! version    the build version string
//! t(key=…)   translation lookup bound to the page's locale
//! ```
//!
//! Any failure in either step is reported for that (page, locale) pair and
//! isolated by the planner; it never aborts the build.
//!
//! ## Categories
//!
//! Feature pages take their category from the feature manifest. Pages from
//! the generic tree fall back to a static directory→category table for
//! legacy sections that predate manifests.

use crate::assets::{AssetHashCache, AssetKind, EmittedAsset};
use crate::cache::CACHE_VERSION;
use crate::locale::Translator;
use crate::naming;
use crate::snapshot::Snapshot;
use crate::types::{PageDescriptor, RootKind};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Template name used when rendering the shared layout.
pub const LAYOUT_TEMPLATE: &str = "__layout";

/// File name of the shared layout inside `includes/`.
pub const LAYOUT_FILE: &str = "layout.tera";

/// Directory→category fallback for generic pages without a manifest.
const CATEGORY_FALLBACK: &[(&str, &str)] = &[
    ("guides", "Guides"),
    ("articles", "Articles"),
    ("legal", "Legal"),
];

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("context error: {0}")]
    Context(#[from] serde_json::Error),
    #[error("render failed: {0}")]
    Failed(String),
}

/// The external collaborator contract: source text + data → HTML string.
///
/// `name` identifies the template in diagnostics, `data` is the full JSON
/// context, and `translator` is bound to the locale being rendered.
pub trait TemplateEngine {
    fn render(
        &self,
        name: &str,
        source: &str,
        data: &Value,
        translator: &Translator,
    ) -> Result<String, EngineError>;
}

/// Tera-backed production engine.
///
/// Shared includes are loaded once at construction; every render gets a
/// fresh Tera instance with the includes, the page source, and a `t`
/// function bound to the render's translator.
pub struct TeraEngine {
    includes: Vec<(String, String)>,
}

impl TeraEngine {
    /// Load every file under the includes directory as a named template.
    /// An absent directory yields an engine without includes.
    pub fn from_dir(includes_dir: &Path) -> Result<Self, EngineError> {
        let mut includes = Vec::new();
        if includes_dir.is_dir() {
            for entry in WalkDir::new(includes_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let Ok(rel) = entry.path().strip_prefix(includes_dir) else {
                    continue;
                };
                let name = rel.to_string_lossy().replace('\\', "/");
                let source = std::fs::read_to_string(entry.path())?;
                includes.push((name, source));
            }
        }
        Ok(Self { includes })
    }

    /// An engine with no includes.
    pub fn empty() -> Self {
        Self {
            includes: Vec::new(),
        }
    }
}

impl TemplateEngine for TeraEngine {
    fn render(
        &self,
        name: &str,
        source: &str,
        data: &Value,
        translator: &Translator,
    ) -> Result<String, EngineError> {
        let mut tera = tera::Tera::default();
        let mut templates: Vec<(&str, &str)> = self
            .includes
            .iter()
            .map(|(n, s)| (n.as_str(), s.as_str()))
            .collect();
        templates.push((name, source));
        tera.add_raw_templates(templates)?;

        let bound = translator.clone();
        tera.register_function(
            "t",
            move |args: &HashMap<String, Value>| match args.get("key").and_then(Value::as_str) {
                Some(key) => Ok(Value::String(bound.lookup(key))),
                None => Err(tera::Error::msg("t() requires a string `key` argument")),
            },
        );

        let context = tera::Context::from_serialize(data)?;
        Ok(tera.render(name, &context)?)
    }
}

/// One composed page, ready for the output writer.
#[derive(Debug)]
pub struct ComposedPage {
    pub output_relative: PathBuf,
    pub html: String,
}

/// Everything a page render needs beyond the page itself.
pub struct Composer<'a> {
    pub snapshot: &'a Snapshot,
    pub engine: &'a dyn TemplateEngine,
    pub layout_source: Option<&'a str>,
    pub output_root: &'a Path,
    pub assets: &'a [EmittedAsset],
}

impl Composer<'_> {
    /// Render one page for one locale: body first, then the shared layout
    /// with the body embedded as `content`.
    pub fn compose(
        &self,
        desc: &PageDescriptor,
        source: &str,
        locale: &str,
        hashes: &mut AssetHashCache,
    ) -> Result<ComposedPage, EngineError> {
        let output_relative = naming::page_output_path(&desc.relative, locale);
        let root_path = naming::root_path(&output_relative);
        let translator = self.snapshot.translator(locale);

        let feature = desc
            .feature_dir
            .as_deref()
            .and_then(|dir| self.snapshot.feature_by_dir(dir));
        let category = match desc.kind {
            RootKind::Features => feature.and_then(|f| f.category.clone()),
            RootKind::Pages => fallback_category(&desc.relative),
        };

        let mut context = shared_context(self.snapshot)?;
        if let Some(feature) = feature {
            context.insert(
                "feature".to_string(),
                crate::snapshot::feature_value(feature),
            );
        }
        context.insert(
            "page".to_string(),
            page_value(desc, locale, &root_path, category.as_deref(), &output_relative),
        );
        context.insert(
            "assets".to_string(),
            self.asset_urls(desc, &root_path, hashes),
        );

        let body = self.engine.render(
            &desc.name(),
            source,
            &Value::Object(context.clone()),
            &translator,
        )?;

        let html = match self.layout_source {
            Some(layout) => {
                context.insert("content".to_string(), Value::String(body));
                self.engine.render(
                    LAYOUT_TEMPLATE,
                    layout,
                    &Value::Object(context),
                    &translator,
                )?
            }
            None => body,
        };

        Ok(ComposedPage {
            output_relative,
            html,
        })
    }

    /// Fingerprinted URL lists for this page: global assets always, plus
    /// the owning feature's own assets.
    fn asset_urls(
        &self,
        desc: &PageDescriptor,
        root_path: &str,
        hashes: &mut AssetHashCache,
    ) -> Value {
        let mut styles = Vec::new();
        let mut scripts = Vec::new();
        // Globals first, then the page's feature assets.
        let visible = self
            .assets
            .iter()
            .filter(|a| a.feature_dir.is_none())
            .chain(self.assets.iter().filter(|a| {
                a.feature_dir.is_some() && a.feature_dir == desc.feature_dir
            }));
        for asset in visible {
            let url = hashes.url(self.output_root, root_path, &asset.out_rel);
            match asset.kind {
                AssetKind::Stylesheet => styles.push(Value::String(url)),
                AssetKind::Script => scripts.push(Value::String(url)),
            }
        }
        let mut obj = Map::new();
        obj.insert("styles".to_string(), Value::Array(styles));
        obj.insert("scripts".to_string(), Value::Array(scripts));
        Value::Object(obj)
    }
}

/// The context fields shared by every render, page or root artifact.
pub fn shared_context(snapshot: &Snapshot) -> Result<Map<String, Value>, EngineError> {
    let mut context = Map::new();
    context.insert("site".to_string(), serde_json::to_value(&snapshot.config)?);
    context.insert("data".to_string(), Value::Object(snapshot.data.clone()));
    context.insert("features".to_string(), snapshot.features_context.clone());
    context.insert(
        "version".to_string(),
        Value::String(CACHE_VERSION.to_string()),
    );
    Ok(context)
}

fn page_value(
    desc: &PageDescriptor,
    locale: &str,
    root_path: &str,
    category: Option<&str>,
    output_relative: &Path,
) -> Value {
    let slug = desc
        .relative
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut page = Map::new();
    page.insert("locale".to_string(), Value::String(locale.to_string()));
    page.insert(
        "root_path".to_string(),
        Value::String(root_path.to_string()),
    );
    page.insert("path".to_string(), Value::String(desc.name()));
    page.insert("slug".to_string(), Value::String(slug));
    page.insert(
        "category".to_string(),
        match category {
            Some(c) => Value::String(c.to_string()),
            None => Value::Null,
        },
    );
    page.insert(
        "output".to_string(),
        Value::String(output_relative.to_string_lossy().replace('\\', "/")),
    );
    Value::Object(page)
}

/// Category for a generic page: the static table keyed by the page's
/// top-level directory. Top-level pages have no category.
fn fallback_category(relative: &Path) -> Option<String> {
    let mut components = relative.components();
    let first = components.next()?;
    components.next()?; // a lone file name has no owning directory
    let dir = first.as_os_str().to_string_lossy();
    CATEGORY_FALLBACK
        .iter()
        .find(|(name, _)| *name == dir)
        .map(|(_, label)| label.to_string())
}
