//! The output writer: page files, the root redirect, and root artifacts.
//!
//! Pages arrive fully rendered; this module owns destination-tree concerns
//! only — parent directory creation, byte writes, and the small set of
//! root-level outputs that are not locale pages:
//!
//! - `index.html` at the output root: a fixed redirect to the default
//!   locale. Written once and left alone afterwards so a hand-edited
//!   redirect survives rebuilds; `--force` rewrites it.
//! - Templated root artifacts: any `<name>.tera` directly in the source
//!   root (`robots.txt.tera`, `site.webmanifest.tera`, `sw.js.tera`, …)
//!   renders to `<name>` at the output root. Each follows the same
//!   change-detection contract as pages — peeked up front, committed only
//!   after a successful render — with a single (default-locale) render as
//!   its unit of work.

use crate::cache;
use crate::generate::BuildContext;
use crate::render;
use serde_json::{Map, Value};
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Write one rendered page under the output root.
pub fn write_page(output_root: &Path, relative: &Path, html: &str) -> io::Result<()> {
    let dest = output_root.join(relative);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, html)
}

/// Write the root redirect page. Returns whether a write happened.
pub fn write_root_redirect(
    output_root: &Path,
    default_locale: &str,
    force: bool,
) -> io::Result<bool> {
    let dest = output_root.join("index.html");
    if dest.exists() && !force {
        return Ok(false);
    }
    info!(locale = default_locale, "writing root redirect");
    std::fs::write(dest, redirect_html(default_locale))?;
    Ok(true)
}

fn redirect_html(locale: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"{locale}\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"0; url=./{locale}/\">\n\
         <link rel=\"canonical\" href=\"./{locale}/\">\n\
         <title>Redirecting</title>\n\
         </head>\n\
         <body>\n\
         <p><a href=\"./{locale}/\">Continue</a></p>\n\
         <script>location.replace(\"./{locale}/\" + location.search + location.hash);</script>\n\
         </body>\n\
         </html>\n"
    )
}

/// Render and write every templated root artifact.
///
/// Failures are logged and the artifact's cache entry withheld so it
/// retries next build; nothing here aborts the run.
pub fn emit_root_artifacts(ctx: &mut BuildContext) {
    let mut sources: Vec<std::path::PathBuf> = match std::fs::read_dir(&ctx.layout.root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|e| e == crate::plan::TEMPLATE_EXTENSION)
                        .unwrap_or(false)
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "cannot list source root for artifacts");
            return;
        }
    };
    sources.sort();

    for source_path in sources {
        let Some(output_name) = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
        else {
            continue;
        };
        let key = format!("artifact/{output_name}");
        let digest = cache::digest_file(&source_path).ok();
        let changed = match &digest {
            Some(d) => ctx.cache.peek(&key, d),
            None => true,
        };
        let dest = ctx.options.output.join(&output_name);
        if !changed && dest.exists() {
            debug!(artifact = %output_name, "up to date");
            continue;
        }

        let source = match std::fs::read_to_string(&source_path) {
            Ok(s) => s,
            Err(e) => {
                warn!(artifact = %output_name, error = %e, "artifact source unreadable");
                continue;
            }
        };

        let context = match artifact_context(ctx, &output_name) {
            Ok(c) => c,
            Err(e) => {
                warn!(artifact = %output_name, error = %e, "artifact context failed");
                continue;
            }
        };
        let translator = ctx
            .snapshot
            .translator(&ctx.snapshot.config.default_locale);

        match ctx
            .engine
            .render(&output_name, &source, &context, &translator)
        {
            Ok(text) => {
                if let Err(e) = std::fs::write(&dest, text) {
                    warn!(artifact = %output_name, error = %e, "artifact write failed");
                    continue;
                }
                if let Some(d) = digest {
                    ctx.cache.commit(&key, d);
                }
                ctx.report.artifacts_written += 1;
            }
            Err(e) => {
                warn!(artifact = %output_name, error = %e, "artifact render failed");
            }
        }
    }
}

/// Context for a root artifact: the shared fields plus a root-level page
/// record and the full fingerprinted asset list (service workers precache
/// from it).
fn artifact_context(
    ctx: &mut BuildContext,
    output_name: &str,
) -> Result<Value, render::EngineError> {
    let mut context = render::shared_context(&ctx.snapshot)?;

    let mut page = Map::new();
    page.insert(
        "locale".to_string(),
        Value::String(ctx.snapshot.config.default_locale.clone()),
    );
    page.insert("root_path".to_string(), Value::String(String::new()));
    page.insert("path".to_string(), Value::String(output_name.to_string()));
    context.insert("page".to_string(), Value::Object(page));

    let output_root = &ctx.options.output;
    let hashes = &mut ctx.asset_hashes;
    let urls: Vec<Value> = ctx
        .assets
        .iter()
        .map(|a| Value::String(hashes.url(output_root, "", &a.out_rel)))
        .collect();
    let mut assets = Map::new();
    assets.insert("all".to_string(), Value::Array(urls));
    context.insert("assets".to_string(), Value::Object(assets));

    Ok(Value::Object(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // Artifact emission end-to-end is covered in generate's tests; these
    // exercise the writer primitives directly.

    #[test]
    fn write_page_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), Path::new("en/guides/rounding/index.html"), "<p></p>").unwrap();
        let written = fs::read_to_string(tmp.path().join("en/guides/rounding/index.html")).unwrap();
        assert_eq!(written, "<p></p>");
    }

    #[test]
    fn redirect_written_when_absent() {
        let tmp = TempDir::new().unwrap();
        assert!(write_root_redirect(tmp.path(), "en", false).unwrap());
        let html = fs::read_to_string(tmp.path().join("index.html")).unwrap();
        assert!(html.contains("url=./en/"));
        assert!(html.contains("location.replace"));
    }

    #[test]
    fn existing_redirect_left_alone() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "hand edited").unwrap();
        assert!(!write_root_redirect(tmp.path(), "en", false).unwrap());
        assert_eq!(
            fs::read_to_string(tmp.path().join("index.html")).unwrap(),
            "hand edited"
        );
    }

    #[test]
    fn force_rewrites_redirect() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "hand edited").unwrap();
        assert!(write_root_redirect(tmp.path(), "vi", true).unwrap());
        let html = fs::read_to_string(tmp.path().join("index.html")).unwrap();
        assert!(html.contains("url=./vi/"));
    }
}
