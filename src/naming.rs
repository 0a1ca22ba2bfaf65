//! Centralized output-path computation for the clean-URL convention.
//!
//! Every rendered page lands at a directory containing an `index.html`
//! rather than a same-named `.html` file, so static hosts serve
//! `/guides/rounding/` without extension tricks. The mapping must stay
//! bit-exact — deployed sites rely on these URLs.
//!
//! ## Mapping
//!
//! | source name | output path |
//! |-------------|-------------|
//! | `404.*` | `<locale>/404.html` (always top-level inside the locale) |
//! | `index.*` | `<locale>/<dir>/index.html` |
//! | `<slug>.*` | `<locale>/<dir>/<slug>/index.html` |
//!
//! The locale segment always comes first; everything after it mirrors the
//! page's path relative to its source root.

use std::path::{Component, Path, PathBuf};

/// Compute the output-relative path for a page template.
///
/// `relative` is the template's path relative to its source root
/// (e.g. `guides/rounding.tera`); `locale` becomes the leading segment.
pub fn page_output_path(relative: &Path, locale: &str) -> PathBuf {
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let dir = relative.parent().unwrap_or_else(|| Path::new(""));

    let mut out = PathBuf::from(locale);
    match stem.as_str() {
        // Hosts look for the error page at the top level only.
        "404" => out.push("404.html"),
        "index" => {
            out.push(dir);
            out.push("index.html");
        }
        slug => {
            out.push(dir);
            out.push(slug);
            out.push("index.html");
        }
    }
    out
}

/// Relative prefix from an output file back to the site root.
///
/// Computed purely from output depth — one `../` per directory level above
/// the file — so generated pages are relocatable without a configured base
/// URL. `en/guides/rounding/index.html` yields `../../../`; a root-level
/// artifact yields the empty string.
pub fn root_path(output_relative: &Path) -> String {
    let depth = output_relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
        .saturating_sub(1);
    "../".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(rel: &str, locale: &str) -> String {
        page_output_path(Path::new(rel), locale)
            .to_string_lossy()
            .replace('\\', "/")
    }

    #[test]
    fn index_maps_to_directory_index() {
        assert_eq!(out("index.tera", "en"), "en/index.html");
    }

    #[test]
    fn nested_index_keeps_directory() {
        assert_eq!(out("guides/index.tera", "en"), "en/guides/index.html");
    }

    #[test]
    fn slug_becomes_directory_with_index() {
        assert_eq!(out("about.tera", "en"), "en/about/index.html");
    }

    #[test]
    fn nested_slug_keeps_directory() {
        assert_eq!(
            out("guides/rounding.tera", "vi"),
            "vi/guides/rounding/index.html"
        );
    }

    #[test]
    fn error_page_is_top_level() {
        assert_eq!(out("404.tera", "en"), "en/404.html");
    }

    #[test]
    fn error_page_in_subdirectory_still_top_level() {
        assert_eq!(out("errors/404.tera", "en"), "en/404.html");
    }

    #[test]
    fn locale_prefix_varies() {
        assert_eq!(out("about.tera", "vi"), "vi/about/index.html");
    }

    #[test]
    fn extension_is_irrelevant() {
        assert_eq!(out("about.html", "en"), "en/about/index.html");
    }

    // =========================================================================
    // root_path
    // =========================================================================

    #[test]
    fn root_path_for_locale_index() {
        assert_eq!(root_path(Path::new("en/index.html")), "../");
    }

    #[test]
    fn root_path_for_error_page() {
        assert_eq!(root_path(Path::new("en/404.html")), "../");
    }

    #[test]
    fn root_path_for_clean_url_page() {
        assert_eq!(root_path(Path::new("en/about/index.html")), "../../");
    }

    #[test]
    fn root_path_for_deep_page() {
        assert_eq!(
            root_path(Path::new("en/guides/rounding/index.html")),
            "../../../"
        );
    }

    #[test]
    fn root_path_for_root_artifact_is_empty() {
        assert_eq!(root_path(Path::new("robots.txt")), "");
    }

    #[test]
    fn root_path_matches_output_computation() {
        let rel = page_output_path(Path::new("guides/rounding.tera"), "en");
        assert_eq!(root_path(&rel), "../../../");
    }
}
