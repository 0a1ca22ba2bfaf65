//! Shared test utilities for the polysite test suite.
//!
//! The fixture site under `fixtures/site/` carries two locales (`en`, `vi`),
//! four generic pages, one feature with a manifest, a locale bundle and a
//! script, shared includes with a layout, global data, global assets, and
//! one templated root artifact. [`site_fixture`] copies it into a temp
//! directory so tests can mutate sources freely.

use std::path::Path;
use tempfile::TempDir;

use crate::generate::BuildOptions;

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn site_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Default build options for a fixture site: plain mode, no force.
pub fn build_options(site: &Path, out: &Path) -> BuildOptions {
    BuildOptions {
        source: site.to_path_buf(),
        output: out.to_path_buf(),
        secure: false,
        force: false,
    }
}
