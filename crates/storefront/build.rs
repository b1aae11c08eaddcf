//! Build script for the storefront crate.
//!
//! Fingerprints the stylesheet so it can be served with an immutable cache
//! header, and warns when the vendored browser scripts are missing.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");

    hash_css(&static_dir);
    check_scripts(&static_dir);
}

/// Copy main.css to `css/derived/main.{hash}.css` and export `CSS_HASH`.
///
/// Older fingerprinted copies are removed so the directory only ever holds
/// the stylesheet the binary links to.
fn hash_css(static_dir: &Path) {
    let css_path = static_dir.join("css/main.css");
    println!("cargo:rerun-if-changed={}", css_path.display());

    let content = match fs::read(&css_path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read main.css: {e}");
            println!("cargo:rustc-env=CSS_HASH=");
            return;
        }
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short_hash = &digest[..8];
    println!("cargo:rustc-env=CSS_HASH={short_hash}");

    let derived_dir = static_dir.join("css/derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived CSS directory");

    let current = format!("main.{short_hash}.css");
    if let Ok(entries) = fs::read_dir(&derived_dir) {
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy() != current {
                let _ = fs::remove_file(entry.path());
            }
        }
    }

    fs::copy(&css_path, derived_dir.join(&current))
        .expect("Failed to copy CSS to derived directory");
}

/// htmx is fetched by `scripts/fetch-assets.sh`, not committed.
fn check_scripts(static_dir: &Path) {
    let htmx = static_dir.join("js/htmx.min.js");
    println!("cargo:rerun-if-changed={}", htmx.display());

    if !htmx.exists() {
        println!("cargo:warning=static/js/htmx.min.js is missing; run scripts/fetch-assets.sh");
    }
}
