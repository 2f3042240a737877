use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Writes fetched markup to `<dir>/<source>_<item-slug>.html` for debugging selectors.
pub fn save_page(dir: &Path, source: &str, item: &str, html: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{}_{}.html", source, file_stem(item)));
    let mut file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(html.as_bytes())?;
    Ok(path)
}

/// Readable slug plus a short digest of the exact item, so names that slug the
/// same (or slug to nothing) still get their own file.
fn file_stem(item: &str) -> String {
    let digest = Sha256::digest(item.as_bytes());
    let short: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    let slug = slug(item);
    if slug.is_empty() {
        short
    } else {
        format!("{}_{}", slug, short)
    }
}

fn slug(item: &str) -> String {
    let mut out = String::with_capacity(item.len());
    for c in item.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
