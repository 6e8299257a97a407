//! Custom assertions over the local store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Every file under `root` with its contents, keyed by path relative to `root`
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(relative, std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

/// Panic if any in-progress temporary is left under `root`
pub fn assert_no_partials(root: &Path) {
    for path in snapshot(root).keys() {
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(
            !name.ends_with(".part"),
            "temporary left behind: {}",
            path.display()
        );
    }
}

/// Parse the JSON record at `path`
pub fn read_record(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap()
}
