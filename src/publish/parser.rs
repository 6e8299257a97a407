//! Parser for `ipfs add` output

use crate::error::{PublishError, Result};
use crate::types::Cid;
use std::path::Path;

/// Extract the root CID for `top_level` from `ipfs add` output
///
/// `ipfs add -r` prints one `added <cid> <path>` line per entry, children first and the
/// root last. Only the line whose path equals the argument that was added is used. The
/// CLI prints relative arguments as given and absolute ones by their final component, so
/// both forms are accepted.
pub fn parse_add_output(stdout: &[u8], top_level: &Path) -> Result<Cid> {
    let output = String::from_utf8_lossy(stdout);
    let wanted = normalize(&top_level.to_string_lossy());
    let base = top_level
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    for line in output.lines().rev() {
        let Some((cid, path)) = split_added_line(line) else {
            continue;
        };
        let path = normalize(path);
        if path == wanted || base.as_deref() == Some(path.as_str()) {
            return Cid::parse(cid).map_err(|_| {
                PublishError::CidParse {
                    path: top_level.display().to_string(),
                    output: output.to_string(),
                }
                .into()
            });
        }
    }

    Err(PublishError::CidParse {
        path: top_level.display().to_string(),
        output: output.to_string(),
    }
    .into())
}

/// Split `added <cid> <path>` into its CID and path; the path may contain spaces
fn split_added_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim().strip_prefix("added")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let (cid, path) = rest.split_once(char::is_whitespace)?;
    let path = path.trim();
    if path.is_empty() { None } else { Some((cid, path)) }
}

fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let path = path.strip_prefix("./").unwrap_or(&path);
    path.trim_end_matches('/').to_string()
}
