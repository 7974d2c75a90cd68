// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Component, Path, PathBuf};

/// Resolve `candidate` against `root` and reject anything that escapes it.
///
/// Two checks are applied:
/// 1. Lexical: the joined path is normalized component-by-component; a
///    `..` that would climb above `root` is an escape.
/// 2. Canonical: when the resolved path (or its deepest existing ancestor)
///    exists on disk, its canonical form must still live under the
///    canonical root — this catches symlinks pointing outside the root.
pub(crate) fn resolve_in_root(root: &Path, candidate: &str) -> Result<PathBuf, String> {
    let raw = Path::new(candidate);
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        root.join(raw)
    };

    let mut normalized = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(format!("path '{candidate}' escapes the tool root directory"));
                }
            }
            other => normalized.push(other),
        }
    }

    if !normalized.starts_with(root) {
        return Err(format!("path '{candidate}' escapes the tool root directory"));
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| format!("tool root '{}' is not accessible: {e}", root.display()))?;

    // Canonicalize the deepest existing ancestor so symlinked segments are
    // resolved even when the target file does not exist yet (writes).
    let mut probe = normalized.clone();
    let mut tail = PathBuf::new();
    loop {
        match probe.canonicalize() {
            Ok(canon) => {
                let resolved = if tail.as_os_str().is_empty() {
                    canon
                } else {
                    canon.join(&tail)
                };
                if !resolved.starts_with(&canonical_root) {
                    return Err(format!("path '{candidate}' escapes the tool root directory"));
                }
                return Ok(resolved);
            }
            Err(_) => match (probe.parent(), probe.file_name()) {
                (Some(parent), Some(name)) => {
                    tail = if tail.as_os_str().is_empty() {
                        PathBuf::from(name)
                    } else {
                        Path::new(name).join(&tail)
                    };
                    probe = parent.to_path_buf();
                }
                _ => return Ok(normalized),
            },
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
