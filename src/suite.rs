//! Test suite discovery and staleness checks.
//!
//! The suite directory is treated as a flat collection: one level of
//! entries, no recursion. Every `.ts` source maps to a sibling output file
//! with the extension swapped, and the output's modification time is the
//! only staleness marker. Its content is never inspected.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use thiserror::Error;
use tracing::debug;

/// Errors raised while scanning the suite directory.
///
/// Both variants are fatal to the whole run: a missing directory means a
/// broken checkout, and a source that vanishes between discovery and the
/// staleness check means another process is racing us. Neither is
/// recoverable per target, so the caller aborts before dispatching.
#[derive(Debug, Error)]
pub enum SuiteError {
    /// The suite directory is missing or unreadable.
    #[error("can't list test suite directory {path}: {source}")]
    UnreadableDir {
        /// The directory that failed to list.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// A discovered source file disappeared before its staleness check.
    #[error("source file {path} doesn't exist")]
    MissingSource {
        /// The source path that could not be stat'ed.
        path: PathBuf,
    },
}

/// A source file paired with the output path derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTarget {
    /// The suite source file.
    pub source: PathBuf,
    /// The compiled counterpart, used purely as a staleness marker.
    pub output: PathBuf,
}

impl SourceTarget {
    /// Pair `source` with the output derived by swapping `from` for `to`.
    ///
    /// Returns `None` when `source` doesn't carry the `from` extension,
    /// which is how non-suite entries (manifests, editor droppings) are
    /// filtered out of the work list.
    pub fn from_source(source: &Path, from: &str, to: &str) -> Option<Self> {
        let output = map_extension(source, from, to)?;
        Some(SourceTarget {
            source: source.to_path_buf(),
            output,
        })
    }
}

/// List the entries of `dir`, each joined with the directory prefix.
///
/// One level only; subdirectories come back as plain paths and fall out of
/// the work list at the extension filter.
pub fn paths_in_directory(dir: &Path) -> Result<Vec<PathBuf>, SuiteError> {
    let entries = fs::read_dir(dir).map_err(|source| SuiteError::UnreadableDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SuiteError::UnreadableDir {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

/// Whether the final dotted suffix of `path` equals `ext`.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Replace a trailing `.from` with `.to`.
///
/// Only a true suffix match is rewritten; dotted segments earlier in the
/// name are untouched (`a/b.c.ts` becomes `a/b.c.wasm`, never
/// `a/b.wasm.ts`). Returns `None` when the suffix doesn't match.
pub fn map_extension(path: &Path, from: &str, to: &str) -> Option<PathBuf> {
    if !has_extension(path, from) {
        return None;
    }
    Some(path.with_extension(to))
}

/// Modification time of `path` in milliseconds since the epoch, or `None`
/// when the path doesn't exist. Read fresh on every call; staleness
/// decisions never reuse a cached timestamp.
pub fn modified_millis(path: &Path) -> Option<u128> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis())
}

/// Whether `output` must be rebuilt from `source`.
///
/// True when the output has no timestamp (doesn't exist) or the source is
/// strictly newer. A missing source is a hard error, never a silent
/// "fresh": a queued rebuild whose input vanished points at a race or a
/// misconfigured suite path.
pub fn is_output_stale(source: &Path, output: &Path) -> Result<bool, SuiteError> {
    let source_ts = modified_millis(source).ok_or_else(|| SuiteError::MissingSource {
        path: source.to_path_buf(),
    })?;
    Ok(match modified_millis(output) {
        None => true,
        Some(output_ts) => source_ts > output_ts,
    })
}

/// Scan `dir` for `.{from}` sources whose `.{to}` counterpart is stale.
///
/// Returns the stale targets alongside the count of up-to-date targets
/// that were skipped. Every tracked source yields exactly one target, and
/// a fresh target never reaches the dispatcher.
pub fn stale_targets(
    dir: &Path,
    from: &str,
    to: &str,
) -> Result<(Vec<SourceTarget>, usize), SuiteError> {
    let mut stale = Vec::new();
    let mut fresh = 0;
    for path in paths_in_directory(dir)? {
        let Some(target) = SourceTarget::from_source(&path, from, to) else {
            continue;
        };
        if is_output_stale(&target.source, &target.output)? {
            stale.push(target);
        } else {
            debug!("{} is up to date", target.output.display());
            fresh += 1;
        }
    }
    Ok((stale, fresh))
}
