//! Filesystem listing and bulk container discovery.
//!
//! # Listing
//!
//! [`list_entries`] walks a directory (one level, or the whole subtree with
//! `recursive`) and returns the paths that match [`ListOptions`].  Filters
//! are OR-combined: with no filter set every entry matches; with both a
//! permission mask and a size threshold set, an entry matches if EITHER
//! holds.  The size filter only ever matches regular files; the permission
//! filter compares the entry's own mode bits, so symlinks are judged by the
//! link, not its target.
//!
//! # Discovery
//!
//! [`find_containers`] walks a subtree and probes every regular file with a
//! tolerant parse.  Probing is a bulk operation over untrusted input, so a
//! file that fails to parse is simply not a container and an unreadable file
//! is logged and skipped; neither aborts the walk.  Only a root that cannot
//! be walked at all is an error.

use std::fs::Metadata;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::container::{Container, ParseError, ParseMode};

// ── Permission strings ───────────────────────────────────────────────────────

/// Parse a 9-character permission string (`rwxr-x--x` and friends) into its
/// 9-bit mode mask.  Each position accepts exactly its own letter or `-`;
/// anything else, including a wrong length, yields `None`.
pub fn parse_permissions(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() != 9 {
        return None;
    }
    let mut mode = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        let expected = match i % 3 {
            0 => b'r',
            1 => b'w',
            _ => b'x',
        };
        mode <<= 1;
        if b == expected {
            mode |= 1;
        } else if b != b'-' {
            return None;
        }
    }
    Some(mode)
}

// ── Listing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Keep entries whose mode bits (masked to 0o777) equal this value.
    pub permissions: Option<u32>,
    /// Keep regular files strictly larger than this many bytes.
    pub size_greater: Option<u64>,
}

fn matches(meta: &Metadata, opts: &ListOptions) -> bool {
    if opts.permissions.is_none() && opts.size_greater.is_none() {
        return true;
    }
    if let Some(mask) = opts.permissions {
        if meta.permissions().mode() & 0o777 == mask {
            return true;
        }
    }
    if let Some(threshold) = opts.size_greater {
        if meta.is_file() && meta.len() > threshold {
            return true;
        }
    }
    false
}

/// Walk `root` and return the matching entry paths in sorted order.
///
/// A `root` that is not a directory is an error; an entry that disappears or
/// loses readability mid-walk is skipped.
pub fn list_entries<P: AsRef<Path>>(root: P, opts: &ListOptions) -> io::Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !opts.recursive {
        walker = walker.max_depth(1);
    }

    let mut out = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(error = %err, "entry skipped");
                continue;
            }
        };
        match entry.metadata() {
            Ok(meta) if matches(&meta, opts) => out.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => debug!(path = %entry.path().display(), error = %err, "entry skipped"),
        }
    }
    Ok(out)
}

// ── Discovery ────────────────────────────────────────────────────────────────

/// Recursively find every file under `root` that parses as a container in
/// tolerant mode.  Paths come back in sorted order.
pub fn find_containers<P: AsRef<Path>>(root: P) -> io::Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        match entry {
            Ok(e) if e.file_type().is_file() => candidates.push(e.into_path()),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "subtree skipped"),
        }
    }
    debug!(candidates = candidates.len(), "probing for containers");
    Ok(probe_candidates(candidates))
}

#[cfg(feature = "parallel")]
fn probe_candidates(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    use rayon::prelude::*;
    candidates.into_par_iter().filter(|p| probe(p)).collect()
}

#[cfg(not(feature = "parallel"))]
fn probe_candidates(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    candidates.into_iter().filter(|p| probe(p)).collect()
}

fn probe(path: &Path) -> bool {
    match Container::parse_path(path, ParseMode::Tolerant) {
        Ok(_) => true,
        Err(ParseError::Io(err)) => {
            warn!(path = %path.display(), error = %err, "unreadable candidate skipped");
            false
        }
        Err(reason) => {
            debug!(path = %path.display(), %reason, "not a container");
            false
        }
    }
}
