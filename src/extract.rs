//! End-anchored line extraction from section payloads.
//!
//! # Numbering
//!
//! Lines are numbered from the END of the payload: line 1 is the text after
//! the last `\n` (or the whole payload if it holds none), line 2 is the text
//! between the last two newlines, and so on.  Containers typically append
//! records, so "the last line" is the access pattern this module optimises
//! for.
//!
//! # Scan strategy
//!
//! The payload is read backwards in [`READ_CHUNK`]-byte windows, each window
//! scanned from its last byte to its first.  Only the bytes of the target
//! line are retained, and the scan stops as soon as the newline preceding the
//! target line is seen, so extracting line 1 of a large section touches one
//! window regardless of payload size.
//!
//! # Byte order of the result
//!
//! Collected bytes are appended in scan order, which runs from the end of the
//! payload toward its start: a multi-byte line comes back with its bytes
//! REVERSED relative to the file.  Long-standing consumers of this output
//! depend on that ordering, so it is kept as-is; callers that want the file
//! order must reverse the buffer themselves.

use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;
use tracing::trace;

/// Bytes read per backward window.
pub const READ_CHUNK: u32 = 4096;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("line {requested} not found (payload holds {available} lines)")]
    LineNotFound { requested: u32, available: u32 },
}

/// Extract one end-numbered line from the `size` payload bytes starting at
/// `offset`.
///
/// A payload of zero bytes still has a line 1, which is empty.  Newline
/// bytes themselves are never part of the result.
pub fn extract_line<R: Read + Seek>(
    mut reader: R,
    offset: u32,
    size: u32,
    line: u32,
) -> Result<Vec<u8>, ExtractError> {
    let target = u64::from(line);
    let mut cursor = u64::from(offset) + u64::from(size);
    let mut remaining = size;
    let mut current = 1u64;
    let mut out = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK as usize];

    'scan: while remaining > 0 {
        let chunk = READ_CHUNK.min(remaining);
        cursor -= u64::from(chunk);
        reader.seek(SeekFrom::Start(cursor))?;
        let window = &mut buf[..chunk as usize];
        reader.read_exact(window)?;

        for &byte in window.iter().rev() {
            if byte == b'\n' {
                current += 1;
                if current > target {
                    // The newline before the target line: everything the
                    // caller asked for has been collected.
                    break 'scan;
                }
            } else if current == target {
                out.push(byte);
            }
        }
        remaining -= chunk;
    }

    if current < target {
        return Err(ExtractError::LineNotFound {
            requested: line,
            available: current as u32,
        });
    }
    trace!(line, bytes = out.len(), "line extracted");
    Ok(out)
}
