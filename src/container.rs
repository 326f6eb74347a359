//! Container parsing and validation.
//!
//! # Layout
//! A container is anchored at the END of the file.  The last three bytes are
//! the trailer (`header_size` u16 LE, magic `0x71`); the header begins
//! `header_size` bytes before EOF and holds `version`, `section_count`, and
//! the packed section table.  Section payloads live in the body of the file
//! at the offsets the table declares.  `header_size` values larger than the
//! header actually needs are legal; the extra bytes before the trailer are
//! ignored.
//!
//! # Parse modes
//! [`ParseMode::Strict`] applies the structural checks only.
//! [`ParseMode::Tolerant`] is meant for bulk discovery over untrusted files
//! and adds a per-section size ceiling so that a stray file with plausible
//! framing but absurd section sizes is rejected rather than reported as a
//! container.
//!
//! Validation order is fixed: magic, then version, then section count, then
//! every section type, then (tolerant only) every section size.  The first
//! failure wins, so a file with both an unknown type in section 2 and an
//! oversized section 1 reports the type error.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::ReadBytesExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::format::{
    is_known_kind, SectionEntry, Trailer, MAGIC, SECTION_COUNT_MAX, SECTION_COUNT_MIN,
    SECTION_ENTRY_SIZE, TOLERANT_MAX_SECTION_SIZE, VERSION_MAX, VERSION_MIN,
};

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("wrong magic byte {found:#04x} (expected 0x71)")]
    BadMagic { found: u8 },
    #[error("unsupported version {0} (valid range 88..=166)")]
    BadVersion(u8),
    #[error("section count {0} out of range (valid range 6..=19)")]
    BadSectionCount(u8),
    #[error("section {section} has invalid type code {kind}")]
    BadSectionKind { section: usize, kind: u16 },
    #[error("section {section} size {size} exceeds the 1499-byte discovery ceiling")]
    OversizedSection { section: usize, size: u32 },
}

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("section index {index} out of range (container has {count} sections)")]
    OutOfRange { index: usize, count: usize },
}

// ── Parsing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Structural validation only.
    Strict,
    /// Structural validation plus the per-section size ceiling.  Used when
    /// probing arbitrary files for container candidates.
    Tolerant,
}

/// A fully validated container header: the stamped version plus the section
/// table in on-disk order.  Payload bytes stay in the underlying file and are
/// read on demand.
#[derive(Debug, Clone)]
pub struct Container {
    pub version: u8,
    pub sections: Vec<SectionEntry>,
}

impl Container {
    /// Parse and validate a container from a seekable stream.
    ///
    /// The stream position on entry is irrelevant; all reads are anchored off
    /// EOF.  I/O failures (including files too short for the structures the
    /// trailer declares) surface as [`ParseError::Io`] and are never folded
    /// into the format errors, tolerant mode included.
    pub fn parse<R: Read + Seek>(mut reader: R, mode: ParseMode) -> Result<Self, ParseError> {
        let trailer = Trailer::read_from_end(&mut reader)?;
        if trailer.magic != MAGIC {
            return Err(ParseError::BadMagic { found: trailer.magic });
        }
        trace!(header_size = trailer.header_size, "trailer accepted");

        reader.seek(SeekFrom::End(-i64::from(trailer.header_size)))?;
        let version = reader.read_u8()?;
        let section_count = reader.read_u8()?;
        if !(VERSION_MIN..=VERSION_MAX).contains(&version) {
            return Err(ParseError::BadVersion(version));
        }
        if !(SECTION_COUNT_MIN..=SECTION_COUNT_MAX).contains(&section_count) {
            return Err(ParseError::BadSectionCount(section_count));
        }

        // The table is read in one pass so a truncated file fails here as a
        // short read rather than as a garbage entry.
        let mut table = vec![0u8; usize::from(section_count) * SECTION_ENTRY_SIZE];
        reader.read_exact(&mut table)?;

        let mut sections = Vec::with_capacity(usize::from(section_count));
        for chunk in table.chunks_exact(SECTION_ENTRY_SIZE) {
            sections.push(SectionEntry::read(chunk)?);
        }

        for (i, entry) in sections.iter().enumerate() {
            if !is_known_kind(entry.kind) {
                return Err(ParseError::BadSectionKind { section: i + 1, kind: entry.kind });
            }
        }
        if mode == ParseMode::Tolerant {
            for (i, entry) in sections.iter().enumerate() {
                if entry.size > TOLERANT_MAX_SECTION_SIZE {
                    return Err(ParseError::OversizedSection { section: i + 1, size: entry.size });
                }
            }
        }

        debug!(version, section_count, "container parsed");
        Ok(Self { version, sections })
    }

    /// Open and parse the container at `path`.
    pub fn parse_path<P: AsRef<Path>>(path: P, mode: ParseMode) -> Result<Self, ParseError> {
        let mut file = File::open(path)?;
        Self::parse(&mut file, mode)
    }

    pub fn section_count(&self) -> u8 {
        self.sections.len() as u8
    }

    /// Resolve a 1-based section number (the numbering reports use) to the
    /// section's `(offset, size)` pair.
    pub fn locate(&self, index: usize) -> Result<(u32, u32), LocateError> {
        if index == 0 || index > self.sections.len() {
            return Err(LocateError::OutOfRange { index, count: self.sections.len() });
        }
        let entry = &self.sections[index - 1];
        Ok((entry.offset, entry.size))
    }

    /// Build the displayable report for this container.
    pub fn report(&self) -> Report {
        Report {
            version: self.version,
            section_count: self.section_count(),
            sections: self
                .sections
                .iter()
                .enumerate()
                .map(|(i, entry)| SectionInfo {
                    index: i + 1,
                    name: entry.display_name(),
                    name_hex: hex::encode(entry.name),
                    kind: entry.kind,
                    offset: entry.offset,
                    size: entry.size,
                })
                .collect(),
        }
    }

    /// Total bytes of payload the section table accounts for.
    pub fn payload_bytes(&self) -> u64 {
        self.sections.iter().map(|entry| u64::from(entry.size)).sum()
    }
}

// ── Reporting ────────────────────────────────────────────────────────────────

/// One row of a container report.  `name` is the lossily decoded printable
/// name; `name_hex` carries the raw 13 bytes for names that do not survive
/// the decoding.
#[derive(Debug, Clone, Serialize)]
pub struct SectionInfo {
    pub index: usize,
    pub name: String,
    pub name_hex: String,
    #[serde(rename = "type")]
    pub kind: u16,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub version: u8,
    pub section_count: u8,
    pub sections: Vec<SectionInfo>,
}
