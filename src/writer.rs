//! Container construction.
//!
//! [`ContainerBuilder`] accumulates sections in memory and emits the whole
//! container in one [`write_to`](ContainerBuilder::write_to) call: payloads
//! packed back to back from offset 0, then the header, the section table,
//! and the trailer.  `header_size` is stamped as the exact header length (fixed
//! prefix + table + trailer); parsers must accept larger values, but the
//! builder always produces the tight form.
//!
//! Per-section properties (name width, type code, payload addressability)
//! are checked as sections are added; container-level properties (version
//! and section count ranges) are checked when the container is written.  The
//! tolerant-parse size ceiling is a read-side policy and is deliberately NOT
//! enforced here.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::WriteBytesExt;
use thiserror::Error;
use tracing::debug;

use crate::format::{
    is_known_kind, SectionEntry, Trailer, HEADER_FIXED_SIZE, MAGIC, NAME_LEN, SECTION_COUNT_MAX,
    SECTION_COUNT_MIN, SECTION_ENTRY_SIZE, TRAILER_SIZE, VERSION_MAX, VERSION_MIN,
};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("version {0} outside the encodable range 88..=166")]
    VersionOutOfRange(u8),
    #[error("{0} section(s) queued; a container holds 6..=19")]
    SectionCountOutOfRange(usize),
    #[error("section name {0:?} exceeds 13 bytes")]
    NameTooLong(String),
    #[error("unknown section type code {0}")]
    UnknownKind(u16),
    #[error("section payload of {0} bytes exceeds u32 addressing")]
    SectionTooLarge(usize),
    #[error("container body of {0} bytes exceeds u32 addressing")]
    ContainerTooLarge(u64),
}

struct PendingSection {
    name: [u8; NAME_LEN],
    kind: u16,
    payload: Vec<u8>,
}

pub struct ContainerBuilder {
    version: u8,
    sections: Vec<PendingSection>,
}

impl ContainerBuilder {
    pub fn new(version: u8) -> Self {
        Self { version, sections: Vec::new() }
    }

    /// Queue a section.  The name is NUL padded to 13 bytes; names longer
    /// than that are rejected rather than truncated.
    pub fn add_section(&mut self, name: &str, kind: u16, payload: &[u8]) -> Result<(), BuildError> {
        if name.len() > NAME_LEN {
            return Err(BuildError::NameTooLong(name.to_string()));
        }
        let mut raw = [0u8; NAME_LEN];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        self.add_section_raw(raw, kind, payload)
    }

    /// Queue a section under a raw 13-byte name, NULs and all.
    pub fn add_section_raw(
        &mut self,
        name: [u8; NAME_LEN],
        kind: u16,
        payload: &[u8],
    ) -> Result<(), BuildError> {
        if !is_known_kind(kind) {
            return Err(BuildError::UnknownKind(kind));
        }
        if payload.len() as u64 > u64::from(u32::MAX) {
            return Err(BuildError::SectionTooLarge(payload.len()));
        }
        self.sections.push(PendingSection { name, kind, payload: payload.to_vec() });
        Ok(())
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Write the complete container to `writer`, starting at offset 0.
    pub fn write_to<W: Write + Seek>(&self, mut writer: W) -> Result<(), BuildError> {
        if !(VERSION_MIN..=VERSION_MAX).contains(&self.version) {
            return Err(BuildError::VersionOutOfRange(self.version));
        }
        let count = self.sections.len();
        let count_range = usize::from(SECTION_COUNT_MIN)..=usize::from(SECTION_COUNT_MAX);
        if !count_range.contains(&count) {
            return Err(BuildError::SectionCountOutOfRange(count));
        }

        writer.seek(SeekFrom::Start(0))?;
        let mut entries = Vec::with_capacity(count);
        for section in &self.sections {
            let position = writer.stream_position()?;
            let offset = u32::try_from(position)
                .map_err(|_| BuildError::ContainerTooLarge(position))?;
            writer.write_all(&section.payload)?;
            entries.push(SectionEntry {
                name: section.name,
                kind: section.kind,
                offset,
                size: section.payload.len() as u32,
            });
        }

        writer.write_u8(self.version)?;
        writer.write_u8(count as u8)?;
        for entry in &entries {
            entry.write(&mut writer)?;
        }
        let header_size =
            HEADER_FIXED_SIZE + (count * SECTION_ENTRY_SIZE) as u64 + TRAILER_SIZE;
        Trailer { header_size: header_size as u16, magic: MAGIC }.write(&mut writer)?;

        debug!(version = self.version, sections = count, "container written");
        Ok(())
    }

    /// Create (or truncate) the file at `path` and write the container there.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), BuildError> {
        let file = File::create(path)?;
        self.write_to(file)
    }
}
