use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Trailing magic byte, ASCII `q`.
pub const MAGIC: u8 = 0x71;
/// Trailer length in bytes: `header_size` (u16 LE) + magic.
pub const TRAILER_SIZE: u64 = 3;
/// Fixed header prefix: `version` (u8) + `section_count` (u8).
pub const HEADER_FIXED_SIZE: u64 = 2;
/// One packed table entry: 13-byte name + u16 type + u32 offset + u32 size.
pub const SECTION_ENTRY_SIZE: usize = 23;
/// Section name field width.  Names shorter than 13 bytes are NUL padded;
/// a 13-byte name carries no terminator.
pub const NAME_LEN: usize = 13;

pub const VERSION_MIN: u8 = 88;
pub const VERSION_MAX: u8 = 166;
pub const SECTION_COUNT_MIN: u8 = 6;
pub const SECTION_COUNT_MAX: u8 = 19;

/// The closed set of valid section type codes.
pub const SECTION_KINDS: [u16; 5] = [38, 60, 67, 72, 75];

/// Section size ceiling applied in tolerant (discovery) parsing only.
pub const TOLERANT_MAX_SECTION_SIZE: u32 = 1499;

/// True if `kind` is one of the type codes a conforming container may carry.
pub fn is_known_kind(kind: u16) -> bool {
    SECTION_KINDS.contains(&kind)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub header_size: u16,
    pub magic: u8,
}

impl Trailer {
    /// Read the trailer occupying the final [`TRAILER_SIZE`] bytes of the
    /// stream.  Streams shorter than the trailer fail the seek.
    pub fn read_from_end<R: Read + Seek>(mut reader: R) -> io::Result<Self> {
        reader.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
        let header_size = reader.read_u16::<LittleEndian>()?;
        let magic = reader.read_u8()?;
        Ok(Self { header_size, magic })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self.header_size)?;
        writer.write_u8(self.magic)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionEntry {
    pub name: [u8; NAME_LEN],
    pub kind: u16,
    pub offset: u32,
    pub size: u32,
}

impl SectionEntry {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut name = [0u8; NAME_LEN];
        reader.read_exact(&mut name)?;
        Ok(Self {
            name,
            kind: reader.read_u16::<LittleEndian>()?,
            offset: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.name)?;
        writer.write_u16::<LittleEndian>(self.kind)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        Ok(())
    }

    /// Printable form of the name: bytes up to the first NUL (or all 13),
    /// decoded lossily.
    pub fn display_name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}
