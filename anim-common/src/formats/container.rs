//! Animation pack container (.ncanim)
//!
//! A seekable file holding one skeleton and any number of encoded clips.
//!
//! # Layout
//! ```text
//! 0x00: magic [u8; 4] = "NCAP"
//! 0x04: version u32
//! 0x08: section_count u32
//! 0x0C: flags u32 (reserved, 0)
//! 0x10: section table (section_count × 32 bytes)
//!       kind u32, reserved u32, offset u64, size u64, name_hash u64
//! ....: section payloads at their recorded offsets
//! ```
//!
//! Readers check the magic, the version and the bounds of every section
//! before any payload is read.

use std::io::{Read, Seek, SeekFrom, Write};

use xxhash_rust::xxh3::xxh3_64;

use crate::animation::EncodedAnimation;
use crate::skeleton::Skeleton;

use super::sections::{read_clip, read_skeleton, write_clip, write_skeleton};

/// Magic bytes at the start of every pack
pub const PACK_MAGIC: [u8; 4] = *b"NCAP";

/// Current container version
pub const PACK_VERSION: u32 = 1;

/// File extension for animation packs
pub const PACK_EXT: &str = "ncanim";

/// Section name used for the skeleton
pub const SKELETON_SECTION_NAME: &str = "skeleton";

/// Errors raised while reading or writing a pack
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an animation pack (magic {found:02X?}, expected \"NCAP\")")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported pack version {found} (this reader supports {PACK_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("pack header or section table is truncated")]
    Truncated,

    #[error("section {index} (offset {offset}, size {size}) lies outside the pack")]
    SectionOutOfBounds { index: usize, offset: u64, size: u64 },

    #[error("section {index} has unknown kind {kind}")]
    UnknownSectionKind { index: usize, kind: u32 },

    #[error("malformed {kind:?} section: {reason}")]
    MalformedSection {
        kind: SectionKind,
        reason: &'static str,
    },

    #[error("clip section name mismatch: table says {expected:?}, payload says {found:?}")]
    NameMismatch { expected: String, found: String },
}

/// What a section holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SectionKind {
    Skeleton = 1,
    Clip = 2,
}

impl SectionKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Skeleton),
            2 => Some(Self::Clip),
            _ => None,
        }
    }
}

/// Hash stored in the section table for a section name
#[inline]
pub fn section_name_hash(name: &str) -> u64 {
    xxh3_64(name.as_bytes())
}

/// Pack header (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackHeader {
    pub version: u32,
    pub section_count: u32,
    pub flags: u32,
}

impl PackHeader {
    pub const SIZE: usize = 16;

    pub fn new(section_count: u32) -> Self {
        Self {
            version: PACK_VERSION,
            section_count,
            flags: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&PACK_MAGIC);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.section_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.flags.to_le_bytes());
        bytes
    }

    /// Parse without validation; `None` on short input or wrong magic
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || bytes[0..4] != PACK_MAGIC {
            return None;
        }
        Some(Self {
            version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            section_count: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            flags: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }

    /// Parse and validate magic and version
    pub fn parse(bytes: &[u8]) -> Result<Self, ContainerError> {
        if bytes.len() < Self::SIZE {
            return Err(ContainerError::Truncated);
        }
        let found = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if found != PACK_MAGIC {
            return Err(ContainerError::BadMagic { found });
        }
        let header = Self::from_bytes(bytes).ok_or(ContainerError::Truncated)?;
        if header.version != PACK_VERSION {
            return Err(ContainerError::UnsupportedVersion {
                found: header.version,
            });
        }
        Ok(header)
    }

    /// Byte offset of the first section payload
    pub fn payload_start(&self) -> u64 {
        Self::SIZE as u64 + self.section_count as u64 * SectionEntry::SIZE as u64
    }
}

/// Section table entry (32 bytes)
///
/// The kind is kept raw so a table can be parsed before it is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionEntry {
    pub kind: u32,
    pub reserved: u32,
    pub offset: u64,
    pub size: u64,
    pub name_hash: u64,
}

impl SectionEntry {
    pub const SIZE: usize = 32;

    pub fn new(kind: SectionKind, offset: u64, size: u64, name: &str) -> Self {
        Self {
            kind: kind as u32,
            reserved: 0,
            offset,
            size,
            name_hash: section_name_hash(name),
        }
    }

    pub fn section_kind(&self) -> Option<SectionKind> {
        SectionKind::from_u32(self.kind)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.kind.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.reserved.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.offset.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.size.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.name_hash.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let u32_at = |at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap_or([0; 4]));
        let u64_at = |at: usize| u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap_or([0; 8]));
        Some(Self {
            kind: u32_at(0),
            reserved: u32_at(4),
            offset: u64_at(8),
            size: u64_at(16),
            name_hash: u64_at(24),
        })
    }
}

/// Builds a pack in memory
#[derive(Debug, Default)]
pub struct PackWriter {
    sections: Vec<(SectionKind, String, Vec<u8>)>,
}

impl PackWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_skeleton(&mut self, skeleton: &Skeleton) {
        self.sections.push((
            SectionKind::Skeleton,
            SKELETON_SECTION_NAME.to_string(),
            write_skeleton(skeleton),
        ));
    }

    pub fn add_clip(&mut self, clip: &EncodedAnimation) {
        self.sections
            .push((SectionKind::Clip, clip.name.clone(), write_clip(clip)));
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Serialize header, table and payloads
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = PackHeader::new(self.sections.len() as u32);
        let mut offset = header.payload_start();

        let mut out = Vec::with_capacity(
            offset as usize + self.sections.iter().map(|(_, _, p)| p.len()).sum::<usize>(),
        );
        out.extend_from_slice(&header.to_bytes());
        for (kind, name, payload) in &self.sections {
            let entry = SectionEntry::new(*kind, offset, payload.len() as u64, name);
            out.extend_from_slice(&entry.to_bytes());
            offset += payload.len() as u64;
        }
        for (_, _, payload) in &self.sections {
            out.extend_from_slice(payload);
        }
        out
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), ContainerError> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Random-access reader over a validated pack
#[derive(Debug)]
pub struct PackReader<R> {
    reader: R,
    header: PackHeader,
    entries: Vec<SectionEntry>,
}

impl<R: Read + Seek> PackReader<R> {
    /// Read and validate header and section table
    ///
    /// Fails without reading any payload if the magic, version or any
    /// section's bounds are wrong.
    pub fn open(mut reader: R) -> Result<Self, ContainerError> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut header_bytes = [0u8; PackHeader::SIZE];
        read_exact_or_truncated(&mut reader, &mut header_bytes)?;
        let header = PackHeader::parse(&header_bytes)?;

        let payload_start = header.payload_start();
        if payload_start > stream_len {
            return Err(ContainerError::Truncated);
        }

        let mut table = vec![0u8; header.section_count as usize * SectionEntry::SIZE];
        read_exact_or_truncated(&mut reader, &mut table)?;

        let mut entries = Vec::with_capacity(header.section_count as usize);
        for (index, raw) in table.chunks_exact(SectionEntry::SIZE).enumerate() {
            let entry = SectionEntry::from_bytes(raw).ok_or(ContainerError::Truncated)?;
            if entry.section_kind().is_none() {
                return Err(ContainerError::UnknownSectionKind {
                    index,
                    kind: entry.kind,
                });
            }
            let in_bounds = entry.offset >= payload_start
                && entry
                    .offset
                    .checked_add(entry.size)
                    .is_some_and(|end| end <= stream_len);
            if !in_bounds {
                return Err(ContainerError::SectionOutOfBounds {
                    index,
                    offset: entry.offset,
                    size: entry.size,
                });
            }
            entries.push(entry);
        }

        Ok(Self {
            reader,
            header,
            entries,
        })
    }

    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    pub fn entries(&self) -> &[SectionEntry] {
        &self.entries
    }

    /// Raw payload of a validated entry
    pub fn read_section(&mut self, index: usize) -> Result<Option<Vec<u8>>, ContainerError> {
        let Some(entry) = self.entries.get(index).copied() else {
            return Ok(None);
        };
        self.reader.seek(SeekFrom::Start(entry.offset))?;
        let mut payload = vec![0u8; entry.size as usize];
        read_exact_or_truncated(&mut self.reader, &mut payload)?;
        Ok(Some(payload))
    }

    /// The pack's skeleton, if it has one
    pub fn skeleton(&mut self) -> Result<Option<Skeleton>, ContainerError> {
        let Some(index) = self.find(SectionKind::Skeleton, SKELETON_SECTION_NAME) else {
            return Ok(None);
        };
        match self.read_section(index)? {
            Some(payload) => read_skeleton(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Seek directly to a clip by name
    pub fn clip(&mut self, name: &str) -> Result<Option<EncodedAnimation>, ContainerError> {
        let Some(index) = self.find(SectionKind::Clip, name) else {
            return Ok(None);
        };
        let Some(payload) = self.read_section(index)? else {
            return Ok(None);
        };
        let clip = read_clip(&payload)?;
        if clip.name != name {
            return Err(ContainerError::NameMismatch {
                expected: name.to_string(),
                found: clip.name,
            });
        }
        Ok(Some(clip))
    }

    /// Every clip, in table order
    pub fn clips(&mut self) -> Result<Vec<EncodedAnimation>, ContainerError> {
        let indices: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.section_kind() == Some(SectionKind::Clip))
            .map(|(i, _)| i)
            .collect();

        let mut clips = Vec::with_capacity(indices.len());
        for index in indices {
            if let Some(payload) = self.read_section(index)? {
                let clip = read_clip(&payload)?;
                if section_name_hash(&clip.name) != self.entries[index].name_hash {
                    return Err(ContainerError::MalformedSection {
                        kind: SectionKind::Clip,
                        reason: "name does not match section table hash",
                    });
                }
                clips.push(clip);
            }
        }
        Ok(clips)
    }

    fn find(&self, kind: SectionKind, name: &str) -> Option<usize> {
        let hash = section_name_hash(name);
        self.entries
            .iter()
            .position(|e| e.kind == kind as u32 && e.name_hash == hash)
    }
}

fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ContainerError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ContainerError::Truncated,
        _ => ContainerError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationPayload, RootMotionExtents};
    use crate::channel::LocalTransform;
    use crate::codec::CodecId;
    use crate::skeleton::Bone;
    use std::io::Cursor;

    fn sample_skeleton() -> Skeleton {
        Skeleton::from_bones(vec![
            Bone::new("hips", None, LocalTransform::IDENTITY),
            Bone::new("spine", Some(0), LocalTransform::IDENTITY),
        ])
        .unwrap()
    }

    fn sample_clip(name: &str) -> EncodedAnimation {
        EncodedAnimation {
            name: name.to_string(),
            duration: 1.5,
            track_count: 3,
            root_motion: RootMotionExtents::default(),
            payload: AnimationPayload::Compressed {
                codec: CodecId::QUANTIZED,
                blob: vec![1, 2, 3, 4],
            },
        }
    }

    fn sample_pack() -> Vec<u8> {
        let mut writer = PackWriter::new();
        writer.add_skeleton(&sample_skeleton());
        writer.add_clip(&sample_clip("Walk"));
        writer.add_clip(&sample_clip("Run"));
        writer.to_bytes()
    }

    // ========================================================================
    // Header
    // ========================================================================

    #[test]
    fn test_header_roundtrip() {
        let header = PackHeader::new(5);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"NCAP");
        assert_eq!(PackHeader::parse(&bytes).unwrap(), header);
        assert_eq!(header.payload_start(), 16 + 5 * 32);
    }

    #[test]
    fn test_section_entry_roundtrip() {
        let entry = SectionEntry::new(SectionKind::Clip, 64, 128, "Walk");
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[8..16], &64u64.to_le_bytes());
        assert_eq!(SectionEntry::from_bytes(&bytes), Some(entry));
        assert_eq!(entry.section_kind(), Some(SectionKind::Clip));
        assert!(SectionEntry::from_bytes(&bytes[..10]).is_none());
        assert!(PackHeader::from_bytes(&PackHeader::new(1).to_bytes()[..12]).is_none());
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(PackHeader::SIZE, 16);
        assert_eq!(SectionEntry::SIZE, 32);
    }

    // ========================================================================
    // Round trip
    // ========================================================================

    #[test]
    fn test_pack_roundtrip() {
        let bytes = sample_pack();
        let mut reader = PackReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.entries().len(), 3);
        assert_eq!(reader.skeleton().unwrap(), Some(sample_skeleton()));
        assert_eq!(reader.clip("Run").unwrap(), Some(sample_clip("Run")));
        assert_eq!(reader.clip("Jump").unwrap(), None);

        let names: Vec<String> = reader.clips().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Walk", "Run"]);
    }

    // ========================================================================
    // Refusals
    // ========================================================================

    #[test]
    fn test_bad_magic_refused() {
        let mut bytes = sample_pack();
        bytes[0] = b'X';
        let err = PackReader::open(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ContainerError::BadMagic { .. }));
    }

    #[test]
    fn test_unsupported_version_refused() {
        let mut bytes = sample_pack();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = PackReader::open(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ContainerError::UnsupportedVersion { found: 2 }));
    }

    #[test]
    fn test_out_of_bounds_section_refused() {
        let mut bytes = sample_pack();
        // Grow the last section's size past the end of the file
        let size_at = PackHeader::SIZE + 2 * SectionEntry::SIZE + 16;
        bytes[size_at..size_at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = PackReader::open(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::SectionOutOfBounds { index: 2, .. }
        ));
    }

    #[test]
    fn test_truncated_table_refused() {
        let bytes = sample_pack();
        let err = PackReader::open(Cursor::new(bytes[..40].to_vec())).unwrap_err();
        assert!(matches!(err, ContainerError::Truncated));
    }

    #[test]
    fn test_unknown_section_kind_refused() {
        let mut bytes = sample_pack();
        bytes[PackHeader::SIZE..PackHeader::SIZE + 4].copy_from_slice(&9u32.to_le_bytes());
        let err = PackReader::open(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::UnknownSectionKind { index: 0, kind: 9 }
        ));
    }
}
