//! Compound File Binary container, the OLE storage that wraps .xls workbooks
//! and password protected OOXML packages.
//!
//! Uploaded files are untrusted: every sector index is bounds-checked and
//! every chain walk is capped, so corrupt input ends in [`CfbError`].

use crate::error::DecodeError;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use crate::helpers::string::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use thiserror::Error;

const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_LEN: usize = 512;
/// Sector ids at or above this value are markers (free, end of chain, ...).
const LAST_REGULAR_SECTOR: usize = 0xFFFF_FFFA;
const DIRECTORY_ENTRY_LEN: usize = 128;
const MINI_SECTOR_LEN: usize = 64;
const MINI_STREAM_CUTOFF: usize = 4096;
const ROOT_ENTRY: &str = "Root Entry";

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("not a compound file (OLE signature missing)")]
    BadSignature,

    #[error("unsupported sector size 2^{shift} for format version {version}")]
    UnsupportedSectorSize { version: u16, shift: u16 },

    #[error("corrupt compound file: {0}")]
    Corrupt(&'static str),
}

#[derive(Debug)]
struct Header {
    version: u16,
    sector_shift: u16,
    fat_sectors: usize,
    first_directory_sector: usize,
    first_mini_fat_sector: usize,
    mini_fat_sectors: usize,
    first_difat_sector: usize,
    difat_sectors: usize,
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<Header, CfbError> {
        if bytes.len() < HEADER_LEN {
            return Err(CfbError::Corrupt("shorter than its header"));
        }
        if to_u64(&bytes[0..8]) != SIGNATURE {
            return Err(CfbError::BadSignature);
        }
        Ok(Header {
            version: to_u16(&bytes[26..28]),
            sector_shift: to_u16(&bytes[30..32]),
            fat_sectors: to_usize(&bytes[44..48]),
            first_directory_sector: to_usize(&bytes[48..52]),
            first_mini_fat_sector: to_usize(&bytes[60..64]),
            mini_fat_sectors: to_usize(&bytes[64..68]),
            first_difat_sector: to_usize(&bytes[68..72]),
            difat_sectors: to_usize(&bytes[72..76]),
        })
    }

    /// Version 3 uses 512 byte sectors, version 4 uses 4096 byte sectors
    /// and pads the header to a whole sector.
    fn sector_len(&self) -> Result<usize, CfbError> {
        match (self.version, self.sector_shift) {
            (3, 9) => Ok(512),
            (4, 12) => Ok(4096),
            (version, shift) => Err(CfbError::UnsupportedSectorSize { version, shift }),
        }
    }
}

/// Fixed-size sectors laid over one byte buffer.
#[derive(Debug)]
struct SectorPool {
    bytes: Vec<u8>,
    sector_len: usize,
    /// Byte offset of sector 0.
    origin: usize,
}

impl SectorPool {
    fn sector(&self, id: usize) -> Result<&[u8], CfbError> {
        let start = id
            .checked_mul(self.sector_len)
            .and_then(|offset| offset.checked_add(self.origin))
            .filter(|&start| start < self.bytes.len())
            .ok_or(CfbError::Corrupt("sector out of range"))?;
        let end = self.bytes.len().min(start + self.sector_len);
        Ok(&self.bytes[start..end])
    }

    /// Concatenates the sectors of the chain starting at `first`, following
    /// `table`. A chain longer than the table must contain a cycle.
    fn chain(&self, table: &[usize], first: usize) -> Result<Vec<u8>, CfbError> {
        let mut content = Vec::new();
        let mut id = first;
        let mut steps = 0usize;
        while id <= LAST_REGULAR_SECTOR {
            steps += 1;
            if steps > table.len() + 1 {
                return Err(CfbError::Corrupt("cyclic sector chain"));
            }
            content.extend_from_slice(self.sector(id)?);
            id = *table.get(id).ok_or(CfbError::Corrupt("sector chain leaves the allocation table"))?;
        }
        Ok(content)
    }
}

/// Start sector and byte length of a directory entry's stream.
#[derive(Debug, Clone, Copy)]
struct Entry {
    first_sector: usize,
    size: usize,
}

fn parse_entry(bytes: &[u8], version: u16) -> (String, Entry) {
    let name_len = usize::from(to_u16(&bytes[64..66])).min(64);
    let (name, _, _) = UTF_16LE.decode(&bytes[..name_len]);
    let name = name.split('\0').next().unwrap_or_default().to_owned();
    // Version 3 writers may leave garbage in the upper half of the size.
    let size = match version {
        3 => to_u32(&bytes[120..124]) as usize,
        _ => to_u64(&bytes[120..128]) as usize,
    };
    let entry = Entry {
        first_sector: to_usize(&bytes[116..120]),
        size,
    };
    (name, entry)
}

/// A parsed compound file: its directory and both sector pools.
pub(crate) struct Cfb {
    entries: HashMap<String, Entry>,
    fat: Vec<usize>,
    sectors: SectorPool,
    mini_fat: Vec<usize>,
    mini_sectors: SectorPool,
}

impl Cfb {
    pub(crate) fn is_compound_file(bytes: &[u8]) -> bool {
        bytes.len() >= 8 && to_u64(&bytes[..8]) == SIGNATURE
    }

    /// Parses a compound file held entirely in memory.
    pub(crate) fn new(bytes: &[u8]) -> Result<Cfb, DecodeError> {
        let header = Header::parse(bytes)?;
        let sector_len = header.sector_len()?;
        let sectors = SectorPool {
            bytes: bytes.to_vec(),
            sector_len,
            origin: sector_len,
        };

        let fat = load_fat(&sectors, &header)?;

        let directory = sectors.chain(&fat, header.first_directory_sector)?;
        let entries: HashMap<String, Entry> = directory
            .chunks_exact(DIRECTORY_ENTRY_LEN)
            .map(|bytes| parse_entry(bytes, header.version))
            .collect();
        if entries.is_empty() {
            return Err(CfbError::Corrupt("empty directory").into());
        }

        let mini_fat = if header.mini_fat_sectors == 0 {
            Vec::new()
        } else {
            to_usize_iter(&sectors.chain(&fat, header.first_mini_fat_sector)?).collect()
        };

        // The mini stream is the root entry's stream; mini sector 0 starts at its first byte.
        let mut mini_stream = Vec::new();
        if let Some(root) = entries.get(ROOT_ENTRY) {
            mini_stream = sectors.chain(&fat, root.first_sector)?;
            mini_stream.truncate(root.size);
        }
        let mini_sectors = SectorPool {
            bytes: mini_stream,
            sector_len: MINI_SECTOR_LEN,
            origin: 0,
        };

        Ok(Cfb { entries, fat, sectors, mini_fat, mini_sectors })
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Reads a whole stream by name, `None` when the directory has no such entry.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, DecodeError> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(None);
        };
        let mut bytes = if entry.size < MINI_STREAM_CUTOFF {
            self.mini_sectors.chain(&self.mini_fat, entry.first_sector)?
        } else {
            self.sectors.chain(&self.fat, entry.first_sector)?
        };
        if bytes.len() < entry.size {
            return Err(CfbError::Corrupt("stream shorter than its directory entry").into());
        }
        bytes.truncate(entry.size);
        Ok(Some(bytes))
    }
}

/// Collects the allocation table: the first 109 FAT sector ids sit in the
/// header, the rest in a chain of DIFAT sectors whose last slot links onward.
fn load_fat(sectors: &SectorPool, header: &Header) -> Result<Vec<usize>, CfbError> {
    let mut fat_sector_ids: Vec<usize> = to_usize_iter(&sectors.bytes[76..HEADER_LEN]).collect();

    let mut next = header.first_difat_sector;
    let mut visited = 0usize;
    while next <= LAST_REGULAR_SECTOR {
        if visited == header.difat_sectors {
            return Err(CfbError::Corrupt("more DIFAT sectors than declared"));
        }
        let mut ids: Vec<usize> = to_usize_iter(sectors.sector(next)?).collect();
        next = ids.pop().ok_or(CfbError::Corrupt("empty DIFAT sector"))?;
        fat_sector_ids.extend(ids);
        visited += 1;
    }
    if visited != header.difat_sectors {
        return Err(CfbError::Corrupt("fewer DIFAT sectors than declared"));
    }

    let mut fat = Vec::new();
    let mut loaded = 0usize;
    for id in fat_sector_ids.into_iter().filter(|&id| id <= LAST_REGULAR_SECTOR) {
        fat.extend(to_usize_iter(sectors.sector(id)?));
        loaded += 1;
    }
    if loaded != header.fat_sectors {
        return Err(CfbError::Corrupt("FAT sector count does not match the header"));
    }
    Ok(fat)
}
