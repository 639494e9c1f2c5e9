//! MS-CFB version 3 writer.
//!
//! Layout produced, in sector order after the 512-byte header:
//!
//! ```text
//! [large streams][mini stream][directory][MiniFAT][FAT]
//! ```
//!
//! Streams below the 4096-byte cutoff live in the mini stream (64-byte mini
//! sectors, chained by the MiniFAT). Sibling entries form a balanced binary
//! tree ordered by name length, then by upper-cased name. Every node is
//! written black, and timestamps and CLSIDs are zero, so identical trees
//! always serialize to identical bytes.

use super::{ContainerNode, ContainerTree, ContainerWriter};
use crate::error::{Error, Result};
use std::cmp::Ordering;

const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const SECTOR_SIZE: usize = 512;
const MINI_SECTOR_SIZE: usize = 64;
const MINI_STREAM_CUTOFF: usize = 4096;
const DIR_ENTRY_SIZE: usize = 128;
const HEADER_FAT_SLOTS: usize = 109;
const MAX_NAME_UNITS: usize = 31;

const FATSECT: u32 = 0xFFFF_FFFD;
const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FREESECT: u32 = 0xFFFF_FFFF;
const NOSTREAM: u32 = 0xFFFF_FFFF;

const STGTY_EMPTY: u8 = 0;
const STGTY_STORAGE: u8 = 1;
const STGTY_STREAM: u8 = 2;
const STGTY_ROOT: u8 = 5;
const COLOR_BLACK: u8 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompoundFileWriter;

impl CompoundFileWriter {
    pub fn new() -> Self {
        CompoundFileWriter
    }
}

impl ContainerWriter for CompoundFileWriter {
    fn serialize(&self, tree: &ContainerTree) -> Result<Vec<u8>> {
        let mut entries = vec![DirEntry::new("Root Entry", STGTY_ROOT)];
        let mut children: Vec<Vec<usize>> = vec![Vec::new()];
        let mut payloads: Vec<(usize, &[u8])> = Vec::new();
        flatten(&tree.children, 0, &mut entries, &mut children, &mut payloads)?;

        let mut fat: Vec<u32> = Vec::new();
        let mut mini_fat: Vec<u32> = Vec::new();
        let mut mini_stream: Vec<u8> = Vec::new();
        let mut large: Vec<&[u8]> = Vec::new();

        // Large streams take the first sectors, in tree order.
        for &(sid, data) in &payloads {
            if data.len() >= MINI_STREAM_CUTOFF {
                entries[sid].start = allocate_chain(&mut fat, data.len().div_ceil(SECTOR_SIZE));
                large.push(data);
            }
        }
        for &(sid, data) in &payloads {
            if data.len() < MINI_STREAM_CUTOFF && !data.is_empty() {
                entries[sid].start =
                    allocate_chain(&mut mini_fat, data.len().div_ceil(MINI_SECTOR_SIZE));
                mini_stream.extend_from_slice(data);
                pad_to(&mut mini_stream, MINI_SECTOR_SIZE);
            }
        }

        entries[0].start = allocate_chain(&mut fat, mini_stream.len().div_ceil(SECTOR_SIZE));
        entries[0].size = mini_stream.len() as u64;

        let dir_sectors = (entries.len() * DIR_ENTRY_SIZE).div_ceil(SECTOR_SIZE);
        let dir_start = allocate_chain(&mut fat, dir_sectors);

        let mini_fat_sectors = (mini_fat.len() * 4).div_ceil(SECTOR_SIZE);
        let mini_fat_start = allocate_chain(&mut fat, mini_fat_sectors);

        let fat_sectors = fat_sector_count(fat.len());
        if fat_sectors > HEADER_FAT_SLOTS {
            return Err(Error::ContainerError(format!(
                "Container needs {} FAT sectors; at most {} are supported",
                fat_sectors, HEADER_FAT_SLOTS
            )));
        }
        let fat_start = fat.len() as u32;
        fat.extend(std::iter::repeat_n(FATSECT, fat_sectors));

        for (parent, kids) in children.iter().enumerate() {
            if entries[parent].kind != STGTY_STREAM {
                let mut sorted = kids.clone();
                sorted.sort_by(|&a, &b| compare_names(&entries[a].name, &entries[b].name));
                entries[parent].child = link_siblings(&sorted, &mut entries);
            }
        }

        let header = encode_header(
            dir_start,
            mini_fat_start,
            mini_fat_sectors as u32,
            fat_start,
            fat_sectors as u32,
        );

        let mut out = Vec::with_capacity(SECTOR_SIZE * (fat.len() + 1));
        out.extend_from_slice(&header);
        for data in large {
            out.extend_from_slice(data);
            pad_to(&mut out, SECTOR_SIZE);
        }
        out.extend_from_slice(&mini_stream);
        pad_to(&mut out, SECTOR_SIZE);

        for entry in &entries {
            out.extend_from_slice(&entry.to_bytes());
        }
        for _ in entries.len()..dir_sectors * (SECTOR_SIZE / DIR_ENTRY_SIZE) {
            out.extend_from_slice(&DirEntry::new("", STGTY_EMPTY).to_bytes());
        }

        for value in &mini_fat {
            out.extend_from_slice(&value.to_le_bytes());
        }
        pad_with_free(&mut out);

        for value in &fat {
            out.extend_from_slice(&value.to_le_bytes());
        }
        pad_with_free(&mut out);

        Ok(out)
    }
}

#[derive(Debug, Clone)]
struct DirEntry {
    name: String,
    kind: u8,
    left: u32,
    right: u32,
    child: u32,
    start: u32,
    size: u64,
}

impl DirEntry {
    fn new(name: &str, kind: u8) -> Self {
        DirEntry {
            name: name.to_string(),
            kind,
            left: NOSTREAM,
            right: NOSTREAM,
            child: NOSTREAM,
            start: if kind == STGTY_STORAGE || kind == STGTY_EMPTY {
                0
            } else {
                ENDOFCHAIN
            },
            size: 0,
        }
    }

    fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut data = [0u8; DIR_ENTRY_SIZE];
        let units: Vec<u16> = self.name.encode_utf16().collect();
        for (i, unit) in units.iter().enumerate() {
            data[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        if self.kind != STGTY_EMPTY {
            // Byte length including the UTF-16 null terminator.
            let name_len = ((units.len() + 1) * 2) as u16;
            data[64..66].copy_from_slice(&name_len.to_le_bytes());
            data[67] = COLOR_BLACK;
        }
        data[66] = self.kind;
        data[68..72].copy_from_slice(&self.left.to_le_bytes());
        data[72..76].copy_from_slice(&self.right.to_le_bytes());
        data[76..80].copy_from_slice(&self.child.to_le_bytes());
        // CLSID, state bits and timestamps (80..116) stay zero.
        data[116..120].copy_from_slice(&self.start.to_le_bytes());
        data[120..128].copy_from_slice(&self.size.to_le_bytes());
        data
    }
}

fn flatten<'a>(
    nodes: &'a [ContainerNode],
    parent: usize,
    entries: &mut Vec<DirEntry>,
    children: &mut Vec<Vec<usize>>,
    payloads: &mut Vec<(usize, &'a [u8])>,
) -> Result<()> {
    for node in nodes {
        validate_name(node.name())?;
        if children[parent]
            .iter()
            .any(|&sid| compare_names(&entries[sid].name, node.name()) == Ordering::Equal)
        {
            return Err(Error::ContainerError(format!(
                "Duplicate entry name {:?}",
                node.name()
            )));
        }

        let sid = entries.len();
        children[parent].push(sid);
        children.push(Vec::new());
        match node {
            ContainerNode::Storage {
                name,
                children: nested,
            } => {
                entries.push(DirEntry::new(name, STGTY_STORAGE));
                flatten(nested, sid, entries, children, payloads)?;
            }
            ContainerNode::Stream { name, data } => {
                let mut entry = DirEntry::new(name, STGTY_STREAM);
                entry.size = data.len() as u64;
                entries.push(entry);
                payloads.push((sid, data.as_slice()));
            }
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    let units = name.encode_utf16().count();
    if units == 0 || units > MAX_NAME_UNITS {
        return Err(Error::ContainerError(format!(
            "Entry name must be 1 to {} UTF-16 units: {:?}",
            MAX_NAME_UNITS, name
        )));
    }
    if name.contains(['/', '\\', ':', '!']) {
        return Err(Error::ContainerError(format!(
            "Entry name contains a reserved character: {:?}",
            name
        )));
    }
    Ok(())
}

/// Directory ordering: shorter names first, then upper-cased UTF-16 comparison.
fn compare_names(a: &str, b: &str) -> Ordering {
    let upper = |s: &str| s.to_uppercase().encode_utf16().collect::<Vec<u16>>();
    a.encode_utf16()
        .count()
        .cmp(&b.encode_utf16().count())
        .then_with(|| upper(a).cmp(&upper(b)))
}

/// Links a sorted sibling list into a balanced tree and returns its root SID.
fn link_siblings(sorted: &[usize], entries: &mut [DirEntry]) -> u32 {
    if sorted.is_empty() {
        return NOSTREAM;
    }
    let mid = sorted.len() / 2;
    let left = link_siblings(&sorted[..mid], entries);
    let right = link_siblings(&sorted[mid + 1..], entries);
    let root = sorted[mid];
    entries[root].left = left;
    entries[root].right = right;
    root as u32
}

/// Appends a contiguous chain of `count` sectors and returns its first index.
fn allocate_chain(table: &mut Vec<u32>, count: usize) -> u32 {
    if count == 0 {
        return ENDOFCHAIN;
    }
    let start = table.len();
    for i in 1..count {
        table.push((start + i) as u32);
    }
    table.push(ENDOFCHAIN);
    start as u32
}

/// FAT sectors needed to describe `used` sectors plus the FAT sectors themselves.
fn fat_sector_count(used: usize) -> usize {
    let per_sector = SECTOR_SIZE / 4;
    let mut count = used.div_ceil(per_sector);
    while (used + count).div_ceil(per_sector) > count {
        count += 1;
    }
    count
}

fn encode_header(
    dir_start: u32,
    mini_fat_start: u32,
    mini_fat_sectors: u32,
    fat_start: u32,
    fat_sectors: u32,
) -> [u8; SECTOR_SIZE] {
    let mut header = [0u8; SECTOR_SIZE];
    header[0..8].copy_from_slice(MAGIC);
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes()); // minor version
    header[26..28].copy_from_slice(&3u16.to_le_bytes()); // major version
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes()); // byte order
    header[30..32].copy_from_slice(&9u16.to_le_bytes()); // 512-byte sectors
    header[32..34].copy_from_slice(&6u16.to_le_bytes()); // 64-byte mini sectors
    // Directory sector count must be zero for version 3.
    header[44..48].copy_from_slice(&fat_sectors.to_le_bytes());
    header[48..52].copy_from_slice(&dir_start.to_le_bytes());
    header[56..60].copy_from_slice(&(MINI_STREAM_CUTOFF as u32).to_le_bytes());
    header[60..64].copy_from_slice(&mini_fat_start.to_le_bytes());
    header[64..68].copy_from_slice(&mini_fat_sectors.to_le_bytes());
    header[68..72].copy_from_slice(&ENDOFCHAIN.to_le_bytes()); // no DIFAT sectors
    for slot in 0..HEADER_FAT_SLOTS {
        let id = if slot < fat_sectors as usize {
            fat_start + slot as u32
        } else {
            FREESECT
        };
        let offset = 76 + slot * 4;
        header[offset..offset + 4].copy_from_slice(&id.to_le_bytes());
    }
    header
}

fn pad_to(buf: &mut Vec<u8>, align: usize) {
    buf.resize(buf.len().div_ceil(align) * align, 0);
}

fn pad_with_free(buf: &mut Vec<u8>) {
    while buf.len() % SECTOR_SIZE != 0 {
        buf.extend_from_slice(&FREESECT.to_le_bytes());
    }
}
