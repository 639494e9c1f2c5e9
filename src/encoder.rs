// src/encoder.rs
//
// Byte layouts for the OLB streams. These were reverse engineered from sample
// libraries; every integer is little-endian.

use crate::capture_models::*;
use crate::error::{Error, Result};
use crate::profile::{FONT_RECORD_COUNT, LibraryProfile, MAX_FIXED_NAME_LEN};
use bitflags::bitflags;
use bytes::{BufMut, BytesMut};

pub const DIRECTORY_MAGIC: u32 = 0x7f1f_8569;
pub const LIBRARY_HEADER_LEN: usize = 32;
pub const FONT_RECORD_LEN: usize = 44;
pub const PAGE_BLOCK_LEN: usize = 48;
pub const CACHE_LEN: usize = 10;
pub const NET_BUNDLE_MAP_VALUE: u32 = 2;

const FONT_NAME_LEN: usize = 32;
const PACKAGE_VERSION: u32 = 1;
const PACKAGE_PART_COUNT: u32 = 1;
const LINE_STYLE_SOLID: u32 = 0;

bitflags! {
    /// Pin decoration bits in the package stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PinFlags: u32 {
        const VISIBLE = 0x01;
        const CLOCK = 0x02;
        const DOT = 0x04;
        const LONG = 0x08;
    }
}

impl PinFlags {
    pub fn from_pin(pin: &Pin) -> Self {
        let mut flags = PinFlags::empty();
        flags.set(PinFlags::VISIBLE, pin.visible);
        flags.set(PinFlags::CLOCK, pin.is_clock);
        flags.set(PinFlags::DOT, pin.is_dot);
        flags.set(PinFlags::LONG, pin.is_long);
        flags
    }
}

/// The top-level storages of a library, each listed by a `<Folder> Directory` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Cells,
    Parts,
    Views,
    Symbols,
    Graphics,
    Packages,
    ExportBlocks,
}

impl Folder {
    pub const ALL: [Folder; 7] = [
        Folder::Cells,
        Folder::Parts,
        Folder::Views,
        Folder::Symbols,
        Folder::Graphics,
        Folder::Packages,
        Folder::ExportBlocks,
    ];

    pub fn storage_name(self) -> &'static str {
        match self {
            Folder::Cells => "Cells",
            Folder::Parts => "Parts",
            Folder::Views => "Views",
            Folder::Symbols => "Symbols",
            Folder::Graphics => "Graphics",
            Folder::Packages => "Packages",
            Folder::ExportBlocks => "ExportBlocks",
        }
    }

    pub fn directory_stream_name(self) -> String {
        format!("{} Directory", self.storage_name())
    }

    /// Names listed for a single-component, single-view library.
    pub fn directory_entries(self, def: &ComponentDefinition) -> Vec<String> {
        match self {
            Folder::Cells => vec![format!("{}A", entry_name(&def.name))],
            Folder::Parts => vec![format!("{}A.Normal", entry_name(&def.name))],
            Folder::Packages => vec![entry_name(&def.name)],
            Folder::Views | Folder::Symbols | Folder::Graphics | Folder::ExportBlocks => {
                Vec::new()
            }
        }
    }
}

/// Name under which a component is stored and listed.
///
/// Applies the same substitution as every encoded string, and replaces the
/// characters a compound-file entry name cannot hold with `_`.
pub fn entry_name(name: &str) -> String {
    ascii_payload(name)
        .into_iter()
        .map(|b| match b {
            b'/' | b'\\' | b':' | b'!' => '_',
            _ => b as char,
        })
        .collect()
}

/// Encodes the `Library` stream. Depends only on the profile.
pub fn encode_library(profile: &LibraryProfile) -> Result<Vec<u8>> {
    if profile.fonts.len() != FONT_RECORD_COUNT {
        return Err(Error::EncodingError(format!(
            "Library stream needs {} font records, profile has {}",
            FONT_RECORD_COUNT,
            profile.fonts.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(
        LIBRARY_HEADER_LEN + 16 + FONT_RECORD_COUNT * FONT_RECORD_LEN + PAGE_BLOCK_LEN,
    );

    // Title, space padded, with the final byte reserved for the null.
    let title = fixed_ascii(&profile.title, MAX_FIXED_NAME_LEN, "library title")?;
    buf.put_slice(&title);
    buf.put_bytes(b' ', MAX_FIXED_NAME_LEN - title.len());
    buf.put_u8(0);

    buf.put_u32_le(profile.version.major);
    buf.put_u32_le(profile.version.minor);
    buf.put_u32_le(profile.version.config_flags);
    buf.put_u32_le(profile.version.reserved);

    for font in &profile.fonts {
        let name = fixed_ascii(&font.name, MAX_FIXED_NAME_LEN, "font name")?;
        buf.put_u32_le(font.index);
        buf.put_slice(&name);
        buf.put_bytes(0, FONT_NAME_LEN - name.len());
        buf.put_u32_le(font.size);
        buf.put_u32_le(font.flags);
    }

    buf.put_u32_le(profile.page.width);
    buf.put_u32_le(profile.page.height);
    buf.put_bytes(0, PAGE_BLOCK_LEN - 8);

    Ok(buf.to_vec())
}

pub fn encode_cache() -> Vec<u8> {
    vec![0u8; CACHE_LEN]
}

pub fn encode_net_bundle_map_data() -> Vec<u8> {
    NET_BUNDLE_MAP_VALUE.to_le_bytes().to_vec()
}

/// Encodes a `<Folder> Directory` stream: magic, u16 count, null-terminated names.
pub fn encode_directory(names: &[String]) -> Result<Vec<u8>> {
    let count = u16::try_from(names.len()).map_err(|_| {
        Error::EncodingError(format!("Too many directory entries: {}", names.len()))
    })?;

    let mut buf = BytesMut::with_capacity(6 + names.iter().map(|n| n.len() + 1).sum::<usize>());
    buf.put_u32_le(DIRECTORY_MAGIC);
    buf.put_u16_le(count);
    for name in names {
        buf.put_slice(&ascii_payload(name));
        buf.put_u8(0);
    }
    Ok(buf.to_vec())
}

/// Encodes the per-component stream stored at `/Packages/<Name>`.
pub fn encode_package(def: &ComponentDefinition) -> Result<Vec<u8>> {
    let pin_count = count_u32(def.pins.len(), "pins")?;
    let mut buf = BytesMut::new();

    buf.put_u32_le(PACKAGE_VERSION);
    buf.put_u32_le(pin_count);
    buf.put_u32_le(PACKAGE_PART_COUNT);
    buf.put_u32_le(0); // flags

    put_lp_string(&mut buf, &def.name)?;
    put_lp_string(&mut buf, &def.pcb_footprint)?;
    put_lp_string(&mut buf, &def.refdes_prefix)?;

    let bbox = def.symbol_bbox;
    buf.put_i32_le(bbox.x1);
    buf.put_i32_le(bbox.y1);
    buf.put_i32_le(bbox.x2);
    buf.put_i32_le(bbox.y2);

    buf.put_u32_le(count_u32(def.lines.len(), "lines")?);
    for line in &def.lines {
        buf.put_i32_le(line.x1);
        buf.put_i32_le(line.y1);
        buf.put_i32_le(line.x2);
        buf.put_i32_le(line.y2);
        buf.put_u32_le(LINE_STYLE_SOLID);
    }

    buf.put_u32_le(pin_count);
    for pin in &def.pins {
        put_lp_string(&mut buf, &pin.name)?;
        buf.put_i32_le(pin.hotpt_x);
        buf.put_i32_le(pin.hotpt_y);
        buf.put_i32_le(pin.start_x);
        buf.put_i32_le(pin.start_y);
        buf.put_u32_le(pin.pin_type);
        buf.put_u32_le(pin.position);
        buf.put_u32_le(PinFlags::from_pin(pin).bits());
    }

    buf.put_u32_le(count_u32(def.pin_numbers.len(), "pin numbers")?);
    for pin_number in &def.pin_numbers {
        put_lp_string(&mut buf, &pin_number.number)?;
        buf.put_u32_le(pin_number.position);
    }

    buf.put_u32_le(count_u32(def.user_props.len(), "user properties")?);
    for prop in &def.user_props {
        put_lp_string(&mut buf, &prop.key)?;
        put_lp_string(&mut buf, &prop.value)?;
    }

    Ok(buf.to_vec())
}

/// Writes a u16 length (payload plus trailing null) followed by the payload and null.
fn put_lp_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    let payload = ascii_payload(value);
    let len = u16::try_from(payload.len() + 1).map_err(|_| {
        Error::EncodingError(format!(
            "String of {} bytes does not fit a u16 length prefix",
            payload.len()
        ))
    })?;
    buf.put_u16_le(len);
    buf.put_slice(&payload);
    buf.put_u8(0);
    Ok(())
}

/// One byte per char; non-ASCII characters and embedded NULs become `?`.
fn ascii_payload(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| if c.is_ascii() && c != '\0' { c as u8 } else { b'?' })
        .collect()
}

fn fixed_ascii(value: &str, max_len: usize, what: &str) -> Result<Vec<u8>> {
    let payload = ascii_payload(value);
    if payload.len() > max_len {
        return Err(Error::EncodingError(format!(
            "{} longer than {} bytes: {:?}",
            what, max_len, value
        )));
    }
    Ok(payload)
}

fn count_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::EncodingError(format!("Too many {}: {}", what, len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::FontRecord;

    fn lp_string_at(data: &[u8], offset: usize) -> (String, usize) {
        let len = u16::from_le_bytes([data[offset], data[offset + 1]]) as usize;
        let body = &data[offset + 2..offset + 2 + len];
        assert_eq!(body[len - 1], 0, "length-prefixed string must end with a null");
        (
            String::from_utf8(body[..len - 1].to_vec()).unwrap(),
            offset + 2 + len,
        )
    }

    fn u32_at(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn sample() -> ComponentDefinition {
        ComponentDefinition {
            name: "NE555".to_string(),
            pcb_footprint: "DIP8".to_string(),
            pins: vec![
                Pin {
                    name: "TRIG".to_string(),
                    position: 1,
                    hotpt_x: -30,
                    is_dot: true,
                    ..Default::default()
                },
                Pin {
                    name: "OUT".to_string(),
                    position: 2,
                    visible: false,
                    is_clock: true,
                    is_long: true,
                    ..Default::default()
                },
            ],
            lines: vec![LineSegment {
                x1: 0,
                y1: 0,
                x2: 50,
                y2: 0,
            }],
            pin_numbers: vec![
                PinNumber {
                    number: "2".to_string(),
                    position: 1,
                },
                PinNumber {
                    number: "EP".to_string(),
                    position: 2,
                },
                PinNumber {
                    number: "3".to_string(),
                    position: 2,
                },
            ],
            user_props: vec![
                UserProp {
                    key: "Value".to_string(),
                    value: "NE555".to_string(),
                },
                UserProp {
                    key: "Mfr".to_string(),
                    value: String::new(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn library_stream_layout() {
        let data = encode_library(&LibraryProfile::default()).unwrap();
        assert_eq!(
            data.len(),
            LIBRARY_HEADER_LEN + 16 + FONT_RECORD_COUNT * FONT_RECORD_LEN + PAGE_BLOCK_LEN
        );
        assert!(data.starts_with(b"OrCAD Windows Library "));
        assert_eq!(data[30], b' ');
        assert_eq!(data[31], 0);

        let first_font = LIBRARY_HEADER_LEN + 16;
        assert_eq!(u32_at(&data, first_font), 0);
        assert_eq!(&data[first_font + 4..first_font + 10], b"Arial\0");
        assert_eq!(u32_at(&data, first_font + 36), 10);

        let page = data.len() - PAGE_BLOCK_LEN;
        assert_eq!(u32_at(&data, page), 11000);
        assert_eq!(u32_at(&data, page + 4), 8500);
    }

    #[test]
    fn library_stream_rejects_oversized_font_name() {
        let mut profile = LibraryProfile::default();
        profile.fonts[3] = FontRecord {
            name: "X".repeat(40),
            ..FontRecord::placeholder(3)
        };
        assert!(matches!(
            encode_library(&profile),
            Err(Error::EncodingError(_))
        ));
    }

    #[test]
    fn constant_streams() {
        assert_eq!(encode_cache(), vec![0u8; 10]);
        assert_eq!(encode_net_bundle_map_data(), vec![2, 0, 0, 0]);
    }

    #[test]
    fn directory_counts_match_names() {
        let def = sample();
        for folder in Folder::ALL {
            let names = folder.directory_entries(&def);
            let data = encode_directory(&names).unwrap();
            assert_eq!(u32_at(&data, 0), DIRECTORY_MAGIC);
            let count = u16::from_le_bytes([data[4], data[5]]) as usize;
            let listed: Vec<&[u8]> = data[6..]
                .split(|b| *b == 0)
                .filter(|s| !s.is_empty())
                .collect();
            assert_eq!(count, names.len(), "{:?}", folder);
            assert_eq!(listed.len(), count, "{:?}", folder);
        }
        assert_eq!(
            Folder::Parts.directory_entries(&def),
            vec!["NE555A.Normal".to_string()]
        );
    }

    #[test]
    fn package_stream_layout() {
        let def = sample();
        let data = encode_package(&def).unwrap();

        assert_eq!(u32_at(&data, 0), 1);
        assert_eq!(u32_at(&data, 4), 2);
        assert_eq!(u32_at(&data, 8), 1);
        assert_eq!(u32_at(&data, 12), 0);

        let (name, off) = lp_string_at(&data, 16);
        let (footprint, off) = lp_string_at(&data, off);
        let (prefix, off) = lp_string_at(&data, off);
        assert_eq!((name.as_str(), footprint.as_str(), prefix.as_str()), ("NE555", "DIP8", "U"));

        assert_eq!(u32_at(&data, off + 8), 100);
        let off = off + 16;
        assert_eq!(u32_at(&data, off), 1);
        assert_eq!(u32_at(&data, off + 4 + 8), 50);
        let off = off + 4 + 20;

        assert_eq!(u32_at(&data, off), 2);
        let (pin, off) = lp_string_at(&data, off + 4);
        assert_eq!(pin, "TRIG");
        assert_eq!(u32_at(&data, off) as i32, -30);
        assert_eq!(u32_at(&data, off + 20), 1);
        assert_eq!(u32_at(&data, off + 24), 0x05);
        let (pin, off) = lp_string_at(&data, off + 28);
        assert_eq!(pin, "OUT");
        assert_eq!(u32_at(&data, off + 24), 0x0A);
        let off = off + 28;

        assert_eq!(u32_at(&data, off), 3);
        let mut off = off + 4;
        for (number, position) in [("2", 1), ("EP", 2), ("3", 2)] {
            let (text, next) = lp_string_at(&data, off);
            assert_eq!(
                u16::from_le_bytes([data[off], data[off + 1]]) as usize,
                number.len() + 1
            );
            assert_eq!(text, number);
            assert_eq!(u32_at(&data, next), position);
            off = next + 4;
        }

        assert_eq!(u32_at(&data, off), 2);
        off += 4;
        for (key, value) in [("Value", "NE555"), ("Mfr", "")] {
            let (k, next) = lp_string_at(&data, off);
            let (v, next) = lp_string_at(&data, next);
            assert_eq!((k.as_str(), v.as_str()), (key, value));
            off = next;
        }
        assert_eq!(data.len(), off);
    }

    #[test]
    fn non_ascii_is_substituted_and_prefix_stays_exact() {
        let mut buf = BytesMut::new();
        put_lp_string(&mut buf, "Ω10µ").unwrap();
        let (text, end) = lp_string_at(&buf, 0);
        assert_eq!(text, "?10?");
        assert_eq!(end, buf.len());
    }

    #[test]
    fn oversized_string_is_an_encoding_error() {
        let mut buf = BytesMut::new();
        let huge = "a".repeat(u16::MAX as usize);
        assert!(matches!(
            put_lp_string(&mut buf, &huge),
            Err(Error::EncodingError(_))
        ));
    }

    #[test]
    fn encoding_is_deterministic() {
        let def = sample();
        assert_eq!(encode_package(&def).unwrap(), encode_package(&def).unwrap());
        assert_eq!(
            encode_library(&LibraryProfile::default()).unwrap(),
            encode_library(&LibraryProfile::default()).unwrap()
        );
    }
}
