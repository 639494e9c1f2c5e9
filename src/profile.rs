// src/profile.rs

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const FONT_RECORD_COUNT: usize = 24;
/// Header title and font names share a 32-byte null-terminated slot.
pub const MAX_FIXED_NAME_LEN: usize = 31;

/// Library-wide boilerplate written into the `Library` stream.
///
/// The defaults are the values observed in sample libraries. Their meaning is
/// not confirmed, so they are carried as opaque pass-through constants that a
/// caller can override (e.g. from a JSON file) without touching the encoders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryProfile {
    pub title: String,
    pub version: VersionBlock,
    pub fonts: Vec<FontRecord>,
    pub page: PageGeometry,
}

impl Default for LibraryProfile {
    fn default() -> Self {
        LibraryProfile {
            title: "OrCAD Windows Library".to_string(),
            version: VersionBlock::default(),
            fonts: (0..FONT_RECORD_COUNT as u32)
                .map(FontRecord::placeholder)
                .collect(),
            page: PageGeometry::default(),
        }
    }
}

impl LibraryProfile {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: LibraryProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.title.is_ascii() || self.title.len() > MAX_FIXED_NAME_LEN {
            return Err(Error::ConfigError(format!(
                "Library title must be ASCII and at most {} bytes: {:?}",
                MAX_FIXED_NAME_LEN, self.title
            )));
        }
        if self.fonts.len() != FONT_RECORD_COUNT {
            return Err(Error::ConfigError(format!(
                "Expected {} font records, found {}",
                FONT_RECORD_COUNT,
                self.fonts.len()
            )));
        }
        if let Some(font) = self
            .fonts
            .iter()
            .find(|f| !f.name.is_ascii() || f.name.len() > MAX_FIXED_NAME_LEN)
        {
            return Err(Error::ConfigError(format!(
                "Font name must be ASCII and at most {} bytes: {:?}",
                MAX_FIXED_NAME_LEN, font.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionBlock {
    pub major: u32,
    pub minor: u32,
    pub config_flags: u32,
    pub reserved: u32,
}

impl Default for VersionBlock {
    fn default() -> Self {
        VersionBlock {
            major: 3,
            minor: 2,
            config_flags: 0,
            reserved: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontRecord {
    pub index: u32,
    pub name: String,
    pub size: u32,
    #[serde(default)]
    pub flags: u32,
}

impl FontRecord {
    pub fn placeholder(index: u32) -> Self {
        FontRecord {
            index,
            name: "Arial".to_string(),
            size: 10,
            flags: 0,
        }
    }
}

/// Page size in mils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry {
            width: 11000,
            height: 8500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_valid() {
        let profile = LibraryProfile::default();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.fonts.len(), FONT_RECORD_COUNT);
        assert_eq!(profile.fonts[23].index, 23);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let profile = LibraryProfile::from_json_str(r#"{"page": {"width": 17000}}"#).unwrap();
        assert_eq!(profile.page.width, 17000);
        assert_eq!(profile.page.height, 8500);
        assert_eq!(profile.title, "OrCAD Windows Library");
    }

    #[test]
    fn wrong_font_count_is_rejected() {
        let err = LibraryProfile::from_json_str(r#"{"fonts": [{"index": 0, "name": "Arial", "size": 10}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            LibraryProfile::from_json_str("{"),
            Err(Error::JsonError(_))
        ));
    }
}
