// src/assembler.rs

use crate::capture_models::ComponentDefinition;
use crate::container::{CompoundFileWriter, ContainerNode, ContainerTree, ContainerWriter};
use crate::encoder::{self, Folder};
use crate::error::Result;
use crate::profile::LibraryProfile;
use log::debug;

const TYPES_MARKER: &str = "$Types$";

/// Builds the storage/stream tree of a single-component, single-view library.
///
/// Only `/Packages` receives component data; `/Symbols` and `/Graphics` get
/// their empty `$Types$` markers and the remaining storages stay empty.
pub fn build_library_tree(
    def: &ComponentDefinition,
    profile: &LibraryProfile,
) -> Result<ContainerTree> {
    let mut children: Vec<ContainerNode> = Folder::ALL
        .iter()
        .map(|&folder| -> Result<ContainerNode> {
            let contents = match folder {
                Folder::Packages => vec![ContainerNode::stream(
                    encoder::entry_name(&def.name),
                    encoder::encode_package(def)?,
                )],
                Folder::Symbols | Folder::Graphics => {
                    vec![ContainerNode::stream(TYPES_MARKER, Vec::new())]
                }
                _ => Vec::new(),
            };
            Ok(ContainerNode::storage(folder.storage_name(), contents))
        })
        .collect::<Result<_>>()?;

    children.push(ContainerNode::stream("Library", encoder::encode_library(profile)?));
    children.push(ContainerNode::stream("Cache", encoder::encode_cache()));
    children.push(ContainerNode::stream(
        "NetBundleMapData",
        encoder::encode_net_bundle_map_data(),
    ));

    for folder in Folder::ALL {
        let listing = encoder::encode_directory(&folder.directory_entries(def))?;
        children.push(ContainerNode::stream(folder.directory_stream_name(), listing));
    }

    Ok(ContainerTree { children })
}

/// Turns a `ComponentDefinition` into complete OLB file bytes.
#[derive(Debug, Clone, Default)]
pub struct OlbAssembler<W = CompoundFileWriter> {
    profile: LibraryProfile,
    writer: W,
}

impl OlbAssembler<CompoundFileWriter> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<W: ContainerWriter> OlbAssembler<W> {
    pub fn with_writer(writer: W) -> Self {
        OlbAssembler {
            profile: LibraryProfile::default(),
            writer,
        }
    }

    pub fn with_profile(mut self, profile: LibraryProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn profile(&self) -> &LibraryProfile {
        &self.profile
    }

    pub fn assemble(&self, def: &ComponentDefinition) -> Result<Vec<u8>> {
        let tree = build_library_tree(def, &self.profile)?;
        let bytes = self.writer.serialize(&tree)?;
        debug!(
            "Assembled OLB for '{}': {} top-level entries, {} bytes",
            def.name,
            tree.children.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_models::Pin;

    fn sample() -> ComponentDefinition {
        ComponentDefinition {
            name: "LM7805".to_string(),
            pins: vec![Pin {
                name: "VIN".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn tree_has_fixed_hierarchy() {
        let tree = build_library_tree(&sample(), &LibraryProfile::default()).unwrap();

        for folder in Folder::ALL {
            assert!(
                matches!(
                    tree.find(folder.storage_name()),
                    Some(ContainerNode::Storage { .. })
                ),
                "missing storage {:?}",
                folder
            );
            assert!(
                tree.stream_data(&folder.directory_stream_name()).is_some(),
                "missing directory stream for {:?}",
                folder
            );
        }
        assert!(tree.stream_data("/Library").is_some());
        assert_eq!(tree.stream_data("/Cache"), Some(&[0u8; 10][..]));
        assert_eq!(tree.stream_data("/NetBundleMapData"), Some(&[2u8, 0, 0, 0][..]));
        assert_eq!(tree.stream_data("/Symbols/$Types$"), Some(&[][..]));
        assert_eq!(tree.stream_data("/Graphics/$Types$"), Some(&[][..]));
        assert!(tree.stream_data("/Packages/LM7805").is_some());
        assert_eq!(tree.children.len(), 7 + 3 + 7);
    }

    #[test]
    fn listed_names_match_the_stored_stream() {
        for (raw, stored) in [
            ("Ωmega", "?mega"),
            ("74HC/595", "74HC_595"),
            ("A:B!C\\D", "A_B_C_D"),
        ] {
            let def = ComponentDefinition {
                name: raw.to_string(),
                ..sample()
            };
            let tree = build_library_tree(&def, &LibraryProfile::default()).unwrap();
            assert!(
                tree.stream_data(&format!("/Packages/{}", stored)).is_some(),
                "no package stream for {:?}",
                raw
            );
            let packages = tree.stream_data("/Packages Directory").unwrap();
            assert_eq!(&packages[6..], format!("{}\0", stored).as_bytes());
            let cells = tree.stream_data("/Cells Directory").unwrap();
            assert_eq!(&cells[6..], format!("{}A\0", stored).as_bytes());
            assert!(OlbAssembler::new().assemble(&def).is_ok(), "{:?}", raw);
        }
    }

    #[test]
    fn empty_storages_stay_empty() {
        let tree = build_library_tree(&sample(), &LibraryProfile::default()).unwrap();
        for name in ["Cells", "Parts", "Views", "ExportBlocks"] {
            match tree.find(name) {
                Some(ContainerNode::Storage { children, .. }) => assert!(children.is_empty()),
                other => panic!("unexpected node for {}: {:?}", name, other),
            }
        }
    }

    #[test]
    fn assembled_file_starts_with_compound_magic() {
        let bytes = OlbAssembler::new().assemble(&sample()).unwrap();
        assert_eq!(&bytes[..8], b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1");
    }

    #[test]
    fn invalid_profile_fails_the_encoder() {
        let mut profile = LibraryProfile::default();
        profile.fonts.pop();
        let assembler = OlbAssembler::new().with_profile(profile);
        assert!(assembler.assemble(&sample()).is_err());
    }
}
