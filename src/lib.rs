// src/lib.rs

pub mod assembler;
pub mod capture_models;
pub mod container;
pub mod encoder;
pub mod error;
pub mod file_writer;
pub mod importer;
pub mod profile;
pub mod xml_tree;

use crate::error::Result;
use std::path::Path;

pub use crate::assembler::OlbAssembler;
pub use crate::capture_models::ComponentDefinition;
pub use crate::file_writer::{LibraryMaterializer, MaterializedPart};

/// Converts a Capture XML document into OLB file bytes with the default profile.
pub fn convert_xml(xml: &str) -> Result<Vec<u8>> {
    let def = importer::import_component_definition(xml)?;
    OlbAssembler::new().assemble(&def)
}

/// Writes `<base_name>.xml` into `output_dir` and, when conversion succeeds,
/// `<base_name>.olb` next to it.
pub fn materialize_component(
    xml: &str,
    output_dir: &Path,
    base_name: &str,
) -> Result<MaterializedPart> {
    LibraryMaterializer::new(output_dir).materialize(xml, base_name)
}
