use crate::assembler::OlbAssembler;
use crate::container::{CompoundFileWriter, ContainerWriter};
use crate::error::{Error, Result};
use crate::importer;
use log::{info, warn};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const UNSAFE_FILE_CHARS: &str = r"[^A-Za-z0-9._-]";

/// Paths written by a single materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedPart {
    pub xml_path: PathBuf,
    /// `None` when OLB generation failed and only the XML was kept.
    pub olb_path: Option<PathBuf>,
}

/// Writes converted parts into an output directory.
pub struct LibraryMaterializer<W = CompoundFileWriter> {
    pub path: PathBuf,
    assembler: OlbAssembler<W>,
}

impl LibraryMaterializer<CompoundFileWriter> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LibraryMaterializer {
            path: path.into(),
            assembler: OlbAssembler::new(),
        }
    }
}

impl<W: ContainerWriter> LibraryMaterializer<W> {
    pub fn with_assembler(path: impl Into<PathBuf>, assembler: OlbAssembler<W>) -> Self {
        LibraryMaterializer {
            path: path.into(),
            assembler,
        }
    }

    /// Creates the output directory.
    pub fn setup_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Writes `<base>.xml`, then tries to write `<base>.olb` next to it.
    ///
    /// The XML copy is what the EDA tool can always import natively, so it is
    /// written first. Only that write, and clearing an OLB left by an earlier
    /// run, return errors. Anything that goes wrong while producing the new OLB
    /// is logged and reported as `olb_path: None`.
    pub fn materialize(&self, xml: &str, base_name: &str) -> Result<MaterializedPart> {
        self.setup_directories()?;
        let stem = sanitize_file_stem(base_name)?;

        let xml_path = self.path.join(format!("{}.xml", stem));
        fs::write(&xml_path, xml)?;

        let olb_path = self.path.join(format!("{}.olb", stem));
        // An OLB left by an earlier run must not outlive a failed conversion.
        remove_stale(&olb_path)?;
        let olb_path = match self.write_olb(xml, &olb_path) {
            Ok(()) => {
                info!("Generated {:?} and {:?}", xml_path, olb_path);
                Some(olb_path)
            }
            Err(e) => {
                warn!(
                    "OLB generation failed for '{}', keeping XML only: {}",
                    stem, e
                );
                None
            }
        };

        Ok(MaterializedPart { xml_path, olb_path })
    }

    fn write_olb(&self, xml: &str, olb_path: &Path) -> Result<()> {
        let def = importer::import_component_definition(xml)?;
        let bytes = self.assembler.assemble(&def)?;
        if let Err(e) = fs::write(olb_path, bytes) {
            // Do not leave a truncated OLB behind.
            let _ = fs::remove_file(olb_path);
            return Err(Error::IoError(e));
        }
        Ok(())
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::IoError(e)),
        _ => Ok(()),
    }
}

/// Reduces a part name to characters that are safe in a file name.
pub fn sanitize_file_stem(base_name: &str) -> Result<String> {
    let re = Regex::new(UNSAFE_FILE_CHARS)?;
    let cleaned = re.replace_all(base_name.trim(), "_");
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        Ok(crate::capture_models::DEFAULT_NAME.to_string())
    } else {
        Ok(cleaned.into_owned())
    }
}
