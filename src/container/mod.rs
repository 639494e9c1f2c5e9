//! Storage/stream tree handed to a container writer.
//!
//! The tree is plain data: assemble it once, then pass it to a
//! [`ContainerWriter`] that owns every detail of the on-disk format.

/// MS-CFB (OLE2) serialization of a [`ContainerTree`]
pub mod compound;

use crate::error::{Error, Result};

pub use compound::CompoundFileWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerNode {
    Storage {
        name: String,
        children: Vec<ContainerNode>,
    },
    Stream {
        name: String,
        data: Vec<u8>,
    },
}

impl ContainerNode {
    pub fn storage(name: impl Into<String>, children: Vec<ContainerNode>) -> Self {
        ContainerNode::Storage {
            name: name.into(),
            children,
        }
    }

    pub fn stream(name: impl Into<String>, data: Vec<u8>) -> Self {
        ContainerNode::Stream {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ContainerNode::Storage { name, .. } | ContainerNode::Stream { name, .. } => name,
        }
    }
}

/// The root storage's children, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerTree {
    pub children: Vec<ContainerNode>,
}

impl ContainerTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty storage at a `/`-separated path. The parent must exist.
    pub fn add_storage(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.parent_of(path)?;
        parent.push(ContainerNode::storage(name, Vec::new()));
        Ok(())
    }

    /// Adds a stream at a `/`-separated path. The parent must exist.
    pub fn add_stream(&mut self, path: &str, data: Vec<u8>) -> Result<()> {
        let (parent, name) = self.parent_of(path)?;
        parent.push(ContainerNode::stream(name, data));
        Ok(())
    }

    pub fn find(&self, path: &str) -> Option<&ContainerNode> {
        let mut siblings = &self.children;
        let mut found = None;
        for part in split_path(path) {
            let node = siblings.iter().find(|n| n.name() == part)?;
            siblings = match node {
                ContainerNode::Storage { children, .. } => children,
                ContainerNode::Stream { .. } => &EMPTY,
            };
            found = Some(node);
        }
        found
    }

    pub fn stream_data(&self, path: &str) -> Option<&[u8]> {
        match self.find(path)? {
            ContainerNode::Stream { data, .. } => Some(data),
            ContainerNode::Storage { .. } => None,
        }
    }

    fn parent_of<'a>(&mut self, path: &'a str) -> Result<(&mut Vec<ContainerNode>, &'a str)> {
        let mut parts = split_path(path);
        let name = parts
            .pop()
            .ok_or_else(|| Error::ContainerError(format!("Empty container path {:?}", path)))?;

        let mut siblings = &mut self.children;
        for part in parts {
            let node = siblings
                .iter_mut()
                .find(|n| n.name() == part)
                .ok_or_else(|| Error::ContainerError(format!("No storage {:?} in {:?}", part, path)))?;
            siblings = match node {
                ContainerNode::Storage { children, .. } => children,
                ContainerNode::Stream { .. } => {
                    return Err(Error::ContainerError(format!(
                        "{:?} in {:?} is a stream, not a storage",
                        part, path
                    )));
                }
            };
        }

        if siblings.iter().any(|n| n.name() == name) {
            return Err(Error::ContainerError(format!("Duplicate entry {:?}", path)));
        }
        Ok((siblings, name))
    }
}

static EMPTY: Vec<ContainerNode> = Vec::new();

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty()).collect()
}

/// Serializes a finished tree into a complete container file.
pub trait ContainerWriter {
    fn serialize(&self, tree: &ContainerTree) -> Result<Vec<u8>>;
}
