use crate::ast::Node;
use crate::error::{ArtifactError, StructuralError};
use crate::extractor;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current on-disk format version.
pub const ARTIFACT_VERSION: u32 = 1;

/// An extracted flow stored in bincode format, so a run can skip extraction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlowArtifact {
    pub version: u32,
    pub nodes: Vec<Node>,
}

impl FlowArtifact {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            nodes,
        }
    }

    /// Saves the artifact to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Loads an artifact from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Checks the stored flow against the same rules as a fresh extraction.
    pub fn validate(&self) -> Result<(), StructuralError> {
        extractor::validate(&self.nodes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        Ok(encode_to_vec(self, standard())?)
    }

    /// Deserializes an artifact and checks its version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        // bincode 2 returns (value, bytes_read)
        let (artifact, _): (FlowArtifact, usize) = decode_from_slice(bytes, standard())?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(ArtifactError::Version {
                found: artifact.version,
                expected: ARTIFACT_VERSION,
            });
        }
        Ok(artifact)
    }
}
