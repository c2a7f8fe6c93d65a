//! Artifact loader

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::artifacts::Artifact;
use crate::pickle::{Unpickler, Value};

/// Magic prefixes of the compressed containers joblib can write
const COMPRESSION_MAGIC: [(&str, &[u8]); 7] = [
    ("zlib", b"\x78"),
    ("gzip", b"\x1f\x8b"),
    ("bz2", b"BZh"),
    ("xz", b"\xfd\x37\x7a\x58\x5a"),
    ("lzma", b"\x5d\x00\x00"),
    ("lz4", b"\x04\x22\x4d\x18"),
    ("legacy zlib", b"ZF"),
];

/// Loader for pickle and joblib artifacts
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactLoader;

impl ArtifactLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load the file at `path` and extract artifact shape `A` from it
    pub fn load<A: Artifact, P: AsRef<Path>>(&self, path: P) -> Result<A> {
        let path = path.as_ref();
        let value = self.load_value(path)?;
        let artifact = A::from_value(value)?;
        info!(kind = A::KIND, path = %path.display(), "Artifact loaded");
        Ok(artifact)
    }

    /// Load and decode the file at `path` without interpreting it
    pub fn load_value<P: AsRef<Path>>(&self, path: P) -> Result<Value> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading artifact");

        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

        if let Some(codec) = sniff_compression(&bytes) {
            bail!("compressed joblib artifacts ({codec}) are not supported");
        }

        let mut unpickler = Unpickler::new(&bytes);
        let value = unpickler
            .load()
            .with_context(|| format!("failed to deserialize {}", path.display()))?;

        if unpickler.position() < bytes.len() {
            debug!(
                trailing = bytes.len() - unpickler.position(),
                "Ignoring bytes after the end of the pickle stream"
            );
        }
        info!(
            path = %path.display(),
            bytes = bytes.len(),
            protocol = unpickler.protocol(),
            inline_arrays = unpickler.inline_arrays(),
            type_name = %value.type_name(),
            "Artifact deserialized"
        );

        Ok(value)
    }
}

/// Name of the compression codec whose magic starts `bytes`, if any
pub fn sniff_compression(bytes: &[u8]) -> Option<&'static str> {
    COMPRESSION_MAGIC
        .iter()
        .find(|(_, magic)| bytes.starts_with(magic))
        .map(|(codec, _)| *codec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ModelArtifact;

    #[test]
    fn test_sniff_compression() {
        assert_eq!(sniff_compression(b"\x1f\x8b\x08\x00"), Some("gzip"));
        assert_eq!(sniff_compression(b"x\x9c"), Some("zlib"));
        assert_eq!(sniff_compression(b"\x5d\x00\x00\x80\x00"), Some("lzma"));
        assert_eq!(sniff_compression(b"\x80\x04\x95"), None);
        // protocol 1 stream starting with EMPTY_LIST
        assert_eq!(sniff_compression(b"]q\x00."), None);
    }

    #[test]
    fn test_missing_file() {
        let loader = ArtifactLoader::new();
        let err = loader
            .load::<ModelArtifact, _>("does/not/exist.pkl")
            .unwrap_err();
        assert!(format!("{err:#}").starts_with("failed to read does/not/exist.pkl: "));
    }

    #[test]
    fn test_load_value_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.pkl");
        fs::write(&path, b"\x80\x02]q\x00(K\x01K\x02e.").unwrap();

        let value = ArtifactLoader::new().load_value(&path).unwrap();
        assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }
}
