//! Upload entries: blobs addressed by digest, backed by memory or disk.

use crate::digest::Digest;
use crate::error::TreeError;
use bytes::Bytes;
use prost::Message;
use std::path::PathBuf;

/// Where an upload entry's bytes come from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// The full contents, held in memory.
    Bytes(Bytes),
    /// A path on the local filesystem to stream from. Valid only while the
    /// referenced file is left in place.
    File(PathBuf),
}

/// One uploadable blob: file contents, a serialized directory descriptor, or
/// a serialized tree message.
#[derive(Debug, Clone)]
pub struct UploadEntry {
    pub digest: Digest,
    source: UploadSource,
}

impl UploadEntry {
    /// Entry holding in-memory contents. The digest is computed here.
    pub fn from_blob(contents: impl Into<Bytes>) -> Self {
        let contents = contents.into();
        Self {
            digest: Digest::of_bytes(&contents),
            source: UploadSource::Bytes(contents),
        }
    }

    /// Entry backed by a file on disk whose digest is already known.
    pub fn from_file(digest: Digest, path: PathBuf) -> Self {
        Self {
            digest,
            source: UploadSource::File(path),
        }
    }

    /// Serialize a wire message in canonical form and wrap the bytes.
    pub fn from_proto<M: Message>(msg: &M) -> Result<Self, TreeError> {
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf)?;
        Ok(Self::from_blob(buf))
    }

    pub fn source(&self) -> &UploadSource {
        &self.source
    }
}
