//! Content digests using BLAKE3
//!
//! A [`Digest`] is the pair of the hex-encoded BLAKE3 hash of some content
//! and the content's length in bytes. Digests are the only identity used for
//! blob deduplication; two digests are equal iff both components are equal.

use crate::proto;
use prost::Message;

/// Length of the hex-encoded hash component.
pub const HASH_HEX_LEN: usize = 64;

/// Content digest: hex hash plus size in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    /// Lowercase hex encoding of the BLAKE3 hash of the content.
    pub hash: String,
    /// Length of the content in bytes.
    pub size_bytes: i64,
}

impl Digest {
    /// Digest of the zero-length blob.
    pub fn empty() -> Self {
        Self::of_bytes(&[])
    }

    /// Hash raw bytes into a digest.
    pub fn of_bytes(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self {
            hash: hex::encode(hash.as_bytes()),
            size_bytes: data.len() as i64,
        }
    }

    /// Serialize a wire message in canonical form and hash the bytes.
    pub fn of_message<M: Message>(msg: &M) -> Result<Self, prost::EncodeError> {
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf)?;
        Ok(Self::of_bytes(&buf))
    }

    pub fn to_proto(&self) -> proto::Digest {
        proto::Digest {
            hash: self.hash.clone(),
            size_bytes: self.size_bytes,
        }
    }

    /// Convert from the wire form without validating the hash string.
    pub fn from_proto(d: &proto::Digest) -> Self {
        Self {
            hash: d.hash.clone(),
            size_bytes: d.size_bytes,
        }
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.hash, self.size_bytes)
    }
}
