//! Wire messages for directory descriptors and action results.
//!
//! The serialized form of these messages is canonical: fields are written in
//! tag order, entry lists are sorted by name before serialization, and equal
//! logical content always encodes to identical bytes. Directory and Tree
//! digests are computed over this encoding, so any change to field tags is a
//! breaking change to every stored digest.

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct Digest {
    #[prost(string, tag = "1")]
    pub hash: String,
    #[prost(int64, tag = "2")]
    pub size_bytes: i64,
}

/// A single named metadata property attached to a node.
#[derive(Clone, PartialEq, Message)]
pub struct NodeProperty {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Opaque node-level metadata carried through to the wire descriptors.
#[derive(Clone, PartialEq, Message)]
pub struct NodeProperties {
    #[prost(message, repeated, tag = "1")]
    pub properties: Vec<NodeProperty>,
    #[prost(uint32, optional, tag = "2")]
    pub unix_mode: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FileNode {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub digest: Option<Digest>,
    #[prost(bool, tag = "3")]
    pub is_executable: bool,
    #[prost(message, optional, tag = "4")]
    pub node_properties: Option<NodeProperties>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DirectoryNode {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub digest: Option<Digest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SymlinkNode {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub target: String,
    #[prost(message, optional, tag = "3")]
    pub node_properties: Option<NodeProperties>,
}

/// A directory descriptor. Invariant: `files`, `directories` and `symlinks`
/// are each sorted ascending by `name`, with no duplicate names across the
/// three lists.
#[derive(Clone, PartialEq, Message)]
pub struct Directory {
    #[prost(message, repeated, tag = "1")]
    pub files: Vec<FileNode>,
    #[prost(message, repeated, tag = "2")]
    pub directories: Vec<DirectoryNode>,
    #[prost(message, repeated, tag = "3")]
    pub symlinks: Vec<SymlinkNode>,
    #[prost(message, optional, tag = "4")]
    pub node_properties: Option<NodeProperties>,
}

/// A whole directory tree: the root descriptor plus every descendant
/// descriptor, each appearing exactly once.
#[derive(Clone, PartialEq, Message)]
pub struct Tree {
    #[prost(message, optional, tag = "1")]
    pub root: Option<Directory>,
    #[prost(message, repeated, tag = "2")]
    pub children: Vec<Directory>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OutputFile {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(message, optional, tag = "2")]
    pub digest: Option<Digest>,
    #[prost(bool, tag = "3")]
    pub is_executable: bool,
    #[prost(message, optional, tag = "4")]
    pub node_properties: Option<NodeProperties>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OutputDirectory {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(message, optional, tag = "2")]
    pub tree_digest: Option<Digest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActionResult {
    #[prost(message, repeated, tag = "1")]
    pub output_files: Vec<OutputFile>,
    #[prost(message, repeated, tag = "2")]
    pub output_directories: Vec<OutputDirectory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_content_encodes_identically() {
        let make = || Directory {
            files: vec![FileNode {
                name: "f".to_string(),
                digest: Some(Digest {
                    hash: "ab".to_string(),
                    size_bytes: 2,
                }),
                is_executable: true,
                node_properties: None,
            }],
            directories: vec![DirectoryNode {
                name: "d".to_string(),
                digest: None,
            }],
            symlinks: vec![],
            node_properties: None,
        };
        assert_eq!(make().encode_to_vec(), make().encode_to_vec());
    }

    #[test]
    fn test_empty_directory_encodes_to_empty_bytes() {
        let dir = Directory::default();
        assert!(dir.encode_to_vec().is_empty());
    }
}
