// Copyright 2024 The Grove Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![expect(missing_docs)]

use std::fmt::Debug;

use thiserror::Error;

use crate::hex_util;

/// The kind of an object stored in the object database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Tag,
    Blob,
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Tag => "tag",
            Self::Blob => "blob",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "commit" => Some(Self::Commit),
            "tree" => Some(Self::Tree),
            "tag" => Some(Self::Tag),
            "blob" => Some(Self::Blob),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Object-database error that may occur while the graph core loads objects.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Object {hash} not found")]
    ObjectNotFound { hash: String },
    #[error("Error when reading object {hash}")]
    ReadObject {
        hash: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The object database the graph core reads from.
///
/// The core never writes objects; everything here is a read-side seam so the
/// graph algorithms and the pretty printer can be driven against any store
/// that can hand out canonical object bytes.
pub trait Backend: Debug {
    /// Reads the canonical byte representation of the object with the given
    /// id, along with its kind.
    fn read_object(&self, id: &[u8]) -> BackendResult<(ObjectKind, Vec<u8>)>;

    /// Returns the shortest unambiguous hex prefix of `id` that is at least
    /// `min_len` digits long. May return the full hex on conflict.
    fn abbreviate(&self, id: &[u8], min_len: usize) -> String {
        let _ = min_len;
        hex_util::encode_hex(id)
    }

    /// Whether the repository has an artificial shallow boundary. Consulted
    /// once, during graft preparation.
    fn is_shallow(&self) -> bool {
        false
    }

    /// Converts `bytes` from the `from` charset to the `to` charset, or
    /// `None` if the conversion is unavailable or fails. The default
    /// implementation only handles the identity conversion.
    fn transcode(&self, bytes: &[u8], from: &str, to: &str) -> Option<Vec<u8>> {
        from.eq_ignore_ascii_case(to).then(|| bytes.to_vec())
    }
}
