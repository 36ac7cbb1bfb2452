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

use crate::hex_util;

/// Number of bytes in a full object identifier.
pub const OBJECT_ID_LEN: usize = 20;

/// Number of hex digits in a full object identifier.
pub const OBJECT_ID_HEX_LEN: usize = OBJECT_ID_LEN * 2;

pub trait ObjectId {
    fn object_type(&self) -> String;
    fn as_bytes(&self) -> &[u8];
    fn to_bytes(&self) -> Vec<u8>;
    fn hex(&self) -> String;
}

// Defines a new struct type with visibility `vis` and name `ident` containing
// a single Vec<u8> used to store an identifier (typically the output of a hash
// function) as bytes. Types defined using this macro automatically implement
// the `ObjectId` trait.
// Documentation comments written inside the macro definition will be captured
// and associated with the type defined by the macro.
macro_rules! id_type {
    (   $(#[$attr:meta])*
        $vis:vis $name:ident
    ) => {
        $(#[$attr])*
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
        $vis struct $name(Vec<u8>);
        $crate::object_id::impl_id_type!($name);
    };
}

macro_rules! impl_id_type {
    ($name:ident) => {
        #[allow(dead_code)]
        impl $name {
            pub fn new(value: Vec<u8>) -> Self {
                Self(value)
            }

            pub fn from_bytes(bytes: &[u8]) -> Self {
                Self(bytes.to_vec())
            }

            /// Parses the given hex string into an ObjectId.
            ///
            /// The given string must be valid. A static str is required to
            /// prevent API misuse.
            pub fn from_hex(hex: &'static str) -> Self {
                Self::try_from_hex(hex).unwrap()
            }

            /// Parses the given hex string into an ObjectId.
            pub fn try_from_hex(hex: impl AsRef<[u8]>) -> Option<Self> {
                $crate::hex_util::decode_hex(hex).map(Self)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                f.debug_tuple(stringify!($name)).field(&self.hex()).finish()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                f.pad(&self.hex())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                if serializer.is_human_readable() {
                    self.hex().serialize(serializer)
                } else {
                    self.as_bytes().serialize(serializer)
                }
            }
        }

        impl crate::object_id::ObjectId for $name {
            fn object_type(&self) -> String {
                stringify!($name)
                    .strip_suffix("Id")
                    .unwrap()
                    .to_ascii_lowercase()
                    .to_string()
            }

            fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            fn to_bytes(&self) -> Vec<u8> {
                self.0.clone()
            }

            fn hex(&self) -> String {
                $crate::hex_util::encode_hex(&self.0)
            }
        }
    };
}

pub(crate) use id_type;
pub(crate) use impl_id_type;

id_type!(
    /// Identifier for a commit object, the content hash of its canonical
    /// byte representation.
    pub CommitId
);
id_type!(pub TreeId);
id_type!(pub TagId);
id_type!(pub BlobId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_object_id() {
        let commit_id = CommitId::from_hex("deadbeef0123");
        assert_eq!(format!("{commit_id}"), "deadbeef0123");
        assert_eq!(format!("{commit_id:.6}"), "deadbe");

        let tree_id = TreeId::from_hex("0123abcd");
        assert_eq!(format!("{tree_id}"), "0123abcd");
    }

    #[test]
    fn test_object_type() {
        assert_eq!(CommitId::new(vec![]).object_type(), "commit");
        assert_eq!(TreeId::new(vec![]).object_type(), "tree");
        assert_eq!(TagId::new(vec![]).object_type(), "tag");
        assert_eq!(BlobId::new(vec![]).object_type(), "blob");
    }

    #[test]
    fn test_hex_round_trip() {
        let id = CommitId::try_from_hex("5c8a256f4f6d21c3d2b03c40e6b04e58cf41f382").unwrap();
        assert_eq!(id.as_bytes().len(), OBJECT_ID_LEN);
        assert_eq!(id.hex().len(), OBJECT_ID_HEX_LEN);
        assert_eq!(CommitId::from_bytes(id.as_bytes()), id);
        assert_eq!(CommitId::try_from_hex("5c8a25g"), None);
    }
}
