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

//! An in-memory [`Backend`] keyed by object id.
//!
//! This exists for tests and for embedders that hold a small object set in
//! memory; it is not meant to scale to real repositories.

use std::collections::HashMap;

use crate::backend::Backend;
use crate::backend::BackendError;
use crate::backend::BackendResult;
use crate::backend::ObjectKind;
use crate::hex_util;
use crate::object_id::CommitId;
use crate::object_id::ObjectId as _;
use crate::object_id::TagId;
use crate::object_id::TreeId;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: HashMap<Vec<u8>, (ObjectKind, Vec<u8>)>,
    shallow: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object under the given raw id, replacing any previous
    /// object with the same id.
    pub fn add_object(&mut self, id: &[u8], kind: ObjectKind, data: Vec<u8>) {
        self.objects.insert(id.to_vec(), (kind, data));
    }

    pub fn add_commit(&mut self, id: &CommitId, data: Vec<u8>) {
        self.add_object(id.as_bytes(), ObjectKind::Commit, data);
    }

    pub fn add_tree(&mut self, id: &TreeId, data: Vec<u8>) {
        self.add_object(id.as_bytes(), ObjectKind::Tree, data);
    }

    pub fn add_tag(&mut self, id: &TagId, data: Vec<u8>) {
        self.add_object(id.as_bytes(), ObjectKind::Tag, data);
    }

    /// Marks the repository as having an artificial shallow boundary.
    pub fn set_shallow(&mut self, shallow: bool) {
        self.shallow = shallow;
    }
}

fn charset_is(name: &str, canonical: &str, aliases: &[&str]) -> bool {
    name.eq_ignore_ascii_case(canonical)
        || aliases.iter().any(|alias| name.eq_ignore_ascii_case(alias))
}

fn is_utf8(name: &str) -> bool {
    charset_is(name, "utf-8", &["utf8"])
}

fn is_latin1(name: &str) -> bool {
    charset_is(name, "iso-8859-1", &["latin-1", "latin1"])
}

impl Backend for MemoryBackend {
    fn read_object(&self, id: &[u8]) -> BackendResult<(ObjectKind, Vec<u8>)> {
        self.objects
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::ObjectNotFound {
                hash: hex_util::encode_hex(id),
            })
    }

    fn abbreviate(&self, id: &[u8], min_len: usize) -> String {
        let full = hex_util::encode_hex(id);
        let longest_common = self
            .objects
            .keys()
            .filter(|other| other.as_slice() != id)
            .map(|other| hex_util::common_hex_len(id, other))
            .max()
            .unwrap_or(0);
        let len = (longest_common + 1).max(min_len).min(full.len());
        full[..len].to_string()
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn transcode(&self, bytes: &[u8], from: &str, to: &str) -> Option<Vec<u8>> {
        if from.eq_ignore_ascii_case(to) || (is_utf8(from) && is_utf8(to)) {
            return Some(bytes.to_vec());
        }
        if is_latin1(from) && is_utf8(to) {
            let out: String = bytes.iter().map(|&b| char::from(b)).collect();
            return Some(out.into_bytes());
        }
        if is_utf8(from) && is_latin1(to) {
            let text = std::str::from_utf8(bytes).ok()?;
            return text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect();
        }
        None
    }
}
