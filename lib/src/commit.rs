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

//! Parsing of the canonical commit byte representation.

use bstr::ByteSlice as _;
use thiserror::Error;

use crate::object_id::CommitId;
use crate::object_id::OBJECT_ID_HEX_LEN;
use crate::object_id::TreeId;

/// The fields extracted from a commit buffer.
///
/// `parents` is the raw header parent list, in on-disk order; any graft
/// override is applied by the store, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitData {
    pub tree: TreeId,
    pub parents: Vec<CommitId>,
    /// Committer epoch seconds; 0 when the committer line is missing or
    /// unparsable.
    pub date: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitParseError {
    #[error("missing tree header")]
    MissingTree,
    #[error("bad tree pointer")]
    BadTree,
    #[error("bad parent line")]
    BadParents,
}

impl CommitData {
    /// Parses a commit buffer:
    ///
    /// ```text
    /// "tree "   <40 hex> "\n"
    /// ( "parent " <40 hex> "\n" )*
    /// "author "    <name-email-date> "\n"
    /// "committer " <name-email-date> "\n"
    /// ( <other header lines> "\n" )*
    /// "\n"
    /// <message>
    /// ```
    ///
    /// Only the tree and parent headers are validated strictly; a missing or
    /// malformed committer line yields `date = 0` rather than an error.
    pub fn parse(buffer: &[u8]) -> Result<Self, CommitParseError> {
        let rest = buffer
            .strip_prefix(b"tree ")
            .ok_or(CommitParseError::MissingTree)?;
        let (tree, mut rest) = take_id_line(rest).ok_or(CommitParseError::BadTree)?;
        let tree = TreeId::new(tree);

        let mut parents = Vec::new();
        while let Some(line) = rest.strip_prefix(b"parent ") {
            let (parent, tail) = take_id_line(line).ok_or(CommitParseError::BadParents)?;
            parents.push(CommitId::new(parent));
            rest = tail;
        }

        let date = parse_commit_date(rest);
        Ok(Self {
            tree,
            parents,
            date,
        })
    }
}

/// Splits `<40 hex>\n` off the front of `bytes`.
fn take_id_line(bytes: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    if bytes.len() < OBJECT_ID_HEX_LEN + 1 || bytes[OBJECT_ID_HEX_LEN] != b'\n' {
        return None;
    }
    let id = crate::hex_util::decode_hex(&bytes[..OBJECT_ID_HEX_LEN])?;
    Some((id, &bytes[OBJECT_ID_HEX_LEN + 1..]))
}

/// Extracts the committer epoch from the header bytes following the parent
/// lines: the decimal immediately after the `>` of the committer line.
fn parse_commit_date(bytes: &[u8]) -> u64 {
    let Some(rest) = bytes.strip_prefix(b"author") else {
        return 0;
    };
    let Some(eol) = rest.find_byte(b'\n') else {
        return 0;
    };
    let rest = &rest[eol + 1..];
    if !rest.starts_with(b"committer") {
        return 0;
    }
    let Some(gt) = rest.find_byte(b'>') else {
        return 0;
    };
    parse_decimal(&rest[gt + 1..])
}

/// Leading-whitespace-tolerant unsigned decimal parse; 0 on overflow or when
/// no digits are present.
pub(crate) fn parse_decimal(bytes: &[u8]) -> u64 {
    let digits = bytes
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit());
    let mut value: u64 = 0;
    for &b in digits {
        let Some(next) = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
        else {
            return 0;
        };
        value = next;
    }
    value
}
