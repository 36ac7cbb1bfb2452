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

//! Graft records: parent-list overrides applied at commit parse time.
//!
//! A graft replaces a commit's parent list wholesale. A graft with an empty
//! parent list is a *shallow* marker turning the commit into an artificial
//! root of the graph.

use std::io::Write;
use std::path::Path;

use itertools::Itertools as _;
use thiserror::Error;

use crate::object_id::CommitId;
use crate::object_id::OBJECT_ID_HEX_LEN;
use crate::object_id::ObjectId as _;

/// One parent-list override, keyed by commit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graft {
    pub id: CommitId,
    pub parents: Vec<CommitId>,
}

impl Graft {
    /// Whether this graft marks an artificial graph root.
    pub fn is_shallow(&self) -> bool {
        self.parents.is_empty()
    }

    /// Parses one graft-file record: `<commit-hex> [<parent-hex> …]`.
    ///
    /// Returns `None` for comment (`#`) and empty lines. Tokens are 40 hex
    /// digits separated by single spaces, so a valid record length satisfies
    /// `(len + 1) % 41 == 0`.
    pub fn parse(line: &str) -> Result<Option<Self>, GraftParseError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let bad = || GraftParseError {
            line: line.to_string(),
        };
        if (line.len() + 1) % (OBJECT_ID_HEX_LEN + 1) != 0 {
            return Err(bad());
        }
        let bytes = line.as_bytes();
        let id = CommitId::try_from_hex(&bytes[..OBJECT_ID_HEX_LEN]).ok_or_else(bad)?;
        let parents = bytes[OBJECT_ID_HEX_LEN..]
            .chunks(OBJECT_ID_HEX_LEN + 1)
            .map(|token| {
                token
                    .strip_prefix(b" ")
                    .and_then(CommitId::try_from_hex)
                    .ok_or_else(bad)
            })
            .try_collect()?;
        Ok(Some(Self { id, parents }))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("bad graft data: {line}")]
pub struct GraftParseError {
    pub line: String,
}

/// What to do when a graft is registered for an id that already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    Ignore,
    Replace,
}

/// How [`GraftTable::write_shallow`] frames its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShallowWriteMode {
    /// `shallow <hex>\n` wrapped in a pkt-line length header.
    PacketLine,
    /// `<hex>\n`, repeated.
    Plain,
}

/// The registered grafts, sorted by commit id for binary search.
#[derive(Debug, Default)]
pub struct GraftTable {
    grafts: Vec<Graft>,
}

impl GraftTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &CommitId) -> Result<usize, usize> {
        self.grafts.binary_search_by(|graft| graft.id.cmp(id))
    }

    /// Registers a graft. Returns true if a graft for the same id was
    /// already present; `policy` decides which of the two survives.
    pub fn register(&mut self, graft: Graft, policy: DuplicatePolicy) -> bool {
        match self.position(&graft.id) {
            Ok(pos) => {
                if policy == DuplicatePolicy::Replace {
                    self.grafts[pos] = graft;
                }
                true
            }
            Err(pos) => {
                self.grafts.insert(pos, graft);
                false
            }
        }
    }

    /// Registers a shallow marker for `id`.
    pub fn register_shallow(&mut self, id: CommitId, policy: DuplicatePolicy) -> bool {
        self.register(
            Graft {
                id,
                parents: vec![],
            },
            policy,
        )
    }

    /// Removes the graft for `id` if it is a shallow marker. Returns whether
    /// anything was removed.
    pub fn unregister_shallow(&mut self, id: &CommitId) -> bool {
        match self.position(id) {
            Ok(pos) if self.grafts[pos].is_shallow() => {
                self.grafts.remove(pos);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, id: &CommitId) -> Option<&Graft> {
        self.position(id).ok().map(|pos| &self.grafts[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Graft> {
        self.grafts.iter()
    }

    pub fn len(&self) -> usize {
        self.grafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grafts.is_empty()
    }

    /// Loads graft records from `path`. Malformed records are logged and
    /// skipped; duplicate ids are logged and ignored, matching the original
    /// graft-file semantics.
    pub fn read_file(&mut self, path: &Path) -> std::io::Result<()> {
        let contents = std::fs::read_to_string(path)?;
        for line in contents.lines() {
            match Graft::parse(line) {
                Ok(Some(graft)) => {
                    if self.register(graft, DuplicatePolicy::Ignore) {
                        tracing::warn!(line, "duplicate graft data");
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(%err, "skipping graft record"),
            }
        }
        Ok(())
    }

    /// Writes the shallow set to `writer`, one entry per shallow graft.
    /// Returns the number of entries written.
    pub fn write_shallow(
        &self,
        writer: &mut dyn Write,
        mode: ShallowWriteMode,
    ) -> std::io::Result<usize> {
        let mut count = 0;
        for graft in self.grafts.iter().filter(|graft| graft.is_shallow()) {
            let hex = graft.id.hex();
            match mode {
                ShallowWriteMode::PacketLine => {
                    let payload = format!("shallow {hex}\n");
                    write!(writer, "{:04x}{payload}", payload.len() + 4)?;
                }
                ShallowWriteMode::Plain => {
                    writeln!(writer, "{hex}")?;
                }
            }
            count += 1;
        }
        Ok(count)
    }
}
