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

//! The commit node table.
//!
//! Nodes are interned in a dense arena and addressed by [`CommitHandle`];
//! looking up the same id twice always yields the same handle, so handle
//! equality is id equality. Parsing is lazy: a handle starts as an unparsed
//! stub and is filled in from the object database on demand, with any
//! matching graft overriding the parent edges.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::io::Write;
use std::path::PathBuf;

use smallvec::SmallVec;
use thiserror::Error;

use crate::backend::Backend;
use crate::backend::BackendError;
use crate::backend::ObjectKind;
use crate::commit::CommitData;
use crate::commit::CommitParseError;
use crate::graft::DuplicatePolicy;
use crate::graft::Graft;
use crate::graft::GraftTable;
use crate::graft::ShallowWriteMode;
use crate::hex_util;
use crate::object_id::CommitId;
use crate::object_id::OBJECT_ID_HEX_LEN;
use crate::object_id::ObjectId as _;
use crate::object_id::TreeId;

/// Index of a node in the store's arena. Cheap to copy; stable for the life
/// of the store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitHandle(u32);

impl Debug for CommitHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_tuple("CommitHandle").field(&self.0).finish()
    }
}

/// Upper 16 bits of `flags` are reserved for algorithm-local markers; the
/// lower 16 are free for callers (revision walkers and the like).
pub const RESERVED_FLAGS: u32 = 0xffff_0000;

pub(crate) struct Node {
    id: CommitId,
    kind: ObjectKind,
    parsed: bool,
    tree: Option<TreeId>,
    parents: SmallVec<[CommitHandle; 2]>,
    date: u64,
    flags: u32,
    raw: Option<Vec<u8>>,
    pub(crate) aux: Option<u32>,
}

impl Node {
    fn unparsed(id: CommitId) -> Self {
        Self {
            id,
            kind: ObjectKind::Commit,
            parsed: false,
            tree: None,
            parents: SmallVec::new(),
            date: 0,
            flags: 0,
            raw: None,
            aux: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Object {hash} is a {actual}, not a {expected}")]
    WrongKind {
        hash: String,
        actual: ObjectKind,
        expected: ObjectKind,
    },
    #[error("bad commit object {hash}")]
    BadCommit {
        hash: String,
        #[source]
        source: CommitParseError,
    },
    #[error("Tag chain starting at {hash} is too long")]
    TagChainTooLong { hash: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The explicit context for everything the commit-graph core does: the node
/// arena, the graft overlay, and the process-wide switches that the original
/// implementation kept in globals.
pub struct Store {
    backend: Box<dyn Backend>,
    nodes: Vec<Node>,
    index: HashMap<CommitId, CommitHandle>,
    grafts: GraftTable,
    graft_file: Option<PathBuf>,
    grafts_prepared: bool,
    shallow: bool,
    save_commit_buffer: bool,
    output_encoding: Option<String>,
}

impl Debug for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("Store")
            .field("backend", &self.backend)
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            nodes: Vec::new(),
            index: HashMap::new(),
            grafts: GraftTable::new(),
            graft_file: None,
            grafts_prepared: false,
            shallow: false,
            save_commit_buffer: true,
            output_encoding: None,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Whether `parse_commit` keeps the raw buffer on the node. Must be on
    /// (the default) before parsing if the pretty printer is to be used on
    /// the same commits.
    pub fn set_save_commit_buffer(&mut self, save: bool) {
        self.save_commit_buffer = save;
    }

    /// Configured output encoding for log message rendering, if any.
    pub fn output_encoding(&self) -> Option<&str> {
        self.output_encoding.as_deref()
    }

    pub fn set_output_encoding(&mut self, encoding: Option<String>) {
        self.output_encoding = encoding;
    }

    /// File of graft records to load lazily on first parse.
    pub fn set_graft_file(&mut self, path: Option<PathBuf>) {
        self.graft_file = path;
    }

    fn node(&self, handle: CommitHandle) -> &Node {
        &self.nodes[handle.0 as usize]
    }

    fn node_mut(&mut self, handle: CommitHandle) -> &mut Node {
        &mut self.nodes[handle.0 as usize]
    }

    /// Returns the canonical handle for `id`, interning an unparsed
    /// commit-kind node if the id has not been seen. A node previously
    /// discovered to be of a different kind keeps that kind; callers that
    /// care check [`Store::kind`].
    pub fn lookup(&mut self, id: &CommitId) -> CommitHandle {
        if let Some(&handle) = self.index.get(id) {
            return handle;
        }
        let handle = CommitHandle(u32::try_from(self.nodes.len()).unwrap());
        self.nodes.push(Node::unparsed(id.clone()));
        self.index.insert(id.clone(), handle);
        handle
    }

    /// Interns `id` with a kind already known to the caller, typically
    /// because the object's bytes were just read. The kind is recorded on
    /// the (new or existing) node.
    pub fn create(&mut self, id: &CommitId, kind: ObjectKind) -> CommitHandle {
        let handle = self.lookup(id);
        self.node_mut(handle).kind = kind;
        handle
    }

    /// Like [`Store::lookup`], but fails unless the node is (still assumed
    /// to be) a commit.
    pub fn lookup_commit(&mut self, id: &CommitId) -> StoreResult<CommitHandle> {
        let handle = self.lookup(id);
        let kind = self.node(handle).kind;
        if kind != ObjectKind::Commit {
            return Err(StoreError::WrongKind {
                hash: id.hex(),
                actual: kind,
                expected: ObjectKind::Commit,
            });
        }
        Ok(handle)
    }

    /// Resolves `id` to a commit, dereferencing tag objects transitively.
    /// `quiet` suppresses the error log, not the error itself.
    pub fn lookup_commit_reference(
        &mut self,
        id: &CommitId,
        quiet: bool,
    ) -> StoreResult<CommitHandle> {
        const MAX_TAG_CHAIN: usize = 32;
        let mut current = id.clone();
        for _ in 0..MAX_TAG_CHAIN {
            let (kind, bytes) = self.backend.read_object(current.as_bytes())?;
            let handle = self.create(&current, kind);
            match kind {
                ObjectKind::Commit => return Ok(handle),
                ObjectKind::Tag => {
                    // A tag without a readable target dereferences to nothing
                    if let Some(target) = tag_target(&bytes) {
                        current = target;
                        continue;
                    }
                }
                ObjectKind::Tree | ObjectKind::Blob => {}
            }
            if !quiet {
                tracing::error!(id = %id.hex(), %kind, "object is not a commit");
            }
            return Err(StoreError::WrongKind {
                hash: id.hex(),
                actual: kind,
                expected: ObjectKind::Commit,
            });
        }
        if !quiet {
            tracing::error!(id = %id.hex(), "tag chain is too long");
        }
        Err(StoreError::TagChainTooLong { hash: id.hex() })
    }

    /// Parses the node's commit object if it has not been parsed yet.
    ///
    /// Idempotent; sets `parsed` before interning parents so that grafted or
    /// self-referencing histories cannot recurse endlessly. On success the
    /// node has a tree, a date, and its effective parent edges (graft
    /// overlay applied); with `save_commit_buffer` on, the raw bytes are
    /// retained for the pretty printer.
    pub fn parse_commit(&mut self, handle: CommitHandle) -> StoreResult<()> {
        if self.node(handle).parsed {
            return Ok(());
        }
        self.prepare_grafts();
        let id = self.node(handle).id.clone();
        let (kind, bytes) = self.backend.read_object(id.as_bytes())?;
        if kind != ObjectKind::Commit {
            self.node_mut(handle).kind = kind;
            return Err(StoreError::WrongKind {
                hash: id.hex(),
                actual: kind,
                expected: ObjectKind::Commit,
            });
        }
        let data = CommitData::parse(&bytes).map_err(|source| StoreError::BadCommit {
            hash: id.hex(),
            source,
        })?;
        let parent_ids = match self.grafts.lookup(&id) {
            Some(graft) => graft.parents.clone(),
            None => data.parents,
        };
        {
            let node = self.node_mut(handle);
            node.parsed = true;
            node.tree = Some(data.tree);
            node.date = data.date;
        }
        let parents = parent_ids.iter().map(|pid| self.lookup(pid)).collect();
        let save_buffer = self.save_commit_buffer;
        let node = self.node_mut(handle);
        node.parents = parents;
        if save_buffer {
            node.raw = Some(bytes);
        }
        Ok(())
    }

    fn prepare_grafts(&mut self) {
        if self.grafts_prepared {
            return;
        }
        self.grafts_prepared = true;
        if let Some(path) = self.graft_file.clone() {
            if let Err(err) = self.grafts.read_file(&path) {
                tracing::warn!(%err, ?path, "could not read graft file");
            }
        }
        self.shallow = self.backend.is_shallow();
        tracing::debug!(
            grafts = self.grafts.len(),
            shallow = self.shallow,
            "prepared commit grafts"
        );
    }

    /// Whether the backend reports an artificial shallow boundary; triggers
    /// graft preparation on first use.
    pub fn is_shallow(&mut self) -> bool {
        self.prepare_grafts();
        self.shallow
    }

    pub fn register_graft(&mut self, graft: Graft, policy: DuplicatePolicy) -> bool {
        self.grafts.register(graft, policy)
    }

    pub fn register_shallow(&mut self, id: CommitId, policy: DuplicatePolicy) -> bool {
        self.grafts.register_shallow(id, policy)
    }

    pub fn unregister_shallow(&mut self, id: &CommitId) -> bool {
        self.grafts.unregister_shallow(id)
    }

    /// Writes the shallow set to `writer`; see [`GraftTable::write_shallow`].
    pub fn write_shallow_commits(
        &mut self,
        writer: &mut dyn Write,
        mode: ShallowWriteMode,
    ) -> std::io::Result<usize> {
        self.prepare_grafts();
        self.grafts.write_shallow(writer, mode)
    }

    // Node accessors. Handles are only minted by this store, so indexing is
    // infallible.

    pub fn id(&self, handle: CommitHandle) -> &CommitId {
        &self.node(handle).id
    }

    pub fn kind(&self, handle: CommitHandle) -> ObjectKind {
        self.node(handle).kind
    }

    pub fn is_parsed(&self, handle: CommitHandle) -> bool {
        self.node(handle).parsed
    }

    /// The commit's tree id; `None` until parsed.
    pub fn tree(&self, handle: CommitHandle) -> Option<&TreeId> {
        self.node(handle).tree.as_ref()
    }

    /// Effective parent edges in mainline-first order; empty until parsed.
    pub fn parents(&self, handle: CommitHandle) -> &[CommitHandle] {
        &self.node(handle).parents
    }

    pub fn date(&self, handle: CommitHandle) -> u64 {
        self.node(handle).date
    }

    pub fn flags(&self, handle: CommitHandle) -> u32 {
        self.node(handle).flags
    }

    pub fn add_flags(&mut self, handle: CommitHandle, bits: u32) {
        self.node_mut(handle).flags |= bits;
    }

    pub fn remove_flags(&mut self, handle: CommitHandle, bits: u32) {
        self.node_mut(handle).flags &= !bits;
    }

    /// The retained raw commit bytes, if `save_commit_buffer` was on when
    /// the node was parsed.
    pub fn raw_buffer(&self, handle: CommitHandle) -> Option<&[u8]> {
        self.node(handle).raw.as_deref()
    }

    // Per-call auxiliary slot of the topological sorter.

    pub(crate) fn aux(&self, handle: CommitHandle) -> Option<u32> {
        self.node(handle).aux
    }

    pub(crate) fn set_aux(&mut self, handle: CommitHandle, aux: Option<u32>) {
        self.node_mut(handle).aux = aux;
    }

    /// All handles interned so far.
    pub fn handles(&self) -> impl Iterator<Item = CommitHandle> + use<> {
        (0..u32::try_from(self.nodes.len()).unwrap()).map(CommitHandle)
    }

    pub fn abbreviate(&self, id: &[u8], min_len: usize) -> String {
        self.backend.abbreviate(id, min_len)
    }
}

/// Extracts the `object <hex>` target from a tag payload.
fn tag_target(bytes: &[u8]) -> Option<CommitId> {
    let rest = bytes.strip_prefix(b"object ")?;
    if rest.len() < OBJECT_ID_HEX_LEN {
        return None;
    }
    let id = hex_util::decode_hex(&rest[..OBJECT_ID_HEX_LEN])?;
    Some(CommitId::new(id))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::object_id::ObjectId as _;
    use crate::object_id::TagId;
    use crate::tests::GraphBuilder;
    use crate::tests::commit_id;
    use crate::tests::tree_id;

    #[test]
    fn test_lookup_canonical() {
        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        let mut store = graph.store();

        let a = store.lookup(&commit_id(1));
        let b = store.lookup(&commit_id(1));
        assert_eq!(a, b);
        let other = store.lookup(&commit_id(2));
        assert_ne!(a, other);
    }

    #[test]
    fn test_parse_commit_idempotent() {
        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        graph.commit(2, &[1], 200);
        let mut store = graph.store();

        let head = store.lookup(&commit_id(2));
        store.parse_commit(head).unwrap();
        let parents: Vec<_> = store.parents(head).to_vec();
        let date = store.date(head);
        let tree = store.tree(head).cloned();

        store.parse_commit(head).unwrap();
        assert_eq!(store.parents(head), parents);
        assert_eq!(store.date(head), date);
        assert_eq!(store.tree(head).cloned(), tree);

        assert_eq!(store.date(head), 200);
        assert_eq!(store.tree(head), Some(&tree_id(2)));
        assert_eq!(parents, vec![store.lookup(&commit_id(1))]);
        // The parent is interned but not parsed
        assert!(!store.is_parsed(parents[0]));
    }

    #[test]
    fn test_parse_commit_graft_overrides_parents() {
        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        graph.commit(2, &[], 150);
        graph.commit(3, &[1], 200);
        let mut store = graph.store();
        store.register_graft(
            Graft {
                id: commit_id(3),
                parents: vec![commit_id(2)],
            },
            DuplicatePolicy::Ignore,
        );

        let head = store.lookup(&commit_id(3));
        store.parse_commit(head).unwrap();
        let graft_parent = store.lookup(&commit_id(2));
        assert_eq!(store.parents(head), [graft_parent]);
    }

    #[test]
    fn test_parse_commit_shallow_graft() {
        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        graph.commit(2, &[1], 200);
        let mut store = graph.store();
        store.register_shallow(commit_id(2), DuplicatePolicy::Ignore);

        let head = store.lookup(&commit_id(2));
        store.parse_commit(head).unwrap();
        assert_eq!(store.parents(head), []);

        let mut out = Vec::new();
        let count = store
            .write_shallow_commits(&mut out, ShallowWriteMode::Plain)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", commit_id(2).hex()));
    }

    #[test]
    fn test_parse_commit_wrong_kind() {
        let mut graph = GraphBuilder::new();
        let tag_id = graph.tag(9, &commit_id(1));
        graph.commit(1, &[], 100);
        let mut store = graph.store();

        let as_commit = CommitId::new(tag_id.to_bytes());
        let handle = store.lookup(&as_commit);
        assert_matches!(
            store.parse_commit(handle),
            Err(StoreError::WrongKind {
                actual: ObjectKind::Tag,
                ..
            })
        );
        // The discovered kind sticks
        assert_eq!(store.kind(handle), ObjectKind::Tag);
    }

    #[test]
    fn test_lookup_commit_reference_deref_tag() {
        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        let tag_id = graph.tag(9, &commit_id(1));
        let tag_tag_id = graph.tag_of_tag(8, &tag_id);
        let mut store = graph.store();

        // tag -> commit
        let handle = store
            .lookup_commit_reference(&CommitId::new(tag_id.to_bytes()), false)
            .unwrap();
        assert_eq!(store.id(handle), &commit_id(1));

        // tag -> tag -> commit
        let handle = store
            .lookup_commit_reference(&CommitId::new(tag_tag_id.to_bytes()), false)
            .unwrap();
        assert_eq!(store.id(handle), &commit_id(1));
    }

    #[test]
    fn test_lookup_commit_reference_tag_cycle() {
        // Two tags pointing at each other never resolve to a commit
        let mut graph = GraphBuilder::new();
        let tag_a = graph.tag_of_tag(8, &TagId::new(vec![9; 20]));
        let tag_b = graph.tag_of_tag(9, &tag_a);
        let mut store = graph.store();

        assert_matches!(
            store.lookup_commit_reference(&CommitId::new(tag_b.to_bytes()), true),
            Err(StoreError::TagChainTooLong { .. })
        );
    }

    #[test]
    fn test_lookup_commit_reference_wrong_kind() {
        let mut graph = GraphBuilder::new();
        let blob_id = graph.blob(7, b"contents".to_vec());
        let mut store = graph.store();

        assert_matches!(
            store.lookup_commit_reference(&CommitId::new(blob_id.to_bytes()), true),
            Err(StoreError::WrongKind {
                actual: ObjectKind::Blob,
                ..
            })
        );
    }

    #[test]
    fn test_graft_file_loaded_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grafts");
        std::fs::write(&path, format!("{}\n", commit_id(2).hex())).unwrap();

        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        graph.commit(2, &[1], 200);
        let mut store = graph.store();
        store.set_graft_file(Some(path));

        let head = store.lookup(&commit_id(2));
        store.parse_commit(head).unwrap();
        assert_eq!(store.parents(head), []);
    }

    #[test]
    fn test_shallow_boundary_from_backend() {
        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        graph.backend_mut().set_shallow(true);
        let mut store = graph.store();
        assert!(store.is_shallow());
    }

    #[test]
    fn test_save_commit_buffer_switch() {
        let mut graph = GraphBuilder::new();
        graph.commit(1, &[], 100);
        graph.commit(2, &[], 100);
        let mut store = graph.store();

        let with_buffer = store.lookup(&commit_id(1));
        store.parse_commit(with_buffer).unwrap();
        assert!(store.raw_buffer(with_buffer).is_some());

        store.set_save_commit_buffer(false);
        let without_buffer = store.lookup(&commit_id(2));
        store.parse_commit(without_buffer).unwrap();
        assert!(store.raw_buffer(without_buffer).is_none());
    }
}
