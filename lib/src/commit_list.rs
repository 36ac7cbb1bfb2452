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

//! Ordered sequences of commit handles.
//!
//! The graph algorithms keep their work queues and result sets in a
//! [`CommitList`] maintained non-increasing by committer date. Insertion is
//! stable: a commit is placed after existing entries of equal date.

use std::collections::VecDeque;

use crate::store::CommitHandle;
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitList {
    items: VecDeque<CommitHandle>,
}

impl CommitList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CommitHandle> + '_ {
        self.items.iter().copied()
    }

    pub fn contains(&self, commit: CommitHandle) -> bool {
        self.items.contains(&commit)
    }

    pub fn push_front(&mut self, commit: CommitHandle) {
        self.items.push_front(commit);
    }

    pub fn push_back(&mut self, commit: CommitHandle) {
        self.items.push_back(commit);
    }

    /// Pops the first commit, if any.
    pub fn pop(&mut self) -> Option<CommitHandle> {
        self.items.pop_front()
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Removes and returns the element at `index`.
    pub(crate) fn remove(&mut self, index: usize) -> Option<CommitHandle> {
        self.items.remove(index)
    }

    pub(crate) fn get(&self, index: usize) -> Option<CommitHandle> {
        self.items.get(index).copied()
    }

    /// Inserts `commit` keeping the list non-increasing by date; stable with
    /// respect to existing entries of the same date.
    pub fn insert_by_date(&mut self, store: &Store, commit: CommitHandle) {
        let date = store.date(commit);
        let pos = self
            .items
            .iter()
            .position(|&other| store.date(other) < date)
            .unwrap_or(self.items.len());
        self.items.insert(pos, commit);
    }

    /// Reorders the whole list into non-increasing date order by repeated
    /// [`CommitList::insert_by_date`].
    pub fn sort_by_date(&mut self, store: &Store) {
        let mut sorted = Self::new();
        while let Some(commit) = self.pop() {
            sorted.insert_by_date(store, commit);
        }
        *self = sorted;
    }
}

impl FromIterator<CommitHandle> for CommitList {
    fn from_iter<I: IntoIterator<Item = CommitHandle>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CommitList {
    type Item = CommitHandle;
    type IntoIter = <VecDeque<CommitHandle> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
