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

//! Merge-base (lowest-common-ancestor) computation.
//!
//! The engine paints the ancestry of the two inputs with the reserved
//! `PARENT1`/`PARENT2` bits while walking a shared date-ordered list; a node
//! carrying both colors is a candidate base, and `STALE` spreads to its
//! ancestors to rule out dominated candidates. All four reserved bits are
//! cleared again before the public functions return.

use crate::commit_list::CommitList;
use crate::graph::clear_commit_marks;
use crate::store::CommitHandle;
use crate::store::Store;
use crate::store::StoreResult;

// Reserved upper flag bits; the lower 16 belong to callers.
const PARENT1: u32 = 1 << 16;
const PARENT2: u32 = 1 << 17;
const STALE: u32 = 1 << 18;
const RESULT: u32 = 1 << 19;

const ALL_FLAGS: u32 = PARENT1 | PARENT2 | STALE | RESULT;

/// Index of the first work-list entry that is still interesting, i.e. not
/// known to be an ancestor of a candidate already found.
fn first_interesting(store: &Store, list: &CommitList) -> Option<usize> {
    (0..list.len()).find(|&index| store.flags(list.get(index).unwrap()) & STALE == 0)
}

/// Paints ancestors of `one` and `two` and collects every commit reachable
/// from both that has no still-interesting descendant. Leaves the paint on
/// the graph; callers scrub with [`clear_commit_marks`].
fn merge_bases(store: &mut Store, one: CommitHandle, two: CommitHandle) -> StoreResult<CommitList> {
    let mut result = CommitList::new();
    if one == two {
        // Not marked with RESULT either, so there is nothing to clean up.
        result.push_front(one);
        return Ok(result);
    }

    store.parse_commit(one)?;
    store.parse_commit(two)?;

    store.add_flags(one, PARENT1);
    store.add_flags(two, PARENT2);
    let mut list = CommitList::new();
    list.insert_by_date(store, one);
    list.insert_by_date(store, two);

    while let Some(index) = first_interesting(store, &list) {
        let commit = list.remove(index).unwrap();
        let mut flags = store.flags(commit) & (PARENT1 | PARENT2 | STALE);
        if flags == (PARENT1 | PARENT2) {
            if store.flags(commit) & RESULT == 0 {
                store.add_flags(commit, RESULT);
                result.insert_by_date(store, commit);
            }
            // Ancestors of a candidate are no longer interesting
            flags |= STALE;
        }
        let parents = store.parents(commit).to_vec();
        for parent in parents {
            if store.flags(parent) & flags == flags {
                continue;
            }
            store.parse_commit(parent)?;
            store.add_flags(parent, flags);
            list.insert_by_date(store, parent);
        }
    }

    // A candidate may have been found stale after it was added
    Ok(result
        .into_iter()
        .filter(|&commit| store.flags(commit) & STALE == 0)
        .collect())
}

/// Returns the independent merge bases of `one` and `two` in non-increasing
/// date order.
///
/// With `cleanup` set (callers almost always want this), the reserved flag
/// bits are scrubbed from every node the computation touched before
/// returning. When more than one candidate is found the reduction needs the
/// paint removed between pairwise passes, so cleanup happens regardless.
pub fn get_merge_bases(
    store: &mut Store,
    one: CommitHandle,
    two: CommitHandle,
    cleanup: bool,
) -> StoreResult<CommitList> {
    let result = merge_bases(store, one, two)?;
    if one == two {
        return Ok(result);
    }
    if result.len() <= 1 {
        if cleanup {
            clear_commit_marks(store, one, ALL_FLAGS);
            clear_commit_marks(store, two, ALL_FLAGS);
        }
        return Ok(result);
    }

    // More than one: prune candidates reachable from other candidates.
    let mut slots: Vec<Option<CommitHandle>> = result.into_iter().map(Some).collect();
    clear_commit_marks(store, one, ALL_FLAGS);
    clear_commit_marks(store, two, ALL_FLAGS);
    for i in 0..slots.len() - 1 {
        for j in (i + 1)..slots.len() {
            let (Some(base_i), Some(base_j)) = (slots[i], slots[j]) else {
                continue;
            };
            let bases = merge_bases(store, base_i, base_j)?;
            clear_commit_marks(store, base_i, ALL_FLAGS);
            clear_commit_marks(store, base_j, ALL_FLAGS);
            for base in bases.iter() {
                if slots[i] == Some(base) {
                    slots[i] = None;
                }
                if slots[j] == Some(base) {
                    slots[j] = None;
                }
            }
        }
    }

    let mut independent = CommitList::new();
    for commit in slots.into_iter().flatten() {
        independent.insert_by_date(store, commit);
    }
    Ok(independent)
}

/// Whether `commit` is an ancestor of (or equal to) `reference`.
pub fn in_merge_bases(
    store: &mut Store,
    commit: CommitHandle,
    reference: CommitHandle,
) -> StoreResult<bool> {
    let bases = get_merge_bases(store, commit, reference, true)?;
    Ok(bases.iter().any(|base| base == commit))
}
