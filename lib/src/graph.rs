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

//! Traversal over the commit DAG: flag scrubbing, date-ordered walking, and
//! topological sorting.

use crate::commit_list::CommitList;
use crate::store::CommitHandle;
use crate::store::Store;
use crate::store::StoreResult;

/// Clears the `mask` bits on `commit` and on every ancestor reachable
/// through nodes that still carry any of the bits.
///
/// The recursion condition is what makes this terminate on arbitrary graphs:
/// an already-clean parent is never descended into, so each node is visited
/// at most once per set bit.
pub fn clear_commit_marks(store: &mut Store, commit: CommitHandle, mask: u32) {
    let mut pending = vec![commit];
    while let Some(commit) = pending.pop() {
        store.remove_flags(commit, mask);
        let parents = store.parents(commit).to_vec();
        for parent in parents {
            if store.flags(parent) & mask != 0 {
                pending.push(parent);
            }
        }
    }
}

/// Pops the head of a date-ordered list and feeds its parents back into the
/// list, parsing them on demand.
///
/// A parent carrying any `mark` bit is considered already queued or emitted
/// and is skipped; otherwise it is marked and inserted by date. With a zero
/// `mark` there is nothing to remember visits in, so the function falls back
/// to skipping parents already present in the list, which bounds a single
/// call even on graphs made cyclic by corrupt grafts.
///
/// Returns `None` when the list is empty.
pub fn pop_most_recent_commit(
    store: &mut Store,
    list: &mut CommitList,
    mark: u32,
) -> StoreResult<Option<CommitHandle>> {
    let Some(commit) = list.pop() else {
        return Ok(None);
    };
    let parents = store.parents(commit).to_vec();
    for parent in parents {
        store.parse_commit(parent)?;
        let seen = if mark != 0 {
            store.flags(parent) & mark != 0
        } else {
            list.contains(parent)
        };
        if !seen {
            store.add_flags(parent, mark);
            list.insert_by_date(store, parent);
        }
    }
    Ok(Some(commit))
}

struct SortNode {
    /// Number of children of the associated commit that also occur in the
    /// list being sorted.
    indegree: u32,
}

/// Sorts `list` in place so that every commit precedes its parents (Kahn's
/// algorithm, children first). Only edges between list members count;
/// parents outside the list are ignored.
///
/// With `lifo` set, newly freed parents are processed immediately, which
/// keeps lines of development together; otherwise the work queue is kept in
/// date order. The sort is stable with respect to that tiebreak, not with
/// respect to the original list order.
pub fn sort_in_topological_order(store: &mut Store, list: &mut CommitList, lifo: bool) {
    if list.is_empty() {
        return;
    }
    let handles: Vec<CommitHandle> = list.iter().collect();
    let mut nodes: Vec<SortNode> = handles.iter().map(|_| SortNode { indegree: 0 }).collect();
    for (index, &commit) in handles.iter().enumerate() {
        store.set_aux(commit, Some(u32::try_from(index).unwrap()));
    }
    for &commit in &handles {
        for index in 0..store.parents(commit).len() {
            let parent = store.parents(commit)[index];
            if let Some(aux) = store.aux(parent) {
                nodes[aux as usize].indegree += 1;
            }
        }
    }

    // Tips are the nodes no other list member reaches; they seed the queue.
    let mut work = CommitList::new();
    for &commit in &handles {
        let aux = store.aux(commit).unwrap();
        if nodes[aux as usize].indegree == 0 {
            work.push_back(commit);
        }
    }
    if !lifo {
        work.sort_by_date(store);
    }

    let mut output = CommitList::new();
    while let Some(commit) = work.pop() {
        let parents = store.parents(commit).to_vec();
        for parent in parents {
            let Some(aux) = store.aux(parent) else {
                continue;
            };
            // Parents are only enqueued for emission once all their children
            // in the list have been emitted.
            let node = &mut nodes[aux as usize];
            node.indegree -= 1;
            if node.indegree == 0 {
                if lifo {
                    work.push_front(parent);
                } else {
                    work.insert_by_date(store, parent);
                }
            }
        }
        store.set_aux(commit, None);
        output.push_back(commit);
    }
    *list = output;
}
