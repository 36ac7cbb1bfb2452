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

//! Commit-graph core of the grove content-addressed object store.
//!
//! This crate owns the commit side of the object model: parsing the
//! canonical commit bytes, interning nodes in a canonical table with a graft
//! overlay, the graph algorithms (date-ordered traversal, topological
//! ordering, merge bases), and the commit pretty printer. Reading object
//! bytes is delegated to a [`backend::Backend`] implementation.

pub mod backend;
pub mod commit;
pub mod commit_list;
pub mod dates;
pub mod graft;
pub mod graph;
pub mod hex_util;
pub mod memory_backend;
pub mod merge_base;
pub mod object_id;
pub mod pretty;
pub mod rfc2047;
pub mod store;
