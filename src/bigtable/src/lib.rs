// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Google Cloud Client Libraries for Rust - Bigtable
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases. Testing is also incomplete, we do
//! **not** recommend that you use this crate in production. We welcome feedback
//! about the APIs, documentation, missing features, bugs, etc.
//!
//! This crate contains traits, types, and functions to write data to
//! [Bigtable] and to wait for administrative operations to complete.
//!
//! The crate does not include a transport. Applications provide one or more
//! implementations of [stub::BigtableStub] and wrap them with
//! [stub::decorate] before creating the clients:
//!
//! * [table::Table] applies single-row mutations, retrying them when it is
//!   safe to do so.
//! * [batcher::MutationBatcher] batches many single-row mutations into bulk
//!   requests, with flow control.
//! * [admin::TableAdmin] waits for replication and restores tables.
//!
//! [bigtable]: https://cloud.google.com/bigtable

pub use gax::Result;
pub use gax::error::Error;

pub mod admin;
pub mod batcher;
pub mod model;
pub mod options;
pub mod stub;
pub mod table;
