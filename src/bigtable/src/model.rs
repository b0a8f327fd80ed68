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

//! The messages exchanged with the Bigtable data and admin services.
//!
//! Only the subset of the Bigtable protos used by this crate is defined here.
//! The field numbers match the service definitions, so the
//! [encoded_len()][prost::Message::encoded_len] of each message is the size
//! the transport would put on the wire.

use gax::error::rpc::{Code, Status as GaxStatus};

/// A timestamp of `-1` asks the server to assign the timestamp.
///
/// Mutations using server-assigned timestamps are not idempotent: retrying
/// them may create additional cells.
pub const SERVER_TIMESTAMP: i64 = -1;

/// A change to be applied to a single row.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Mutation {
    #[prost(oneof = "mutation::Mutation", tags = "1, 2, 3, 4")]
    pub mutation: ::core::option::Option<mutation::Mutation>,
}

pub mod mutation {
    /// The kinds of mutations.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Mutation {
        #[prost(message, tag = "1")]
        SetCell(super::SetCell),
        #[prost(message, tag = "2")]
        DeleteFromColumn(super::DeleteFromColumn),
        #[prost(message, tag = "3")]
        DeleteFromFamily(super::DeleteFromFamily),
        #[prost(message, tag = "4")]
        DeleteFromRow(super::DeleteFromRow),
    }
}

/// Sets the value of a cell.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetCell {
    #[prost(string, tag = "1")]
    pub family_name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub column_qualifier: ::prost::alloc::vec::Vec<u8>,
    /// The timestamp of the cell, in microseconds. Use [SERVER_TIMESTAMP] to
    /// let the service pick the timestamp.
    #[prost(int64, tag = "3")]
    pub timestamp_micros: i64,
    #[prost(bytes = "vec", tag = "4")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

/// Deletes cells from a column, optionally restricted to a time range.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteFromColumn {
    #[prost(string, tag = "1")]
    pub family_name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub column_qualifier: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub time_range: ::core::option::Option<TimestampRange>,
}

/// A half-open range of timestamps, in microseconds.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct TimestampRange {
    #[prost(int64, tag = "1")]
    pub start_timestamp_micros: i64,
    #[prost(int64, tag = "2")]
    pub end_timestamp_micros: i64,
}

/// Deletes all the cells in a column family.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteFromFamily {
    #[prost(string, tag = "1")]
    pub family_name: ::prost::alloc::string::String,
}

/// Deletes all the cells in a row.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeleteFromRow {}

impl Mutation {
    /// A mutation setting `value` in the given cell.
    pub fn set_cell<F, C, V>(family: F, column: C, timestamp_micros: i64, value: V) -> Self
    where
        F: Into<String>,
        C: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        Self {
            mutation: Some(mutation::Mutation::SetCell(SetCell {
                family_name: family.into(),
                column_qualifier: column.into(),
                timestamp_micros,
                value: value.into(),
            })),
        }
    }

    /// A mutation deleting all the cells in a column.
    pub fn delete_from_column<F, C>(family: F, column: C) -> Self
    where
        F: Into<String>,
        C: Into<Vec<u8>>,
    {
        Self {
            mutation: Some(mutation::Mutation::DeleteFromColumn(DeleteFromColumn {
                family_name: family.into(),
                column_qualifier: column.into(),
                time_range: None,
            })),
        }
    }

    /// A mutation deleting all the cells in a column family.
    pub fn delete_from_family<F: Into<String>>(family: F) -> Self {
        Self {
            mutation: Some(mutation::Mutation::DeleteFromFamily(DeleteFromFamily {
                family_name: family.into(),
            })),
        }
    }

    /// A mutation deleting the row.
    pub fn delete_from_row() -> Self {
        Self {
            mutation: Some(mutation::Mutation::DeleteFromRow(DeleteFromRow {})),
        }
    }

    /// Returns true if applying this mutation twice has the same effect as
    /// applying it once.
    pub fn is_idempotent(&self) -> bool {
        match &self.mutation {
            Some(mutation::Mutation::SetCell(c)) => c.timestamp_micros != SERVER_TIMESTAMP,
            _ => true,
        }
    }
}

/// Request message for `MutateRow`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MutateRowRequest {
    #[prost(string, tag = "1")]
    pub table_name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub row_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub mutations: ::prost::alloc::vec::Vec<Mutation>,
    #[prost(string, tag = "4")]
    pub app_profile_id: ::prost::alloc::string::String,
}

/// Response message for `MutateRow`.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct MutateRowResponse {}

/// Request message for `MutateRows`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MutateRowsRequest {
    #[prost(string, tag = "1")]
    pub table_name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub entries: ::prost::alloc::vec::Vec<mutate_rows_request::Entry>,
    #[prost(string, tag = "3")]
    pub app_profile_id: ::prost::alloc::string::String,
}

pub mod mutate_rows_request {
    /// The mutations for a single row.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entry {
        #[prost(bytes = "vec", tag = "1")]
        pub row_key: ::prost::alloc::vec::Vec<u8>,
        #[prost(message, repeated, tag = "2")]
        pub mutations: ::prost::alloc::vec::Vec<super::Mutation>,
    }
}

/// An atomic set of mutations for a single row.
pub type SingleRowMutation = mutate_rows_request::Entry;

impl mutate_rows_request::Entry {
    /// Creates a row mutation.
    pub fn new<K, I>(row_key: K, mutations: I) -> Self
    where
        K: Into<Vec<u8>>,
        I: IntoIterator<Item = Mutation>,
    {
        Self {
            row_key: row_key.into(),
            mutations: mutations.into_iter().collect(),
        }
    }

    /// Returns true if all the mutations are idempotent.
    pub fn is_idempotent(&self) -> bool {
        self.mutations.iter().all(Mutation::is_idempotent)
    }
}

/// Response message for `MutateRows`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MutateRowsResponse {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<mutate_rows_response::Entry>,
}

pub mod mutate_rows_response {
    /// The result for one of the entries in a `MutateRows` request.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entry {
        /// The index into the request `entries`.
        #[prost(int64, tag = "1")]
        pub index: i64,
        #[prost(message, optional, tag = "2")]
        pub status: ::core::option::Option<super::Status>,
    }
}

/// The wire representation of an RPC status.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.code == i32::from(Code::Ok)
    }
}

impl std::convert::From<Status> for GaxStatus {
    fn from(value: Status) -> Self {
        GaxStatus::default()
            .set_code(value.code)
            .set_message(value.message)
    }
}

impl std::convert::From<GaxStatus> for Status {
    fn from(value: GaxStatus) -> Self {
        Self {
            code: value.code.into(),
            message: value.message,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GenerateConsistencyTokenRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GenerateConsistencyTokenResponse {
    #[prost(string, tag = "1")]
    pub consistency_token: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckConsistencyRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub consistency_token: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CheckConsistencyResponse {
    #[prost(bool, tag = "1")]
    pub consistent: bool,
}

/// Request message for `RestoreTable`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RestoreTableRequest {
    /// The instance where the table is restored, in
    /// `projects/{project}/instances/{instance}` format.
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub table_id: ::prost::alloc::string::String,
    /// The backup to restore from, in
    /// `projects/{project}/instances/{instance}/clusters/{cluster}/backups/{backup}`
    /// format.
    #[prost(string, tag = "3")]
    pub backup: ::prost::alloc::string::String,
}

/// A table, as returned by the admin service.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Table {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

impl ::prost::Name for Table {
    const NAME: &'static str = "Table";
    const PACKAGE: &'static str = "google.bigtable.admin.v2";

    fn type_url() -> String {
        format!("type.googleapis.com/{}", Self::full_name())
    }
}

/// A long-running operation.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operation {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub metadata: ::core::option::Option<::prost_types::Any>,
    #[prost(bool, tag = "3")]
    pub done: bool,
    #[prost(oneof = "operation::Result", tags = "4, 5")]
    pub result: ::core::option::Option<operation::Result>,
}

pub mod operation {
    /// The final result of an operation.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "4")]
        Error(super::Status),
        #[prost(message, tag = "5")]
        Response(::prost_types::Any),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetOperationRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}
