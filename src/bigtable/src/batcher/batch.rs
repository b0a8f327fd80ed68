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

use crate::Result;
use crate::model::{MutateRowsRequest, MutateRowsResponse, SingleRowMutation};
use gax::error::Error;
use prost::Message;
use tokio::sync::oneshot;

/// A mutation waiting for admission.
#[derive(Debug)]
pub(crate) struct PendingMutation {
    pub(crate) mutation: SingleRowMutation,
    pub(crate) request_size: usize,
    pub(crate) num_mutations: usize,
    pub(crate) admission: oneshot::Sender<()>,
    pub(crate) completion: oneshot::Sender<Result<()>>,
}

impl PendingMutation {
    pub(crate) fn new(
        mutation: SingleRowMutation,
        admission: oneshot::Sender<()>,
        completion: oneshot::Sender<Result<()>>,
    ) -> Self {
        Self {
            request_size: mutation.encoded_len(),
            num_mutations: mutation.mutations.len(),
            mutation,
            admission,
            completion,
        }
    }
}

/// The mutations accumulated for the next `MutateRows` request.
///
/// The completion sender at position `i` belongs to the entry at position
/// `i`, which is also the index the service uses in its response.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    entries: Vec<SingleRowMutation>,
    completions: Vec<oneshot::Sender<Result<()>>>,
    requests_size: usize,
    num_mutations: usize,
}

impl Batch {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn requests_size(&self) -> usize {
        self.requests_size
    }

    pub(crate) fn num_mutations(&self) -> usize {
        self.num_mutations
    }

    /// Adds a mutation, returns its admission sender.
    pub(crate) fn push(&mut self, pending: PendingMutation) -> oneshot::Sender<()> {
        self.requests_size += pending.request_size;
        self.num_mutations += pending.num_mutations;
        self.entries.push(pending.mutation);
        self.completions.push(pending.completion);
        pending.admission
    }

    /// Takes the accumulated mutations, leaving this batch empty.
    pub(crate) fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Splits the batch into the request to send and its completion state.
    pub(crate) fn into_request(
        self,
        table_name: &str,
        app_profile_id: &str,
    ) -> (MutateRowsRequest, Completions) {
        let request = MutateRowsRequest {
            table_name: table_name.to_string(),
            entries: self.entries,
            app_profile_id: app_profile_id.to_string(),
        };
        let completions = Completions {
            senders: self.completions,
            requests_size: self.requests_size,
        };
        (request, completions)
    }
}

/// The completion senders of a batch in flight.
#[derive(Debug)]
pub(crate) struct Completions {
    senders: Vec<oneshot::Sender<Result<()>>>,
    requests_size: usize,
}

impl Completions {
    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }

    pub(crate) fn requests_size(&self) -> usize {
        self.requests_size
    }

    /// Completes every mutation in the batch.
    ///
    /// Entries reported with a non-OK status fail with that status, all other
    /// entries succeed. If the request failed, every entry fails with the
    /// same error.
    pub(crate) fn complete(self, result: Result<MutateRowsResponse>) {
        let response = match result {
            Ok(r) => r,
            Err(e) => {
                for tx in self.senders {
                    // The user may have dropped the handle, so it is ok if this fails.
                    let _ = tx.send(Err(e.clone()));
                }
                return;
            }
        };
        let mut senders = self.senders.into_iter().map(Some).collect::<Vec<_>>();
        for entry in response.entries {
            let slot = usize::try_from(entry.index)
                .ok()
                .and_then(|i| senders.get_mut(i));
            let Some(slot) = slot else {
                tracing::warn!(
                    index = entry.index,
                    batch_len = senders.len(),
                    "ignoring out of range index in MutateRows response"
                );
                continue;
            };
            let Some(status) = entry.status.filter(|s| !s.is_ok()) else {
                continue;
            };
            if let Some(tx) = slot.take() {
                let _ = tx.send(Err(Error::service(status.into())));
            }
        }
        for tx in senders.into_iter().flatten() {
            let _ = tx.send(Ok(()));
        }
    }
}
