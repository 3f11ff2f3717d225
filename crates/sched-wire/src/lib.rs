// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Wire contract between `sched-cli` and `sched-daemon`: the admin
//! request/response protocol, its framed codec, and the JSON
//! canonicalization profile applied to manifest and queue inputs.

pub mod codec;
pub mod contract;
mod request;
mod response;
mod types;

pub use codec::{decode, encode, read_message, read_request, write_message, write_response, ProtocolError};
pub use request::Request;
pub use response::Response;
pub use types::{
    DeadLetterSummary, ExecutionDetail, ExecutionSummary, ManifestDetail, ManifestSummary,
    WorkQueueSummary,
};
