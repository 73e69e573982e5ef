//! SPDX-License-Identifier: MIT

//! The framed command client: a single connection that serializes
//! request/response exchanges over a Unix-domain socket while
//! demultiplexing unsolicited server-initiated messages onto typed event
//! channels.

mod capability;
mod client;
mod discovery;
mod error;
mod events;

pub use capability::CapabilityResult;
pub use client::Client;
pub use error::{CapabilityError, ClientError, DiscoveryError};
