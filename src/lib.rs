//! SPDX-License-Identifier: MIT

//! A pure-Rust BSER codec and command client for the Watchman file-watching
//! service.
//!
//! [`bser`] is the self-describing binary wire format; [`client`] is the
//! framed command client that speaks it over a Unix-domain socket.

pub mod accumulator;
pub mod bser;
pub mod cfg;
pub mod client;
pub mod int64;
pub mod value;

pub use bser::{DecodeError, EncodeError, load_from_buffer};
pub use client::{
    CapabilityError, CapabilityResult, Client, ClientError, DiscoveryError,
};
pub use int64::Int64;
pub use value::{Object, Value};
