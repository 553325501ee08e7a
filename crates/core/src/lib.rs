// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! qs-core: protocol and queue model for the qsync client
//!
//! This crate provides the pieces of the queue client that do no I/O: the
//! Pusher Channels frame codec, the queue item model, and the queue
//! projection store. Everything here is synchronous and deterministic.

pub mod error;
pub mod item;
pub mod protocol;
pub mod store;

pub use error::{Error, Result};
pub use item::QueueItem;
pub use protocol::{
    ConnectionEstablished, Frame, FrameKind, ProtocolError, SubscribeRequest, UnsubscribeRequest,
};
pub use store::{Applied, QueueEvent, QueueStore};
