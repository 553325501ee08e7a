// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription slot: one channel/event pair per client.
//!
//! The slot survives reconnects. Every time the connection reaches the
//! handshake the actor calls [`SubscriptionManager::begin`]; the manager
//! decides whether a frame goes out immediately or an auth request is
//! needed first.

use qs_core::protocol::{is_restricted_channel, Frame, SubscribeRequest, UnsubscribeRequest};

use crate::auth::AuthError;

/// A requested channel subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub channel_name: String,
    pub event_name: String,
    /// Private and presence channels need an auth token.
    pub is_restricted: bool,
}

impl Subscription {
    pub fn new(channel_name: impl Into<String>, event_name: impl Into<String>) -> Self {
        let channel_name = channel_name.into();
        Subscription {
            is_restricted: is_restricted_channel(&channel_name),
            channel_name,
            event_name: event_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// Waiting for the next handshake.
    Pending,
    /// Auth request in flight for this generation.
    Authorizing(u64),
    /// Subscribe frame sent, no confirmation yet.
    Sent,
    /// Server confirmed the subscription.
    Active,
    /// Auth or subscribe failed; retried on the next connection.
    Deferred,
}

/// What the actor must do to subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeStep {
    /// Send this subscribe frame.
    Send(String),
    /// Ask the authorizer first, then report back with `generation`.
    Authorize {
        generation: u64,
        channel: String,
        socket_id: String,
    },
}

/// Result of feeding an auth response back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Send this subscribe frame.
    Send(String),
    /// Auth failed; the subscription waits for the next connection.
    Deferred(AuthError),
    /// The response belongs to a superseded attempt.
    Stale,
}

#[derive(Debug, Default)]
pub struct SubscriptionManager {
    slot: Option<(Subscription, Status)>,
    generation: u64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The requested subscription, if any.
    pub fn subscription(&self) -> Option<&Subscription> {
        self.slot.as_ref().map(|(sub, _)| sub)
    }

    /// Returns true once the server confirmed the subscription.
    pub fn is_active(&self) -> bool {
        matches!(self.slot, Some((_, Status::Active)))
    }

    /// Returns true if a subscription waits for the next handshake.
    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        matches!(self.slot, Some((_, Status::Pending)))
    }

    /// Returns true while waiting for the authorizer.
    #[cfg(test)]
    pub fn is_authorizing(&self) -> bool {
        matches!(self.slot, Some((_, Status::Authorizing(_))))
    }

    /// Stores a new request.
    ///
    /// Returns an unsubscribe frame when a different channel had already been
    /// sent to the server. Re-requesting the channel that is already sent only
    /// updates the event name.
    pub fn request(&mut self, subscription: Subscription) -> qs_core::Result<Option<String>> {
        if let Some((current, status)) = &mut self.slot {
            if current.channel_name == subscription.channel_name
                && matches!(status, Status::Sent | Status::Active)
            {
                current.event_name = subscription.event_name;
                return Ok(None);
            }
        }

        let unsubscribe = self.clear()?;
        self.slot = Some((subscription, Status::Pending));
        Ok(unsubscribe)
    }

    /// Drops the slot. Returns an unsubscribe frame if the server knew about it.
    pub fn clear(&mut self) -> qs_core::Result<Option<String>> {
        self.generation += 1;
        match self.slot.take() {
            Some((sub, Status::Sent | Status::Active)) => {
                Ok(Some(UnsubscribeRequest::new(sub.channel_name).to_json()?))
            }
            _ => Ok(None),
        }
    }

    /// Starts subscribing on the connection identified by `socket_id`.
    ///
    /// Only a pending slot moves; anything else returns `None`.
    pub fn begin(&mut self, socket_id: &str) -> qs_core::Result<Option<SubscribeStep>> {
        let Some((sub, status)) = &mut self.slot else {
            return Ok(None);
        };
        if *status != Status::Pending {
            return Ok(None);
        }

        if sub.is_restricted {
            self.generation += 1;
            *status = Status::Authorizing(self.generation);
            return Ok(Some(SubscribeStep::Authorize {
                generation: self.generation,
                channel: sub.channel_name.clone(),
                socket_id: socket_id.to_string(),
            }));
        }

        let frame = SubscribeRequest::public(sub.channel_name.clone()).to_json()?;
        *status = Status::Sent;
        Ok(Some(SubscribeStep::Send(frame)))
    }

    /// Feeds back the result of an auth request started by [`Self::begin`].
    pub fn on_auth_result(
        &mut self,
        generation: u64,
        result: Result<String, AuthError>,
    ) -> qs_core::Result<AuthOutcome> {
        let Some((sub, status)) = &mut self.slot else {
            return Ok(AuthOutcome::Stale);
        };
        if *status != Status::Authorizing(generation) {
            return Ok(AuthOutcome::Stale);
        }

        match result {
            Ok(token) => {
                let frame = SubscribeRequest::authorized(sub.channel_name.clone(), token).to_json()?;
                *status = Status::Sent;
                Ok(AuthOutcome::Send(frame))
            }
            Err(err) => {
                *status = Status::Deferred;
                Ok(AuthOutcome::Deferred(err))
            }
        }
    }

    /// Handles `pusher_internal:subscription_succeeded`.
    ///
    /// Returns true if it confirmed our subscription.
    pub fn on_succeeded(&mut self, channel: Option<&str>) -> bool {
        match &mut self.slot {
            Some((sub, status))
                if *status == Status::Sent && channel == Some(sub.channel_name.as_str()) =>
            {
                *status = Status::Active;
                true
            }
            _ => false,
        }
    }

    /// Handles `pusher:subscription_error`. A frame without a channel applies
    /// to whatever is in flight.
    ///
    /// Returns true if it rejected our subscription.
    pub fn on_error(&mut self, channel: Option<&str>) -> bool {
        match &mut self.slot {
            Some((sub, status))
                if matches!(status, Status::Sent | Status::Active)
                    && (channel.is_none() || channel == Some(sub.channel_name.as_str())) =>
            {
                *status = Status::Deferred;
                true
            }
            _ => false,
        }
    }

    /// Returns true if an application frame belongs to our subscription.
    pub fn accepts(&self, frame: &Frame) -> bool {
        match &self.slot {
            Some((sub, Status::Sent | Status::Active)) => {
                frame.channel.as_deref() == Some(sub.channel_name.as_str())
                    && frame.event == sub.event_name
            }
            _ => false,
        }
    }

    /// The connection is gone: everything in flight is void and the slot
    /// waits for the next handshake.
    pub fn on_connection_lost(&mut self) {
        self.generation += 1;
        if let Some((_, status)) = &mut self.slot {
            *status = Status::Pending;
        }
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
