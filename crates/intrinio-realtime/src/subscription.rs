/*
[INPUT]:  Caller join/leave intents and the provider adapter
[OUTPUT]: Minimal ordered join/leave frames converging joined -> desired
[POS]:    Subscription layer - desired vs joined channel reconciliation
[UPDATE]: When reconciliation ordering or reset semantics change
*/

use std::collections::BTreeSet;

use tracing::debug;

use crate::provider::ProviderAdapter;
use crate::types::Channel;
use crate::ws::message::OutboundMessage;

/// Desired and joined channel sets.
///
/// `desired` is what the caller asked for and survives reconnects. `joined` records
/// what was sent on the current socket; there is no server acknowledgment, so it is
/// an optimistic view.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    desired: BTreeSet<Channel>,
    joined: BTreeSet<Channel>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds channels to the desired set. Blank names are skipped.
    pub fn join<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in channels {
            match Channel::new(name.as_ref()) {
                Some(channel) => {
                    self.desired.insert(channel);
                }
                None => debug!("ignoring blank channel name"),
            }
        }
    }

    /// Removes channels from the desired set.
    pub fn leave<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in channels {
            if let Some(channel) = Channel::new(name.as_ref()) {
                self.desired.remove(&channel);
            }
        }
    }

    pub fn leave_all(&mut self) {
        self.desired.clear();
    }

    pub fn desired(&self) -> &BTreeSet<Channel> {
        &self.desired
    }

    pub fn joined(&self) -> &BTreeSet<Channel> {
        &self.joined
    }

    /// Forget what was joined; the next pass replays every desired channel.
    pub fn reset_joined(&mut self) {
        self.joined.clear();
    }

    pub fn is_converged(&self) -> bool {
        self.desired == self.joined
    }

    /// Frames converging `joined` to `desired`: all joins first, then all leaves,
    /// each group in channel order. Afterwards `joined == desired`.
    pub fn reconcile(&mut self, adapter: &ProviderAdapter) -> Vec<OutboundMessage> {
        let joins = self
            .desired
            .difference(&self.joined)
            .map(|channel| adapter.join_message(channel));
        let leaves = self
            .joined
            .difference(&self.desired)
            .map(|channel| adapter.leave_message(channel));
        let messages: Vec<OutboundMessage> = joins.chain(leaves).collect();

        self.joined = self.desired.clone();
        messages
    }
}
