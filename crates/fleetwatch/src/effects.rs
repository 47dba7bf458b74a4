//! Effect handlers that turn command intents into wire messages.
//!
//! The presentation layer dispatches commands (`load_verkehrsmittel`,
//! `delay_verkehrsmittel`) into the store like any other action. The
//! effects registered here pick them up by kind and send the matching
//! envelope over the channel. They emit nothing back into the store.

use std::sync::Arc;

use fleetwatch_protocol::{Codec, Command, kind};
use fleetwatch_store::Effect;
use fleetwatch_transport::Channel;

/// Somewhere commands can be sent. Fire-and-forget.
pub trait CommandSink: Send + Sync + 'static {
    fn send_command(&self, command: &Command);
}

/// Encodes commands with a [`Codec`] and sends them on a [`Channel`].
pub struct ChannelSink<C, K> {
    channel: Arc<C>,
    codec: K,
}

impl<C: Channel, K: Codec> ChannelSink<C, K> {
    pub fn new(channel: Arc<C>, codec: K) -> Self {
        Self { channel, codec }
    }
}

impl<C: Channel, K: Codec> CommandSink for ChannelSink<C, K> {
    fn send_command(&self, command: &Command) {
        match self.codec.encode(&command.to_envelope()) {
            Ok(text) => {
                tracing::debug!(kind = command.kind(), "sending command");
                self.channel.send(text);
            }
            Err(e) => {
                tracing::error!(kind = command.kind(), error = %e, "command not encodable, dropping");
            }
        }
    }
}

/// The commands that go to the server, one effect each.
const SENT_KINDS: [&str; 3] = [kind::LOAD_USERNAME, kind::LOAD_UNITS, kind::DELAY_UNIT];

/// Builds one effect per command kind, all sending through `sink`.
pub fn command_effects(sink: Arc<dyn CommandSink>) -> Vec<Effect> {
    SENT_KINDS
        .into_iter()
        .map(|k| {
            let sink = Arc::clone(&sink);
            Effect::on_kind(k, move |action| {
                if let Some(command) = action.as_command() {
                    sink.send_command(command);
                }
            })
        })
        .collect()
}
