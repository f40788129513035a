//! Cross-node message routing.

use std::sync::Arc;
use tracing::debug;
use world_core::{CrossNodeEnvelope, FamilyId, MessageKind, Packet, Recipient};

use crate::session::Session;
use crate::world::core::WorldContext;

const COLOR_WHISPER: u8 = 5;
const COLOR_SHOUT: u8 = 10;
const COLOR_FAMILY: u8 = 6;

impl WorldContext {
    /// Routes a chat/notice envelope received from the shared channel.
    ///
    /// Envelopes for other node groups are dropped; the rest are delivered
    /// according to their message kind. Cross-channel deliveries are
    /// annotated with the origin channel number.
    pub async fn on_cross_node_message(&self, envelope: &CrossNodeEnvelope) {
        if !envelope.addressed_to_group(&self.settings.node_group) {
            return;
        }
        match envelope.kind {
            MessageKind::Whisper => {
                if let Recipient::Name(name) = &envelope.recipient {
                    if let Some(target) = self.session_by_name(name) {
                        target.send(Packet::Say {
                            text: self.annotate_channel(envelope),
                            color: COLOR_WHISPER,
                        });
                    } else {
                        debug!("📨 Whisper target '{}' not on this node", name);
                    }
                }
            }
            MessageKind::Shout => {
                for session in self.connected_sessions() {
                    session.send(Packet::Say {
                        text: format!("{}: {}", envelope.sender, envelope.text),
                        color: COLOR_SHOUT,
                    });
                    session.send(Packet::Info {
                        text: envelope.text.clone(),
                    });
                }
            }
            MessageKind::Private => {
                if let Recipient::Name(name) = &envelope.recipient {
                    if let Some(target) = self.session_by_name(name) {
                        target.send(Packet::Message {
                            text: envelope.text.clone(),
                        });
                    }
                }
            }
            MessageKind::FamilyChat => {
                if let Recipient::Family(family_id) = envelope.recipient {
                    let text = self.annotate_channel(envelope);
                    for session in self.family_members_connected(family_id).await {
                        session.send(Packet::Say {
                            text: text.clone(),
                            color: COLOR_FAMILY,
                        });
                    }
                }
            }
            MessageKind::FamilyBroadcast => {
                if let Recipient::Family(family_id) = envelope.recipient {
                    for session in self.family_members_connected(family_id).await {
                        session.send(Packet::Message {
                            text: envelope.text.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Connected sessions whose character belongs to `family_id`.
    pub async fn family_members_connected(&self, family_id: FamilyId) -> Vec<Arc<Session>> {
        let mut members = Vec::new();
        for session in self.connected_sessions() {
            if session.character().await.family_id == Some(family_id) {
                members.push(session);
            }
        }
        members
    }

    /// Prefixes the origin channel when the message crossed channels.
    fn annotate_channel(&self, envelope: &CrossNodeEnvelope) -> String {
        if envelope.origin_channel != self.settings.channel_id {
            let tag = self
                .localizer
                .resolve("CHANNEL_TAG", &[&envelope.origin_channel.to_string()]);
            format!("{} {}: {}", tag, envelope.sender, envelope.text)
        } else {
            format!("{}: {}", envelope.sender, envelope.text)
        }
    }
}
