use serde::{Deserialize, Serialize};

pub mod webhook {
    use super::*;

    /// One decoded inbound event, ready for the dispatcher.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum InboundEvent {
        Text { body: String },
        Image { media_id: String },
        Button { id: String },
    }

    /// An inbound event together with its sender and channel message id.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct InboundMessage {
        /// Opaque per-user identifier on the messaging channel.
        pub sender: String,
        /// Channel message id, used for the mark-as-read acknowledgement.
        pub message_id: Option<String>,
        pub event: InboundEvent,
    }

    /// The raw webhook envelope as the channel posts it.
    ///
    /// The transport nests messages three levels deep and sends plenty of
    /// envelopes that carry no messages at all (delivery receipts, status
    /// updates). Every level defaults to empty so any of them may be absent
    /// without failing deserialization.
    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct Envelope {
        #[serde(default)]
        pub entry: Vec<Entry>,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct Entry {
        #[serde(default)]
        pub changes: Vec<Change>,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct Change {
        #[serde(default)]
        pub value: ChangeValue,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct ChangeValue {
        #[serde(default)]
        pub messages: Vec<Message>,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct Message {
        #[serde(default)]
        pub from: String,
        #[serde(default)]
        pub id: Option<String>,
        #[serde(rename = "type", default)]
        pub kind: String,
        #[serde(default)]
        pub text: Option<TextBody>,
        #[serde(default)]
        pub image: Option<MediaRef>,
        #[serde(default)]
        pub interactive: Option<Interactive>,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct TextBody {
        #[serde(default)]
        pub body: String,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct MediaRef {
        #[serde(default)]
        pub id: String,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct Interactive {
        #[serde(default)]
        pub button_reply: Option<ButtonReply>,
    }

    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct ButtonReply {
        #[serde(default)]
        pub id: String,
        #[serde(default)]
        pub title: Option<String>,
    }

    impl Envelope {
        /// Flattens the envelope into dispatchable events.
        ///
        /// Messages without a sender, with an unknown type, or missing the
        /// payload their type promises are skipped, never errors.
        #[must_use]
        pub fn into_events(self) -> Vec<InboundMessage> {
            let mut events = Vec::new();
            for entry in self.entry {
                for change in entry.changes {
                    for message in change.value.messages {
                        if message.from.is_empty() {
                            continue;
                        }
                        let event = match message.kind.as_str() {
                            "text" => message.text.map(|t| InboundEvent::Text { body: t.body }),
                            "image" => message.image.map(|i| InboundEvent::Image { media_id: i.id }),
                            "interactive" => message
                                .interactive
                                .and_then(|i| i.button_reply)
                                .map(|b| InboundEvent::Button { id: b.id }),
                            _ => None,
                        };
                        let Some(event) = event else { continue };
                        events.push(InboundMessage {
                            sender: message.from,
                            message_id: message.id,
                            event,
                        });
                    }
                }
            }
            events
        }
    }

}
