//! Dispatch of decoded inbound events to the presentation layer.

use chatline_protocol::{ChatMessage, InboundEvent};

/// What the presentation layer implements to show inbound traffic.
///
/// Called on the client's event loop, one event at a time, in the order
/// frames arrived. Implementations should hand work off rather than block.
pub trait RenderHandler: Send + 'static {
    /// A chat line from any participant, including ourselves.
    fn render_message(&mut self, message: &ChatMessage);

    /// Server-generated text ("alice joined").
    fn render_notification(&mut self, text: &str);

    /// A frame that did not decode. Ignored unless overridden.
    fn on_unknown(&mut self, _raw: &str) {}
}

/// Routes each [`InboundEvent`] to the matching [`RenderHandler`] method.
///
/// Holds no buffer: every event is delivered before `dispatch` returns.
pub struct MessageRouter {
    handler: Box<dyn RenderHandler>,
    dispatched: u64,
}

impl MessageRouter {
    pub fn new(handler: impl RenderHandler) -> Self {
        Self {
            handler: Box::new(handler),
            dispatched: 0,
        }
    }

    pub fn dispatch(&mut self, event: InboundEvent) {
        self.dispatched += 1;
        match event {
            InboundEvent::ChatMessage(message) => {
                tracing::trace!(
                    seq = self.dispatched,
                    username = %message.username,
                    "dispatching chat message"
                );
                self.handler.render_message(&message);
            }
            InboundEvent::Notification { text } => {
                tracing::trace!(seq = self.dispatched, "dispatching notification");
                self.handler.render_notification(&text);
            }
            InboundEvent::Unknown { raw } => {
                tracing::debug!(seq = self.dispatched, %raw, "unknown inbound event");
                self.handler.on_unknown(&raw);
            }
        }
    }

    /// Events dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}
