//! Notification and session-control collaborators.

use petrel_shared::envelope::InboundEnvelope;
use petrel_shared::message::Message;
use petrel_store::Chat;

/// Sound/tray side effect fired for background messages.
///
/// Implementations must return quickly; the reconciler never awaits the
/// effect and a muted conversation never reaches it.
pub trait Notifier: Send + Sync {
    fn notify(&self, chat: &Chat, message: &Message);
}

/// Notifier that does nothing. Useful for tests and headless runs.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _chat: &Chat, _message: &Message) {}
}

/// Receiver for session-control events (forced logout, token refresh,
/// registration acks, heartbeat acks). Auth flows live outside the
/// pipeline; it only guarantees these events exit the queue first.
pub trait ControlEvents: Send + Sync {
    fn on_control(&self, envelope: &InboundEnvelope);
}

/// Control handler that drops everything on the floor.
pub struct NoopControl;

impl ControlEvents for NoopControl {
    fn on_control(&self, _envelope: &InboundEnvelope) {}
}
