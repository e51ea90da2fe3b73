//! Gateway capability and factory traits.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GatewayResult;
use crate::event::GatewayEvent;
use crate::request::GatewayRequest;

/// Sending half of the gateway event channel.
pub type EventSender = mpsc::UnboundedSender<GatewayEvent>;
/// Receiving half of the gateway event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<GatewayEvent>;

/// Create a gateway event channel.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Event stream selector for `Ready` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowSeries {
    /// Per-user order and trade stream.
    Private,
    /// Market-wide status stream.
    Public,
}

/// Where private and public streams resume after connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeMode {
    /// Only events after login.
    Quick,
    /// Replay from the last received sequence.
    #[default]
    Resume,
}

/// A live link to the trading counterparty.
///
/// `send` returns the vendor's synchronous result code: `0` when the request
/// was queued for transmission, nonzero otherwise. Responses arrive later on
/// the event channel handed to the factory.
pub trait TraderGateway: Send + Sync {
    /// Subscribe streams, register the front address and start connecting.
    ///
    /// `FrontConnected` is delivered once the link is up.
    fn start(&self, front: &str, resume: ResumeMode) -> GatewayResult<()>;

    /// Send one request.
    fn send(&self, request: GatewayRequest, request_id: u32) -> i32;

    /// Tear the link down. No events are delivered afterwards.
    fn release(&self);
}

/// Creates gateways of one kind.
pub trait GatewayFactory: Send + Sync {
    /// Name the factory is registered under.
    fn name(&self) -> &str;

    /// Create a gateway that keeps its flow files under `flow_path` and
    /// delivers callbacks to `events`.
    fn create(&self, flow_path: &Path, events: EventSender) -> GatewayResult<Arc<dyn TraderGateway>>;
}
