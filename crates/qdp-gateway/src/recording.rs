//! Recording gateway for tests and dry runs.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::GatewayResult;
use crate::event::GatewayEvent;
use crate::gateway::{EventSender, GatewayFactory, ResumeMode, TraderGateway};
use crate::request::GatewayRequest;

/// Gateway that records every request and answers nothing on its own.
///
/// Tests drive callbacks explicitly, either through [`RecordingGateway::emit`]
/// or by handing events to the session directly.
pub struct RecordingGateway {
    /// Recorded `(request, request_id)` pairs.
    sends: Mutex<Vec<(GatewayRequest, u32)>>,
    /// Result code returned by `send`.
    next_result: AtomicI32,
    front: Mutex<Option<String>>,
    released: AtomicBool,
    events: Mutex<Option<EventSender>>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            next_result: AtomicI32::new(0),
            front: Mutex::new(None),
            released: AtomicBool::new(false),
            events: Mutex::new(None),
        }
    }

    /// Set the code returned by subsequent sends.
    pub fn set_next_result(&self, code: i32) {
        self.next_result.store(code, Ordering::SeqCst);
    }

    /// Get recorded sends.
    pub fn get_sends(&self) -> Vec<(GatewayRequest, u32)> {
        self.sends.lock().clone()
    }

    /// Recorded requests without ids.
    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.sends.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Clear recorded sends.
    pub fn clear_sends(&self) {
        self.sends.lock().clear();
    }

    /// Front address passed to `start`.
    pub fn front(&self) -> Option<String> {
        self.front.lock().clone()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Deliver an event on the channel given at creation.
    ///
    /// Returns false when no channel is attached or the receiver is gone.
    pub fn emit(&self, event: GatewayEvent) -> bool {
        match self.events.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    fn attach(&self, events: EventSender) {
        *self.events.lock() = Some(events);
        self.released.store(false, Ordering::SeqCst);
    }
}

impl TraderGateway for RecordingGateway {
    fn start(&self, front: &str, _resume: ResumeMode) -> GatewayResult<()> {
        *self.front.lock() = Some(front.to_string());
        Ok(())
    }

    fn send(&self, request: GatewayRequest, request_id: u32) -> i32 {
        self.sends.lock().push((request, request_id));
        self.next_result.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.events.lock().take();
    }
}

/// Factory that always hands out the same [`RecordingGateway`].
pub struct RecordingFactory {
    gateway: Arc<RecordingGateway>,
}

impl Default for RecordingFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(RecordingGateway::new()),
        }
    }

    /// The shared gateway instance.
    pub fn gateway(&self) -> Arc<RecordingGateway> {
        Arc::clone(&self.gateway)
    }
}

impl GatewayFactory for RecordingFactory {
    fn name(&self) -> &str {
        "recording"
    }

    fn create(&self, _flow_path: &Path, events: EventSender) -> GatewayResult<Arc<dyn TraderGateway>> {
        self.gateway.attach(events);
        let gateway: Arc<dyn TraderGateway> = self.gateway.clone();
        Ok(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::event_channel;
    use crate::request::{QryField, ReqUserLogoutField};

    #[test]
    fn test_records_sends_and_result() {
        let gw = RecordingGateway::new();
        assert_eq!(gw.send(GatewayRequest::QryOrder(QryField::default()), 1), 0);

        gw.set_next_result(-2);
        let logout = GatewayRequest::UserLogout(ReqUserLogoutField::default());
        assert_eq!(gw.send(logout.clone(), 2), -2);

        let sends = gw.get_sends();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[1], (logout, 2));

        gw.clear_sends();
        assert!(gw.get_sends().is_empty());
    }

    #[test]
    fn test_emit_through_factory_channel() {
        let factory = RecordingFactory::new();
        let (tx, mut rx) = event_channel();
        let gw = factory.create(Path::new("unused"), tx).unwrap();
        gw.start("tcp://127.0.0.1:30005", ResumeMode::Quick).unwrap();

        let recording = factory.gateway();
        assert_eq!(recording.front().as_deref(), Some("tcp://127.0.0.1:30005"));
        assert!(recording.emit(GatewayEvent::FrontConnected));
        assert_eq!(rx.try_recv().unwrap(), GatewayEvent::FrontConnected);

        gw.release();
        assert!(recording.is_released());
        assert!(!recording.emit(GatewayEvent::FrontConnected));
    }
}
