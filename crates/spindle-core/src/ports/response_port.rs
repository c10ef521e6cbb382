//! ResponsePort - worker→pool channel handle.
//!
//! The coordinator hands one over in the handshake; until then the worker
//! answers on the parent channel it was started with.

use tokio::sync::mpsc;

use crate::domain::MessageValue;
use crate::error::SpindleError;

#[derive(Debug, Clone)]
pub struct ResponsePort {
    tx: mpsc::UnboundedSender<MessageValue>,
}

impl ResponsePort {
    pub fn new(tx: mpsc::UnboundedSender<MessageValue>) -> Self {
        Self { tx }
    }

    /// A port plus the receiving end the coordinator keeps.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MessageValue>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, message: MessageValue) -> Result<(), SpindleError> {
        self.tx.send(message).map_err(|_| SpindleError::ChannelClosed)
    }

    /// True once the coordinator dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_fails_after_receiver_dropped() {
        let (port, rx) = ResponsePort::channel();
        assert!(!port.is_closed());
        drop(rx);
        assert!(port.is_closed());
        assert_eq!(
            port.send(MessageValue::check_active(true)).unwrap_err(),
            SpindleError::ChannelClosed
        );
    }
}
