use tokio::sync::broadcast;

use crate::types::CanMessage;

/// Virtual CAN bus for the demo harness and integration tests.
///
/// A broadcast channel stands in for the physical medium: every subscriber
/// sees every message, like nodes on a real bus. The safety core itself
/// never touches this; hooks stay synchronous.
#[derive(Clone)]
pub struct VirtualCanBus {
    tx: broadcast::Sender<CanMessage>,
}

impl VirtualCanBus {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Put a message on the bus. Fails when nobody is listening.
    pub fn send(&self, msg: CanMessage) -> Result<(), BusError> {
        self.tx.send(msg).map(|_| ()).map_err(|_| BusError::NoReceivers)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CanMessage> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    NoReceivers,
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::NoReceivers => write!(f, "no receivers subscribed to the bus"),
        }
    }
}

impl std::error::Error for BusError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BUS_VEHICLE;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let bus = VirtualCanBus::new(64);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let msg = CanMessage::new(BUS_VEHICLE, 0x123, &[1, 2, 3]).unwrap();
        bus.send(msg).unwrap();

        assert_eq!(rx1.recv().await.unwrap(), msg);
        assert_eq!(rx2.recv().await.unwrap(), msg);
    }

    #[tokio::test]
    async fn send_without_receivers_fails() {
        let bus = VirtualCanBus::new(8);
        let msg = CanMessage::new(BUS_VEHICLE, 0x123, &[]).unwrap();
        assert_eq!(bus.send(msg), Err(BusError::NoReceivers));
    }
}
