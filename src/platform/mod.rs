pub mod gen1;
pub mod gen2;

use serde::{Deserialize, Serialize};

use crate::limits::{SteeringLimits, TorqueLimitMode};
use crate::types::CanMessage;

/// Supported vehicle platforms. A closed set: one variant per platform,
/// selected once at startup and never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Steering-only platform generation.
    Gen1,
    /// Full platform generation with optional alternate longitudinal
    /// control.
    Gen2,
}

/// One entry of a platform's transmit allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxMessage {
    pub address: u32,
    pub bus: u8,
    pub length: u8,
}

/// Both generations share the same EPS rack, so the lateral envelope is
/// common. Torques in 0.01 Nm; the real-time window is 250 ms.
pub const STEERING_LIMITS: SteeringLimits = SteeringLimits {
    max_steer: 300,
    max_rate_up: 4,
    max_rate_down: 10,
    max_rt_delta: 75,
    max_rt_interval_us: 250_000,
    driver_torque_allowance: 80,
    driver_torque_factor: 3,
    mode: TorqueLimitMode::DriverLimited,
};

/// Whether an outbound message is in the platform's allowlist: address, bus
/// and length must all match an entry.
pub(crate) fn tx_allowed(msg: &CanMessage, allowlist: &[TxMessage]) -> bool {
    allowlist
        .iter()
        .any(|m| m.address == msg.address() && m.bus == msg.bus() && m.length as usize == msg.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BUS_VEHICLE;

    #[test]
    fn tx_allowed_requires_exact_triple() {
        let allowlist = [TxMessage {
            address: 0x1B2,
            bus: BUS_VEHICLE,
            length: 8,
        }];
        let ok = CanMessage::new(BUS_VEHICLE, 0x1B2, &[0u8; 8]).unwrap();
        assert!(tx_allowed(&ok, &allowlist));

        let wrong_bus = CanMessage::new(2, 0x1B2, &[0u8; 8]).unwrap();
        assert!(!tx_allowed(&wrong_bus, &allowlist));

        let wrong_len = CanMessage::new(BUS_VEHICLE, 0x1B2, &[0u8; 4]).unwrap();
        assert!(!tx_allowed(&wrong_len, &allowlist));

        let wrong_addr = CanMessage::new(BUS_VEHICLE, 0x1B3, &[0u8; 8]).unwrap();
        assert!(!tx_allowed(&wrong_addr, &allowlist));
    }
}
