//! Steering-only platform generation. Shares the steering column and brake
//! state layouts with the newer generation but keeps its own chassis and
//! drivetrain messages, and has no longitudinal path.

use crate::crc::ChecksumKind;
use crate::events::SafetyEvent;
use crate::freshness::AddressPolicy;
use crate::limits::check_steer_cmd;
use crate::platform::{TxMessage, STEERING_LIMITS};
use crate::policy::{SafetyGateway, TxDenial};
use crate::types::{signals, CanMessage, BUS_CAMERA, BUS_VEHICLE};

/// Arbitration identifiers this generation cares about.
pub mod msg {
    /// RX from the chassis controller: four wheel speeds, packed 12-bit.
    pub const WHEEL_SPEEDS: u32 = 0x0E8;
    /// RX from the power steering rack: measured driver torque (shared
    /// layout with the newer generation).
    pub const DRIVER_STEER: u32 = 0x0A6;
    /// RX from the brake controller: driver brake pressure state (shared
    /// layout).
    pub const BRAKE_STATE: u32 = 0x11C;
    /// RX from the drivetrain coordinator: cruise status.
    pub const CRUISE_STATE: u32 = 0x148;
    /// RX from the engine controller: accelerator input and brake switch.
    pub const DRIVER_PEDAL: u32 = 0x12C;
    /// RX (driver buttons) and TX (button emulation): cruise buttons.
    pub const CRUISE_BUTTONS: u32 = 0x154;
    /// TX: commanded steering torque to the rack (shared layout).
    pub const STEER_CMD: u32 = 0x1B2;
}

/// Transmit set: steering plus button emulation toward both sides.
pub const TX_MESSAGES: &[TxMessage] = &[
    TxMessage { address: msg::STEER_CMD, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::CRUISE_BUTTONS, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::CRUISE_BUTTONS, bus: BUS_CAMERA, length: 8 },
];

/// Counter/checksum protection for the addresses the receive hook consumes.
pub fn rx_policies() -> Vec<AddressPolicy> {
    vec![
        AddressPolicy {
            address: msg::WHEEL_SPEEDS,
            bus: BUS_VEHICLE,
            length: 8,
            checksum: ChecksumKind::Crc8,
            max_counter: 15,
            expected_timestep_us: 20_000,
        },
        AddressPolicy {
            address: msg::DRIVER_STEER,
            bus: BUS_VEHICLE,
            length: 8,
            checksum: ChecksumKind::Crc8CounterSalted,
            max_counter: 15,
            expected_timestep_us: 10_000,
        },
        AddressPolicy {
            address: msg::BRAKE_STATE,
            bus: BUS_VEHICLE,
            length: 8,
            checksum: ChecksumKind::Crc8,
            max_counter: 15,
            expected_timestep_us: 20_000,
        },
        AddressPolicy {
            address: msg::CRUISE_STATE,
            bus: BUS_VEHICLE,
            length: 8,
            checksum: ChecksumKind::Crc8,
            max_counter: 15,
            expected_timestep_us: 20_000,
        },
        AddressPolicy {
            address: msg::DRIVER_PEDAL,
            bus: BUS_VEHICLE,
            length: 8,
            checksum: ChecksumKind::Crc8,
            max_counter: 15,
            expected_timestep_us: 10_000,
        },
    ]
}

/// Camera-bus addresses the gateway takes over on this generation.
pub fn intercepted() -> Vec<u32> {
    vec![msg::STEER_CMD]
}

/// Sum of the four wheel speeds: 12-bit values packed back to back from
/// bit 16 (front left, front right, rear left, rear right).
pub fn wheel_speed_sum(msg: &CanMessage) -> u32 {
    let fl = (msg.byte(2) as u32) | (((msg.byte(3) & 0x0F) as u32) << 8);
    let fr = ((msg.byte(3) >> 4) as u32) | ((msg.byte(4) as u32) << 4);
    let rl = (msg.byte(5) as u32) | (((msg.byte(6) & 0x0F) as u32) << 8);
    let rr = ((msg.byte(6) >> 4) as u32) | ((msg.byte(7) as u32) << 4);
    fl + fr + rl + rr
}

/// Inverse of [`wheel_speed_sum`], for tests and the demo harness.
pub fn encode_wheel_speeds(speeds: [u16; 4]) -> [u8; 8] {
    let [fl, fr, rl, rr] = speeds.map(|s| s & 0x0FFF);
    let mut data = [0u8; 8];
    data[2] = (fl & 0xFF) as u8;
    data[3] = ((fl >> 8) as u8) | (((fr & 0x0F) as u8) << 4);
    data[4] = (fr >> 4) as u8;
    data[5] = (rl & 0xFF) as u8;
    data[6] = ((rl >> 8) as u8) | (((rr & 0x0F) as u8) << 4);
    data[7] = (rr >> 4) as u8;
    data
}

/// Stock cruise engaged when byte 2 bits 0-1 read 1.
pub fn cruise_engaged(msg: &CanMessage) -> bool {
    msg.byte(2) & 0x03 == 1
}

/// Cruise status payload builder.
pub fn encode_cruise_status(engaged: bool, counter: u8) -> [u8; 8] {
    let mut data = [0u8; 8];
    data[1] = counter & 0x0F;
    data[2] = if engaged { 1 } else { 0 };
    data
}

/// Raw driver accelerator value, byte 6. Nonzero means pressed.
pub fn pedal_raw(msg: &CanMessage) -> u8 {
    msg.byte(6)
}

/// Brake pedal switch, bit 35 of the pedal message.
pub fn brake_switch_bit(msg: &CanMessage) -> bool {
    msg.bit(35)
}

/// Pedal message payload builder.
pub fn encode_pedal(raw: u8, brake_switch: bool, counter: u8) -> [u8; 8] {
    let mut data = [0u8; 8];
    data[1] = counter & 0x0F;
    if brake_switch {
        data[4] = 1 << 3;
    }
    data[6] = raw;
    data
}

/// Decode one validated vehicle-bus message into shared state and run the
/// engagement machine.
pub(crate) fn rx(gw: &mut SafetyGateway, m: &CanMessage) {
    match m.address() {
        msg::WHEEL_SPEEDS => {
            gw.vehicle.vehicle_moving = wheel_speed_sum(m) > 0;
        }
        msg::DRIVER_STEER => {
            gw.vehicle.update_driver_torque(signals::driver_torque(m));
        }
        msg::CRUISE_STATE => {
            let transition = gw.engagement.update_stock_cruise(cruise_engaged(m));
            gw.note_engagement(transition);
        }
        msg::CRUISE_BUTTONS => {
            // No alternate longitudinal path on this generation; buttons
            // only matter for the unconditional cancel edge.
            let transition = gw.engagement.update_buttons(
                signals::button_set(m),
                signals::button_resume(m),
                signals::button_cancel(m),
                false,
                false,
            );
            gw.note_engagement(transition);
        }
        msg::DRIVER_PEDAL => {
            gw.vehicle.gas_pressed = pedal_raw(m) != 0;
            gw.vehicle.brake_switch = brake_switch_bit(m);
            gw.vehicle.refresh_brake_pressed();
        }
        msg::BRAKE_STATE => {
            gw.vehicle.brake_pressure = signals::brake_pressure_bit(m);
            gw.vehicle.refresh_brake_pressed();
        }
        msg::STEER_CMD => {
            if !gw.vehicle.stock_actuator_detected {
                gw.vehicle.stock_actuator_detected = true;
                gw.events
                    .record(SafetyEvent::StockActuatorDetected { address: m.address() });
            }
        }
        _ => {}
    }
}

/// Transmit firewall for this generation.
pub(crate) fn tx(gw: &mut SafetyGateway, m: &CanMessage, now_us: u64) -> Result<(), TxDenial> {
    if !crate::platform::tx_allowed(m, gw.tx_allowlist) {
        return Err(TxDenial::NotAllowlisted);
    }

    match m.address() {
        msg::STEER_CMD => {
            let desired = signals::steer_cmd_torque(m);
            let driver = gw.vehicle.driver_torque();
            let engaged = gw.engagement.engaged();
            check_steer_cmd(
                desired,
                driver,
                engaged,
                &mut gw.torque,
                &STEERING_LIMITS,
                now_us,
            )
            .map_err(TxDenial::Steer)?;
        }
        msg::CRUISE_BUTTONS => {
            if !gw.engagement.engaged() && (signals::button_set(m) || signals::button_resume(m)) {
                return Err(TxDenial::ButtonsWhileDisengaged);
            }
        }
        _ => {}
    }
    Ok(())
}
