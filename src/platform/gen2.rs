//! Full platform generation: lateral control plus optional alternate
//! longitudinal control behind the init-time feature flag.

use crate::crc::ChecksumKind;
use crate::events::SafetyEvent;
use crate::freshness::AddressPolicy;
use crate::limits::{check_accel_cmd, check_steer_cmd, LongitudinalLimits};
use crate::platform::{TxMessage, STEERING_LIMITS};
use crate::policy::{SafetyGateway, TxDenial};
use crate::types::{signals, CanMessage, BUS_CAMERA, BUS_VEHICLE};

/// Arbitration identifiers this generation cares about.
pub mod msg {
    /// RX from the chassis controller: four wheel speeds.
    pub const WHEEL_SPEEDS: u32 = 0x0C4;
    /// RX from the power steering rack: measured driver torque.
    pub const DRIVER_STEER: u32 = 0x0A6;
    /// RX from the brake controller: driver brake pressure state.
    pub const BRAKE_STATE: u32 = 0x11C;
    /// RX from the drivetrain coordinator: cruise status.
    pub const CRUISE_STATE: u32 = 0x13A;
    /// RX from the engine controller: driver accelerator input.
    pub const DRIVER_PEDAL: u32 = 0x158;
    /// RX from the engine controller: brake pedal switch.
    pub const BRAKE_SWITCH: u32 = 0x3D0;
    /// RX (driver buttons) and TX (button emulation): cruise buttons.
    pub const CRUISE_BUTTONS: u32 = 0x16E;
    /// TX: commanded steering torque to the rack.
    pub const STEER_CMD: u32 = 0x1B2;
    /// TX: primary acceleration request to the drivetrain coordinator.
    pub const ACCEL_CMD: u32 = 0x172;
    /// TX: auxiliary acceleration request.
    pub const ACCEL_CMD_AUX: u32 = 0x17E;
    /// TX: cruise HUD data to the instrument cluster.
    pub const CRUISE_HUD: u32 = 0x321;
    /// TX: lane recognition HUD data.
    pub const LANE_HUD: u32 = 0x3A4;
}

/// Longitudinal envelope, m/s² x 1000. The platform signals "no request"
/// with one wire increment above the legal maximum.
pub const LONG_LIMITS: LongitudinalLimits = LongitudinalLimits {
    max_accel: 2000,
    min_accel: -3500,
    inactive_accel: 3010,
};

/// Inactive sentinel of the auxiliary command's secondary channel, which is
/// never actively driven.
pub const AUX_INACTIVE_ACCEL: i32 = 3020;

/// Transmit set when the stock system keeps longitudinal control. Button
/// emulation is allowed toward both the gateway and the camera unit.
pub const STOCK_TX_MESSAGES: &[TxMessage] = &[
    TxMessage { address: msg::STEER_CMD, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::CRUISE_BUTTONS, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::CRUISE_BUTTONS, bus: BUS_CAMERA, length: 8 },
    TxMessage { address: msg::LANE_HUD, bus: BUS_VEHICLE, length: 8 },
];

/// Transmit set under alternate longitudinal control.
pub const LONG_TX_MESSAGES: &[TxMessage] = &[
    TxMessage { address: msg::STEER_CMD, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::LANE_HUD, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::CRUISE_HUD, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::ACCEL_CMD, bus: BUS_VEHICLE, length: 8 },
    TxMessage { address: msg::ACCEL_CMD_AUX, bus: BUS_VEHICLE, length: 8 },
];

/// Counter/checksum protection for the addresses the receive hook consumes.
pub fn rx_policies() -> Vec<AddressPolicy> {
    vec![
        AddressPolicy {
            address: msg::WHEEL_SPEEDS,
            bus: BUS_VEHICLE,
            length: 8,
            checksum: ChecksumKind::None,
            max_counter: 0,
            expected_timestep_us: 10_000,
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
            expected_timestep_us: 20_000,
        },
        AddressPolicy {
            address: msg::BRAKE_SWITCH,
            bus: BUS_VEHICLE,
            length: 8,
            checksum: ChecksumKind::None,
            max_counter: 0,
            expected_timestep_us: 100_000,
        },
    ]
}

/// Camera-bus addresses the gateway takes over and therefore intercepts.
pub fn intercepted(longitudinal: bool) -> Vec<u32> {
    let mut addresses = vec![msg::STEER_CMD, msg::LANE_HUD];
    if longitudinal {
        addresses.extend([msg::ACCEL_CMD, msg::ACCEL_CMD_AUX, msg::CRUISE_HUD]);
    }
    addresses
}

/// Sum of the four wheel speeds: unsigned 16-bit little-endian values in
/// bytes 0/1, 2/3, 4/5 and 6/7.
pub fn wheel_speed_sum(msg: &CanMessage) -> u32 {
    (0..8)
        .step_by(2)
        .map(|i| (msg.byte(i) as u32) | ((msg.byte(i + 1) as u32) << 8))
        .sum()
}

/// Inverse of [`wheel_speed_sum`], for tests and the demo harness.
pub fn encode_wheel_speeds(speeds: [u16; 4]) -> [u8; 8] {
    let mut data = [0u8; 8];
    for (i, speed) in speeds.iter().enumerate() {
        data[2 * i] = (speed & 0xFF) as u8;
        data[2 * i + 1] = (speed >> 8) as u8;
    }
    data
}

/// Drivetrain coordinator cruise status, byte 3 bits 0-2. Values 3, 4 and 5
/// mean engaged, 2 means standby with the main switch on.
pub fn cruise_status(msg: &CanMessage) -> u8 {
    msg.byte(3) & 0x07
}

/// Cruise status payload builder.
pub fn encode_cruise_status(status: u8, counter: u8) -> [u8; 8] {
    let mut data = [0u8; 8];
    data[1] = counter & 0x0F;
    data[3] = status & 0x07;
    data
}

/// Raw driver accelerator value: bits 12-19 of the little-endian word made
/// of bytes 0-3. Nonzero means the pedal is pressed.
pub fn pedal_raw(msg: &CanMessage) -> u8 {
    let word = u32::from_le_bytes([msg.byte(0), msg.byte(1), msg.byte(2), msg.byte(3)]);
    ((word >> 12) & 0xFF) as u8
}

/// Driver accelerator payload builder.
pub fn encode_pedal(raw: u8, counter: u8) -> [u8; 8] {
    let mut data = [0u8; 8];
    data[1] = (counter & 0x0F) | ((raw & 0x0F) << 4);
    data[2] = raw >> 4;
    data
}

/// Brake pedal switch from the dedicated switch message, byte 3 bit 4.
pub fn brake_switch_bit(msg: &CanMessage) -> bool {
    msg.byte(3) & 0x10 != 0
}

/// Brake switch payload builder.
pub fn encode_brake_switch(pressed: bool) -> [u8; 8] {
    let mut data = [0u8; 8];
    if pressed {
        data[3] = 0x10;
    }
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
            let status = cruise_status(m);
            let cruise_engaged = matches!(status, 3 | 4 | 5);
            let main_on = cruise_engaged || status == 2;
            gw.vehicle.acc_main_on = main_on;

            if !gw.longitudinal {
                let transition = gw.engagement.update_stock_cruise(cruise_engaged);
                gw.note_engagement(transition);
            }
            let transition = gw.engagement.update_main_switch(main_on);
            gw.note_engagement(transition);
        }
        msg::CRUISE_BUTTONS => {
            let transition = gw.engagement.update_buttons(
                signals::button_set(m),
                signals::button_resume(m),
                signals::button_cancel(m),
                gw.vehicle.acc_main_on,
                gw.longitudinal,
            );
            gw.note_engagement(transition);
        }
        msg::DRIVER_PEDAL => {
            gw.vehicle.gas_pressed = pedal_raw(m) != 0;
        }
        msg::BRAKE_SWITCH => {
            gw.vehicle.brake_switch = brake_switch_bit(m);
            gw.vehicle.refresh_brake_pressed();
        }
        msg::BRAKE_STATE => {
            gw.vehicle.brake_pressure = signals::brake_pressure_bit(m);
            gw.vehicle.refresh_brake_pressed();
        }
        msg::STEER_CMD => {
            // Our own command address sourced by the vehicle bus: the stock
            // actuator path is still live.
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
        msg::ACCEL_CMD => {
            check_accel_cmd(signals::accel_request(m), &LONG_LIMITS).map_err(TxDenial::Accel)?;
        }
        msg::ACCEL_CMD_AUX => {
            // The secondary channel is never actively driven; anything but
            // its inactive sentinel is a violation.
            let secondary = signals::accel_aux_secondary(m);
            if secondary != AUX_INACTIVE_ACCEL {
                return Err(TxDenial::AuxChannelActive { value: secondary });
            }
            check_accel_cmd(signals::accel_request_aux(m), &LONG_LIMITS)
                .map_err(TxDenial::Accel)?;
        }
        msg::CRUISE_BUTTONS => {
            // Only the cancel press may go out while disengaged; resume
            // spam stays available once engaged.
            if !gw.engagement.engaged() && (signals::button_set(m) || signals::button_resume(m)) {
                return Err(TxDenial::ButtonsWhileDisengaged);
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_speed_sum_round_trips() {
        let data = encode_wheel_speeds([120, 121, 119, 122]);
        let m = CanMessage::new(BUS_VEHICLE, msg::WHEEL_SPEEDS, &data).unwrap();
        assert_eq!(wheel_speed_sum(&m), 482);

        let stopped = CanMessage::new(
            BUS_VEHICLE,
            msg::WHEEL_SPEEDS,
            &encode_wheel_speeds([0; 4]),
        )
        .unwrap();
        assert_eq!(wheel_speed_sum(&stopped), 0);
    }

    #[test]
    fn pedal_raw_round_trips_and_keeps_counter() {
        for raw in [0u8, 1, 0x5A, 0xFF] {
            let data = encode_pedal(raw, 9);
            let m = CanMessage::new(BUS_VEHICLE, msg::DRIVER_PEDAL, &data).unwrap();
            assert_eq!(pedal_raw(&m), raw, "raw {:#04X}", raw);
            assert_eq!(signals::counter(&m), 9);
        }
    }

    #[test]
    fn cruise_status_reads_low_three_bits() {
        let m = CanMessage::new(BUS_VEHICLE, msg::CRUISE_STATE, &encode_cruise_status(5, 0))
            .unwrap();
        assert_eq!(cruise_status(&m), 5);
    }

    #[test]
    fn brake_switch_bit_round_trips() {
        let m = CanMessage::new(BUS_VEHICLE, msg::BRAKE_SWITCH, &encode_brake_switch(true))
            .unwrap();
        assert!(brake_switch_bit(&m));
        let m = CanMessage::new(BUS_VEHICLE, msg::BRAKE_SWITCH, &encode_brake_switch(false))
            .unwrap();
        assert!(!brake_switch_bit(&m));
    }

    #[test]
    fn intercept_set_grows_with_longitudinal() {
        let stock = intercepted(false);
        assert!(stock.contains(&msg::STEER_CMD));
        assert!(!stock.contains(&msg::ACCEL_CMD));

        let long = intercepted(true);
        assert!(long.contains(&msg::ACCEL_CMD));
        assert!(long.contains(&msg::CRUISE_HUD));
    }
}
