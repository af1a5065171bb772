use serde::Serialize;

/// Weight (out of [`DRIVER_TORQUE_EMA_DENOM`]) given to the newest driver
/// torque sample.
const DRIVER_TORQUE_EMA_NUM: i32 = 3;
const DRIVER_TORQUE_EMA_DENOM: i32 = 4;

/// Vehicle state shared between the receive hooks, the limit checkers and
/// the engagement machine.
///
/// Zeroed at policy init; mutated only inside hook execution; never
/// persisted across power cycles. Single-writer discipline is enforced by
/// the gateway owning this exclusively.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VehicleState {
    /// Any wheel reporting nonzero speed.
    pub vehicle_moving: bool,
    pub gas_pressed: bool,
    /// OR of the redundant brake channels below.
    pub brake_pressed: bool,
    /// Cruise main switch on (standby or engaged).
    pub acc_main_on: bool,
    /// Pedal-switch brake channel.
    pub brake_switch: bool,
    /// Pressure-threshold brake channel.
    pub brake_pressure: bool,
    /// Steering command address seen on the vehicle bus: the stock actuator
    /// path is still live. Latched until re-init.
    pub stock_actuator_detected: bool,
    driver_torque: i32,
}

impl VehicleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one measured driver torque sample into the exponential filter,
    /// weighted toward the newest sample.
    pub fn update_driver_torque(&mut self, sample: i32) {
        self.driver_torque = (DRIVER_TORQUE_EMA_NUM * sample
            + (DRIVER_TORQUE_EMA_DENOM - DRIVER_TORQUE_EMA_NUM) * self.driver_torque)
            / DRIVER_TORQUE_EMA_DENOM;
    }

    /// Current filtered driver torque sample.
    pub fn driver_torque(&self) -> i32 {
        self.driver_torque
    }

    /// Combine the redundant brake channels.
    pub fn refresh_brake_pressed(&mut self) {
        self.brake_pressed = self.brake_switch || self.brake_pressure;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
