use std::fmt;

/// How the steering rate envelope treats measured driver input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorqueLimitMode {
    /// Rate caps open in the direction the driver is actively pushing.
    DriverLimited,
    /// Pure rate limiting, driver input ignored.
    RateLimited,
}

/// Steering torque envelope for one platform. All torques are in the wire
/// unit (0.01 Nm); intervals are microseconds.
#[derive(Debug, Clone, Copy)]
pub struct SteeringLimits {
    pub max_steer: i32,
    pub max_rate_up: i32,
    pub max_rate_down: i32,
    pub max_rt_delta: i32,
    pub max_rt_interval_us: u64,
    pub driver_torque_allowance: i32,
    pub driver_torque_factor: i32,
    pub mode: TorqueLimitMode,
}

/// Longitudinal acceleration envelope, pre-scaled m/s² x 1000. The inactive
/// sentinel sits one wire increment above the legal range so it can never be
/// confused with a real request.
#[derive(Debug, Clone, Copy)]
pub struct LongitudinalLimits {
    pub max_accel: i32,
    pub min_accel: i32,
    pub inactive_accel: i32,
}

/// Why a steering command was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerViolation {
    AbsoluteLimit { desired: i32, max: i32 },
    RateLimit { desired: i32, lowest: i32, highest: i32 },
    RealTimeDrift { desired: i32, reference: i32, max_delta: i32 },
    NonZeroWhileDisengaged { desired: i32 },
}

impl fmt::Display for SteerViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SteerViolation::AbsoluteLimit { desired, max } => {
                write!(f, "torque {} exceeds absolute limit {}", desired, max)
            }
            SteerViolation::RateLimit {
                desired,
                lowest,
                highest,
            } => write!(
                f,
                "torque {} outside rate envelope [{}, {}]",
                desired, lowest, highest
            ),
            SteerViolation::RealTimeDrift {
                desired,
                reference,
                max_delta,
            } => write!(
                f,
                "torque {} drifted more than {} from checkpoint {}",
                desired, max_delta, reference
            ),
            SteerViolation::NonZeroWhileDisengaged { desired } => {
                write!(f, "torque {} commanded while controls disengaged", desired)
            }
        }
    }
}

/// Why an acceleration command was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelViolation {
    OutOfRange { desired: i32, min: i32, max: i32 },
}

impl fmt::Display for AccelViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccelViolation::OutOfRange { desired, min, max } => write!(
                f,
                "acceleration {} outside [{}, {}] and not the inactive value",
                desired, min, max
            ),
        }
    }
}

/// Rate/drift checkpoints for the steering command stream.
///
/// Checkpoints advance only on accepted commands; a rejected command leaves
/// every field untouched so the compute module must retry from the last
/// accepted value. The real-time reference re-anchors at most once per
/// `max_rt_interval_us`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TorqueTracker {
    last_commanded: i32,
    rt_reference: i32,
    rt_reference_ts_us: u64,
}

impl TorqueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_commanded(&self) -> i32 {
        self.last_commanded
    }

    pub fn reset(&mut self, now_us: u64) {
        self.last_commanded = 0;
        self.rt_reference = 0;
        self.rt_reference_ts_us = now_us;
    }
}

/// Validate one desired steering torque against the platform envelope.
///
/// `driver_torque` is the filtered driver input sample; `engaged` is the
/// current controls-allowed state.
pub fn check_steer_cmd(
    desired: i32,
    driver_torque: i32,
    engaged: bool,
    tracker: &mut TorqueTracker,
    limits: &SteeringLimits,
    now_us: u64,
) -> Result<(), SteerViolation> {
    if !engaged {
        if desired != 0 {
            return Err(SteerViolation::NonZeroWhileDisengaged { desired });
        }
        // Zero while disengaged is fine and re-arms the ramp from zero.
        tracker.reset(now_us);
        return Ok(());
    }

    if desired.abs() > limits.max_steer {
        return Err(SteerViolation::AbsoluteLimit {
            desired,
            max: limits.max_steer,
        });
    }

    // Per-cycle rate envelope around the last accepted command. Motion
    // toward larger magnitude is capped at max_rate_up, motion toward zero
    // or across it at max_rate_down.
    let last = tracker.last_commanded;
    let mut highest = last
        + if last >= 0 {
            limits.max_rate_up
        } else {
            limits.max_rate_down
        };
    let mut lowest = last
        - if last <= 0 {
            limits.max_rate_up
        } else {
            limits.max_rate_down
        };

    if limits.mode == TorqueLimitMode::DriverLimited {
        // A driver pushing harder than the allowance opens the envelope in
        // that direction, scaled by the platform factor. The absolute limit
        // above still binds.
        if driver_torque > limits.driver_torque_allowance {
            let relief = limits.driver_torque_factor * (driver_torque - limits.driver_torque_allowance);
            highest = (highest + relief).min(limits.max_steer);
        } else if driver_torque < -limits.driver_torque_allowance {
            let relief = limits.driver_torque_factor * (-driver_torque - limits.driver_torque_allowance);
            lowest = (lowest - relief).max(-limits.max_steer);
        }
    }

    if desired > highest || desired < lowest {
        return Err(SteerViolation::RateLimit {
            desired,
            lowest,
            highest,
        });
    }

    // Real-time drift bound: many individually-legal steps must not sum to
    // a large swing inside one checkpoint window.
    if (desired - tracker.rt_reference).abs() > limits.max_rt_delta {
        return Err(SteerViolation::RealTimeDrift {
            desired,
            reference: tracker.rt_reference,
            max_delta: limits.max_rt_delta,
        });
    }

    tracker.last_commanded = desired;
    if now_us.saturating_sub(tracker.rt_reference_ts_us) >= limits.max_rt_interval_us {
        tracker.rt_reference = desired;
        tracker.rt_reference_ts_us = now_us;
    }
    Ok(())
}

/// Validate one desired acceleration against the platform envelope.
///
/// The closed interval [min_accel, max_accel] and the single inactive
/// sentinel are legal; everything else is denied.
pub fn check_accel_cmd(desired: i32, limits: &LongitudinalLimits) -> Result<(), AccelViolation> {
    let in_range = desired >= limits.min_accel && desired <= limits.max_accel;
    if in_range || desired == limits.inactive_accel {
        Ok(())
    } else {
        Err(AccelViolation::OutOfRange {
            desired,
            min: limits.min_accel,
            max: limits.max_accel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: SteeringLimits = SteeringLimits {
        max_steer: 300,
        max_rate_up: 4,
        max_rate_down: 10,
        max_rt_delta: 75,
        max_rt_interval_us: 250_000,
        driver_torque_allowance: 80,
        driver_torque_factor: 3,
        mode: TorqueLimitMode::DriverLimited,
    };

    const LONG_LIMITS: LongitudinalLimits = LongitudinalLimits {
        max_accel: 2000,
        min_accel: -3500,
        inactive_accel: 3010,
    };

    fn steer(
        desired: i32,
        driver: i32,
        tracker: &mut TorqueTracker,
        now_us: u64,
    ) -> Result<(), SteerViolation> {
        check_steer_cmd(desired, driver, true, tracker, &LIMITS, now_us)
    }

    /// Walk a tracker up to `target` with legal steps.
    fn ramp_to(target: i32, tracker: &mut TorqueTracker, now_us: &mut u64) {
        while tracker.last_commanded() != target {
            let step = (target - tracker.last_commanded()).clamp(-10, 4);
            *now_us += 20_000;
            steer(tracker.last_commanded() + step, 0, tracker, *now_us)
                .expect("ramp step should be legal");
        }
    }

    #[test]
    fn absolute_bound_rejected_for_any_driver_torque() {
        for driver in [-4000, -80, 0, 80, 4000] {
            let mut tracker = TorqueTracker::new();
            assert!(matches!(
                steer(301, driver, &mut tracker, 0),
                Err(SteerViolation::AbsoluteLimit { .. })
            ));
            let mut tracker = TorqueTracker::new();
            assert!(matches!(
                steer(-301, driver, &mut tracker, 0),
                Err(SteerViolation::AbsoluteLimit { .. })
            ));
        }
    }

    #[test]
    fn rate_up_enforced_from_zero() {
        let mut tracker = TorqueTracker::new();
        assert!(steer(4, 0, &mut tracker, 0).is_ok());
        assert!(matches!(
            steer(9, 0, &mut tracker, 10_000),
            Err(SteerViolation::RateLimit { .. })
        ));
        assert!(steer(8, 0, &mut tracker, 10_000).is_ok());
    }

    #[test]
    fn rate_down_enforced_mid_range() {
        let mut tracker = TorqueTracker::new();
        let mut now = 0;
        ramp_to(60, &mut tracker, &mut now);

        now += 10_000;
        assert!(matches!(
            steer(49, 0, &mut tracker, now),
            Err(SteerViolation::RateLimit { .. })
        ));
        assert!(steer(50, 0, &mut tracker, now).is_ok());
    }

    #[test]
    fn rejected_command_holds_checkpoints() {
        let mut tracker = TorqueTracker::new();
        assert!(steer(4, 0, &mut tracker, 0).is_ok());
        assert!(steer(200, 0, &mut tracker, 10_000).is_err());
        assert_eq!(tracker.last_commanded(), 4);
        assert!(steer(8, 0, &mut tracker, 20_000).is_ok());
    }

    #[test]
    fn real_time_drift_denied_despite_legal_steps() {
        let mut tracker = TorqueTracker::new();
        let mut now = 10_000;
        let mut torque = 0;
        // +4 per cycle is always rate-legal, but 20 cycles inside one
        // 250ms window sum to 80 > 75.
        let mut hit_drift = false;
        for _ in 0..20 {
            torque += 4;
            now += 10_000;
            match steer(torque, 0, &mut tracker, now) {
                Ok(()) => {}
                Err(SteerViolation::RealTimeDrift { .. }) => {
                    hit_drift = true;
                    break;
                }
                Err(other) => panic!("unexpected violation {:?}", other),
            }
        }
        assert!(hit_drift, "drift bound never tripped");
        assert!(torque <= 80);
    }

    #[test]
    fn drift_reference_reanchors_after_interval() {
        let mut tracker = TorqueTracker::new();
        let mut now = 0;
        ramp_to(72, &mut tracker, &mut now);
        // The ramp spans several 250ms windows, so the reference has moved
        // with it; another small step stays legal.
        now += 20_000;
        assert!(steer(76, 0, &mut tracker, now).is_ok());
    }

    #[test]
    fn driver_override_opens_envelope_in_push_direction() {
        let mut tracker = TorqueTracker::new();
        // Driver pushing +200: relief = 3 * (200 - 80) = 360, capped at the
        // absolute limit, so a jump straight to 300 is rate-legal. The
        // drift bound still applies, so stay within 75 of the zero anchor.
        assert!(steer(75, 200, &mut tracker, 0).is_ok());
        // Same jump against the driver is still denied.
        let mut tracker = TorqueTracker::new();
        assert!(matches!(
            steer(75, -200, &mut tracker, 0),
            Err(SteerViolation::RateLimit { .. })
        ));
    }

    #[test]
    fn rate_limited_mode_ignores_driver_input() {
        let limits = SteeringLimits {
            mode: TorqueLimitMode::RateLimited,
            ..LIMITS
        };
        let mut tracker = TorqueTracker::new();
        // A hard driver push opens nothing in this mode.
        assert!(matches!(
            check_steer_cmd(75, 200, true, &mut tracker, &limits, 0),
            Err(SteerViolation::RateLimit { .. })
        ));
        assert!(check_steer_cmd(4, 200, true, &mut tracker, &limits, 0).is_ok());
    }

    #[test]
    fn disengaged_commands_must_be_zero() {
        let mut tracker = TorqueTracker::new();
        assert!(matches!(
            check_steer_cmd(1, 0, false, &mut tracker, &LIMITS, 0),
            Err(SteerViolation::NonZeroWhileDisengaged { .. })
        ));
        assert!(check_steer_cmd(0, 0, false, &mut tracker, &LIMITS, 0).is_ok());
    }

    #[test]
    fn accel_interval_is_closed_and_sentinel_exact() {
        assert!(check_accel_cmd(LONG_LIMITS.max_accel, &LONG_LIMITS).is_ok());
        assert!(check_accel_cmd(LONG_LIMITS.min_accel, &LONG_LIMITS).is_ok());
        assert!(check_accel_cmd(0, &LONG_LIMITS).is_ok());
        assert!(check_accel_cmd(LONG_LIMITS.inactive_accel, &LONG_LIMITS).is_ok());

        assert!(check_accel_cmd(LONG_LIMITS.max_accel + 1, &LONG_LIMITS).is_err());
        assert!(check_accel_cmd(LONG_LIMITS.min_accel - 1, &LONG_LIMITS).is_err());
        assert!(check_accel_cmd(LONG_LIMITS.inactive_accel - 1, &LONG_LIMITS).is_err());
        assert!(check_accel_cmd(LONG_LIMITS.inactive_accel + 1, &LONG_LIMITS).is_err());
    }
}
