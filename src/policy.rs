use std::fmt;

use crate::crc::Crc8Table;
use crate::engagement::{Engagement, EngagementTracker, EngagementTrigger};
use crate::events::{EventLog, SafetyEvent};
use crate::freshness::FreshnessTracker;
use crate::limits::{AccelViolation, SteerViolation, TorqueTracker};
use crate::platform::{gen1, gen2, Platform, TxMessage};
use crate::router::BusRouter;
use crate::state::VehicleState;
use crate::types::{CanMessage, BUS_VEHICLE};

/// Init-time feature flag word.
///
/// Interpreted only when the `unlocked` feature is compiled in; production
/// builds ignore it and keep safe defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayParam(u16);

impl GatewayParam {
    /// Bit 0: hand longitudinal control to the gateway.
    pub const ALTERNATE_LONGITUDINAL: u16 = 1 << 0;

    pub fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn none() -> Self {
        Self(0)
    }

    pub fn alternate_longitudinal(self) -> bool {
        self.0 & Self::ALTERNATE_LONGITUDINAL != 0
    }
}

/// Why an outbound message was kept off the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDenial {
    /// Address/bus/length triple is not in the platform's transmit set.
    NotAllowlisted,
    Steer(SteerViolation),
    Accel(AccelViolation),
    /// The auxiliary acceleration channel carried something other than its
    /// inactive sentinel.
    AuxChannelActive { value: i32 },
    /// Set/Resume emulation attempted while controls are disengaged.
    ButtonsWhileDisengaged,
}

impl fmt::Display for TxDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxDenial::NotAllowlisted => write!(f, "address not in platform transmit set"),
            TxDenial::Steer(violation) => write!(f, "{}", violation),
            TxDenial::Accel(violation) => write!(f, "{}", violation),
            TxDenial::AuxChannelActive { value } => {
                write!(f, "auxiliary acceleration channel active ({})", value)
            }
            TxDenial::ButtonsWhileDisengaged => {
                write!(f, "set/resume emulation while controls disengaged")
            }
        }
    }
}

/// The safety-validation firewall for one vehicle platform.
///
/// Owns every piece of mutable safety state, so the single-writer rule is a
/// borrow-checker fact: hooks take `&mut self` and run to completion. Time
/// is injected as a microsecond timestamp; the core never reads a clock.
#[derive(Debug)]
pub struct SafetyGateway {
    platform: Platform,
    pub(crate) longitudinal: bool,
    pub(crate) crc: Crc8Table,
    pub(crate) tracker: FreshnessTracker,
    pub(crate) vehicle: VehicleState,
    pub(crate) engagement: EngagementTracker,
    pub(crate) torque: TorqueTracker,
    pub(crate) tx_allowlist: &'static [TxMessage],
    router: BusRouter,
    pub(crate) events: EventLog,
}

impl SafetyGateway {
    /// Init hook: select the platform policy, apply the feature flag word
    /// and reset all runtime state.
    pub fn new(platform: Platform, param: GatewayParam) -> Self {
        Self::with_events(platform, param, EventLog::new())
    }

    /// Same, echoing safety events to the console as they happen.
    pub fn with_verbose_events(platform: Platform, param: GatewayParam) -> Self {
        Self::with_events(platform, param, EventLog::verbose())
    }

    fn with_events(platform: Platform, param: GatewayParam, events: EventLog) -> Self {
        let longitudinal = cfg!(feature = "unlocked")
            && platform == Platform::Gen2
            && param.alternate_longitudinal();

        let (policies, tx_allowlist, intercepted) = match platform {
            Platform::Gen1 => (gen1::rx_policies(), gen1::TX_MESSAGES, gen1::intercepted()),
            Platform::Gen2 => (
                gen2::rx_policies(),
                if longitudinal {
                    gen2::LONG_TX_MESSAGES
                } else {
                    gen2::STOCK_TX_MESSAGES
                },
                gen2::intercepted(longitudinal),
            ),
        };

        Self {
            platform,
            longitudinal,
            crc: Crc8Table::new(),
            tracker: FreshnessTracker::new(&policies),
            vehicle: VehicleState::new(),
            engagement: EngagementTracker::new(),
            torque: TorqueTracker::new(),
            tx_allowlist,
            router: BusRouter::new(intercepted),
            events,
        }
    }

    /// Receive hook: authenticity/freshness first, then state aggregation
    /// and engagement transitions for vehicle-bus traffic. Returns whether
    /// the message passed validation.
    pub fn on_receive(&mut self, msg: &CanMessage, now_us: u64) -> bool {
        if let Err(error) = self.tracker.check(msg, &self.crc, now_us) {
            self.events.record(SafetyEvent::RxRejected {
                bus: msg.bus(),
                address: msg.address(),
                reason: error.to_string(),
            });
            return false;
        }

        if msg.bus() == BUS_VEHICLE {
            match self.platform {
                Platform::Gen1 => gen1::rx(self, msg),
                Platform::Gen2 => gen2::rx(self, msg),
            }
        }
        true
    }

    /// Transmit hook: returns whether the outbound message may be released
    /// to the bus controller. Side effects are limited to limit-checker
    /// checkpoints and the event log.
    pub fn on_transmit(&mut self, msg: &CanMessage, now_us: u64) -> bool {
        let verdict = match self.platform {
            Platform::Gen1 => gen1::tx(self, msg, now_us),
            Platform::Gen2 => gen2::tx(self, msg, now_us),
        };
        match verdict {
            Ok(()) => true,
            Err(denial) => {
                self.events.record(SafetyEvent::TxDenied {
                    address: msg.address(),
                    reason: denial.to_string(),
                });
                false
            }
        }
    }

    /// Forwarding hook: destination bus for a message received on `bus`, or
    /// `None` to drop it.
    pub fn forward(&self, bus: u8, msg: &CanMessage) -> Option<u8> {
        self.router.route(bus, msg.address())
    }

    /// Generic cross-platform disengage, raised by the outer gateway.
    pub fn release_controls(&mut self) {
        let transition = self.engagement.release();
        self.note_engagement(transition);
    }

    pub(crate) fn note_engagement(&mut self, transition: Option<EngagementTrigger>) {
        if let Some(trigger) = transition {
            let engaged = self.engagement.engaged();
            self.events
                .record(SafetyEvent::EngagementChanged { engaged, trigger });
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether the alternate longitudinal path was actually enabled.
    pub fn alternate_longitudinal(&self) -> bool {
        self.longitudinal
    }

    pub fn controls_allowed(&self) -> bool {
        self.engagement.engaged()
    }

    pub fn engagement(&self) -> Engagement {
        self.engagement.state()
    }

    pub fn vehicle_state(&self) -> &VehicleState {
        &self.vehicle
    }

    /// Last accepted counter for a protected address, for observability and
    /// tests.
    pub fn rx_last_counter(&self, address: u32) -> Option<u8> {
        self.tracker.last_counter(address)
    }

    /// True once every protected address has produced at least one valid
    /// message since init.
    pub fn all_rx_addresses_seen(&self) -> bool {
        self.tracker.all_addresses_seen()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }
}
