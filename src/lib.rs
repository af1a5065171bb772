pub mod bus;
pub mod crc;
pub mod engagement;
pub mod events;
pub mod freshness;
pub mod limits;
pub mod platform;
pub mod policy;
pub mod router;
pub mod state;
pub mod types;

pub use bus::VirtualCanBus;
pub use crc::{ChecksumKind, Crc8Table};
pub use engagement::{Engagement, EngagementTracker, EngagementTrigger};
pub use events::{EventLog, SafetyEvent};
pub use freshness::{AddressPolicy, FreshnessError, FreshnessTracker};
pub use limits::{
    AccelViolation, LongitudinalLimits, SteerViolation, SteeringLimits, TorqueLimitMode,
    TorqueTracker,
};
pub use platform::{Platform, TxMessage};
pub use policy::{GatewayParam, SafetyGateway, TxDenial};
pub use router::BusRouter;
pub use state::VehicleState;
pub use types::{CanMessage, BUS_CAMERA, BUS_VEHICLE};
