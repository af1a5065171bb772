use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::engagement::EngagementTrigger;

/// Hard cap on retained entries so the hot path never reallocates. Counters
/// keep counting after the cap is reached.
const MAX_ENTRIES: usize = 1024;

/// Safety-relevant conditions surfaced to the outer gateway.
///
/// Purely observational: recording an event never changes a hook result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum SafetyEvent {
    /// A message on a registered address failed authenticity or freshness.
    RxRejected {
        bus: u8,
        address: u32,
        reason: String,
    },
    /// An outbound command was kept off the bus.
    TxDenied { address: u32, reason: String },
    /// The engagement machine changed state.
    EngagementChanged {
        engaged: bool,
        trigger: EngagementTrigger,
    },
    /// The stock actuator path was observed alive on the vehicle bus.
    StockActuatorDetected { address: u32 },
}

/// One recorded event with its wall-clock timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub event: SafetyEvent,
}

/// Bounded in-memory event log with per-class counters.
#[derive(Debug)]
pub struct EventLog {
    entries: Vec<EventRecord>,
    verbose: bool,
    rx_rejected: u64,
    tx_denied: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_ENTRIES),
            verbose: false,
            rx_rejected: 0,
            tx_denied: 0,
        }
    }

    /// Echo each event to the console as it is recorded.
    pub fn verbose() -> Self {
        let mut log = Self::new();
        log.verbose = true;
        log
    }

    pub fn record(&mut self, event: SafetyEvent) {
        match &event {
            SafetyEvent::RxRejected { .. } => self.rx_rejected += 1,
            SafetyEvent::TxDenied { .. } => self.tx_denied += 1,
            _ => {}
        }

        if self.verbose {
            match &event {
                SafetyEvent::RxRejected {
                    bus,
                    address,
                    reason,
                } => println!(
                    "{} bus {} addr {:#05X}: {}",
                    "RX REJECTED".red().bold(),
                    bus,
                    address,
                    reason
                ),
                SafetyEvent::TxDenied { address, reason } => println!(
                    "{} addr {:#05X}: {}",
                    "TX DENIED".red().bold(),
                    address,
                    reason
                ),
                SafetyEvent::EngagementChanged { engaged, trigger } => {
                    let label = if *engaged {
                        "ENGAGED".green().bold()
                    } else {
                        "DISENGAGED".yellow().bold()
                    };
                    println!("{} ({:?})", label, trigger)
                }
                SafetyEvent::StockActuatorDetected { address } => println!(
                    "{} addr {:#05X} live on vehicle bus",
                    "STOCK ACTUATOR".red().bold(),
                    address
                ),
            }
        }

        if self.entries.len() < MAX_ENTRIES {
            self.entries.push(EventRecord {
                timestamp: Utc::now(),
                event,
            });
        }
    }

    pub fn entries(&self) -> &[EventRecord] {
        &self.entries
    }

    pub fn rx_rejected_count(&self) -> u64 {
        self.rx_rejected
    }

    pub fn tx_denied_count(&self) -> u64 {
        self.tx_denied
    }

    /// Serialize the retained entries for export.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.rx_rejected = 0;
        self.tx_denied = 0;
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
