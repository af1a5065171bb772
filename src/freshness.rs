use std::fmt;

use crate::crc::{ChecksumKind, Crc8Table};
use crate::types::{signals, CanMessage};

/// Static description of one counter/checksum protected address.
///
/// Built by the platform policy at init time and never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct AddressPolicy {
    pub address: u32,
    /// Bus the address is legitimately sourced on.
    pub bus: u8,
    /// Expected payload length.
    pub length: u8,
    pub checksum: ChecksumKind,
    /// Highest counter value before wrap; 0 disables the counter check.
    pub max_counter: u8,
    /// Nominal inter-arrival time in microseconds.
    pub expected_timestep_us: u64,
}

/// Per-address runtime state, advanced only on valid messages.
#[derive(Debug, Clone, Copy, Default)]
struct AddressState {
    last_counter: Option<u8>,
    last_timestamp_us: Option<u64>,
    ever_valid: bool,
}

/// Why a message on a registered address was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessError {
    /// Registered address observed on a bus it is not sourced on.
    WrongBus { expected: u8, received: u8 },
    /// Registered address with an unexpected payload length.
    WrongLength { expected: u8, received: u8 },
    ChecksumMismatch { expected: u8, received: u8 },
    /// Counter did not continue exactly +1 (mod wrap) from the last good
    /// value.
    CounterSkip { expected: u8, received: u8 },
    /// Inter-arrival time far above the expected period; the source is
    /// starved or stuck.
    Stale { elapsed_us: u64, expected_us: u64 },
    /// Inter-arrival time far below the expected period; spoof burst.
    Flooding { elapsed_us: u64, expected_us: u64 },
}

impl fmt::Display for FreshnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshnessError::WrongBus { expected, received } => {
                write!(f, "wrong bus: expected {}, received {}", expected, received)
            }
            FreshnessError::WrongLength { expected, received } => {
                write!(
                    f,
                    "wrong length: expected {}, received {}",
                    expected, received
                )
            }
            FreshnessError::ChecksumMismatch { expected, received } => {
                write!(
                    f,
                    "checksum mismatch: expected {:#04X}, received {:#04X}",
                    expected, received
                )
            }
            FreshnessError::CounterSkip { expected, received } => {
                write!(
                    f,
                    "counter skip: expected {}, received {}",
                    expected, received
                )
            }
            FreshnessError::Stale {
                elapsed_us,
                expected_us,
            } => write!(
                f,
                "stale: {}us since last valid, expected period {}us",
                elapsed_us, expected_us
            ),
            FreshnessError::Flooding {
                elapsed_us,
                expected_us,
            } => write!(
                f,
                "flooding: {}us since last valid, expected period {}us",
                elapsed_us, expected_us
            ),
        }
    }
}

/// Rolling checksum, counter and timestep validator for the registered
/// address set.
///
/// On any failure the runtime state for that address holds at the last
/// known-good values, so a later legitimate message must still satisfy the
/// continuation rule — a single well-formed re-sync message cannot reset the
/// sequence.
#[derive(Debug)]
pub struct FreshnessTracker {
    entries: Vec<(AddressPolicy, AddressState)>,
}

impl FreshnessTracker {
    pub fn new(policies: &[AddressPolicy]) -> Self {
        Self {
            entries: policies
                .iter()
                .map(|p| (*p, AddressState::default()))
                .collect(),
        }
    }

    /// Validate one received message against its registered policy.
    ///
    /// An address with no registered policy is out of scope for this check
    /// and passes: it simply is not checksum/counter protected.
    pub fn check(
        &mut self,
        msg: &CanMessage,
        crc: &Crc8Table,
        now_us: u64,
    ) -> Result<(), FreshnessError> {
        let entry = match self
            .entries
            .iter_mut()
            .find(|(policy, _)| policy.address == msg.address())
        {
            Some(entry) => entry,
            None => return Ok(()),
        };
        let (policy, state) = (&entry.0, &mut entry.1);

        if msg.bus() != policy.bus {
            return Err(FreshnessError::WrongBus {
                expected: policy.bus,
                received: msg.bus(),
            });
        }
        if msg.len() != policy.length as usize {
            return Err(FreshnessError::WrongLength {
                expected: policy.length,
                received: msg.len() as u8,
            });
        }

        if let Some(expected) = crc.expected(policy.checksum, msg) {
            let received = signals::checksum_byte(msg);
            if expected != received {
                return Err(FreshnessError::ChecksumMismatch { expected, received });
            }
        }

        let counter = signals::counter(msg);
        if policy.max_counter > 0 {
            if let Some(last) = state.last_counter {
                let expected = if last >= policy.max_counter { 0 } else { last + 1 };
                if counter != expected {
                    return Err(FreshnessError::CounterSkip {
                        expected,
                        received: counter,
                    });
                }
            }
        }

        if let Some(last_us) = state.last_timestamp_us {
            let elapsed = now_us.saturating_sub(last_us);
            let expected = policy.expected_timestep_us;
            // Tolerance band: anything past 2.5x the period is starvation,
            // anything under half of it is a burst.
            if elapsed * 2 > expected * 5 {
                return Err(FreshnessError::Stale {
                    elapsed_us: elapsed,
                    expected_us: expected,
                });
            }
            if elapsed * 2 < expected {
                return Err(FreshnessError::Flooding {
                    elapsed_us: elapsed,
                    expected_us: expected,
                });
            }
        }

        state.last_counter = Some(counter);
        state.last_timestamp_us = Some(now_us);
        state.ever_valid = true;
        Ok(())
    }

    /// True once every registered address has produced at least one valid
    /// message since init.
    pub fn all_addresses_seen(&self) -> bool {
        self.entries.iter().all(|(_, state)| state.ever_valid)
    }

    /// Last accepted counter for an address, for observability.
    pub fn last_counter(&self, address: u32) -> Option<u8> {
        self.entries
            .iter()
            .find(|(policy, _)| policy.address == address)
            .and_then(|(_, state)| state.last_counter)
    }

    pub fn reset(&mut self) {
        for (_, state) in &mut self.entries {
            *state = AddressState::default();
        }
    }
}
