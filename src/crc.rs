use crate::types::{signals, CanMessage};

/// Integrity scheme applied to a registered address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// Address carries no integrity byte.
    None,
    /// Plain table-driven CRC-8, polynomial 0x2F, init 0xFF, final invert.
    Crc8,
    /// Same table walk, then the running value is perturbed by a 16-entry
    /// salt indexed by the message counter before one final lookup and the
    /// terminal invert. Used by the steering column torque family.
    Crc8CounterSalted,
}

/// Salt applied between the payload fold and the terminal invert of the
/// counter-salted engine, indexed by the 4-bit message counter.
const COUNTER_SALT: [u8; 16] = [0xF5; 16];

/// Table-driven CRC-8 engine, polynomial 0x2F.
///
/// Built once at gateway init and immutable afterwards; both checksum
/// variants walk the same table. The checksum byte itself (byte 0) is
/// excluded from the fold.
#[derive(Debug, Clone)]
pub struct Crc8Table {
    table: [u8; 256],
}

impl Crc8Table {
    pub const POLYNOMIAL: u8 = 0x2F;

    pub fn new() -> Self {
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = i as u8;
            for _ in 0..8 {
                if crc & 0x80 != 0 {
                    crc = (crc << 1) ^ Self::POLYNOMIAL;
                } else {
                    crc <<= 1;
                }
            }
            *entry = crc;
        }
        Self { table }
    }

    fn fold(&self, payload: &[u8]) -> u8 {
        let mut crc = 0xFFu8;
        for &byte in payload {
            crc = self.table[(crc ^ byte) as usize];
        }
        crc
    }

    /// Plain CRC-8 over `payload` (init 0xFF, final invert). Matches the
    /// CRC-8/AUTOSAR reference bit for bit.
    pub fn checksum(&self, payload: &[u8]) -> u8 {
        self.fold(payload) ^ 0xFF
    }

    /// Counter-salted CRC-8 over `payload`.
    pub fn checksum_salted(&self, payload: &[u8], counter: u8) -> u8 {
        let mut crc = self.fold(payload);
        crc ^= COUNTER_SALT[(counter & 0x0F) as usize];
        crc = self.table[crc as usize];
        crc ^ 0xFF
    }

    /// Expected integrity byte for a full message under `kind`. Byte 0 is
    /// skipped; the counter is read from its fixed position.
    pub fn expected(&self, kind: ChecksumKind, msg: &CanMessage) -> Option<u8> {
        let payload = &msg.data()[1.min(msg.len())..];
        match kind {
            ChecksumKind::None => None,
            ChecksumKind::Crc8 => Some(self.checksum(payload)),
            ChecksumKind::Crc8CounterSalted => {
                Some(self.checksum_salted(payload, signals::counter(msg)))
            }
        }
    }

    /// Write the integrity byte for `kind` into byte 0 of a payload buffer.
    /// Used by the demo harness and tests to craft well-formed frames; the
    /// receive path only ever verifies.
    pub fn seal(&self, kind: ChecksumKind, data: &mut [u8]) {
        if data.is_empty() {
            return;
        }
        let counter = data.get(1).copied().unwrap_or(0) & 0x0F;
        data[0] = match kind {
            ChecksumKind::None => data[0],
            ChecksumKind::Crc8 => self.checksum(&data[1..]),
            ChecksumKind::Crc8CounterSalted => self.checksum_salted(&data[1..], counter),
        };
    }
}

impl Default for Crc8Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// Bitwise CRC-8 poly 0x2F, init 0xFF, final invert. Independent of the
    /// table construction under test.
    fn reference_crc8(payload: &[u8]) -> u8 {
        let mut crc = 0xFFu8;
        for &byte in payload {
            crc ^= byte;
            for _ in 0..8 {
                if crc & 0x80 != 0 {
                    crc = (crc << 1) ^ 0x2F;
                } else {
                    crc <<= 1;
                }
            }
        }
        crc ^ 0xFF
    }

    #[test]
    fn matches_autosar_reference_algorithm() {
        let engine = Crc8Table::new();
        let reference = ::crc::Crc::<u8>::new(&::crc::CRC_8_AUTOSAR);
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let len = rng.gen_range(1..=7);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            assert_eq!(
                engine.checksum(&payload),
                reference.checksum(&payload),
                "payload {:02X?}",
                payload
            );
        }
    }

    #[test]
    fn matches_bitwise_reference() {
        let engine = Crc8Table::new();
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let payload: Vec<u8> = (0..7).map(|_| rng.gen()).collect();
            assert_eq!(engine.checksum(&payload), reference_crc8(&payload));
        }
    }

    #[test]
    fn salted_variant_matches_reference_for_all_counters() {
        let engine = Crc8Table::new();
        let payload = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE];

        for counter in 0..16u8 {
            // Reproduce the salted walk with the bitwise fold: undo the
            // final invert, apply salt, one more byte-wide division step.
            let folded = reference_crc8(&payload) ^ 0xFF;
            let mut crc = folded ^ 0xF5;
            for _ in 0..8 {
                if crc & 0x80 != 0 {
                    crc = (crc << 1) ^ 0x2F;
                } else {
                    crc <<= 1;
                }
            }
            let expected = crc ^ 0xFF;
            assert_eq!(
                engine.checksum_salted(&payload, counter),
                expected,
                "counter {}",
                counter
            );
        }
    }

    #[test]
    fn salted_differs_from_plain() {
        let engine = Crc8Table::new();
        let payload = [0x01, 0x02, 0x03];
        assert_ne!(
            engine.checksum(&payload),
            engine.checksum_salted(&payload, 0)
        );
    }

    #[test]
    fn seal_writes_verifiable_byte_zero() {
        use crate::types::CanMessage;

        let engine = Crc8Table::new();
        let mut data = [0x00, 0x07, 0xAA, 0xBB, 0, 0, 0, 0];
        engine.seal(ChecksumKind::Crc8CounterSalted, &mut data);

        let msg = CanMessage::new(0, 0x100, &data).unwrap();
        assert_eq!(
            engine.expected(ChecksumKind::Crc8CounterSalted, &msg),
            Some(data[0])
        );
    }
}
