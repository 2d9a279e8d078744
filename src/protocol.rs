//! Fixed-layout CCSDS-style telemetry packet.
//!
//! ```text
//! ┌──────────────────────┬─────────────────────────┬──────────────────────────┐
//! │ Primary header (6B)  │ Secondary header (10B)  │ Payload (16B)            │
//! │ id | seq ctl | len   │ timestamp | subsystem   │ temp | batt | alt | sig  │
//! └──────────────────────┴─────────────────────────┴──────────────────────────┘
//! ```
//!
//! Every multi-byte field is big-endian, floats are IEEE-754 `f32`.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use thiserror::Error;

pub const PRIMARY_HEADER_SIZE: usize = 6;
pub const SECONDARY_HEADER_SIZE: usize = 10;
pub const PAYLOAD_SIZE: usize = 16;
pub const PACKET_SIZE: usize = PRIMARY_HEADER_SIZE + SECONDARY_HEADER_SIZE + PAYLOAD_SIZE;

/// CCSDS convention: octets following the primary header, minus one.
pub const PACKET_DATA_LENGTH: u16 = (SECONDARY_HEADER_SIZE + PAYLOAD_SIZE - 1) as u16;

const_assert_eq!(PACKET_SIZE, 32);
const_assert_eq!(PACKET_DATA_LENGTH, 25);

// Constants for this sender
pub const PACKET_VERSION: u8 = 0;
pub const PACKET_TYPE_TELEMETRY: u8 = 0;
pub const SECONDARY_HEADER_PRESENT: u8 = 1;
pub const APID: u16 = 0x01;
pub const SEQUENCE_FLAGS_UNSEGMENTED: u8 = 0b11;
pub const SUBSYSTEM_ID: u16 = 0x0001;

/// Sequence counts wrap at 2^14.
pub const SEQUENCE_COUNT_MODULUS: u32 = 1 << 14;

const VERSION_SHIFT: u16 = 13;
const VERSION_MASK: u16 = 0x7;
const TYPE_SHIFT: u16 = 12;
const SECONDARY_FLAG_SHIFT: u16 = 11;
const ONE_BIT_MASK: u16 = 0x1;
const APID_MASK: u16 = 0x07FF;
const SEQUENCE_FLAGS_SHIFT: u16 = 14;
const SEQUENCE_FLAGS_MASK: u16 = 0x3;
const SEQUENCE_COUNT_MASK: u16 = 0x3FFF;

/// Packs `Version(3) | Type(1) | SecondaryHeaderFlag(1) | APID(11)`.
pub fn pack_packet_id(version: u8, packet_type: u8, secondary_header: u8, apid: u16) -> u16 {
    ((u16::from(version) & VERSION_MASK) << VERSION_SHIFT)
        | ((u16::from(packet_type) & ONE_BIT_MASK) << TYPE_SHIFT)
        | ((u16::from(secondary_header) & ONE_BIT_MASK) << SECONDARY_FLAG_SHIFT)
        | (apid & APID_MASK)
}

/// Packs `SequenceFlags(2) | SequenceCount(14)`. The count is taken modulo 2^14.
pub fn pack_sequence_control(flags: u8, count: u16) -> u16 {
    ((u16::from(flags) & SEQUENCE_FLAGS_MASK) << SEQUENCE_FLAGS_SHIFT) | (count & SEQUENCE_COUNT_MASK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryHeader {
    pub packet_id: u16,
    pub sequence_control: u16,
    pub data_length: u16,
}

impl PrimaryHeader {
    pub fn new(sequence_count: u16) -> Self {
        Self {
            packet_id: pack_packet_id(
                PACKET_VERSION,
                PACKET_TYPE_TELEMETRY,
                SECONDARY_HEADER_PRESENT,
                APID,
            ),
            sequence_control: pack_sequence_control(SEQUENCE_FLAGS_UNSEGMENTED, sequence_count),
            data_length: PACKET_DATA_LENGTH,
        }
    }

    pub fn version(&self) -> u8 {
        ((self.packet_id >> VERSION_SHIFT) & VERSION_MASK) as u8
    }

    pub fn packet_type(&self) -> u8 {
        ((self.packet_id >> TYPE_SHIFT) & ONE_BIT_MASK) as u8
    }

    pub fn has_secondary_header(&self) -> bool {
        (self.packet_id >> SECONDARY_FLAG_SHIFT) & ONE_BIT_MASK == 1
    }

    pub fn apid(&self) -> u16 {
        self.packet_id & APID_MASK
    }

    pub fn sequence_flags(&self) -> u8 {
        ((self.sequence_control >> SEQUENCE_FLAGS_SHIFT) & SEQUENCE_FLAGS_MASK) as u8
    }

    pub fn sequence_count(&self) -> u16 {
        self.sequence_control & SEQUENCE_COUNT_MASK
    }

    pub fn to_bytes(&self) -> [u8; PRIMARY_HEADER_SIZE] {
        let mut out = [0u8; PRIMARY_HEADER_SIZE];
        out[0..2].copy_from_slice(&self.packet_id.to_be_bytes());
        out[2..4].copy_from_slice(&self.sequence_control.to_be_bytes());
        out[4..6].copy_from_slice(&self.data_length.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; PRIMARY_HEADER_SIZE]) -> Self {
        Self {
            packet_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            sequence_control: u16::from_be_bytes([bytes[2], bytes[3]]),
            data_length: u16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryHeader {
    /// Unix seconds.
    pub timestamp: u64,
    pub subsystem_id: u16,
}

impl SecondaryHeader {
    pub fn to_bytes(&self) -> [u8; SECONDARY_HEADER_SIZE] {
        let mut out = [0u8; SECONDARY_HEADER_SIZE];
        out[0..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out[8..10].copy_from_slice(&self.subsystem_id.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; SECONDARY_HEADER_SIZE]) -> Self {
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[0..8]);
        Self {
            timestamp: u64::from_be_bytes(timestamp),
            subsystem_id: u16::from_be_bytes([bytes[8], bytes[9]]),
        }
    }
}

/// One telemetry reading. Field order is the wire order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub temperature: f32, // °C
    pub battery: f32,     // %
    pub altitude: f32,    // km
    pub signal: f32,      // dB
}

impl Payload {
    pub fn to_bytes(&self) -> [u8; PAYLOAD_SIZE] {
        let mut out = [0u8; PAYLOAD_SIZE];
        let fields = [self.temperature, self.battery, self.altitude, self.signal];
        for (chunk, value) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&value.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8; PAYLOAD_SIZE]) -> Self {
        let field = |offset: usize| {
            f32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        Self {
            temperature: field(0),
            battery: field(4),
            altitude: field(8),
            signal: field(12),
        }
    }
}

/// A decoded datagram. Header fields are kept verbatim so they can be stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodedReading {
    pub primary: PrimaryHeader,
    pub secondary: SecondaryHeader,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Section {
    PrimaryHeader,
    SecondaryHeader,
    Payload,
}

impl core::fmt::Display for Section {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Section::PrimaryHeader => write!(f, "primary header"),
            Section::SecondaryHeader => write!(f, "secondary header"),
            Section::Payload => write!(f, "payload"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("packet too short: {len} bytes, expected {expected}")]
    TooShort { len: usize, expected: usize },
    #[error("truncated {section} section")]
    TruncatedField { section: Section },
}

/// Encodes one 32-byte packet. `sequence_count` is reduced modulo 2^14.
pub fn encode(
    sequence_count: u16,
    subsystem_id: u16,
    timestamp: u64,
    payload: &Payload,
) -> [u8; PACKET_SIZE] {
    let primary = PrimaryHeader::new(sequence_count);
    let secondary = SecondaryHeader {
        timestamp,
        subsystem_id,
    };

    let mut packet = [0u8; PACKET_SIZE];
    let (head, rest) = packet.split_at_mut(PRIMARY_HEADER_SIZE);
    let (secondary_bytes, payload_bytes) = rest.split_at_mut(SECONDARY_HEADER_SIZE);
    head.copy_from_slice(&primary.to_bytes());
    secondary_bytes.copy_from_slice(&secondary.to_bytes());
    payload_bytes.copy_from_slice(&payload.to_bytes());
    packet
}

/// Decodes a datagram. Anything shorter than [`PACKET_SIZE`] is rejected;
/// bytes past the payload are ignored.
pub fn decode(bytes: &[u8]) -> Result<DecodedReading, DecodeError> {
    if bytes.len() < PACKET_SIZE {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            expected: PACKET_SIZE,
        });
    }

    let mut reader = SectionReader::new(bytes);
    let primary = PrimaryHeader::from_bytes(reader.take(Section::PrimaryHeader)?);
    let secondary = SecondaryHeader::from_bytes(reader.take(Section::SecondaryHeader)?);
    let payload = Payload::from_bytes(reader.take(Section::Payload)?);

    Ok(DecodedReading {
        primary,
        secondary,
        payload,
    })
}

struct SectionReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SectionReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take<const N: usize>(&mut self, section: Section) -> Result<&'a [u8; N], DecodeError> {
        let end = self.position + N;
        let field = self
            .bytes
            .get(self.position..end)
            .and_then(|slice| <&[u8; N]>::try_from(slice).ok())
            .ok_or(DecodeError::TruncatedField { section })?;
        self.position = end;
        Ok(field)
    }
}

/// Per-sender 14-bit sequence counter.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(count: u16) -> Self {
        Self {
            next: count & SEQUENCE_COUNT_MASK,
        }
    }

    /// Returns the count for this packet and moves to the next one.
    pub fn advance(&mut self) -> u16 {
        let current = self.next;
        self.next = (self.next + 1) & SEQUENCE_COUNT_MASK;
        current
    }

    pub fn peek(&self) -> u16 {
        self.next
    }
}
