//! Wire-format definitions for protocol packets.
//!
//! Every datagram exchanged between peers is a 4-byte header followed by up
//! to [`MAX_PAYLOAD`] payload bytes.  This module is responsible for:
//! - Framing a payload into wire bytes ([`encode`]).
//! - Classifying received bytes as corrupt or intact ([`validate`],
//!   [`is_corrupt`]), without ever indexing past the buffer.
//! - Reading fields back out ([`sequence_of`], [`tag_of`], [`decode`],
//!   [`Packet::parse`]).
//! - Strict checks for a datagram exactly as the channel returned it
//!   ([`validate_datagram`], [`Packet::from_datagram`]).
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Checksum    |   Sequence    |      Tag      |    Length     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! - `Length` is the total framed length (header + payload), at most
//!   [`MAX_PACKET_LEN`].
//! - `Checksum` is the sum of bytes `[1, length)` modulo 127.  It alone
//!   cannot catch a flipped length bit whose dropped bytes sum to a multiple
//!   of 127, so received datagrams must also match their length field.
//! - `Sequence` is a ring value `0..=126` or the sentinel `0xFF`.

use thiserror::Error;

use crate::seq::{self, Seq};

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 4;

/// Largest framed packet (header + payload) the length byte may declare.
pub const MAX_PACKET_LEN: usize = 127;

/// Largest payload that fits in one packet.
pub const MAX_PAYLOAD: usize = MAX_PACKET_LEN - HEADER_LEN;

// Byte offsets of each field within the serialised header.
const OFF_CHECKSUM: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_TAG: usize = 2;
const OFF_LEN: usize = 3;

const CHECKSUM_MODULUS: u32 = 127;

/// Role of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Ordinary application payload.
    Data,
    /// Acknowledgement of a data packet.
    Ack,
}

impl Tag {
    const fn to_byte(self) -> u8 {
        match self {
            Tag::Data => 0,
            Tag::Ack => 1,
        }
    }

    const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Tag::Data),
            1 => Some(Tag::Ack),
            _ => None,
        }
    }
}

/// Errors that can arise when framing or classifying a datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Caller tried to frame more than [`MAX_PAYLOAD`] bytes.
    #[error("payload of {len} bytes exceeds the {max}-byte packet limit")]
    PayloadTooLarge { len: usize, max: usize },
    /// Buffer shorter than the fixed header.
    #[error("buffer of {len} bytes is too short to contain a header")]
    TooShort { len: usize },
    /// Length field is smaller than the header, larger than the packet limit,
    /// or runs past the end of the buffer.
    #[error("length field {declared} is inconsistent with a {actual}-byte buffer")]
    LengthOutOfBounds { declared: usize, actual: usize },
    /// Length field disagrees with the size of a whole datagram.
    #[error("length field {declared} disagrees with a {actual}-byte datagram")]
    LengthMismatch { declared: usize, actual: usize },
    /// Stored checksum disagrees with the recomputed one.
    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: u8, computed: u8 },
    /// Tag byte is neither DATA nor ACK.
    #[error("unknown tag byte {0:#04x}")]
    UnknownTag(u8),
    /// Sequence byte is neither a ring value nor the sentinel.
    #[error("sequence byte {0} is outside the sequence ring")]
    BadSequence(u8),
}

/// Frame `payload` as a packet with the given tag and sequence number.
///
/// `seq = None` writes the sentinel; only ACKs are ever sent that way.
pub fn encode(tag: Tag, seq: Option<Seq>, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(PacketError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let len = HEADER_LEN + payload.len();
    let mut buf = vec![0u8; len];
    buf[OFF_SEQ] = seq::to_wire(seq);
    buf[OFF_TAG] = tag.to_byte();
    // Fits: len <= MAX_PACKET_LEN < 256.
    buf[OFF_LEN] = len as u8;
    buf[HEADER_LEN..].copy_from_slice(payload);
    buf[OFF_CHECKSUM] = checksum(&buf[OFF_SEQ..]);

    Ok(buf)
}

/// Check every header invariant of a received datagram.
///
/// The length field is bounds-checked before anything is sliced, so a
/// mangled length can only ever produce an error.
pub fn validate(buf: &[u8]) -> Result<(), PacketError> {
    declared_len(buf)?;
    let len = usize::from(buf[OFF_LEN]);

    let stored = buf[OFF_CHECKSUM];
    let computed = checksum(&buf[OFF_SEQ..len]);
    if stored != computed {
        return Err(PacketError::ChecksumMismatch { stored, computed });
    }

    if Tag::from_byte(buf[OFF_TAG]).is_none() {
        return Err(PacketError::UnknownTag(buf[OFF_TAG]));
    }
    seq::from_wire(buf[OFF_SEQ]).map_err(PacketError::BadSequence)?;

    Ok(())
}

/// [`validate`] for a whole datagram: `buf` must be exactly as long as its
/// length field says.
///
/// Use this on anything read from a channel.  [`validate`] tolerates
/// trailing padding, which lets a flipped length bit slip through when the
/// bytes it cuts off happen to keep the checksum.
pub fn validate_datagram(buf: &[u8]) -> Result<(), PacketError> {
    let declared = declared_len(buf)?;
    if declared != buf.len() {
        return Err(PacketError::LengthMismatch {
            declared,
            actual: buf.len(),
        });
    }
    validate(buf)
}

/// `true` when `buf` fails any check in [`validate`].
pub fn is_corrupt(buf: &[u8]) -> bool {
    validate(buf).is_err()
}

/// Raw sequence byte, or `None` if `buf` has no header.
pub fn sequence_of(buf: &[u8]) -> Option<u8> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    Some(buf[OFF_SEQ])
}

/// Tag of the packet, or `None` if `buf` has no header or the byte is unknown.
pub fn tag_of(buf: &[u8]) -> Option<Tag> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    Tag::from_byte(buf[OFF_TAG])
}

/// Payload bytes `[HEADER_LEN, length)`, dropping any receive-buffer padding.
///
/// Returns `None` when the length field is unusable.
pub fn decode(buf: &[u8]) -> Option<&[u8]> {
    declared_len(buf).ok().map(|len| &buf[HEADER_LEN..len])
}

/// A validated, borrowed view of one received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub tag: Tag,
    /// `None` is the sentinel (an ACK sent before anything was accepted).
    pub seq: Option<Seq>,
    pub payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Validate `buf` and expose its fields.
    pub fn parse(buf: &'a [u8]) -> Result<Self, PacketError> {
        validate(buf)?;
        Self::fields(buf)
    }

    /// Like [`Packet::parse`], but rejects any datagram whose length field
    /// is not its exact size.
    pub fn from_datagram(buf: &'a [u8]) -> Result<Self, PacketError> {
        validate_datagram(buf)?;
        Self::fields(buf)
    }

    fn fields(buf: &'a [u8]) -> Result<Self, PacketError> {
        let len = usize::from(buf[OFF_LEN]);
        let tag = Tag::from_byte(buf[OFF_TAG]).ok_or(PacketError::UnknownTag(buf[OFF_TAG]))?;
        let seq = seq::from_wire(buf[OFF_SEQ]).map_err(PacketError::BadSequence)?;
        Ok(Self {
            tag,
            seq,
            payload: &buf[HEADER_LEN..len],
        })
    }

    /// `true` for an intact DATA packet carrying exactly `seq`.
    pub fn is_data(&self, seq: Option<Seq>) -> bool {
        self.tag == Tag::Data && self.seq.is_some() && self.seq == seq
    }

    /// `true` for an intact ACK carrying exactly `seq`.
    pub fn is_ack(&self, seq: Seq) -> bool {
        self.tag == Tag::Ack && self.seq == Some(seq)
    }
}

/// Length field, checked against the header size, the packet limit and
/// the buffer.
fn declared_len(buf: &[u8]) -> Result<usize, PacketError> {
    if buf.len() < HEADER_LEN {
        return Err(PacketError::TooShort { len: buf.len() });
    }
    let declared = usize::from(buf[OFF_LEN]);
    if declared < HEADER_LEN || declared > MAX_PACKET_LEN || declared > buf.len() {
        return Err(PacketError::LengthOutOfBounds {
            declared,
            actual: buf.len(),
        });
    }
    Ok(declared)
}

/// Sum of `bytes` reduced into `0..127`.
fn checksum(bytes: &[u8]) -> u8 {
    let sum: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
    // Always < 127.
    (sum % CHECKSUM_MODULUS) as u8
}
