//! The sequence ring.
//!
//! Every packet carries a one-byte sequence number drawn from a ring of
//! [`SEQ_MODULUS`] values (`0..=126`).  Both peers start each session at
//! [`Seq::ZERO`] and advance by one per accepted exchange, wrapping after 126.
//!
//! "Nothing yet" (before the first packet of a session has been accepted) is
//! modelled as `Option<Seq>::None` in memory and as [`SENTINEL`] on the wire,
//! which lies outside the ring and can therefore never collide with a real
//! sequence number.

use std::fmt;

/// Number of distinct sequence numbers.
pub const SEQ_MODULUS: u8 = 127;

/// Wire encoding of "no sequence number yet" (`-1` as a signed byte).
pub const SENTINEL: u8 = 0xFF;

/// A sequence number in `0..SEQ_MODULUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Seq(u8);

impl Seq {
    /// Start-of-session value.
    pub const ZERO: Seq = Seq(0);

    /// Largest value in the ring.
    pub const MAX: Seq = Seq(SEQ_MODULUS - 1);

    /// Returns `None` when `raw` lies outside the ring.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw < SEQ_MODULUS {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Raw byte value.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The successor of `self`, wrapping from 126 back to 0.
    #[must_use]
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % SEQ_MODULUS)
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode an optional sequence number as its wire byte.
pub fn to_wire(seq: Option<Seq>) -> u8 {
    seq.map_or(SENTINEL, Seq::get)
}

/// Decode a wire byte.
///
/// `Ok(None)` is the sentinel; `Err(raw)` is a byte that is neither a ring
/// value nor the sentinel.
pub fn from_wire(raw: u8) -> Result<Option<Seq>, u8> {
    match Seq::new(raw) {
        Some(seq) => Ok(Some(seq)),
        None if raw == SENTINEL => Ok(None),
        None => Err(raw),
    }
}

/// Formats an `Option<Seq>` the way the log lines show it (`-` for none).
pub(crate) struct Show(pub Option<Seq>);

impl fmt::Display for Show {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(seq) => write!(f, "{seq}"),
            None => f.write_str("-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_after_max() {
        assert_eq!(Seq::MAX.get(), 126);
        assert_eq!(Seq::MAX.next(), Seq::ZERO);
    }

    #[test]
    fn full_cycle_returns_to_zero() {
        let mut s = Seq::ZERO;
        for _ in 0..SEQ_MODULUS {
            s = s.next();
        }
        assert_eq!(s, Seq::ZERO);
    }

    #[test]
    fn new_rejects_values_outside_ring() {
        assert!(Seq::new(126).is_some());
        assert!(Seq::new(127).is_none());
        assert!(Seq::new(SENTINEL).is_none());
    }

    #[test]
    fn sentinel_is_distinct_on_the_wire() {
        assert_eq!(to_wire(None), SENTINEL);
        assert_eq!(to_wire(Seq::new(5)), 5);
        assert_eq!(from_wire(SENTINEL), Ok(None));
        assert_eq!(from_wire(0), Ok(Some(Seq::ZERO)));
        assert_eq!(from_wire(200), Err(200));
    }
}
