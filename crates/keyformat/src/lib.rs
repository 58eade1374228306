//! # Keyformat — internal key encoding and ordering
//!
//! Every record the engine stores carries a composite *internal key*: the
//! caller's user key followed by an 8-byte little-endian tag packing a
//! 56-bit sequence number with an 8-bit value type.
//!
//! ```text
//! [user_key: bytes][tag: u64 LE]      tag = (sequence << 8) | value_type
//! ```
//!
//! Under the [`InternalKeyComparator`] internal keys sort by user key
//! ascending, then by tag *descending*, so the newest version of a key is
//! always encountered first when scanning forward. Point lookups build a
//! [`LookupKey`] whose synthetic tag lands just before the first record at
//! or below the requested snapshot sequence.
//!
//! The tag values are embedded in on-disk structures. Do not change them.
//!
//! ## Example
//!
//! ```rust
//! use keyformat::{append_internal_key, parse_internal_key, ValueType};
//!
//! let mut key = Vec::new();
//! append_internal_key(&mut key, b"user", 42, ValueType::Value);
//! let parsed = parse_internal_key(&key).unwrap();
//! assert_eq!(parsed.user_key, b"user");
//! assert_eq!(parsed.sequence, 42);
//! ```

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

pub mod coding;
mod comparator;
mod lookup;

pub use comparator::{BytewiseComparator, Comparator, InternalKeyComparator};
pub use lookup::LookupKey;

/// Monotonically increasing write ordinal, assigned at batch commit.
/// Defines the global happened-before order for multi-version reads.
pub type SequenceNumber = u64;

/// Highest representable sequence number. The low 8 bits of the packed tag
/// hold the value type, leaving 56 usable bits for the sequence.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Byte width of the packed tag appended to every user key.
pub const TAG_BYTES: usize = 8;

/// Distinguishes live values from deletion markers inside an internal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    /// Tombstone: the key is deleted at this sequence.
    Deletion = 0,
    /// A live value.
    Value = 1,
}

/// Type stamped into seek tags. Tags compare in reverse, so the
/// highest-numbered type sorts earliest among entries with the same
/// sequence; a seek key built with it lands just before every real record
/// at or below the requested sequence.
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Value;

impl ValueType {
    /// Decodes the low tag byte. An unrecognized byte signals corruption and
    /// must never be defaulted by the caller.
    pub fn from_tag_byte(b: u8) -> Result<Self, FormatError> {
        match b {
            0 => Ok(ValueType::Deletion),
            1 => Ok(ValueType::Value),
            other => Err(FormatError::UnknownValueType(other)),
        }
    }
}

/// Errors raised while decoding keys or validating store format metadata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Internal key shorter than the 8-byte tag.
    #[error("internal key too short: {0} bytes (need at least 8)")]
    TruncatedKey(usize),

    /// The tag's type byte is not a known [`ValueType`].
    #[error("unknown value type byte: {0:#04x}")]
    UnknownValueType(u8),

    /// The store was created under a different comparator. Fatal: reopening
    /// under another order would corrupt every structure built on it.
    #[error("comparator mismatch: store created with {stored:?}, opened with {actual:?}")]
    ComparatorMismatch { stored: String, actual: String },

    /// A varint32 field ended before its terminating byte.
    #[error("truncated varint32")]
    TruncatedVarint,

    /// A varint32 field encodes a value wider than 32 bits.
    #[error("varint32 overflows 32 bits")]
    VarintOverflow,
}

/// Packs a sequence number and value type into the 64-bit trailing tag.
pub fn pack_tag(sequence: SequenceNumber, value_type: ValueType) -> u64 {
    debug_assert!(sequence <= MAX_SEQUENCE_NUMBER);
    (sequence << 8) | value_type as u64
}

/// Decomposed view of an internal key. A parsing result only; the encoded
/// form is what gets stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    pub fn new(user_key: &'a [u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        Self {
            user_key,
            sequence,
            value_type,
        }
    }

    /// Length of the encoding of this key.
    pub fn encoding_length(&self) -> usize {
        self.user_key.len() + TAG_BYTES
    }
}

/// Appends the encoding of `(user_key, sequence, value_type)` to `dst`.
pub fn append_internal_key(
    dst: &mut Vec<u8>,
    user_key: &[u8],
    sequence: SequenceNumber,
    value_type: ValueType,
) {
    dst.extend_from_slice(user_key);
    let mut tag = [0u8; TAG_BYTES];
    LittleEndian::write_u64(&mut tag, pack_tag(sequence, value_type));
    dst.extend_from_slice(&tag);
}

/// Parses an encoded internal key, failing explicitly on truncation or an
/// unrecognized type byte.
pub fn parse_internal_key(internal_key: &[u8]) -> Result<ParsedInternalKey<'_>, FormatError> {
    let n = internal_key.len();
    if n < TAG_BYTES {
        return Err(FormatError::TruncatedKey(n));
    }
    let tag = LittleEndian::read_u64(&internal_key[n - TAG_BYTES..]);
    let value_type = ValueType::from_tag_byte((tag & 0xff) as u8)?;
    Ok(ParsedInternalKey {
        user_key: &internal_key[..n - TAG_BYTES],
        sequence: tag >> 8,
        value_type,
    })
}

/// User-key projection of an internal key.
///
/// Precondition: `internal_key` was validated by the caller and holds at
/// least the 8-byte tag.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    debug_assert!(internal_key.len() >= TAG_BYTES);
    &internal_key[..internal_key.len() - TAG_BYTES]
}

/// Raw 64-bit tag of an internal key. Same precondition as
/// [`extract_user_key`].
pub fn extract_tag(internal_key: &[u8]) -> u64 {
    debug_assert!(internal_key.len() >= TAG_BYTES);
    LittleEndian::read_u64(&internal_key[internal_key.len() - TAG_BYTES..])
}

/// Value-type projection of an internal key. Unlike [`extract_user_key`]
/// this re-validates the type byte: iterators call it on keys read back from
/// disk, where a bad byte means corruption.
pub fn extract_value_type(internal_key: &[u8]) -> Result<ValueType, FormatError> {
    if internal_key.len() < TAG_BYTES {
        return Err(FormatError::TruncatedKey(internal_key.len()));
    }
    ValueType::from_tag_byte((extract_tag(internal_key) & 0xff) as u8)
}

/// Owned internal key.
///
/// Engine modules pass this newtype instead of raw byte strings so a plain
/// byte-wise comparison can't sneak in where the internal ordering is
/// required. An empty rep marks the key as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternalKey {
    rep: Vec<u8>,
}

impl InternalKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        let mut rep = Vec::with_capacity(user_key.len() + TAG_BYTES);
        append_internal_key(&mut rep, user_key, sequence, value_type);
        Self { rep }
    }

    /// Adopts an already-encoded key, validating it first.
    pub fn decode_from(encoded: &[u8]) -> Result<Self, FormatError> {
        parse_internal_key(encoded)?;
        Ok(Self {
            rep: encoded.to_vec(),
        })
    }

    /// The encoded form. Must not be called on an unset key.
    pub fn encode(&self) -> &[u8] {
        debug_assert!(!self.rep.is_empty());
        &self.rep
    }

    pub fn user_key(&self) -> &[u8] {
        extract_user_key(&self.rep)
    }

    pub fn parse(&self) -> Result<ParsedInternalKey<'_>, FormatError> {
        parse_internal_key(&self.rep)
    }

    /// Marks the key unset; keeps the allocation.
    pub fn clear(&mut self) {
        self.rep.clear();
    }

    pub fn is_set(&self) -> bool {
        !self.rep.is_empty()
    }
}

/// Open-time metadata check: a store must be reopened under the comparator
/// it was created with. There is no automatic migration path.
pub fn verify_comparator_name(stored: &str, actual: &str) -> Result<(), FormatError> {
    if stored == actual {
        Ok(())
    } else {
        Err(FormatError::ComparatorMismatch {
            stored: stored.to_string(),
            actual: actual.to_string(),
        })
    }
}
