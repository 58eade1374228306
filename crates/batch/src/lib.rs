//! # Batch — atomic write batches
//!
//! A [`WriteBatch`] buffers an ordered sequence of `Put`/`Delete` mutations
//! in a single serialized representation:
//!
//! ```text
//! [base_seq: u64 LE][count: u32 LE]                      12-byte header
//! [tag: u8 = 0][klen: varint32][key]                     Delete record
//! [tag: u8 = 1][klen: varint32][key][vlen: varint32][v]  Put record
//! ```
//!
//! The header's sequence slot is a placeholder until commit: the
//! [`CommitPipeline`] reserves a contiguous range of sequence numbers,
//! stamps the first into the header, and applies record *N* under sequence
//! `base + N`. Readers observe either the whole batch or none of it — the
//! externally visible sequence advances only after the last record lands.
//!
//! Appending to a batch is purely local buffer work: no I/O, no locking.
//! A single batch has single-writer semantics; independent batches may be
//! prepared concurrently.
//!
//! ## Example
//!
//! ```rust
//! use batch::WriteBatch;
//!
//! let mut b = WriteBatch::new();
//! b.put(b"key", b"v1");
//! b.delete(b"key");
//! b.put(b"key", b"v2");
//! assert_eq!(b.count(), 3);
//! // After commit, a read at any snapshot >= the batch's last sequence
//! // sees "v2": last append order wins.
//! ```

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use keyformat::coding::{decode_varint32, encode_varint32};
use keyformat::{FormatError, SequenceNumber, ValueType};

mod commit;
pub use commit::{BatchTarget, CommitPipeline};

/// Fixed header: 8-byte base-sequence slot + 4-byte record count.
pub const BATCH_HEADER_BYTES: usize = 12;

const TAG_DELETION: u8 = ValueType::Deletion as u8;
const TAG_VALUE: u8 = ValueType::Value as u8;

/// Errors raised while decoding or committing a batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// Serialized form shorter than the 12-byte header.
    #[error("batch too short for header: {0} bytes")]
    MissingHeader(usize),

    /// A record body ended before its declared length.
    #[error("truncated batch record")]
    TruncatedRecord,

    /// A record tag byte that is neither Put nor Delete.
    #[error("unknown batch record tag: {0:#04x}")]
    UnknownTag(u8),

    /// The header count disagrees with the number of records in the body.
    #[error("batch record count mismatch: header says {expected}, body holds {found}")]
    CountMismatch { expected: u32, found: u32 },

    /// Committing would exceed the 56-bit sequence space.
    #[error("sequence number space exhausted")]
    SequenceExhausted,

    /// A malformed varint inside a record.
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Receives decoded records during [`WriteBatch::iterate`], in append order.
pub trait BatchHandler {
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// An atomically committed group of `Put`/`Delete` operations.
///
/// Append-only until commit. Within one batch, the last write to a key wins
/// at any snapshot at or past that record's sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    rep: Vec<u8>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self {
            rep: vec![0u8; BATCH_HEADER_BYTES],
        }
    }

    /// Records `key -> value`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(TAG_VALUE);
        encode_varint32(&mut self.rep, key.len() as u32);
        self.rep.extend_from_slice(key);
        encode_varint32(&mut self.rep, value.len() as u32);
        self.rep.extend_from_slice(value);
    }

    /// Records a tombstone for `key`.
    pub fn delete(&mut self, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(TAG_DELETION);
        encode_varint32(&mut self.rep, key.len() as u32);
        self.rep.extend_from_slice(key);
    }

    /// Drops all buffered records; keeps the allocation for reuse.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(BATCH_HEADER_BYTES, 0);
    }

    /// Number of buffered records.
    pub fn count(&self) -> u32 {
        LittleEndian::read_u32(&self.rep[8..BATCH_HEADER_BYTES])
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Base sequence stamped at commit; zero before that.
    pub fn sequence(&self) -> SequenceNumber {
        LittleEndian::read_u64(&self.rep[..8])
    }

    /// Serialized size in bytes, header included. Hosts use this for
    /// group-commit sizing decisions.
    pub fn byte_size(&self) -> usize {
        self.rep.len()
    }

    /// Raw serialized form, e.g. for a write-ahead log record.
    pub fn contents(&self) -> &[u8] {
        &self.rep
    }

    /// Reconstructs a batch from its serialized form, validating the whole
    /// body up front.
    pub fn from_contents(data: &[u8]) -> Result<Self, BatchError> {
        let batch = Self { rep: data.to_vec() };
        batch.validate()?;
        Ok(batch)
    }

    /// Decodes the body and replays each record through `handler` in append
    /// order.
    ///
    /// All-or-nothing: the entire body is validated before the first
    /// callback, so a truncated record, unknown tag, or count mismatch means
    /// the handler never observes a partial batch.
    pub fn iterate<H: BatchHandler>(&self, handler: &mut H) -> Result<(), BatchError> {
        self.validate()?;
        let mut input = &self.rep[BATCH_HEADER_BYTES..];
        while !input.is_empty() {
            // Cannot fail: validate() walked the same bytes.
            match decode_record(&mut input)? {
                Record::Put { key, value } => handler.put(key, value),
                Record::Delete { key } => handler.delete(key),
            }
        }
        Ok(())
    }

    /// Walks the entire body without side effects, checking every record and
    /// the header count.
    pub(crate) fn validate(&self) -> Result<(), BatchError> {
        if self.rep.len() < BATCH_HEADER_BYTES {
            return Err(BatchError::MissingHeader(self.rep.len()));
        }
        let mut input = &self.rep[BATCH_HEADER_BYTES..];
        let mut found: u32 = 0;
        while !input.is_empty() {
            decode_record(&mut input)?;
            found += 1;
        }
        let expected = self.count();
        if found != expected {
            return Err(BatchError::CountMismatch { expected, found });
        }
        Ok(())
    }

    pub(crate) fn set_sequence(&mut self, seq: SequenceNumber) {
        LittleEndian::write_u64(&mut self.rep[..8], seq);
    }

    fn set_count(&mut self, n: u32) {
        LittleEndian::write_u32(&mut self.rep[8..BATCH_HEADER_BYTES], n);
    }
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

enum Record<'a> {
    Put { key: &'a [u8], value: &'a [u8] },
    Delete { key: &'a [u8] },
}

fn decode_record<'a>(input: &mut &'a [u8]) -> Result<Record<'a>, BatchError> {
    let (&tag, rest) = input.split_first().ok_or(BatchError::TruncatedRecord)?;
    *input = rest;
    match tag {
        TAG_VALUE => {
            let key = decode_slice(input)?;
            let value = decode_slice(input)?;
            Ok(Record::Put { key, value })
        }
        TAG_DELETION => Ok(Record::Delete {
            key: decode_slice(input)?,
        }),
        other => Err(BatchError::UnknownTag(other)),
    }
}

fn decode_slice<'a>(input: &mut &'a [u8]) -> Result<&'a [u8], BatchError> {
    let (len, consumed) = decode_varint32(input)?;
    let rest = &input[consumed..];
    if rest.len() < len as usize {
        return Err(BatchError::TruncatedRecord);
    }
    let (s, rest) = rest.split_at(len as usize);
    *input = rest;
    Ok(s)
}
