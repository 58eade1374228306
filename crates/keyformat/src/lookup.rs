//! Lookup keys for snapshot-consistent point reads.

use byteorder::{ByteOrder, LittleEndian};

use crate::coding::{encode_varint32, write_varint32, MAX_VARINT32_BYTES};
use crate::{pack_tag, SequenceNumber, MAX_SEQUENCE_NUMBER, TAG_BYTES, VALUE_TYPE_FOR_SEEK};

/// Inline capacity; keys that fit avoid a heap allocation entirely.
const INLINE_CAPACITY: usize = 200;

enum Buf {
    Inline { data: [u8; INLINE_CAPACITY], len: usize },
    Heap(Vec<u8>),
}

/// Search key for a point lookup of `user_key` at a snapshot sequence.
///
/// Layout of the buffer:
///
/// ```text
/// [varint32(user_key_len + 8)]        <- memtable_key() starts here
/// [user_key bytes]                    <- internal_key() / user_key() start here
/// [u64 LE seek tag]
/// ```
///
/// The tag packs the snapshot sequence with [`VALUE_TYPE_FOR_SEEK`], which
/// sorts earliest among same-sequence entries under the internal comparator.
/// Seeking to this key and scanning forward therefore yields the first real
/// record for `user_key` whose sequence is at or below the snapshot.
///
/// The value is scoped to its constructing call frame and is not meant to be
/// shared across threads.
pub struct LookupKey {
    buf: Buf,
    /// Offset where the user key starts, just past the varint32 prefix.
    kstart: usize,
}

impl LookupKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber) -> Self {
        debug_assert!(sequence <= MAX_SEQUENCE_NUMBER);
        let internal_len = user_key.len() + TAG_BYTES;
        debug_assert!(internal_len <= u32::MAX as usize);
        let tag = pack_tag(sequence, VALUE_TYPE_FOR_SEEK);

        if MAX_VARINT32_BYTES + internal_len <= INLINE_CAPACITY {
            let mut data = [0u8; INLINE_CAPACITY];
            let kstart = write_varint32(&mut data, internal_len as u32);
            let mut len = kstart;
            data[len..len + user_key.len()].copy_from_slice(user_key);
            len += user_key.len();
            LittleEndian::write_u64(&mut data[len..len + TAG_BYTES], tag);
            len += TAG_BYTES;
            Self {
                buf: Buf::Inline { data, len },
                kstart,
            }
        } else {
            let mut v = Vec::with_capacity(MAX_VARINT32_BYTES + internal_len);
            encode_varint32(&mut v, internal_len as u32);
            let kstart = v.len();
            v.extend_from_slice(user_key);
            let mut tag_buf = [0u8; TAG_BYTES];
            LittleEndian::write_u64(&mut tag_buf, tag);
            v.extend_from_slice(&tag_buf);
            Self {
                buf: Buf::Heap(v),
                kstart,
            }
        }
    }

    fn bytes(&self) -> &[u8] {
        match &self.buf {
            Buf::Inline { data, len } => &data[..*len],
            Buf::Heap(v) => v,
        }
    }

    /// Length-prefixed form suitable for probing the memtable.
    pub fn memtable_key(&self) -> &[u8] {
        self.bytes()
    }

    /// Bare internal key, suitable for internal iterators.
    pub fn internal_key(&self) -> &[u8] {
        &self.bytes()[self.kstart..]
    }

    /// The user key alone, minus the tag.
    pub fn user_key(&self) -> &[u8] {
        let b = self.bytes();
        &b[self.kstart..b.len() - TAG_BYTES]
    }
}
