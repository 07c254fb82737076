//! Bit-packed integer arrays ([`IndexArray`]): the on-wire representation of
//! every map and every `hapToAllele`/`hapToSeq` table.

use nom::number::streaming::le_u8;
use nom::IResult;

use super::restricted_int::{read_restricted_int, write_restricted_int};
use crate::error::{Bref4Error, Result};

/// A packed array of `length` values, each in `[0, value_size)`.
///
/// Values are stored unpacked in memory (one `u32` per element); the bit
/// packing only happens on the wire. `value_size` is carried alongside the
/// values because it determines both how many bits each element occupies
/// and what a downstream `applyMap` composes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexArray {
    values: Vec<u32>,
    value_size: u32,
}

impl IndexArray {
    pub fn new(values: Vec<u32>, value_size: u32) -> Self {
        debug_assert!(values.iter().all(|&v| v < value_size));
        Self { values, value_size }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_size(&self) -> u32 {
        self.value_size
    }

    pub fn get(&self, i: usize) -> u32 {
        self.values[i]
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Composes `self` with `next`: `result[i] = next[self[i]]`. The result
    /// carries `next`'s `value_size`.
    pub fn compose(&self, next: &IndexArray) -> IndexArray {
        let values = self.values.iter().map(|&v| next.get(v as usize)).collect();
        IndexArray::new(values, next.value_size)
    }
}

/// `bitsPerValue = ceil(log2(max(value_size, 2)))`.
pub fn bits_per_value(value_size: u32) -> u32 {
    let v = value_size.max(2);
    32 - (v - 1).leading_zeros()
}

struct BitWriter {
    acc: u128,
    nbits: u32,
    words: Vec<u64>,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            acc: 0,
            nbits: 0,
            words: Vec::new(),
        }
    }

    fn push(&mut self, value: u64, bits: u32) {
        self.acc |= (value as u128) << self.nbits;
        self.nbits += bits;
        while self.nbits >= 64 {
            self.words.push((self.acc & u64::MAX as u128) as u64);
            self.acc >>= 64;
            self.nbits -= 64;
        }
    }

    fn finish(mut self) -> Vec<u64> {
        if self.nbits > 0 {
            self.words.push((self.acc & u64::MAX as u128) as u64);
        }
        self.words
    }
}

/// Writes `writeRestrictedInt(value_size)` followed by the packed body.
pub fn write_packed_array(arr: &IndexArray, out: &mut Vec<u8>) -> Result<()> {
    write_restricted_int(arr.value_size as i64, out)?;
    let bits = bits_per_value(arr.value_size);
    let total_bits = arr.len() as u64 * bits as u64;

    let mut writer = BitWriter::new();
    for &v in &arr.values {
        writer.push(v as u64, bits);
    }
    let words = writer.finish();

    for (i, word) in words.iter().enumerate() {
        let is_last = i + 1 == words.len();
        let bytes = if is_last {
            let leftover = total_bits % 64;
            if leftover == 0 {
                8
            } else {
                ((leftover + 7) / 8) as usize
            }
        } else {
            8
        };
        out.extend_from_slice(&word.to_le_bytes()[..bytes]);
    }
    Ok(())
}

struct BitReader<'a> {
    words: std::slice::Iter<'a, u64>,
    acc: u128,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    fn new(words: &'a [u64]) -> Self {
        Self {
            words: words.iter(),
            acc: 0,
            nbits: 0,
        }
    }

    fn pull(&mut self, bits: u32) -> u32 {
        while self.nbits < bits {
            let word = *self.words.next().expect("word stream exhausted");
            self.acc |= (word as u128) << self.nbits;
            self.nbits += 64;
        }
        let mask = (1u128 << bits) - 1;
        let value = (self.acc & mask) as u32;
        self.acc >>= bits;
        self.nbits -= bits;
        value
    }
}

/// Reads a packed array of `length` elements. The preceding
/// `writeRestrictedInt(value_size)` is read first.
pub fn read_packed_array(length: usize, input: &[u8]) -> IResult<&[u8], IndexArray> {
    let (input, value_size) = read_restricted_int(input)?;
    let value_size = value_size as u32;
    let bits = bits_per_value(value_size);
    let total_bits = length as u64 * bits as u64;
    let n_words = if total_bits == 0 {
        0
    } else {
        ((total_bits + 63) / 64) as usize
    };

    let mut words = Vec::with_capacity(n_words);
    let mut input = input;
    for i in 0..n_words {
        let is_last = i + 1 == n_words;
        let n_bytes = if is_last {
            let leftover = total_bits % 64;
            if leftover == 0 {
                8
            } else {
                ((leftover + 7) / 8) as usize
            }
        } else {
            8
        };
        let mut buf = [0u8; 8];
        for slot in buf.iter_mut().take(n_bytes) {
            let (rest, byte) = le_u8(input)?;
            input = rest;
            *slot = byte;
        }
        words.push(u64::from_le_bytes(buf));
    }

    let mut reader = BitReader::new(&words);
    let mut values = Vec::with_capacity(length);
    for _ in 0..length {
        values.push(reader.pull(bits));
    }
    Ok((input, IndexArray::new(values, value_size)))
}

/// Validates a just-read [`IndexArray`] against the bound its caller
/// expects, converting an out-of-range value into a `CorruptBlock` error.
pub fn validate_bound(arr: &IndexArray, expected_value_size: u32) -> Result<()> {
    if arr.value_size != expected_value_size {
        return Err(Bref4Error::CorruptBlock(format!(
            "packed array value_size {} != expected {}",
            arr.value_size, expected_value_size
        )));
    }
    if let Some(&bad) = arr.values.iter().find(|&&v| v >= arr.value_size) {
        return Err(Bref4Error::CorruptBlock(format!(
            "packed value {} >= value_size {}",
            bad, arr.value_size
        )));
    }
    Ok(())
}
