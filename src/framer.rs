//! File-level framing: magic number, header payload, length-prefixed block
//! stream, and the tail index (§4.6).

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use nom::bytes::streaming::take;
use nom::number::streaming::{be_i32, be_i64, be_u32};

use crate::bits::read_restricted_int;
use crate::chrom::ChromId;
use crate::error::{Bref4Error, Result};
use crate::wire_str::{read_wire_string, read_wire_string_array, write_wire_string, write_wire_string_array};

/// bref4's magic number, stable across format revisions.
pub const MAGIC: u32 = 25_597_034;

type NomErr<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

fn corrupt(_: NomErr<'_>) -> Bref4Error {
    Bref4Error::CorruptBlock("truncated or malformed bref4 file".into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub meta_info_lines: Vec<String>,
    pub sample_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub file_offset: u64,
    pub chrom_name: String,
    pub start_pos: i32,
    pub end_pos: i32,
}

/// Reads `nRecs, lastPos, nMaps, chromId` and the first record's position
/// delta, without parsing the rest of the block — enough to build an
/// [`IndexEntry`] or re-derive one during pass-through re-emission (§4.6).
pub fn peek_block_header(bytes: &[u8]) -> Result<(String, i32, i32)> {
    let (input, _n_recs) = be_i32(bytes).map_err(corrupt)?;
    let (input, last_pos) = be_i32(input).map_err(corrupt)?;
    let (input, _n_maps) = nom::number::streaming::be_u8(input).map_err(corrupt)?;
    let (input, chrom_name) = read_wire_string(input).map_err(corrupt)?;
    let (_input, first_delta) = read_restricted_int(input).map_err(corrupt)?;
    Ok((chrom_name, first_delta as i32, last_pos))
}

pub fn read_file_header(input: &[u8]) -> Result<(&[u8], FileHeader)> {
    let (input, magic) = be_u32(input).map_err(corrupt)?;
    if magic != MAGIC {
        return Err(Bref4Error::CorruptBlock(format!(
            "bad magic number {magic:#x}, expected {MAGIC:#x}"
        )));
    }
    let (input, payload_len) = be_u32(input).map_err(corrupt)?;
    let (rest, payload) = take(payload_len)(input).map_err(corrupt)?;
    let (payload, meta_info_lines) = read_wire_string_array(payload).map_err(corrupt)?;
    let (_, sample_ids) = read_wire_string_array(payload).map_err(corrupt)?;
    Ok((
        rest,
        FileHeader {
            meta_info_lines,
            sample_ids,
        },
    ))
}

/// Reads the length-prefixed block stream up to (and consuming) the
/// `u32 0` end-of-blocks sentinel. Returns the raw bytes of each block and
/// the remaining input (the start of the index body).
pub fn read_blocks(mut input: &[u8]) -> Result<(&[u8], Vec<Vec<u8>>)> {
    let mut blocks = Vec::new();
    loop {
        let (rest, len) = be_i32(input).map_err(corrupt)?;
        if len == 0 {
            return Ok((rest, blocks));
        }
        let (rest, bytes) = take(len as u32)(rest).map_err(corrupt)?;
        blocks.push(bytes.to_vec());
        input = rest;
    }
}

/// Reads index entries up to the `i64 -1` end-of-index sentinel. Does not
/// read the trailing `indexByteOffset` field, which only matters to a
/// seek-based reader entering from the end of the file.
pub fn read_index(mut input: &[u8]) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    loop {
        let (rest, marker) = be_i64(input).map_err(corrupt)?;
        if marker == -1 {
            return Ok(entries);
        }
        let (rest, chrom_name) = read_wire_string(rest).map_err(corrupt)?;
        let (rest, start_pos) = be_i32(rest).map_err(corrupt)?;
        let (rest, end_pos) = be_i32(rest).map_err(corrupt)?;
        entries.push(IndexEntry {
            file_offset: marker as u64,
            chrom_name,
            start_pos,
            end_pos,
        });
        input = rest;
    }
}

/// Writes a bref4 file's header, block stream, and tail index to `out`.
/// Owns a 64-bit byte counter (never truncated through a 32-bit field, per
/// the fixed Open Question in §9) so index offsets stay exact regardless of
/// file size.
pub struct FileWriter<W: Write> {
    out: W,
    bytes_written: AtomicU64,
    index: Vec<IndexEntry>,
}

impl<W: Write> FileWriter<W> {
    pub fn new(mut out: W, meta_info_lines: &[String], sample_ids: &[String]) -> Result<Self> {
        let mut payload = Vec::new();
        write_wire_string_array(meta_info_lines, &mut payload)?;
        write_wire_string_array(sample_ids, &mut payload)?;
        out.write_all(&MAGIC.to_be_bytes())?;
        out.write_all(&(payload.len() as u32).to_be_bytes())?;
        out.write_all(&payload)?;
        let bytes_written = 4 + 4 + payload.len() as u64;
        Ok(Self {
            out,
            bytes_written: AtomicU64::new(bytes_written),
            index: Vec::new(),
        })
    }

    /// Appends one already-serialized block (from [`crate::block::BlockWriter`]
    /// or copied byte-for-byte during pass-through re-emission) and records
    /// its index entry.
    pub fn write_block(&mut self, block_bytes: &[u8]) -> Result<()> {
        let (chrom_name, first_pos, last_pos) = peek_block_header(block_bytes)?;
        let offset = self.bytes_written.load(Ordering::SeqCst);
        self.out.write_all(&(block_bytes.len() as i32).to_be_bytes())?;
        self.out.write_all(block_bytes)?;
        self.bytes_written
            .fetch_add(4 + block_bytes.len() as u64, Ordering::SeqCst);
        self.index.push(IndexEntry {
            file_offset: offset,
            chrom_name,
            start_pos: first_pos,
            end_pos: last_pos,
        });
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.write_all(&0i32.to_be_bytes())?;
        self.bytes_written.fetch_add(4, Ordering::SeqCst);
        let index_offset = self.bytes_written.load(Ordering::SeqCst);

        let mut body = Vec::new();
        for entry in &self.index {
            body.extend_from_slice(&(entry.file_offset as i64).to_be_bytes());
            write_wire_string(&entry.chrom_name, &mut body)?;
            body.extend_from_slice(&entry.start_pos.to_be_bytes());
            body.extend_from_slice(&entry.end_pos.to_be_bytes());
        }
        self.out.write_all(&body)?;
        self.out.write_all(&(-1i64).to_be_bytes())?;
        self.out.write_all(&(index_offset as i64).to_be_bytes())?;
        Ok(self.out)
    }
}

/// Looks up the [`ChromId`] an index entry's chromosome name resolves to,
/// interning it if this is the first time it's been seen in this run.
pub fn intern_index_chrom(table: &mut crate::chrom::ChromIdTable, entry: &IndexEntry) -> ChromId {
    table.intern(&entry.chrom_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_empty_block_stream_roundtrip() {
        let meta = vec!["##fileformat=VCFv4.2".to_owned()];
        let samples = vec!["S1".to_owned(), "S2".to_owned()];

        let mut buf = Vec::new();
        let writer = FileWriter::new(&mut buf, &meta, &samples).unwrap();
        writer.finish().unwrap();

        let (rest, header) = read_file_header(&buf).unwrap();
        assert_eq!(header.meta_info_lines, meta);
        assert_eq!(header.sample_ids, samples);

        let (rest, blocks) = read_blocks(rest).unwrap();
        assert!(blocks.is_empty());
        let index = read_index(rest).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn block_roundtrips_with_index() {
        use crate::block::BlockWriter;
        use crate::block::BlockEncoderConfig;
        use crate::chrom::ChromIdTable;
        use crate::marker::Marker;
        use crate::record::RefGTRec;
        use crate::shared::Shared;

        let mut table = ChromIdTable::new();
        let chrom = table.intern("1");
        let n_haps = 4;
        let marker = Shared::new(Marker {
            chrom,
            pos: 100,
            id: ".".into(),
            ref_allele: "A".into(),
            alt_alleles: vec!["G".into()],
            qual: None,
            filter: vec![],
            info: ".".into(),
        });
        let rec = RefGTRec::new(marker, n_haps, vec![None, Some(vec![1, 3])]).unwrap();

        let mut block_writer = BlockWriter::new(n_haps, BlockEncoderConfig::default()).unwrap();
        block_writer.add_record(rec, &table).unwrap();
        let blocks = block_writer.finish(&table).unwrap();

        let mut buf = Vec::new();
        let mut file_writer = FileWriter::new(&mut buf, &[], &["S1".to_owned()]).unwrap();
        for block in &blocks {
            file_writer.write_block(block).unwrap();
        }
        file_writer.finish().unwrap();

        let (rest, _header) = read_file_header(&buf).unwrap();
        let (rest, read_back_blocks) = read_blocks(rest).unwrap();
        assert_eq!(read_back_blocks, blocks);
        let index = read_index(rest).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].chrom_name, "1");
        assert_eq!(index[0].start_pos, 100);
        assert_eq!(index[0].end_pos, 100);
    }
}
