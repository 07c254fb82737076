//! Batches records onto one chromosome, decides which ones are worth
//! map-coding, and builds the hierarchical map chain for those that are.

use crate::bits::packed_array::write_packed_array;
use crate::bits::{write_restricted_int, IndexArray};
use crate::block::{default_max_nonmajor, level_caps, BlockEncoderConfig, ALLELE_REC};
use crate::chrom::{ChromId, ChromIdTable};
use crate::error::{Bref4Error, Result};
use crate::record::{AlleleView, Bref4Rec, RefGTRec};
use crate::seqcoder::SequenceCoder;
use crate::wire_str::write_wire_string;

pub struct BlockWriter {
    level_caps: Vec<u32>,
    max_maps: u8,
    max_nonmajor: usize,
    cur_chrom: Option<ChromId>,
    buffer: Vec<RefGTRec>,
    eligible: Vec<bool>,
    coder: Option<SequenceCoder>,
    blocks: Vec<Vec<u8>>,
}

impl BlockWriter {
    pub fn new(n_haps: usize, config: BlockEncoderConfig) -> Result<Self> {
        let n_samples = n_haps / 2;
        let caps = level_caps(n_samples, config.bits_per_level);
        let max_maps = caps.len() as u32 + 1;
        if max_maps > 255 {
            return Err(Bref4Error::BadArguments(format!(
                "bits-per-level={} yields {max_maps} map levels for {n_samples} samples, \
                 exceeding the single-byte nMaps limit of 255",
                config.bits_per_level
            )));
        }
        let max_nonmajor = config
            .max_nonmajor
            .unwrap_or_else(|| default_max_nonmajor(n_haps));
        let coder = caps.first().map(|&cap| SequenceCoder::new(n_haps, cap));
        Ok(Self {
            level_caps: caps,
            max_maps: max_maps as u8,
            max_nonmajor,
            cur_chrom: None,
            buffer: Vec::new(),
            eligible: Vec::new(),
            coder,
            blocks: Vec::new(),
        })
    }

    fn smallest_level_cap(&self) -> u32 {
        self.level_caps.last().copied().unwrap_or(0)
    }

    fn is_map_eligible(&self, rec: &RefGTRec) -> bool {
        if self.level_caps.is_empty() {
            return false;
        }
        let nonmajor: usize = (0..rec.n_alleles())
            .filter(|&a| a != rec.null_row())
            .map(|a| rec.allele_haps(a).map_or(0, |h| h.len()))
            .sum();
        nonmajor > self.max_nonmajor
            && rec.n_alleles() <= (self.smallest_level_cap() as usize).min(256)
    }

    pub fn add_record(&mut self, rec: RefGTRec, chrom_table: &ChromIdTable) -> Result<()> {
        let chrom = rec.marker().chrom;
        if let Some(cur) = self.cur_chrom {
            if cur != chrom {
                self.flush(chrom_table)?;
            }
        }
        self.cur_chrom = Some(chrom);

        let eligible = self.is_map_eligible(&rec);
        if eligible {
            let bref = Bref4Rec::from_ref_gt_rec(&rec);
            let admitted = self
                .coder
                .as_mut()
                .expect("map-eligible record implies level_caps is non-empty")
                .add(bref.clone());
            if !admitted {
                self.flush(chrom_table)?;
                self.cur_chrom = Some(chrom);
                let ok = self.coder.as_mut().unwrap().add(bref);
                debug_assert!(ok, "a lone record must be admitted into a freshly cleared coder");
            }
        }
        self.eligible.push(eligible);
        self.buffer.push(rec);
        Ok(())
    }

    pub fn finish(mut self, chrom_table: &ChromIdTable) -> Result<Vec<Vec<u8>>> {
        if !self.buffer.is_empty() {
            self.flush(chrom_table)?;
        }
        Ok(self.blocks)
    }

    fn flush(&mut self, chrom_table: &ChromIdTable) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chrom_id = self
            .cur_chrom
            .expect("flush is only called with a non-empty, single-chromosome buffer");
        let chrom_name = chrom_table.name(chrom_id).to_owned();

        let n_eligible = self.eligible.iter().filter(|&&e| e).count();
        let mut chains: Vec<Vec<IndexArray>> = (0..n_eligible).map(|_| Vec::new()).collect();

        if n_eligible > 0 {
            let coder = self.coder.as_ref().expect("eligible records imply a coder");
            let top_map = coder.hap_to_seq();
            chains[0].push(top_map.clone());
            let mapped = coder.mapped_bref4_recs(&top_map);
            store_maps(0, &self.level_caps, &mapped, &mut chains);
        }

        let body = serialize_block(
            &self.buffer,
            &self.eligible,
            &chains,
            self.max_maps,
            &chrom_name,
        )?;
        self.blocks.push(body);

        self.buffer.clear();
        self.eligible.clear();
        if let Some(coder) = self.coder.as_mut() {
            coder.clear();
        }
        Ok(())
    }
}

/// Recursively descends the level hierarchy, appending one map per level to
/// every record's bucket until the final level, where each record's own
/// `hapToAllele()` is appended instead (§4.4).
fn store_maps(level: usize, level_caps: &[u32], recs: &[Bref4Rec], buckets: &mut [Vec<IndexArray>]) {
    if recs.is_empty() {
        return;
    }
    if level + 1 < level_caps.len() {
        let domain = recs[0].size();
        let mut sub = SequenceCoder::new(domain, level_caps[level + 1]);
        let mut last_start = 0usize;
        for i in 0..recs.len() {
            if !sub.add(recs[i].clone()) {
                let m = sub.hap_to_seq();
                buckets[last_start].push(m.clone());
                let sub_mapped: Vec<Bref4Rec> =
                    recs[last_start..i].iter().map(|r| r.apply_map(&m)).collect();
                store_maps(level + 1, level_caps, &sub_mapped, &mut buckets[last_start..i]);
                sub.clear();
                last_start = i;
                let ok = sub.add(recs[i].clone());
                debug_assert!(ok, "a lone record must be admitted into a freshly cleared sub-coder");
            }
        }
        let m = sub.hap_to_seq();
        buckets[last_start].push(m.clone());
        let sub_mapped: Vec<Bref4Rec> = recs[last_start..].iter().map(|r| r.apply_map(&m)).collect();
        store_maps(level + 1, level_caps, &sub_mapped, &mut buckets[last_start..]);
    } else {
        for (bucket, rec) in buckets.iter_mut().zip(recs.iter()) {
            bucket.push(rec.hap_to_allele());
        }
    }
}

fn serialize_block(
    buffer: &[RefGTRec],
    eligible: &[bool],
    chains: &[Vec<IndexArray>],
    max_maps: u8,
    chrom_name: &str,
) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    body.extend_from_slice(&(buffer.len() as i32).to_be_bytes());
    let last_pos = buffer
        .last()
        .expect("serialize_block is only called on a non-empty buffer")
        .marker()
        .pos as i32;
    body.extend_from_slice(&last_pos.to_be_bytes());
    let n_maps_first = chains.first().map_or(0, |c| c.len() as u8);
    body.push(n_maps_first);
    write_wire_string(chrom_name, &mut body)?;

    let mut prev_pos: i64 = 0;
    let mut next_chain = 0usize;
    for (rec, &is_eligible) in buffer.iter().zip(eligible.iter()) {
        let pos = rec.marker().pos as i64;
        write_restricted_int(pos - prev_pos, &mut body)?;
        prev_pos = pos;
        rec.marker().write_non_pos_fields(&mut body)?;

        if is_eligible {
            let chain = &chains[next_chain];
            next_chain += 1;
            body.push(max_maps - chain.len() as u8);
            for m in chain {
                write_packed_array(m, &mut body)?;
            }
        } else {
            body.push(ALLELE_REC);
            for a in 0..rec.n_alleles() {
                if a == rec.null_row() {
                    write_restricted_int(-1, &mut body)?;
                } else {
                    let haps = rec.allele_haps(a).unwrap_or(&[]);
                    write_restricted_int(haps.len() as i64, &mut body)?;
                    for &h in haps {
                        body.extend_from_slice(&(h as i32).to_be_bytes());
                    }
                }
            }
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::decoder::decode_block;
    use crate::chrom::ChromIdTable;
    use crate::marker::Marker;
    use crate::shared::Shared;

    fn marker(chrom: ChromId, pos: u32) -> Shared<Marker> {
        Shared::new(Marker {
            chrom,
            pos,
            id: ".".into(),
            ref_allele: "A".into(),
            alt_alleles: vec!["G".into()],
            qual: None,
            filter: vec![],
            info: ".".into(),
        })
    }

    fn di_allelic(chrom: ChromId, pos: u32, n_haps: usize, carriers: Vec<u32>) -> RefGTRec {
        let mut allele_to_haps = vec![None; 2];
        allele_to_haps[1] = Some(carriers);
        RefGTRec::new(marker(chrom, pos), n_haps, allele_to_haps).unwrap()
    }

    #[test]
    fn mixed_sparse_and_map_coded_block_roundtrips() {
        let mut table = ChromIdTable::new();
        let chrom = table.intern("1");
        let n_haps = 40;

        let originals = vec![
            di_allelic(chrom, 100, n_haps, vec![0, 5]),
            di_allelic(chrom, 150, n_haps, (0..10).collect()),
            di_allelic(chrom, 200, n_haps, (0..15).collect()),
        ];

        let mut writer = BlockWriter::new(n_haps, BlockEncoderConfig::default()).unwrap();
        for rec in originals.clone() {
            writer.add_record(rec, &table).unwrap();
        }
        let blocks = writer.finish(&table).unwrap();
        assert_eq!(blocks.len(), 1);

        let decoded = decode_block(&blocks[0], n_haps, &mut table).unwrap();
        assert_eq!(decoded.len(), originals.len());
        for (orig, got) in originals.iter().zip(decoded.iter()) {
            assert_eq!(orig.marker().pos, got.marker().pos);
            assert_eq!(orig.hap_to_allele().values(), got.hap_to_allele().values());
        }
    }

    #[test]
    fn chromosome_change_forces_a_flush() {
        let mut table = ChromIdTable::new();
        let chrom1 = table.intern("1");
        let chrom2 = table.intern("2");
        let n_haps = 8;

        let mut writer = BlockWriter::new(n_haps, BlockEncoderConfig::default()).unwrap();
        writer
            .add_record(di_allelic(chrom1, 1, n_haps, vec![0]), &table)
            .unwrap();
        writer
            .add_record(di_allelic(chrom2, 1, n_haps, vec![1]), &table)
            .unwrap();
        let blocks = writer.finish(&table).unwrap();
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn admission_failure_mid_block_flushes_and_continues() {
        let mut table = ChromIdTable::new();
        let chrom = table.intern("1");
        let n_haps = 40;
        let config = BlockEncoderConfig {
            bits_per_level: 2,
            max_nonmajor: Some(0),
        };
        let mut writer = BlockWriter::new(n_haps, config).unwrap();
        // 16 splitting records will exhaust the top-level coder's capacity
        // (16, per level_caps(20, 2)) and force an internal flush.
        let mut originals = Vec::new();
        for i in 0..20u32 {
            let carriers: Vec<u32> = (0..n_haps as u32).filter(|h| h % (i + 2) == 0).collect();
            originals.push(di_allelic(chrom, 10 + i, n_haps, carriers));
        }
        for rec in originals.clone() {
            writer.add_record(rec, &table).unwrap();
        }
        let blocks = writer.finish(&table).unwrap();
        assert!(blocks.len() >= 2, "expected at least one internal flush");

        let mut decoded = Vec::new();
        for block in &blocks {
            decoded.extend(decode_block(block, n_haps, &mut table).unwrap());
        }
        assert_eq!(decoded.len(), originals.len());
        for (orig, got) in originals.iter().zip(decoded.iter()) {
            assert_eq!(orig.hap_to_allele().values(), got.hap_to_allele().values());
        }
    }
}
