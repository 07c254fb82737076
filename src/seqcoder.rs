//! The sequence coder: the online haplotype-partition refiner at the heart
//! of bref4's compression. Maintains an equivalence-class partition of
//! `[0, n_haps)` that gets refined, record by record, until it would need
//! more than `max_n_seq` classes — at which point admission fails and the
//! caller (the block encoder) must flush or descend a level.

use std::collections::HashMap;

use crate::bits::IndexArray;
use crate::record::{AlleleView, Bref4Rec};

pub struct SequenceCoder {
    n_haps: usize,
    max_n_seq: u32,
    hap2seq: Vec<u32>,
    seq2cnt: Vec<u32>,
    n_seq: u32,
    records: Vec<Bref4Rec>,
}

impl SequenceCoder {
    pub fn new(n_haps: usize, max_n_seq: u32) -> Self {
        Self {
            n_haps,
            max_n_seq,
            hap2seq: vec![0; n_haps],
            seq2cnt: vec![n_haps as u32],
            n_seq: 1,
            records: Vec::new(),
        }
    }

    pub fn n_seq(&self) -> u32 {
        self.n_seq
    }

    pub fn records(&self) -> &[Bref4Rec] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.hap2seq.iter_mut().for_each(|s| *s = 0);
        self.seq2cnt.clear();
        self.seq2cnt.push(self.n_haps as u32);
        self.n_seq = 1;
        self.records.clear();
    }

    /// Attempts to refine the partition by `rec`'s allele pattern. Returns
    /// `false` (no state change) if doing so would need more than
    /// `max_n_seq` sequences.
    pub fn add(&mut self, rec: Bref4Rec) -> bool {
        let null_al = rec.null_row();
        let n_seq = self.n_seq as usize;

        let mut null_count = self.seq2cnt[..n_seq].to_vec();
        for a in 0..rec.n_alleles() {
            if a == null_al {
                continue;
            }
            if let Some(haps) = rec.allele_haps(a) {
                for &h in haps {
                    null_count[self.hap2seq[h as usize] as usize] -= 1;
                }
            }
        }

        let mut claimed: Vec<bool> = null_count.iter().map(|&c| c > 0).collect();
        let mut update_map: Vec<HashMap<u32, u32>> = vec![HashMap::new(); rec.n_alleles()];
        let mut next_seq = self.n_seq;

        for a in 0..rec.n_alleles() {
            if a == null_al {
                continue;
            }
            let Some(haps) = rec.allele_haps(a) else {
                continue;
            };
            for &h in haps {
                let s = self.hap2seq[h as usize];
                if update_map[a].contains_key(&s) {
                    continue;
                }
                if !claimed[s as usize] {
                    claimed[s as usize] = true;
                    update_map[a].insert(s, s);
                } else {
                    if next_seq == self.max_n_seq {
                        return false;
                    }
                    update_map[a].insert(s, next_seq);
                    next_seq += 1;
                }
            }
        }

        for a in 0..rec.n_alleles() {
            if a == null_al {
                continue;
            }
            let Some(haps) = rec.allele_haps(a) else {
                continue;
            };
            for &h in haps {
                let old_s = self.hap2seq[h as usize];
                self.hap2seq[h as usize] = update_map[a][&old_s];
            }
        }

        self.n_seq = next_seq;
        self.seq2cnt.clear();
        self.seq2cnt.resize(self.n_seq as usize, 0);
        for &s in &self.hap2seq {
            self.seq2cnt[s as usize] += 1;
        }

        self.records.push(rec);
        true
    }

    pub fn hap_to_seq(&self) -> IndexArray {
        IndexArray::new(self.hap2seq.clone(), self.n_seq)
    }

    pub fn mapped_bref4_recs(&self, m: &IndexArray) -> Vec<Bref4Rec> {
        self.records.iter().map(|r| r.apply_map(m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use crate::record::RefGTRec;
    use crate::shared::Shared;

    fn marker(pos: u32) -> Shared<Marker> {
        Shared::new(Marker {
            chrom: 0,
            pos,
            id: ".".into(),
            ref_allele: "A".into(),
            alt_alleles: vec!["G".into()],
            qual: None,
            filter: vec![],
            info: ".".into(),
        })
    }

    fn di_allelic(pos: u32, n_haps: usize, carriers: Vec<u32>) -> Bref4Rec {
        let mut allele_to_haps = vec![None; 2];
        allele_to_haps[1] = Some(carriers);
        let rec = RefGTRec::new(marker(pos), n_haps, allele_to_haps).unwrap();
        Bref4Rec::from_ref_gt_rec(&rec)
    }

    #[test]
    fn first_add_always_succeeds_and_partition_count_is_exact() {
        let mut coder = SequenceCoder::new(8, 16);
        assert!(coder.add(di_allelic(1, 8, vec![0, 2, 4, 6])));
        assert_eq!(coder.n_seq(), 2);
        assert_eq!(coder.seq2cnt.iter().sum::<u32>() as usize, 8);
    }

    #[test]
    fn admission_fails_once_capacity_exceeded() {
        let mut coder = SequenceCoder::new(8, 2);
        assert!(coder.add(di_allelic(1, 8, vec![0, 2, 4, 6])));
        // splits the remaining class {1,3,5,7} further -> needs a 3rd seq.
        assert!(!coder.add(di_allelic(2, 8, vec![1, 3])));
        assert_eq!(coder.n_seq(), 2, "failed add must not mutate state");
    }

    #[test]
    fn clear_resets_to_single_class() {
        let mut coder = SequenceCoder::new(4, 16);
        coder.add(di_allelic(1, 4, vec![0, 1]));
        coder.clear();
        assert_eq!(coder.n_seq(), 1);
        assert!(coder.records().is_empty());
    }

    #[test]
    fn composed_maps_reproduce_hap_to_allele() {
        let mut coder = SequenceCoder::new(8, 16);
        let recs: Vec<Bref4Rec> = vec![
            di_allelic(1, 8, vec![0, 2, 4, 6]),
            di_allelic(2, 8, vec![1, 3]),
            di_allelic(3, 8, vec![5, 7]),
        ];
        let originals: Vec<_> = recs.iter().map(|r| r.hap_to_allele()).collect();
        for r in recs {
            assert!(coder.add(r));
        }
        let m = coder.hap_to_seq();
        let mapped = coder.mapped_bref4_recs(&m);
        for (mapped_rec, original) in mapped.iter().zip(&originals) {
            let via_chain = m.compose(&mapped_rec.hap_to_allele());
            assert_eq!(via_chain.values(), original.values());
        }
    }
}
