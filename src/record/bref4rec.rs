//! `Bref4Rec`: the sequence coder's working view of a record. Two storage
//! variants exist purely as a space optimization — di-allelic records need
//! only the non-null carrier list, multi-allelic records need the full
//! `alleleToHaps` table — but both expose the same `AlleleView` surface.

use crate::bits::IndexArray;
use crate::marker::Marker;
use crate::record::{refgt::RefGTRec, AlleleView};
use crate::shared::Shared;

#[derive(Debug, Clone)]
pub enum Bref4Rec {
    DiAllelic {
        marker: Shared<Marker>,
        size: u32,
        null_allele: u8,
        haps: Vec<u32>,
    },
    MultiAllelic {
        marker: Shared<Marker>,
        size: u32,
        allele_to_haps: Vec<Option<Vec<u32>>>,
        null_row: usize,
    },
}

fn sorted_dedup(mut v: Vec<u32>) -> Vec<u32> {
    v.sort_unstable();
    v.dedup();
    v
}

impl Bref4Rec {
    pub fn from_ref_gt_rec(rec: &RefGTRec) -> Self {
        let marker = rec.marker_shared();
        let size = rec.size() as u32;
        if rec.n_alleles() == 2 {
            let null_allele = rec.null_row() as u8;
            let non_null = 1 - null_allele as usize;
            let haps = rec.allele_haps(non_null).map(|h| h.to_vec()).unwrap_or_default();
            Bref4Rec::DiAllelic {
                marker,
                size,
                null_allele,
                haps,
            }
        } else {
            let allele_to_haps = (0..rec.n_alleles())
                .map(|a| rec.allele_haps(a).map(|h| h.to_vec()))
                .collect();
            Bref4Rec::MultiAllelic {
                marker,
                size,
                allele_to_haps,
                null_row: rec.null_row(),
            }
        }
    }

    pub fn marker(&self) -> &Marker {
        match self {
            Bref4Rec::DiAllelic { marker, .. } => marker,
            Bref4Rec::MultiAllelic { marker, .. } => marker,
        }
    }

    /// Applies `m` (`self.size() == m.len()`), producing a new record in
    /// `m`'s value space. Each resulting list is `sort(dedup(...))` of the
    /// mapped indices, per the `applyMap` contract in §4.2.
    pub fn apply_map(&self, m: &IndexArray) -> Bref4Rec {
        let new_size = m.value_size();
        match self {
            Bref4Rec::DiAllelic {
                marker,
                null_allele,
                haps,
                ..
            } => Bref4Rec::DiAllelic {
                marker: Shared::clone(marker),
                size: new_size,
                null_allele: *null_allele,
                haps: sorted_dedup(haps.iter().map(|&h| m.get(h as usize)).collect()),
            },
            Bref4Rec::MultiAllelic {
                marker,
                allele_to_haps,
                null_row,
                ..
            } => Bref4Rec::MultiAllelic {
                marker: Shared::clone(marker),
                size: new_size,
                allele_to_haps: allele_to_haps
                    .iter()
                    .map(|haps| {
                        haps.as_ref()
                            .map(|haps| sorted_dedup(haps.iter().map(|&h| m.get(h as usize)).collect()))
                    })
                    .collect(),
                null_row: *null_row,
            },
        }
    }
}

impl AlleleView for Bref4Rec {
    fn size(&self) -> usize {
        match self {
            Bref4Rec::DiAllelic { size, .. } => *size as usize,
            Bref4Rec::MultiAllelic { size, .. } => *size as usize,
        }
    }

    fn null_row(&self) -> usize {
        match self {
            Bref4Rec::DiAllelic { null_allele, .. } => *null_allele as usize,
            Bref4Rec::MultiAllelic { null_row, .. } => *null_row,
        }
    }

    fn n_alleles(&self) -> usize {
        match self {
            Bref4Rec::DiAllelic { .. } => 2,
            Bref4Rec::MultiAllelic { allele_to_haps, .. } => allele_to_haps.len(),
        }
    }

    fn allele_haps(&self, a: usize) -> Option<&[u32]> {
        match self {
            Bref4Rec::DiAllelic {
                null_allele, haps, ..
            } => {
                if a == *null_allele as usize {
                    None
                } else {
                    Some(haps.as_slice())
                }
            }
            Bref4Rec::MultiAllelic { allele_to_haps, .. } => allele_to_haps[a].as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RefGTRec;

    fn marker() -> Shared<Marker> {
        Shared::new(Marker {
            chrom: 0,
            pos: 1,
            id: ".".into(),
            ref_allele: "A".into(),
            alt_alleles: vec!["G".into()],
            qual: None,
            filter: vec![],
            info: ".".into(),
        })
    }

    #[test]
    fn apply_map_dedups_and_sorts() {
        let rec = RefGTRec::new(marker(), 4, vec![None, Some(vec![1, 2, 3])]).unwrap();
        let bref = Bref4Rec::from_ref_gt_rec(&rec);
        // map haps {0,1} -> seq 0, {2,3} -> seq 1
        let m = IndexArray::new(vec![0, 0, 1, 1], 2);
        let mapped = bref.apply_map(&m);
        assert_eq!(mapped.size(), 2);
        assert_eq!(mapped.allele_haps(1), Some([0, 1].as_slice()));
    }

    #[test]
    fn di_allelic_roundtrips_hap_to_allele() {
        let rec = RefGTRec::new(marker(), 4, vec![None, Some(vec![1, 3])]).unwrap();
        let bref = Bref4Rec::from_ref_gt_rec(&rec);
        assert_eq!(bref.hap_to_allele().values(), rec.hap_to_allele().values());
    }
}
