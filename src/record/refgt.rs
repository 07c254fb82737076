//! `RefGTRec`: a phased reference record in full sample space (domain
//! `[0, 2N)`), as produced by the VCF reader and reconstructed by the block
//! decoder.

use crate::error::{Bref4Error, Result};
use crate::marker::Marker;
use crate::record::AlleleView;
use crate::shared::Shared;

#[derive(Debug, Clone)]
pub struct RefGTRec {
    marker: Shared<Marker>,
    n_haps: usize,
    /// One entry per allele; exactly one is `None` (the null/major allele).
    allele_to_haps: Vec<Option<Vec<u32>>>,
    null_row: usize,
}

impl RefGTRec {
    /// Validates the invariants in §3: exactly one null entry, non-null
    /// lists strictly increasing, disjoint, and exhausting `[0, n_haps)`.
    pub fn new(
        marker: Shared<Marker>,
        n_haps: usize,
        allele_to_haps: Vec<Option<Vec<u32>>>,
    ) -> Result<Self> {
        let mut null_row = None;
        let mut seen = vec![false; n_haps];
        for (a, haps) in allele_to_haps.iter().enumerate() {
            match haps {
                None => {
                    if null_row.is_some() {
                        return Err(Bref4Error::BadVcfLine(
                            "more than one null allele row".into(),
                        ));
                    }
                    null_row = Some(a);
                }
                Some(haps) => {
                    if !haps.windows(2).all(|w| w[0] < w[1]) {
                        return Err(Bref4Error::BadVcfLine(
                            "allele haplotype list not strictly increasing".into(),
                        ));
                    }
                    for &h in haps {
                        let h = h as usize;
                        if h >= n_haps || seen[h] {
                            return Err(Bref4Error::BadVcfLine(
                                "haplotype index out of range or assigned twice".into(),
                            ));
                        }
                        seen[h] = true;
                    }
                }
            }
        }
        let null_row = null_row
            .ok_or_else(|| Bref4Error::BadVcfLine("no null allele row present".into()))?;
        if seen.iter().any(|&s| !s) {
            return Err(Bref4Error::BadVcfLine(
                "non-null allele lists do not exhaust all haplotypes".into(),
            ));
        }
        Ok(Self {
            marker,
            n_haps,
            allele_to_haps,
            null_row,
        })
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn marker_shared(&self) -> Shared<Marker> {
        Shared::clone(&self.marker)
    }
}

impl AlleleView for RefGTRec {
    fn size(&self) -> usize {
        self.n_haps
    }

    fn null_row(&self) -> usize {
        self.null_row
    }

    fn n_alleles(&self) -> usize {
        self.allele_to_haps.len()
    }

    fn allele_haps(&self, a: usize) -> Option<&[u32]> {
        self.allele_to_haps[a].as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;

    fn marker() -> Shared<Marker> {
        Shared::new(Marker {
            chrom: 0,
            pos: 100,
            id: ".".into(),
            ref_allele: "A".into(),
            alt_alleles: vec!["G".into()],
            qual: None,
            filter: vec![],
            info: ".".into(),
        })
    }

    #[test]
    fn builds_and_inverts_hap_to_allele() {
        let rec = RefGTRec::new(marker(), 4, vec![None, Some(vec![1, 3])]).unwrap();
        assert_eq!(rec.null_row(), 0);
        let h2a = rec.hap_to_allele();
        assert_eq!(h2a.values(), &[0, 1, 0, 1]);
        assert_eq!(rec.get(1), 1);
        assert_eq!(rec.get(0), 0);
    }

    #[test]
    fn rejects_overlapping_lists() {
        let err = RefGTRec::new(marker(), 4, vec![None, Some(vec![1, 1])]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_missing_null_row() {
        let err = RefGTRec::new(marker(), 2, vec![Some(vec![0]), Some(vec![1])]);
        assert!(err.is_err());
    }

    #[test]
    fn all_haps_on_one_allele_leaves_null_list_empty() {
        let rec = RefGTRec::new(marker(), 3, vec![None, Some(vec![0, 1, 2])]).unwrap();
        assert_eq!(rec.get(0), 1);
        assert_eq!(rec.hap_to_allele().values(), &[1, 1, 1]);
    }
}
