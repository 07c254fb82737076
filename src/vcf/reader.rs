//! Line-oriented phased-diploid VCF parser (§4.8). Mirrors the teacher's own
//! `reader.rs`/`parser.rs` split (a `Header` extracted up front, a record
//! iterator after it) but trades the binary `nom` parser for plain
//! line/tab splitting, matching how textual VCF is actually shaped.

use std::collections::HashSet;
use std::io::BufRead;

use crate::chrom::ChromIdTable;
use crate::error::{Bref4Error, Result};
use crate::marker::Marker;
use crate::record::RefGTRec;
use crate::shared::Shared;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcfHeader {
    pub meta_info_lines: Vec<String>,
    pub sample_ids: Vec<String>,
}

pub struct VcfReader<R> {
    lines: std::io::Lines<R>,
    header: VcfHeader,
    chrom_table: ChromIdTable,
}

impl<R: BufRead> VcfReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let mut meta_info_lines = Vec::new();
        let sample_ids = loop {
            let line = lines.next().ok_or_else(|| {
                Bref4Error::BadVcfLine("unexpected end of file before column header".into())
            })??;
            if let Some(rest) = line.strip_prefix("##") {
                meta_info_lines.push(format!("##{rest}"));
                continue;
            }
            if let Some(rest) = line.strip_prefix('#') {
                let cols: Vec<&str> = rest.split('\t').collect();
                if cols.len() <= 9 {
                    return Err(Bref4Error::BadVcfLine(
                        "column header missing sample columns".into(),
                    ));
                }
                let samples: Vec<String> = cols[9..].iter().map(|s| s.to_string()).collect();
                let mut seen = HashSet::new();
                for s in &samples {
                    if !seen.insert(s.clone()) {
                        return Err(Bref4Error::BadVcfLine(format!("duplicate sample id {s}")));
                    }
                }
                break samples;
            }
            return Err(Bref4Error::BadVcfLine(
                "expected a meta-info or column header line".into(),
            ));
        };
        if sample_ids.len() as u64 > (1 << 30) - 1 {
            return Err(Bref4Error::TooManySamples(2 * sample_ids.len()));
        }
        Ok(Self {
            lines,
            header: VcfHeader {
                meta_info_lines,
                sample_ids,
            },
            chrom_table: ChromIdTable::new(),
        })
    }

    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    pub fn chrom_table(&self) -> &ChromIdTable {
        &self.chrom_table
    }

    fn parse_line(&mut self, line: &str) -> Result<RefGTRec> {
        let n_samples = self.header.sample_ids.len();
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() != 9 + n_samples {
            return Err(Bref4Error::BadVcfLine(format!(
                "expected {} columns, got {}",
                9 + n_samples,
                cols.len()
            )));
        }

        let chrom = self.chrom_table.intern(cols[0]);
        let pos: u32 = cols[1]
            .parse()
            .map_err(|_| Bref4Error::BadVcfLine(format!("bad POS {}", cols[1])))?;
        let id = cols[2].to_owned();
        let ref_allele = cols[3].to_owned();
        let alt_alleles: Vec<String> = cols[4].split(',').map(|s| s.to_owned()).collect();
        let qual = if cols[5] == "." {
            None
        } else {
            Some(
                cols[5]
                    .parse::<f32>()
                    .map_err(|_| Bref4Error::BadVcfLine(format!("bad QUAL {}", cols[5])))?,
            )
        };
        let filter: Vec<String> = if cols[6] == "." {
            Vec::new()
        } else {
            cols[6].split(';').map(|s| s.to_owned()).collect()
        };
        let info = cols[7].to_owned();
        let format: Vec<&str> = cols[8].split(':').collect();
        let gt_index = format
            .iter()
            .position(|&f| f == "GT")
            .ok_or_else(|| Bref4Error::BadVcfLine("FORMAT missing GT".into()))?;

        let n_alleles = 1 + alt_alleles.len();
        let n_haps = 2 * n_samples;
        let mut allele_haps: Vec<Vec<u32>> = vec![Vec::new(); n_alleles];
        for (sample_idx, sample_col) in cols[9..].iter().enumerate() {
            let gt_field = sample_col
                .split(':')
                .nth(gt_index)
                .ok_or_else(|| Bref4Error::BadVcfLine("sample column missing GT subfield".into()))?;
            if gt_field.contains('/') || gt_field.contains('.') {
                return Err(Bref4Error::BadVcfLine(format!(
                    "unphased or missing genotype {gt_field}"
                )));
            }
            let mut alleles = gt_field.split('|');
            let a0 = alleles
                .next()
                .ok_or_else(|| Bref4Error::BadVcfLine("empty GT".into()))?;
            let a1 = alleles
                .next()
                .ok_or_else(|| Bref4Error::BadVcfLine(format!("non-diploid GT {gt_field}")))?;
            if alleles.next().is_some() {
                return Err(Bref4Error::BadVcfLine(format!("non-diploid GT {gt_field}")));
            }
            for (hap_offset, allele_str) in [a0, a1].into_iter().enumerate() {
                let allele: usize = allele_str
                    .parse()
                    .map_err(|_| Bref4Error::BadVcfLine(format!("bad GT allele {allele_str}")))?;
                if allele >= n_alleles {
                    return Err(Bref4Error::BadVcfLine(format!(
                        "GT allele {allele} out of range for {n_alleles} alleles"
                    )));
                }
                allele_haps[allele].push((2 * sample_idx + hap_offset) as u32);
            }
        }

        let null_row = allele_haps
            .iter()
            .enumerate()
            .max_by_key(|(_, haps)| haps.len())
            .map(|(a, _)| a)
            .unwrap_or(0);
        let allele_to_haps: Vec<Option<Vec<u32>>> = allele_haps
            .into_iter()
            .enumerate()
            .map(|(a, haps)| if a == null_row { None } else { Some(haps) })
            .collect();

        let marker = Shared::new(Marker {
            chrom,
            pos,
            id,
            ref_allele,
            alt_alleles,
            qual,
            filter,
            info,
        });
        RefGTRec::new(marker, n_haps, allele_to_haps)
    }
}

impl<R: BufRead> Iterator for VcfReader<R> {
    type Item = Result<RefGTRec>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(Bref4Error::Io(e))),
            };
            if line.is_empty() {
                continue;
            }
            return Some(self.parse_line(&line));
        }
    }
}
