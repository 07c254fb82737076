//! Marker: the non-genotype content of a VCF row (chromosome, position,
//! id, alleles, quality, filter, info). Immutable once built.

use nom::number::streaming::{be_f32, be_u8};
use nom::IResult;

use crate::bits::{read_restricted_int, write_restricted_int};
use crate::chrom::ChromId;
use crate::error::Result;
use crate::wire_str::{read_wire_string, write_wire_string};

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub chrom: ChromId,
    pub pos: u32,
    pub id: String,
    pub ref_allele: String,
    pub alt_alleles: Vec<String>,
    pub qual: Option<f32>,
    pub filter: Vec<String>,
    pub info: String,
}

impl Marker {
    pub fn n_alleles(&self) -> usize {
        1 + self.alt_alleles.len()
    }

    pub fn allele(&self, i: usize) -> &str {
        if i == 0 {
            &self.ref_allele
        } else {
            &self.alt_alleles[i - 1]
        }
    }

    /// Emits every field except `pos`; the caller writes `pos` separately
    /// as a delta from the previous marker in the block.
    pub fn write_non_pos_fields(&self, out: &mut Vec<u8>) -> Result<()> {
        write_wire_string(&self.id, out)?;
        write_wire_string(&self.ref_allele, out)?;
        write_restricted_int(self.alt_alleles.len() as i64, out)?;
        for alt in &self.alt_alleles {
            write_wire_string(alt, out)?;
        }
        match self.qual {
            Some(q) => {
                out.push(1);
                out.extend_from_slice(&q.to_be_bytes());
            }
            None => out.push(0),
        }
        write_restricted_int(self.filter.len() as i64, out)?;
        for f in &self.filter {
            write_wire_string(f, out)?;
        }
        write_wire_string(&self.info, out)?;
        Ok(())
    }

    /// Inverse of [`write_non_pos_fields`], given the already-decoded
    /// `chrom` and `pos`.
    pub fn read_non_pos_fields(chrom: ChromId, pos: u32, input: &[u8]) -> IResult<&[u8], Marker> {
        let (input, id) = read_wire_string(input)?;
        let (input, ref_allele) = read_wire_string(input)?;
        let (input, n_alt) = read_restricted_int(input)?;
        let mut input = input;
        let mut alt_alleles = Vec::with_capacity(n_alt as usize);
        for _ in 0..n_alt {
            let (rest, alt) = read_wire_string(input)?;
            input = rest;
            alt_alleles.push(alt);
        }
        let (input, has_qual) = be_u8(input)?;
        let (input, qual) = if has_qual == 1 {
            let (input, q) = be_f32(input)?;
            (input, Some(q))
        } else {
            (input, None)
        };
        let (input, n_filter) = read_restricted_int(input)?;
        let mut input = input;
        let mut filter = Vec::with_capacity(n_filter as usize);
        for _ in 0..n_filter {
            let (rest, f) = read_wire_string(input)?;
            input = rest;
            filter.push(f);
        }
        let (input, info) = read_wire_string(input)?;
        Ok((
            input,
            Marker {
                chrom,
                pos,
                id,
                ref_allele,
                alt_alleles,
                qual,
                filter,
                info,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_non_pos_fields() {
        let marker = Marker {
            chrom: 0,
            pos: 100,
            id: ".".into(),
            ref_allele: "A".into(),
            alt_alleles: vec!["G".into(), "T".into()],
            qual: Some(30.0),
            filter: vec!["PASS".into()],
            info: ".".into(),
        };
        let mut buf = Vec::new();
        marker.write_non_pos_fields(&mut buf).unwrap();
        let (rest, got) = Marker::read_non_pos_fields(0, 100, &buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(got, marker);
    }

    #[test]
    fn roundtrips_missing_qual() {
        let marker = Marker {
            chrom: 3,
            pos: 1,
            id: "rs1".into(),
            ref_allele: "C".into(),
            alt_alleles: vec!["A".into()],
            qual: None,
            filter: vec![],
            info: "AF=0.5".into(),
        };
        let mut buf = Vec::new();
        marker.write_non_pos_fields(&mut buf).unwrap();
        let (_, got) = Marker::read_non_pos_fields(3, 1, &buf).unwrap();
        assert_eq!(got, marker);
    }
}
