//! Parses one block's bytes, recomposing each record's map chain (or
//! reading its sparse allele lists) back into a [`RefGTRec`].

use nom::number::streaming::{be_i32, be_i8, be_u32, be_u8};

use crate::bits::packed_array::read_packed_array;
use crate::bits::{read_restricted_int, IndexArray};
use crate::chrom::ChromIdTable;
use crate::error::{Bref4Error, Result};
use crate::marker::Marker;
use crate::record::RefGTRec;
use crate::shared::Shared;
use crate::wire_str::read_wire_string;

type NomErr<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

fn corrupt(_: NomErr<'_>) -> Bref4Error {
    Bref4Error::CorruptBlock("truncated or malformed block".into())
}

/// Decodes every record in a block. `n_haps` is the file-wide haplotype
/// count (`2N`); `chrom_table` is mutated to intern the block's chromosome
/// name if it hasn't been seen yet (e.g. a standalone block being decoded
/// out of pipeline order, such as in a pass-through re-index).
pub fn decode_block(input: &[u8], n_haps: usize, chrom_table: &mut ChromIdTable) -> Result<Vec<RefGTRec>> {
    let (input, n_recs) = be_i32(input).map_err(corrupt)?;
    let (input, _last_pos) = be_i32(input).map_err(corrupt)?;
    let (input, n_maps) = be_u8(input).map_err(corrupt)?;
    let (mut input, chrom_name) = read_wire_string(input).map_err(corrupt)?;
    let chrom_id = chrom_table.intern(&chrom_name);

    let mut records = Vec::with_capacity(n_recs.max(0) as usize);
    let mut current_maps: Vec<Option<IndexArray>> = vec![None; n_maps as usize];
    let mut prev_pos: i64 = 0;

    for _ in 0..n_recs {
        let (rest, delta) = read_restricted_int(input).map_err(corrupt)?;
        input = rest;
        let pos = prev_pos + delta;
        prev_pos = pos;

        let (rest, marker) = Marker::read_non_pos_fields(chrom_id, pos as u32, input).map_err(corrupt)?;
        input = rest;

        let (rest, start_index) = be_i8(input).map_err(corrupt)?;
        input = rest;

        let rec = if start_index >= 0 {
            let start_index = start_index as usize;
            let mut domain_len = if start_index == 0 {
                n_haps
            } else {
                current_maps[start_index - 1]
                    .as_ref()
                    .ok_or_else(|| Bref4Error::CorruptBlock("map chain reused before populated".into()))?
                    .value_size() as usize
            };
            for slot in current_maps[start_index..].iter_mut() {
                let (rest, arr) = read_packed_array(domain_len, input).map_err(corrupt)?;
                input = rest;
                domain_len = arr.value_size() as usize;
                *slot = Some(arr);
            }
            from_hap_to_allele(Shared::new(marker), n_haps, &current_maps)?
        } else {
            let n_alleles = marker.n_alleles();
            let mut allele_to_haps = Vec::with_capacity(n_alleles);
            for _ in 0..n_alleles {
                let (rest, len) = read_restricted_int(input).map_err(corrupt)?;
                input = rest;
                if len < 0 {
                    allele_to_haps.push(None);
                } else {
                    let mut haps = Vec::with_capacity(len as usize);
                    for _ in 0..len {
                        let (rest, h) = be_u32(input).map_err(corrupt)?;
                        input = rest;
                        haps.push(h);
                    }
                    allele_to_haps.push(Some(haps));
                }
            }
            RefGTRec::new(Shared::new(marker), n_haps, allele_to_haps)?
        };
        records.push(rec);
    }
    Ok(records)
}

/// Composes the full map chain (§4.5) over the identity domain `[0, n_haps)`
/// and inverts the resulting `hapToAllele` into a `RefGTRec`. Which allele
/// ends up tagged "null" is an arbitrary storage choice (the allele with the
/// most haplotypes) — it does not affect the genotypes reconstructed.
fn from_hap_to_allele(
    marker: Shared<Marker>,
    n_haps: usize,
    current_maps: &[Option<IndexArray>],
) -> Result<RefGTRec> {
    let mut values: Vec<u32> = (0..n_haps as u32).collect();
    for m in current_maps {
        let m = m
            .as_ref()
            .ok_or_else(|| Bref4Error::CorruptBlock("map chain slot never populated".into()))?;
        values = values.iter().map(|&v| m.get(v as usize)).collect();
    }
    let n_alleles = current_maps
        .last()
        .and_then(|m| m.as_ref())
        .ok_or_else(|| Bref4Error::CorruptBlock("empty map chain for map-coded record".into()))?
        .value_size() as usize;

    let mut allele_to_haps: Vec<Vec<u32>> = vec![Vec::new(); n_alleles];
    for (h, &a) in values.iter().enumerate() {
        allele_to_haps[a as usize].push(h as u32);
    }
    let null_row = allele_to_haps
        .iter()
        .enumerate()
        .max_by_key(|(_, haps)| haps.len())
        .map(|(a, _)| a)
        .unwrap_or(0);
    let allele_to_haps: Vec<Option<Vec<u32>>> = allele_to_haps
        .into_iter()
        .enumerate()
        .map(|(a, haps)| if a == null_row { None } else { Some(haps) })
        .collect();
    RefGTRec::new(marker, n_haps, allele_to_haps)
}
