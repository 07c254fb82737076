//! Writes `RefGTRec`s back out as phased diploid VCF text (§4.8, the
//! bref4 -> VCF direction).

use std::io::Write;

use crate::chrom::ChromIdTable;
use crate::error::Result;
use crate::record::{AlleleView, RefGTRec};

pub struct VcfWriter<W: Write> {
    out: W,
}

impl<W: Write> VcfWriter<W> {
    pub fn new(
        mut out: W,
        meta_info_lines: &[String],
        sample_ids: &[String],
        command: &str,
    ) -> Result<Self> {
        for line in meta_info_lines {
            writeln!(out, "{line}")?;
        }
        writeln!(out, "##bref4Command=\"{command}\"")?;
        write!(out, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")?;
        for s in sample_ids {
            write!(out, "\t{s}")?;
        }
        writeln!(out)?;
        Ok(Self { out })
    }

    pub fn write_record(&mut self, rec: &RefGTRec, chrom_table: &ChromIdTable) -> Result<()> {
        let marker = rec.marker();
        let qual = marker
            .qual
            .map(|q| q.to_string())
            .unwrap_or_else(|| ".".to_owned());
        let filter = if marker.filter.is_empty() {
            ".".to_owned()
        } else {
            marker.filter.join(";")
        };
        write!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\tGT",
            chrom_table.name(marker.chrom),
            marker.pos,
            marker.id,
            marker.ref_allele,
            marker.alt_alleles.join(","),
            qual,
            filter,
            marker.info,
        )?;
        let n_samples = rec.size() / 2;
        for sample in 0..n_samples {
            let a0 = rec.get((2 * sample) as u32);
            let a1 = rec.get((2 * sample + 1) as u32);
            write!(self.out, "\t{a0}|{a1}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chrom::ChromIdTable;
    use crate::marker::Marker;
    use crate::shared::Shared;

    #[test]
    fn writes_header_and_one_record() {
        let mut table = ChromIdTable::new();
        let chrom = table.intern("chr1");
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
        let rec = RefGTRec::new(marker, 2, vec![None, Some(vec![1])]).unwrap();

        let mut buf = Vec::new();
        {
            let mut writer = VcfWriter::new(
                &mut buf,
                &["##fileformat=VCFv4.2".to_owned()],
                &["S".to_owned()],
                "bref4 in=a.vcf out=b.bref4",
            )
            .unwrap();
            writer.write_record(&rec, &table).unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("##fileformat=VCFv4.2\n"));
        assert!(text.contains("##bref4Command="));
        assert!(text.contains("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS\n"));
        assert!(text.contains("chr1\t100\t.\tA\tG\t.\t.\t.\tGT\t0|1\n"));
    }
}
