//! Drives a single conversion: detects format by file suffix, enforces
//! chromosome contiguity across the input, and routes records between the
//! VCF front-end and the bref4 block codec (§4.7).

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::block::{decode_block, BlockEncoderConfig, BlockWriter};
use crate::chrom::ChromIdTable;
use crate::error::{Bref4Error, Result};
use crate::framer::{self, FileWriter};
use crate::vcf::{VcfReader, VcfWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Vcf,
    Bref4,
}

pub fn detect_format(path: &str) -> Result<Format> {
    if path == "-" || path.ends_with(".vcf") || path.ends_with(".vcf.gz") || path.ends_with(".vcf.bgz")
    {
        Ok(Format::Vcf)
    } else if path.ends_with(".bref4") {
        Ok(Format::Bref4)
    } else {
        Err(Bref4Error::BadArguments(format!(
            "cannot determine file format from path {path:?} (expected .vcf, .vcf.gz, .vcf.bgz, .bref4, or -)"
        )))
    }
}

/// Rejects a chromosome id that reappears after some other chromosome has
/// already closed out its run (§3, §4.7).
pub struct ContiguityGuard {
    current: Option<String>,
    seen: HashSet<String>,
}

impl ContiguityGuard {
    pub fn new() -> Self {
        Self {
            current: None,
            seen: HashSet::new(),
        }
    }

    pub fn check(&mut self, chrom: &str) -> Result<()> {
        if self.current.as_deref() == Some(chrom) {
            return Ok(());
        }
        if self.seen.contains(chrom) {
            return Err(Bref4Error::NonContiguousChromosome {
                chrom: chrom.to_owned(),
                after: self.current.clone().unwrap_or_default(),
            });
        }
        if let Some(prev) = self.current.take() {
            self.seen.insert(prev);
        }
        self.current = Some(chrom.to_owned());
        Ok(())
    }
}

impl Default for ContiguityGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn open_input(path: &str) -> Result<Box<dyn BufRead>> {
    let raw: Box<dyn Read> = if path == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(path)?)
    };
    if path.ends_with(".gz") || path.ends_with(".bgz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(raw))))
    } else {
        Ok(Box::new(BufReader::new(raw)))
    }
}

fn open_output(path: &str) -> Result<Box<dyn Write>> {
    let raw: Box<dyn Write> = if path == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(File::create(path)?)
    };
    if path.ends_with(".gz") || path.ends_with(".bgz") {
        Ok(Box::new(GzEncoder::new(raw, Compression::default())))
    } else {
        Ok(raw)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bits_per_level: u32,
    pub max_nonmajor: Option<usize>,
}

/// Runs one end-to-end conversion. `command_line` is the quoted invocation
/// inserted as a `##bref4Command=` meta-line on any VCF output.
pub fn run(in_path: &str, out_path: &str, config: PipelineConfig, command_line: &str) -> Result<()> {
    if in_path == out_path && in_path != "-" {
        return Err(Bref4Error::BadArguments(
            "in and out must not name the same file".into(),
        ));
    }
    match (detect_format(in_path)?, detect_format(out_path)?) {
        (Format::Bref4, Format::Bref4) => bref4_passthrough(in_path, out_path),
        (Format::Vcf, Format::Bref4) => vcf_to_bref4(in_path, out_path, config),
        (Format::Bref4, Format::Vcf) => bref4_to_vcf(in_path, out_path, command_line),
        (Format::Vcf, Format::Vcf) => vcf_to_vcf(in_path, out_path, command_line),
    }
}

fn vcf_to_bref4(in_path: &str, out_path: &str, config: PipelineConfig) -> Result<()> {
    let input = open_input(in_path)?;
    let mut reader = VcfReader::new(input)?;
    let header = reader.header().clone();
    let n_haps = 2 * header.sample_ids.len();

    let mut writer = BlockWriter::new(
        n_haps,
        BlockEncoderConfig {
            bits_per_level: config.bits_per_level,
            max_nonmajor: config.max_nonmajor,
        },
    )?;
    let mut guard = ContiguityGuard::new();

    while let Some(rec) = reader.next() {
        let rec = rec?;
        let chrom_name = reader.chrom_table().name(rec.marker().chrom).to_owned();
        guard.check(&chrom_name)?;
        writer.add_record(rec, reader.chrom_table())?;
    }

    let blocks = writer.finish(reader.chrom_table())?;
    let output = open_output(out_path)?;
    let mut file_writer = FileWriter::new(output, &header.meta_info_lines, &header.sample_ids)?;
    for block in &blocks {
        file_writer.write_block(block)?;
    }
    file_writer.finish()?;
    Ok(())
}

fn bref4_to_vcf(in_path: &str, out_path: &str, command_line: &str) -> Result<()> {
    let mut input_buf = Vec::new();
    open_input(in_path)?.read_to_end(&mut input_buf)?;
    let (rest, header) = framer::read_file_header(&input_buf)?;
    let (_rest, blocks) = framer::read_blocks(rest)?;

    let n_haps = 2 * header.sample_ids.len();
    let mut chrom_table = ChromIdTable::new();
    let output = open_output(out_path)?;
    let mut writer = VcfWriter::new(output, &header.meta_info_lines, &header.sample_ids, command_line)?;

    let mut guard = ContiguityGuard::new();
    for block in &blocks {
        let (chrom_name, _, _) = framer::peek_block_header(block)?;
        guard.check(&chrom_name)?;
        let records = decode_block(block, n_haps, &mut chrom_table)?;
        for rec in &records {
            writer.write_record(rec, &chrom_table)?;
        }
    }
    Ok(())
}

fn bref4_passthrough(in_path: &str, out_path: &str) -> Result<()> {
    let mut input_buf = Vec::new();
    open_input(in_path)?.read_to_end(&mut input_buf)?;
    let (rest, header) = framer::read_file_header(&input_buf)?;
    let (_rest, blocks) = framer::read_blocks(rest)?;

    let mut guard = ContiguityGuard::new();
    for block in &blocks {
        let (chrom_name, _, _) = framer::peek_block_header(block)?;
        guard.check(&chrom_name)?;
    }

    let output = open_output(out_path)?;
    let mut writer = FileWriter::new(output, &header.meta_info_lines, &header.sample_ids)?;
    for block in &blocks {
        writer.write_block(block)?;
    }
    writer.finish()?;
    Ok(())
}

fn vcf_to_vcf(in_path: &str, out_path: &str, command_line: &str) -> Result<()> {
    let input = open_input(in_path)?;
    let mut reader = VcfReader::new(input)?;
    let header = reader.header().clone();
    let output = open_output(out_path)?;
    let mut writer = VcfWriter::new(output, &header.meta_info_lines, &header.sample_ids, command_line)?;
    let mut guard = ContiguityGuard::new();

    while let Some(rec) = reader.next() {
        let rec = rec?;
        let chrom_name = reader.chrom_table().name(rec.marker().chrom).to_owned();
        guard.check(&chrom_name)?;
        writer.write_record(&rec, reader.chrom_table())?;
    }
    Ok(())
}
