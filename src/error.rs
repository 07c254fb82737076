use thiserror::Error;

/// Categorical errors surfaced by the bref4 library.
///
/// None of these are locally recovered: every call site that produces one
/// propagates it to `main`, which prints a single diagnostic and exits
/// non-zero. The tool is a batch converter, so a partial output is never
/// more useful than no output.
#[derive(Debug, Error)]
pub enum Bref4Error {
    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("bad VCF line: {0}")]
    BadVcfLine(String),

    #[error("chromosome {chrom:?} reappeared after chromosome {after:?}")]
    NonContiguousChromosome { chrom: String, after: String },

    #[error("too many samples: {0} haplotypes exceeds 2^30 - 1")]
    TooManySamples(usize),

    #[error("corrupt block: {0}")]
    CorruptBlock(String),

    #[error("value {value} does not fit the restricted-int range")]
    BadEncoding { value: i64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Bref4Error>;
