pub mod bits;
pub mod block;
pub mod chrom;
pub mod cli;
pub mod error;
pub mod framer;
pub mod marker;
pub mod pipeline;
pub mod record;
pub mod seqcoder;
pub mod shared;
pub mod vcf;
pub mod wire_str;
