//! Command-line argument parsing. Built on `clap`'s derive API but keeps the
//! `key=value` grammar (§6) via a custom `value_parser` rather than
//! switching to `--flag value` syntax.

use std::collections::HashMap;
use std::str::FromStr;

use clap::Parser;

use crate::error::{Bref4Error, Result};
use crate::pipeline::PipelineConfig;

fn parse_kv(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

/// Converts phased, non-missing diploid VCF to and from the bref4 binary
/// format.
#[derive(Parser, Debug)]
#[command(name = "bref4", version, about)]
pub struct RawArgs {
    /// in=<path|->  out=<path|->  [nthreads=N] [bits-per-level=N] [max-nonmajor=N]
    #[arg(value_parser = parse_kv)]
    pub args: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Args {
    pub in_path: String,
    pub out_path: String,
    pub n_threads: u32,
    pub bits_per_level: u32,
    pub max_nonmajor: Option<usize>,
}

fn parse_opt<T: FromStr>(kv: &mut HashMap<String, String>, key: &str, default: T) -> Result<T> {
    match kv.remove(key) {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| Bref4Error::BadArguments(format!("bad {key}={v}"))),
        None => Ok(default),
    }
}

impl Args {
    pub fn parse_from_env() -> Result<Self> {
        Self::from_raw(RawArgs::parse())
    }

    fn from_raw(raw: RawArgs) -> Result<Self> {
        let mut kv: HashMap<String, String> = HashMap::new();
        for (k, v) in raw.args {
            if kv.insert(k.clone(), v).is_some() {
                return Err(Bref4Error::BadArguments(format!("duplicate argument {k}")));
            }
        }

        let in_path = kv
            .remove("in")
            .ok_or_else(|| Bref4Error::BadArguments("missing required argument in=<path>".into()))?;
        let out_path = kv
            .remove("out")
            .ok_or_else(|| Bref4Error::BadArguments("missing required argument out=<path>".into()))?;
        let n_threads: u32 = parse_opt(&mut kv, "nthreads", 1)?;
        let bits_per_level: u32 = parse_opt(&mut kv, "bits-per-level", 2)?;
        let max_nonmajor = match kv.remove("max-nonmajor") {
            Some(v) => Some(
                v.parse::<usize>()
                    .map_err(|_| Bref4Error::BadArguments(format!("bad max-nonmajor={v}")))?,
            ),
            None => None,
        };

        if let Some((k, _)) = kv.into_iter().next() {
            return Err(Bref4Error::BadArguments(format!("unrecognized argument {k}")));
        }
        if n_threads == 0 {
            return Err(Bref4Error::BadArguments("nthreads must be >= 1".into()));
        }
        if bits_per_level == 0 {
            return Err(Bref4Error::BadArguments("bits-per-level must be >= 1".into()));
        }
        if in_path == out_path && in_path != "-" {
            return Err(Bref4Error::BadArguments(
                "in and out must not name the same file".into(),
            ));
        }

        Ok(Self {
            in_path,
            out_path,
            n_threads,
            bits_per_level,
            max_nonmajor,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            bits_per_level: self.bits_per_level,
            max_nonmajor: self.max_nonmajor,
        }
    }
}
