use std::process::ExitCode;

use itertools::Itertools;

use bref4::cli::Args;
use bref4::pipeline;

fn main() -> ExitCode {
    env_logger::init();
    let command_line = format!("bref4 {}", std::env::args().skip(1).join(" "));
    match run(&command_line) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("bref4: error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command_line: &str) -> anyhow::Result<()> {
    let args = Args::parse_from_env()?;
    if let Some(pool_size) = Some(args.n_threads).filter(|&n| n > 1) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size as usize)
            .build_global()
            .ok();
    }
    log::info!("converting {} -> {}", args.in_path, args.out_path);
    pipeline::run(&args.in_path, &args.out_path, args.pipeline_config(), command_line)?;
    log::info!("done");
    Ok(())
}
