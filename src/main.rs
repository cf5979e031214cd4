use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    let cli = bakebook::cli::Cli::parse();

    match cli.command {
        // Logging to the book root starts only once the run is confirmed.
        bakebook::cli::Command::Bake(args) => {
            bakebook::bake::run(args, cli.verbose, bakebook::bake::confirm_start)
                .context("bake")?;
        }
        bakebook::cli::Command::Files(args) => {
            bakebook::logging::init(cli.verbose, None).context("init logging")?;
            tracing::debug!(?args, "parsed cli");
            bakebook::inspect::files(args).context("files")?;
        }
        bakebook::cli::Command::Rewrite(args) => {
            bakebook::logging::init(cli.verbose, None).context("init logging")?;
            tracing::debug!(?args, "parsed cli");
            bakebook::inspect::rewrite(args).context("rewrite")?;
        }
    }

    Ok(())
}
