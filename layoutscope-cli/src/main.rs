mod app;
mod commands;
mod output;

use clap::Parser;
use layoutscope::protocol::channel::LogWriter;

use crate::app::{normalize_args, Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse_from(normalize_args(std::env::args()));

    let level = if cli.global.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // The worker logs into its log channel; everything else shows info+ on stderr unless
    // --json. --verbose enables debug; RUST_LOG overrides.
    if let Command::Worker {
        id,
        wait,
        idle_timeout,
        build,
    } = &cli.command
    {
        let (writer, receiver) = LogWriter::pair();
        env_logger::Builder::new()
            .filter_module("layoutscope", level)
            .parse_default_env()
            .target(env_logger::Target::Pipe(Box::new(writer)))
            .format_timestamp_millis()
            .init();
        return commands::worker::run(id, *wait, *idle_timeout, build, receiver);
    }

    if !cli.global.json {
        env_logger::Builder::new()
            .filter_module("layoutscope", level)
            .filter_module("worker", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Analyze {
            path,
            type_name,
            assembly,
            no_padding,
            build,
        } => commands::analyze::run(
            path,
            type_name,
            assembly.as_deref(),
            !*no_padding,
            build,
            &cli.global,
        ),
        Command::Query {
            path,
            type_name,
            assembly,
            worker,
            no_padding,
            build,
        } => commands::query::run(
            path,
            type_name,
            assembly.as_deref(),
            worker.as_deref(),
            !*no_padding,
            build,
            &cli.global,
        ),
        Command::Worker { .. } => Ok(()),
    }
}
