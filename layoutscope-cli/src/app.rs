use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use layoutscope::{layout::Platform, session::BuildSettings};

/// layoutscope - memory layout of .NET types: field offsets, sizes and padding
#[derive(Debug, Parser)]
#[command(name = "layoutscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Configuration {
    Debug,
    Release,
}

/// Target platform and build output selection.
#[derive(Debug, Args)]
pub struct BuildOptions {
    /// Platform layouts are computed for: x86, x64 or arm64.
    #[arg(long, default_value = "x64")]
    pub platform: Platform,

    /// Build configuration of project outputs.
    #[arg(long, value_enum, default_value = "debug", ignore_case = true)]
    pub configuration: Configuration,

    /// Build platform segment of project outputs (e.g. x64); AnyCPU has none.
    #[arg(long, default_value = layoutscope::session::ANY_CPU)]
    pub build_platform: String,

    /// Target framework of project outputs (e.g. net8.0); read from the project if unset.
    #[arg(long)]
    pub framework: Option<String>,
}

impl BuildOptions {
    pub fn settings(&self) -> BuildSettings {
        BuildSettings {
            debug: self.configuration == Configuration::Debug,
            platform_name: self.build_platform.clone(),
            target_framework: self.framework.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the layout of a type in this process.
    Analyze {
        /// Assembly, output directory or project file.
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Full type name, e.g. Ns.Outer+Inner or Ns.Pair`2[System.Int32,Ns.Point].
        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Simple name of the defining assembly; derived from PATH if unset.
        #[arg(long)]
        assembly: Option<String>,

        /// Hide padding rows.
        #[arg(long)]
        no_padding: bool,

        #[command(flatten)]
        build: BuildOptions,
    },

    /// Compute the layout of a type through a worker process.
    Query {
        /// Assembly, output directory or project file.
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Full type name, e.g. Ns.Outer+Inner.
        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Simple name of the defining assembly; derived from PATH if unset.
        #[arg(long)]
        assembly: Option<String>,

        /// Worker executable; this executable if unset.
        #[arg(long, value_name = "FILE")]
        worker: Option<PathBuf>,

        /// Hide padding rows.
        #[arg(long)]
        no_padding: bool,

        #[command(flatten)]
        build: BuildOptions,
    },

    /// Run as a worker process serving a client over named channels.
    Worker {
        /// Channel id shared with the client (also accepted as -id:<value>).
        #[arg(long)]
        id: String,

        /// Wait for a debugger to attach before binding the channels.
        #[arg(long)]
        wait: bool,

        /// Seconds without a request before the worker exits.
        #[arg(long, default_value_t = 600)]
        idle_timeout: u64,

        #[command(flatten)]
        build: BuildOptions,
    },
}

/// Rewrite the legacy `-id:<value>` and `-wait` worker arguments into their long forms.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            if let Some(id) = arg.strip_prefix("-id:") {
                format!("--id={id}")
            } else if arg == "-wait" {
                "--wait".to_string()
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(normalize_args(args.iter().map(|arg| (*arg).to_string())))
    }

    #[test]
    fn legacy_worker_arguments() {
        let cli = parse(&["layoutscope", "worker", "-id:1234-0", "-wait", "--platform", "x86"]);
        let Command::Worker {
            id, wait, build, ..
        } = cli.command
        else {
            panic!("expected the worker command");
        };
        assert_eq!(id, "1234-0");
        assert!(wait);
        assert_eq!(build.platform, Platform::X86);
        assert!(build.settings().debug);
    }

    #[test]
    fn analyze_arguments() {
        let cli = parse(&[
            "layoutscope",
            "--json",
            "analyze",
            "App/App.csproj",
            "App.Order",
            "--configuration",
            "release",
            "--framework",
            "net8.0",
        ]);
        assert!(cli.global.json);
        let Command::Analyze {
            type_name, build, ..
        } = cli.command
        else {
            panic!("expected the analyze command");
        };
        assert_eq!(type_name, "App.Order");
        let settings = build.settings();
        assert!(!settings.debug);
        assert_eq!(settings.target_framework.as_deref(), Some("net8.0"));
    }
}
