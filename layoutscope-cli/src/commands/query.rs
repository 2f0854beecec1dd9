use std::path::{Path, PathBuf};

use anyhow::Context;
use layoutscope::protocol::{HostRunner, RunnerConfig};

use crate::{
    app::{BuildOptions, GlobalOptions},
    commands::common::assembly_name,
    output::{print_layout, print_output},
};

pub fn run(
    path: &Path,
    type_name: &str,
    assembly: Option<&str>,
    worker: Option<&Path>,
    show_padding: bool,
    build: &BuildOptions,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let assembly = assembly_name(path, assembly)?;
    let program = match worker {
        Some(program) => program.to_path_buf(),
        None => std::env::current_exe().context("failed to locate this executable")?,
    };
    let config = RunnerConfig {
        program,
        platform: build.platform,
        settings: build.settings(),
        ..RunnerConfig::default()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let layout = runtime.block_on(async {
        let runner = HostRunner::start(config)
            .await
            .context("failed to start the worker")?;
        let layout = runner
            .analyze(&absolute(path).display().to_string(), &format!("{type_name},{assembly}"))
            .await
            .with_context(|| format!("failed to analyze {type_name} in {assembly}"))?;
        runner.shutdown().await;
        anyhow::Ok(layout)
    })?;

    let layout = layout.with_context(|| format!("{type_name} has no layout"))?;
    print_output(&layout, opts, |layout| print_layout(layout, show_padding))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
