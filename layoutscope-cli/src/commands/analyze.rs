use std::path::Path;

use anyhow::Context;
use layoutscope::session::{AnalysisTarget, SessionKey, SessionRegistry};

use crate::{
    app::{BuildOptions, GlobalOptions},
    commands::common::assembly_name,
    output::{print_layout, print_output},
};

pub fn run(
    path: &Path,
    type_name: &str,
    assembly: Option<&str>,
    show_padding: bool,
    build: &BuildOptions,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let assembly = assembly_name(path, assembly)?;
    let target = AnalysisTarget::from_path(path, &build.settings());

    let registry = SessionRegistry::new();
    let session = registry
        .get_or_open(&SessionKey::new(target, build.platform))
        .with_context(|| format!("failed to open build output of {}", path.display()))?;

    let layout = session
        .load_and_analyze(&assembly, type_name)
        .with_context(|| format!("failed to analyze {type_name} in {assembly}"))?
        .with_context(|| format!("{type_name} has no layout"))?;

    print_output(&layout, opts, |layout| print_layout(layout, show_padding))
}
