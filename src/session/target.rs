//! What a session analyzes: an output directory, given directly or through a project.

use std::path::{Path, PathBuf};

use crate::{
    layout::Platform,
    session::project::{ProjectOutput, ANY_CPU},
    Result,
};

/// Build settings applied to project paths that arrive without them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// `Debug` when `true`, `Release` otherwise.
    pub debug: bool,
    /// Build platform name.
    pub platform_name: String,
    /// Target framework override.
    pub target_framework: Option<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            debug: true,
            platform_name: ANY_CPU.to_string(),
            target_framework: None,
        }
    }
}

/// The build output a session is opened for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnalysisTarget {
    /// A directory holding the assemblies.
    Assembly(PathBuf),
    /// The output directory of a project.
    Project(ProjectOutput),
}

impl AnalysisTarget {
    /// Classify a request path: project files become [`AnalysisTarget::Project`] with
    /// `settings`, assembly files stand for their directory, anything else is taken as the
    /// directory itself.
    pub fn from_path(path: &Path, settings: &BuildSettings) -> Self {
        if ProjectOutput::is_project_file(path) {
            return AnalysisTarget::Project(ProjectOutput {
                project_path: path.to_path_buf(),
                debug: settings.debug,
                platform_name: settings.platform_name.clone(),
                target_framework: settings.target_framework.clone(),
                executable: None,
            });
        }

        let is_assembly_file = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                extension.eq_ignore_ascii_case("dll") || extension.eq_ignore_ascii_case("exe")
            });
        match path.parent() {
            Some(parent) if is_assembly_file => AnalysisTarget::Assembly(parent.to_path_buf()),
            _ => AnalysisTarget::Assembly(path.to_path_buf()),
        }
    }

    /// The output directory, plus the primary assembly name when a project says so.
    ///
    /// # Errors
    /// As [`ProjectOutput::resolve`].
    pub fn output(&self) -> Result<(PathBuf, Option<String>)> {
        match self {
            AnalysisTarget::Assembly(directory) => Ok((directory.clone(), None)),
            AnalysisTarget::Project(project) => {
                let resolved = project.resolve()?;
                Ok((resolved.directory, Some(resolved.assembly_name)))
            }
        }
    }
}

/// Identity of a session in the [`crate::session::SessionRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// What is analyzed.
    pub target: AnalysisTarget,
    /// For which platform.
    pub platform: Platform,
}

impl SessionKey {
    /// Create a key.
    pub fn new(target: AnalysisTarget, platform: Platform) -> Self {
        SessionKey { target, platform }
    }
}
