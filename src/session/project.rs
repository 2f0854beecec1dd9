//! Locating the build output of a project.
//!
//! A project is analyzed through its build output: `<project dir>/bin/[<platform>/]<Debug|Release>/<tfm>/`.
//! Values not supplied by the caller are read from the project file itself.

use std::{
    fs,
    path::{Path, PathBuf},
};

use quick_xml::{events::Event, Reader};

use crate::Result;

/// Platform name that does not add a directory segment to the output path.
pub const ANY_CPU: &str = "AnyCPU";

const PROJECT_EXTENSIONS: &[&str] = &["csproj", "fsproj", "vbproj"];

/// Build output of one project under one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectOutput {
    /// Path of the project file.
    pub project_path: PathBuf,
    /// `Debug` configuration if `true`, `Release` otherwise.
    pub debug: bool,
    /// Build platform, e.g. `AnyCPU` or `x64`.
    pub platform_name: String,
    /// Target framework moniker; read from the project when `None`.
    pub target_framework: Option<String>,
    /// `true` for executables; read from `OutputType` when `None`.
    pub executable: Option<bool>,
}

/// The properties of a project file that influence its output path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectProperties {
    /// `AssemblyName`.
    pub assembly_name: Option<String>,
    /// `TargetFramework`, or the first entry of `TargetFrameworks`.
    pub target_framework: Option<String>,
    /// `OutputType`.
    pub output_type: Option<String>,
}

/// Where the compiled assembly of a project lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// The output directory.
    pub directory: PathBuf,
    /// Simple name of the primary assembly.
    pub assembly_name: String,
    /// Full path of the primary assembly file.
    pub assembly_path: PathBuf,
}

impl ProjectOutput {
    /// Debug build for `AnyCPU`, everything else read from the project file.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        ProjectOutput {
            project_path: project_path.into(),
            debug: true,
            platform_name: ANY_CPU.to_string(),
            target_framework: None,
            executable: None,
        }
    }

    /// `true` if `path` names a project file.
    #[must_use]
    pub fn is_project_file(path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                PROJECT_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(extension))
            })
    }

    /// Resolve the output directory and primary assembly.
    ///
    /// # Errors
    /// [`crate::Error::FileError`] if the project file cannot be read,
    /// [`crate::Error::Malformed`] if it is not well-formed XML and
    /// [`crate::Error::NotFound`] if no target framework is known.
    pub fn resolve(&self) -> Result<ResolvedOutput> {
        let properties = read_project_properties(&self.project_path)?;

        let target_framework = self
            .target_framework
            .clone()
            .or(properties.target_framework)
            .ok_or_else(|| {
                crate::Error::NotFound(format!(
                    "target framework of {}",
                    self.project_path.display()
                ))
            })?;
        let executable = self.executable.unwrap_or_else(|| {
            properties.output_type.as_deref().is_some_and(|output| {
                output.eq_ignore_ascii_case("Exe") || output.eq_ignore_ascii_case("WinExe")
            })
        });
        let assembly_name = properties.assembly_name.unwrap_or_else(|| {
            self.project_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let mut directory = self
            .project_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("bin");
        if !self.platform_name.eq_ignore_ascii_case(ANY_CPU) && !self.platform_name.is_empty() {
            directory.push(&self.platform_name);
        }
        directory.push(if self.debug { "Debug" } else { "Release" });
        directory.push(&target_framework);

        let extension = if executable && is_net_framework(&target_framework) {
            "exe"
        } else {
            "dll"
        };
        let assembly_path = directory.join(format!("{assembly_name}.{extension}"));

        Ok(ResolvedOutput {
            directory,
            assembly_name,
            assembly_path,
        })
    }
}

/// `net4x` style monikers (`net48`, `net472`), as opposed to `net8.0` or `netstandard2.0`.
fn is_net_framework(target_framework: &str) -> bool {
    target_framework
        .strip_prefix("net")
        .is_some_and(|version| {
            version.starts_with('4') && version.bytes().all(|byte| byte.is_ascii_digit())
        })
}

/// Read the output related properties from a project file.
///
/// # Errors
/// [`crate::Error::FileError`] if the file cannot be read and [`crate::Error::Malformed`] on
/// invalid XML.
pub fn read_project_properties(path: &Path) -> Result<ProjectProperties> {
    let text = fs::read_to_string(path)?;
    parse_project_properties(&text)
}

/// Parse the output related properties from project file text. The first occurrence of each
/// property wins; conditions are not evaluated.
///
/// # Errors
/// [`crate::Error::Malformed`] on invalid XML.
pub fn parse_project_properties(text: &str) -> Result<ProjectProperties> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut properties = ProjectProperties::default();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                current = Some(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
            }
            Ok(Event::Text(text)) => {
                let Some(name) = current.as_deref() else {
                    continue;
                };
                let value = text
                    .unescape()
                    .map_err(|error| malformed_error!("Invalid project text - {}", error))?
                    .trim()
                    .to_string();
                if value.is_empty() {
                    continue;
                }

                let slot = match name {
                    "AssemblyName" => &mut properties.assembly_name,
                    "OutputType" => &mut properties.output_type,
                    "TargetFramework" => &mut properties.target_framework,
                    "TargetFrameworks" => {
                        if properties.target_framework.is_none() {
                            properties.target_framework = value
                                .split(';')
                                .map(str::trim)
                                .find(|framework| !framework.is_empty())
                                .map(str::to_string);
                        }
                        continue;
                    }
                    _ => continue,
                };
                if slot.is_none() {
                    *slot = Some(value);
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(error) => {
                return Err(malformed_error!(
                    "Invalid project file at {} - {}",
                    reader.buffer_position(),
                    error
                ))
            }
            Ok(_) => {}
        }
    }

    Ok(properties)
}
