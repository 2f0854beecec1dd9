use std::path::Path;

use anyhow::{bail, Context};
use layoutscope::session::{read_project_properties, ProjectOutput};

/// The defining assembly of a request: given explicitly, the stem of an assembly path, or
/// the assembly name declared by a project file.
pub fn assembly_name(path: &Path, explicit: Option<&str>) -> anyhow::Result<String> {
    if let Some(name) = explicit {
        return Ok(name.to_string());
    }

    if is_assembly_file(path) {
        if let Some(stem) = path.file_stem() {
            return Ok(stem.to_string_lossy().to_string());
        }
    }

    if ProjectOutput::is_project_file(path) {
        let properties = read_project_properties(path)
            .with_context(|| format!("failed to read project: {}", path.display()))?;
        if let Some(name) = properties.assembly_name {
            return Ok(name);
        }
        if let Some(stem) = path.file_stem() {
            return Ok(stem.to_string_lossy().to_string());
        }
    }

    bail!(
        "cannot derive the assembly name from {}; pass --assembly",
        path.display()
    )
}

/// Returns true if the path has an `.exe` or `.dll` extension.
pub fn is_assembly_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dll") || e.eq_ignore_ascii_case("exe"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_assembly_names() {
        assert_eq!(
            assembly_name(Path::new("out/App.Core.dll"), None).unwrap(),
            "App.Core"
        );
        assert_eq!(
            assembly_name(Path::new("out"), Some("Explicit")).unwrap(),
            "Explicit"
        );
        assert!(assembly_name(Path::new("out"), None).is_err());
    }
}
