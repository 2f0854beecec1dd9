//! Request lines sent to the worker.

use std::fmt;

use crate::{Error::Format, Result};

/// One `<path>|<type>,<assembly>` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Assembly, directory or project path the build output is found through.
    pub path: String,
    /// Full type name, possibly with generic arguments.
    pub type_name: String,
    /// Simple name of the assembly defining the type.
    pub assembly: String,
}

impl Request {
    /// Create a request from its parts.
    pub fn new(path: impl Into<String>, type_name: impl Into<String>, assembly: impl Into<String>) -> Self {
        Request {
            path: path.into(),
            type_name: type_name.into(),
            assembly: assembly.into(),
        }
    }

    /// Parse one request line. A trailing line terminator is ignored.
    ///
    /// The line is split at the first `|`. The type part is split at the first comma that is
    /// not inside `[...]`, so assembly qualified generic arguments stay with the type name.
    ///
    /// # Errors
    /// [`crate::Error::Format`] if the `|` is missing, the type part has no top-level comma,
    /// or any of the three parts is empty.
    pub fn parse(line: &str) -> Result<Request> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some((path, qualified)) = line.split_once('|') else {
            return Err(Format(format!("missing '|' in request \"{line}\"")));
        };
        if path.is_empty() {
            return Err(Format(format!("empty path in request \"{line}\"")));
        }

        let Some(comma) = top_level_comma(qualified) else {
            return Err(Format(format!(
                "missing assembly name in type \"{qualified}\""
            )));
        };
        let type_name = qualified[..comma].trim();
        let assembly = qualified[comma + 1..].trim();
        if type_name.is_empty() || assembly.is_empty() {
            return Err(Format(format!("incomplete type \"{qualified}\"")));
        }

        Ok(Request::new(path, type_name, assembly))
    }

    /// The request as a newline terminated line.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{},{}", self.path, self.type_name, self.assembly)
    }
}

fn top_level_comma(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, byte) in text.bytes().enumerate() {
        match byte {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => return Some(index),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let request = Request::parse("/src/App/App.csproj|App.Models.Order,App\n").unwrap();
        assert_eq!(request.path, "/src/App/App.csproj");
        assert_eq!(request.type_name, "App.Models.Order");
        assert_eq!(request.assembly, "App");
        assert_eq!(request.to_line(), "/src/App/App.csproj|App.Models.Order,App\n");
    }

    #[test]
    fn generic_arguments_keep_their_commas() {
        let request = Request::parse(
            "C:\\out\\App.dll|App.Pair`2[[System.Int32, System.Private.CoreLib],[App.Point, App]], App",
        )
        .unwrap();
        assert_eq!(request.path, "C:\\out\\App.dll");
        assert_eq!(
            request.type_name,
            "App.Pair`2[[System.Int32, System.Private.CoreLib],[App.Point, App]]"
        );
        assert_eq!(request.assembly, "App");
    }

    #[test]
    fn only_first_bar_splits() {
        let request = Request::parse("/a|b|Type,Asm").unwrap();
        assert_eq!(request.path, "/a");
        assert_eq!(request.type_name, "b|Type");
    }

    #[test]
    fn malformed() {
        for line in [
            "",
            "no separator",
            "|Type,Asm",
            "/path|Type",
            "/path|Type,",
            "/path|,Asm",
            "/path|Pair`1[[A, B]]",
        ] {
            assert!(
                matches!(Request::parse(line), Err(Format(_))),
                "{line:?} should be rejected"
            );
        }
    }
}
