//! Reflection-style type names as they appear in requests.
//!
//! Supported forms: `Ns.Outer+Inner`, generic instantiations with bare or assembly qualified
//! arguments (`` Ns.Pair`2[[System.Int32, System.Private.CoreLib],[Ns.Point, Sample]] `` or
//! `` Ns.Pair`2[System.Int32,Ns.Point] ``), and `*`, `&`, `[]`, `[,]` suffixes.

use std::fmt;

use crate::{Error::Format, Result};

/// A decoration applied after the type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeModifier {
    /// `*`
    Pointer,
    /// `&`
    ByRef,
    /// `[]` (rank 0) or `[,...]` with the given rank.
    Array(u32),
}

/// A parsed type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// Full name of the definition, `` Ns.Outer+Inner`1 ``.
    pub full_name: String,
    /// Simple name of the assembly qualifying this name, if any.
    pub assembly: Option<String>,
    /// Generic arguments.
    pub arguments: Vec<TypeName>,
    /// Suffixes in source order.
    pub modifiers: Vec<TypeModifier>,
}

struct Cursor<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.position).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.text.as_bytes().get(self.position + ahead).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        if self.peek() == Some(expected) {
            self.position += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected as char)))
        }
    }

    fn error(&self, message: &str) -> crate::Error {
        Format(format!(
            "{message} at position {} of \"{}\"",
            self.position, self.text
        ))
    }

    fn name(&mut self) -> Result<&'a str> {
        let start = self.position;
        while let Some(byte) = self.peek() {
            match byte {
                b'\\' => {
                    self.position += 1;
                    if let Some(escaped) = self.text[self.position..].chars().next() {
                        self.position += escaped.len_utf8();
                    }
                }
                b'[' | b']' | b',' | b'*' | b'&' => break,
                _ => self.position += 1,
            }
        }

        let name = self.text[start..self.position].trim();
        if name.is_empty() {
            return Err(self.error("empty type name"));
        }
        Ok(name)
    }

    fn assembly(&mut self) -> Result<String> {
        let start = self.position;
        while self.peek().is_some_and(|byte| byte != b']') {
            self.position += 1;
        }

        let qualifier = &self.text[start..self.position];
        let simple = qualifier.split(',').next().unwrap_or_default().trim();
        if simple.is_empty() {
            return Err(self.error("empty assembly name"));
        }
        Ok(simple.to_string())
    }

    fn type_name(&mut self, depth: usize) -> Result<TypeName> {
        if depth > MAX_DEPTH {
            return Err(self.error("type name nested too deeply"));
        }

        self.skip_whitespace();
        let full_name = self.name()?.to_string();
        let mut arguments = Vec::new();

        let opens_arguments = self.peek() == Some(b'[')
            && !matches!(self.peek_at(1), Some(b']' | b',' | b'*'));
        if opens_arguments && full_name.contains('`') {
            self.position += 1;
            loop {
                self.skip_whitespace();
                if self.peek() == Some(b'[') {
                    self.position += 1;
                    let mut argument = self.type_name(depth + 1)?;
                    self.skip_whitespace();
                    if self.peek() == Some(b',') {
                        self.position += 1;
                        argument.assembly = Some(self.assembly()?);
                    }
                    self.expect(b']')?;
                    arguments.push(argument);
                } else {
                    arguments.push(self.type_name(depth + 1)?);
                }

                self.skip_whitespace();
                match self.peek() {
                    Some(b',') => self.position += 1,
                    Some(b']') => {
                        self.position += 1;
                        break;
                    }
                    _ => return Err(self.error("unterminated generic argument list")),
                }
            }
        }

        let mut modifiers = Vec::new();
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.position += 1;
                    modifiers.push(TypeModifier::Pointer);
                }
                Some(b'&') => {
                    self.position += 1;
                    modifiers.push(TypeModifier::ByRef);
                }
                Some(b'[') if matches!(self.peek_at(1), Some(b']' | b',')) => {
                    self.position += 1;
                    let mut commas = 0;
                    while self.peek() == Some(b',') {
                        commas += 1;
                        self.position += 1;
                    }
                    self.expect(b']')?;
                    modifiers.push(TypeModifier::Array(if commas == 0 { 0 } else { commas + 1 }));
                }
                _ => break,
            }
        }

        Ok(TypeName {
            full_name,
            assembly: None,
            arguments,
            modifiers,
        })
    }
}

const MAX_DEPTH: usize = 64;

impl TypeName {
    /// Parse a type name without a trailing assembly qualifier.
    ///
    /// # Errors
    /// [`crate::Error::Format`] on empty names, unbalanced brackets or trailing text.
    pub fn parse(text: &str) -> Result<TypeName> {
        let mut cursor = Cursor { text, position: 0 };
        let name = cursor.type_name(0)?;

        cursor.skip_whitespace();
        if cursor.position < text.len() {
            return Err(cursor.error("unexpected trailing text"));
        }
        Ok(name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)?;
        if !self.arguments.is_empty() {
            write!(f, "[")?;
            for (index, argument) in self.arguments.iter().enumerate() {
                if index > 0 {
                    write!(f, ",")?;
                }
                match &argument.assembly {
                    Some(assembly) => write!(f, "[{argument}, {assembly}]")?,
                    None => write!(f, "{argument}")?,
                }
            }
            write!(f, "]")?;
        }
        for modifier in &self.modifiers {
            match modifier {
                TypeModifier::Pointer => write!(f, "*")?,
                TypeModifier::ByRef => write!(f, "&")?,
                TypeModifier::Array(rank) => {
                    write!(f, "[{}]", ",".repeat(rank.saturating_sub(1) as usize))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_nested() {
        let name = TypeName::parse("Sample.Outer+Inner").unwrap();
        assert_eq!(name.full_name, "Sample.Outer+Inner");
        assert!(name.arguments.is_empty());
        assert!(name.modifiers.is_empty());

        assert_eq!(TypeName::parse("  Point ").unwrap().full_name, "Point");
    }

    #[test]
    fn qualified_arguments() {
        let name = TypeName::parse(
            "Sample.Pair`2[[System.Int32, System.Private.CoreLib, Version=8.0.0.0],[Sample.Point, Sample]]",
        )
        .unwrap();
        assert_eq!(name.full_name, "Sample.Pair`2");
        assert_eq!(name.arguments.len(), 2);
        assert_eq!(name.arguments[0].full_name, "System.Int32");
        assert_eq!(
            name.arguments[0].assembly.as_deref(),
            Some("System.Private.CoreLib")
        );
        assert_eq!(name.arguments[1].assembly.as_deref(), Some("Sample"));
        assert_eq!(
            name.to_string(),
            "Sample.Pair`2[[System.Int32, System.Private.CoreLib],[Sample.Point, Sample]]"
        );
    }

    #[test]
    fn bare_arguments_and_suffixes() {
        let name = TypeName::parse("System.Nullable`1[System.Int64][,]*").unwrap();
        assert_eq!(name.arguments[0].full_name, "System.Int64");
        assert_eq!(
            name.modifiers,
            vec![TypeModifier::Array(2), TypeModifier::Pointer]
        );

        let array = TypeName::parse("Sample.Point[]").unwrap();
        assert_eq!(array.modifiers, vec![TypeModifier::Array(0)]);
        assert_eq!(array.to_string(), "Sample.Point[]");
    }

    #[test]
    fn malformed() {
        for text in ["", "   ", "A`1[[B", "A`1[B", "A`1[[B, ]]", "Point]", "A[,"] {
            assert!(
                matches!(TypeName::parse(text), Err(Format(_))),
                "{text:?} should not parse"
            );
        }
    }
}
