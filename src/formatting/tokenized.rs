//! Display text paired with a run-length partition into token kinds.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, FromRepr};

use crate::{Error, Result};

/// Classification of a run of rendered text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    FromRepr,
)]
#[repr(u8)]
pub enum TokenKind {
    /// Language keywords: built-in type aliases such as `int` or `nint`.
    Keyword = 0,
    /// Namespace qualifier.
    Namespace = 1,
    /// Reference type name.
    Class = 2,
    /// Value type name.
    Struct = 3,
    /// Enum type name.
    Enum = 4,
    /// Field names and generic parameters.
    Identifier = 5,
    /// Operators: `.` `*` `?` `<` `>` `,`.
    Symbol = 6,
    /// Bracket groups and whitespace.
    Punctuation = 7,
}

const KIND_BITS: u32 = 3;
const KIND_MASK: u32 = (1 << KIND_BITS) - 1;

/// A `(kind, length)` run packed into one `u32`: the low 3 bits hold the kind, the upper 29
/// bits the length in UTF-8 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "SerializedSpan", into = "SerializedSpan")]
pub struct TokenSpan(u32);

impl TokenSpan {
    /// Longest run a single span can describe.
    pub const MAX_LENGTH: u32 = u32::MAX >> KIND_BITS;

    /// Pack a span. Lengths above [`TokenSpan::MAX_LENGTH`] are truncated; use
    /// [`TokenSpan::split`] for arbitrary lengths.
    #[must_use]
    pub fn new(kind: TokenKind, length: u32) -> Self {
        TokenSpan((length.min(Self::MAX_LENGTH) << KIND_BITS) | kind as u32)
    }

    /// Spans covering `length` bytes of one kind, splitting runs that do not fit.
    pub fn split(kind: TokenKind, length: usize) -> impl Iterator<Item = TokenSpan> {
        let max = Self::MAX_LENGTH as usize;
        let full = length / max;
        let rest = length % max;

        std::iter::repeat(TokenSpan::new(kind, Self::MAX_LENGTH))
            .take(full)
            .chain((rest > 0).then(|| {
                TokenSpan::new(kind, u32::try_from(rest).unwrap_or(Self::MAX_LENGTH))
            }))
    }

    /// The token kind.
    #[must_use]
    pub fn kind(self) -> TokenKind {
        // Every 3-bit value names a kind
        TokenKind::from_repr((self.0 & KIND_MASK) as u8).unwrap_or(TokenKind::Punctuation)
    }

    /// Run length in bytes.
    #[must_use]
    pub fn length(self) -> u32 {
        self.0 >> KIND_BITS
    }

    /// The packed representation.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    fn with_length(self, length: u32) -> Self {
        TokenSpan::new(self.kind(), length)
    }
}

impl fmt::Debug for TokenSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.length())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SerializedSpan {
    token: TokenKind,
    length: u32,
}

impl From<TokenSpan> for SerializedSpan {
    fn from(span: TokenSpan) -> Self {
        SerializedSpan {
            token: span.kind(),
            length: span.length(),
        }
    }
}

impl TryFrom<SerializedSpan> for TokenSpan {
    type Error = String;

    fn try_from(span: SerializedSpan) -> std::result::Result<Self, Self::Error> {
        if span.length > TokenSpan::MAX_LENGTH {
            return Err(format!("token length {} does not fit a span", span.length));
        }
        Ok(TokenSpan::new(span.token, span.length))
    }
}

/// Immutable text plus the token runs that partition it.
///
/// The runs cover the text exactly, left to right, and every run boundary falls on a `char`
/// boundary. Both constructors and deserialization enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", try_from = "UncheckedTokenizedString")]
pub struct TokenizedString {
    value: String,
    tokens: Vec<TokenSpan>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UncheckedTokenizedString {
    value: String,
    tokens: Vec<TokenSpan>,
}

impl TryFrom<UncheckedTokenizedString> for TokenizedString {
    type Error = Error;

    fn try_from(raw: UncheckedTokenizedString) -> Result<Self> {
        TokenizedString::new(raw.value, raw.tokens)
    }
}

impl TokenizedString {
    /// Pair `value` with `tokens`, validating the partition.
    ///
    /// # Errors
    /// Returns [`crate::Error::Format`] if the runs do not cover `value` exactly or split a
    /// character.
    pub fn new(value: String, tokens: Vec<TokenSpan>) -> Result<Self> {
        let mut position = 0usize;
        for span in &tokens {
            position += span.length() as usize;
            if position > value.len() || !value.is_char_boundary(position) {
                return Err(Error::Format(format!(
                    "token runs do not partition {value:?} at byte {position}"
                )));
            }
        }

        if position != value.len() {
            return Err(Error::Format(format!(
                "token runs cover {position} of {} bytes",
                value.len()
            )));
        }

        Ok(TokenizedString { value, tokens })
    }

    /// A single run of one kind.
    #[must_use]
    pub fn single(kind: TokenKind, text: &str) -> Self {
        TokenizedString {
            value: text.to_string(),
            tokens: TokenSpan::split(kind, text.len()).collect(),
        }
    }

    pub(crate) fn from_parts_unchecked(value: String, tokens: Vec<TokenSpan>) -> Self {
        debug_assert_eq!(
            tokens.iter().map(|span| span.length() as usize).sum::<usize>(),
            value.len()
        );
        TokenizedString { value, tokens }
    }

    /// The full text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The token runs.
    #[must_use]
    pub fn tokens(&self) -> &[TokenSpan] {
        &self.tokens
    }

    /// Length of the text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// `true` for the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Iterate over `(kind, text)` runs.
    pub fn iter(&self) -> impl Iterator<Item = (TokenKind, &str)> {
        let mut position = 0usize;
        self.tokens.iter().map(move |span| {
            let start = position;
            position += span.length() as usize;
            (span.kind(), &self.value[start..position])
        })
    }

    /// Append another tokenized string, concatenating text and runs positionally.
    pub fn append(&mut self, other: &TokenizedString) {
        self.value.push_str(&other.value);
        self.tokens.extend_from_slice(&other.tokens);
    }

    /// Append a run of one kind.
    pub fn push(&mut self, kind: TokenKind, text: &str) {
        if text.is_empty() {
            return;
        }
        self.value.push_str(text);
        self.tokens.extend(TokenSpan::split(kind, text.len()));
    }

    /// Merge adjacent runs of the same kind. The text is unchanged.
    #[must_use]
    pub fn coalesced(&self) -> TokenizedString {
        let mut tokens: Vec<TokenSpan> = Vec::with_capacity(self.tokens.len());
        for span in &self.tokens {
            match tokens.last_mut() {
                Some(last)
                    if last.kind() == span.kind()
                        && u64::from(last.length()) + u64::from(span.length())
                            <= u64::from(TokenSpan::MAX_LENGTH) =>
                {
                    *last = last.with_length(last.length() + span.length());
                }
                _ => tokens.push(*span),
            }
        }

        TokenizedString {
            value: self.value.clone(),
            tokens,
        }
    }
}

impl fmt::Display for TokenizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
