//! The serialized description of a type's memory shape.

use serde::{Deserialize, Serialize};

use crate::{
    formatting::{TokenKind, TokenizedString},
    layout::padding::{fields_with_paddings, LayoutEntry},
    typesystem::LayoutKind,
};

/// One data member of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Field {
    /// Offset from the start of the containing type or field.
    pub offset: i32,
    /// Bytes occupied.
    pub size: i32,
    /// Rendered `"Type name"`.
    pub type_and_name: TokenizedString,
    /// Classification of the field's type.
    pub kind: TokenKind,
    /// `true` for public fields.
    pub is_public: bool,
    /// Fields of an embedded value type, offsets relative to this field.
    pub children: Option<Vec<Field>>,
}

impl Field {
    /// First byte after the field.
    #[must_use]
    pub fn end(&self) -> i32 {
        self.offset + self.size
    }

    /// Bytes of this field actually covered by data.
    #[must_use]
    pub fn contribution(&self) -> i32 {
        match &self.children {
            Some(children) => self.size.min(unpadded_size(children)),
            None => self.size,
        }
    }
}

/// Synthetic unused bytes between or after fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Padding {
    /// Offset from the start of the containing type or field.
    pub offset: i32,
    /// Bytes of padding.
    pub size: i32,
}

/// The layout of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Layout {
    /// Top-level fields ordered by offset.
    pub fields: Vec<Field>,
    /// Value size for value types, heap allocation size for classes.
    pub total_size: i32,
    /// `total_size` minus the bytes covered by fields.
    pub total_padding: i32,
    /// Rendered type name.
    pub name: TokenizedString,
    /// `true` for value types.
    pub is_value_type: bool,
    /// Requested layout strategy.
    pub attribute_kind: LayoutKind,
    /// Requested size, `0` when unset.
    pub attribute_size: i32,
    /// Requested packing.
    pub attribute_pack: i32,
}

impl Layout {
    /// Assemble a layout, deriving `total_padding` from the fields.
    #[must_use]
    pub fn new(
        name: TokenizedString,
        fields: Vec<Field>,
        total_size: i32,
        is_value_type: bool,
        attribute_kind: LayoutKind,
        attribute_size: i32,
        attribute_pack: i32,
    ) -> Self {
        let total_padding = (total_size - unpadded_size(&fields)).max(0);
        Layout {
            fields,
            total_size,
            total_padding,
            name,
            is_value_type,
            attribute_kind,
            attribute_size,
            attribute_pack,
        }
    }

    /// Fields interleaved with padding at every nesting level.
    #[must_use]
    pub fn fields_with_paddings(&self) -> Vec<LayoutEntry<'_>> {
        fields_with_paddings(&self.fields, self.total_size, 0)
    }
}

/// Bytes covered by `fields`, counting overlapping ranges once.
///
/// Each field covers `[offset, offset + contribution)`; for fields with children the
/// contribution is bounded by the children's own unpadded size.
#[must_use]
pub fn unpadded_size(fields: &[Field]) -> i32 {
    let mut ranges: Vec<(i32, i32)> = fields
        .iter()
        .map(|field| (field.offset, field.offset + field.contribution().max(0)))
        .filter(|(start, end)| end > start)
        .collect();
    ranges.sort_unstable();

    let mut covered = 0;
    let mut current: Option<(i32, i32)> = None;
    for (start, end) in ranges {
        current = match current {
            Some((open, close)) if start <= close => Some((open, close.max(end))),
            Some((open, close)) => {
                covered += close - open;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((open, close)) = current {
        covered += close - open;
    }

    covered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, offset: i32, size: i32) -> Field {
        Field {
            offset,
            size,
            type_and_name: TokenizedString::single(TokenKind::Identifier, name),
            kind: TokenKind::Keyword,
            is_public: true,
            children: None,
        }
    }

    #[test]
    fn plain_sum() {
        let fields = vec![field("a", 0, 4), field("b", 8, 8)];
        assert_eq!(unpadded_size(&fields), 12);
    }

    #[test]
    fn overlaps_count_once() {
        let mut fields: Vec<_> = (0..6).map(|i| field(&format!("u{i}"), 0, 4)).collect();
        fields.push(field("tail", 8, 4));
        assert_eq!(unpadded_size(&fields), 8);

        let partial = vec![field("wide", 0, 8), field("inner", 4, 8)];
        assert_eq!(unpadded_size(&partial), 12);
    }

    #[test]
    fn children_bound_contribution() {
        let mut nested = field("inner", 0, 16);
        nested.children = Some(vec![field("x", 0, 1), field("y", 8, 8)]);
        assert_eq!(nested.contribution(), 9);

        let layout = Layout::new(
            TokenizedString::single(TokenKind::Struct, "Outer"),
            vec![nested, field("z", 16, 4)],
            24,
            true,
            LayoutKind::Sequential,
            0,
            8,
        );
        assert_eq!(layout.total_padding, 24 - 13);
    }

    #[test]
    fn padding_never_negative() {
        let layout = Layout::new(
            TokenizedString::single(TokenKind::Struct, "Odd"),
            vec![field("a", 0, 8)],
            4,
            true,
            LayoutKind::Explicit,
            4,
            8,
        );
        assert_eq!(layout.total_padding, 0);
    }

    #[test]
    fn json_shape() {
        let layout = Layout::new(
            TokenizedString::single(TokenKind::Struct, "P"),
            vec![field("x", 0, 4)],
            4,
            true,
            LayoutKind::Auto,
            0,
            8,
        );
        let json: serde_json::Value = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["TotalSize"], 4);
        assert_eq!(json["AttributeKind"], "Auto");
        assert_eq!(json["Fields"][0]["TypeAndName"]["Value"], "x");
        assert_eq!(json["Fields"][0]["Children"], serde_json::Value::Null);
        assert_eq!(json["Fields"][0]["Kind"], "Keyword");
        assert_eq!(json["Fields"][0]["IsPublic"], true);

        let back: Layout = serde_json::from_value(json).unwrap();
        assert_eq!(back, layout);
    }
}
