//! Interleaving synthetic padding with fields.
//!
//! The walk emits, for every sibling list, a gap-free sequence of fields and padding
//! blocks covering `[0, container size)`. Overlapping fields (explicit layout unions) are
//! emitted with [`LayoutEntry::overlaps`] set; a padding block is never zero or negative
//! in size.

use crate::layout::{Field, Padding};

/// A field or a padding block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'a> {
    /// A real field.
    Field(&'a Field),
    /// Unused bytes.
    Padding(Padding),
}

impl Entry<'_> {
    /// Bytes covered by the entry.
    #[must_use]
    pub fn size(&self) -> i32 {
        match self {
            Entry::Field(field) => field.size,
            Entry::Padding(padding) => padding.size,
        }
    }
}

/// One row of the flattened layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry<'a> {
    /// The field or padding.
    pub entry: Entry<'a>,
    /// Offset from the start of the root type.
    pub offset: i32,
    /// Nesting depth, `0` for top-level fields.
    pub level: usize,
    /// The field starts before the end of an earlier sibling.
    pub overlaps: bool,
}

impl LayoutEntry<'_> {
    /// Bytes covered by the entry.
    #[must_use]
    pub fn size(&self) -> i32 {
        self.entry.size()
    }

    /// `true` for padding rows.
    #[must_use]
    pub fn is_padding(&self) -> bool {
        matches!(self.entry, Entry::Padding(_))
    }
}

/// Flatten `fields` into rows with padding, recursing into children.
///
/// `container_size` bounds the trailing padding and `start_offset` is the absolute offset of
/// the container.
#[must_use]
pub fn fields_with_paddings(
    fields: &[Field],
    container_size: i32,
    start_offset: i32,
) -> Vec<LayoutEntry<'_>> {
    let mut entries = Vec::with_capacity(fields.len() * 2 + 1);
    walk(fields, container_size, start_offset, 0, &mut entries);
    entries
}

fn walk<'a>(
    fields: &'a [Field],
    container_size: i32,
    start_offset: i32,
    level: usize,
    entries: &mut Vec<LayoutEntry<'a>>,
) {
    let mut ordered: Vec<&Field> = fields.iter().collect();
    ordered.sort_by_key(|field| field.offset);

    let mut cursor = 0;
    for field in ordered {
        if field.offset > cursor {
            entries.push(padding(cursor, field.offset - cursor, start_offset, level));
        }

        entries.push(LayoutEntry {
            entry: Entry::Field(field),
            offset: start_offset + field.offset,
            level,
            overlaps: field.offset < cursor,
        });

        if let Some(children) = &field.children {
            walk(
                children,
                field.size,
                start_offset + field.offset,
                level + 1,
                entries,
            );
        }

        cursor = cursor.max(field.end());
    }

    if container_size > cursor {
        entries.push(padding(cursor, container_size - cursor, start_offset, level));
    }
}

fn padding(offset: i32, size: i32, start_offset: i32, level: usize) -> LayoutEntry<'static> {
    LayoutEntry {
        entry: Entry::Padding(Padding { offset, size }),
        offset: start_offset + offset,
        level,
        overlaps: false,
    }
}
