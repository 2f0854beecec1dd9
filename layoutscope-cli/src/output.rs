use colored::{ColoredString, Colorize};
use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use layoutscope::{
    formatting::{TokenKind, TokenizedString},
    layout::{Entry, Layout},
};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
    } else {
        display_fn(data);
    }
    Ok(())
}

/// Column alignment for tabular output.
#[derive(Clone, Copy)]
pub enum Align {
    Left,
    Right,
}

/// Tabular writer backed by `comfy-table`: whitespace-aligned columns, no borders.
pub struct TabWriter {
    table: Table,
}

impl TabWriter {
    /// Create a new `TabWriter` with `(header, alignment)` columns.
    pub fn new(columns: Vec<(&str, Align)>) -> Self {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Disabled);

        let headers: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        table.set_header(headers);

        let last = columns.len().saturating_sub(1);
        for (i, (_, align)) in columns.iter().enumerate() {
            let cell_align = match align {
                Align::Left => CellAlignment::Left,
                Align::Right => CellAlignment::Right,
            };
            if let Some(col) = table.column_mut(i) {
                col.set_cell_alignment(cell_align);
                let pad_left = if i == 0 { 0 } else { 1 };
                let pad_right = if i == last { 0 } else { 1 };
                col.set_padding((pad_left, pad_right));
            }
        }

        Self { table }
    }

    /// Add a row. Values are given in column order.
    pub fn row(&mut self, values: Vec<String>) {
        self.table.add_row(values);
    }

    /// Print the table to stdout.
    pub fn print(&self) {
        for line in self.table.to_string().lines() {
            println!("{}", line.trim_end());
        }
    }
}

fn paint(kind: TokenKind, text: &str) -> ColoredString {
    match kind {
        TokenKind::Keyword => text.blue(),
        TokenKind::Namespace => text.dimmed(),
        TokenKind::Class => text.cyan(),
        TokenKind::Struct => text.green(),
        TokenKind::Enum => text.yellow(),
        TokenKind::Identifier => text.normal(),
        TokenKind::Symbol | TokenKind::Punctuation => text.white(),
    }
}

/// Render a tokenized string with one color per token kind.
pub fn colorize(name: &TokenizedString) -> String {
    name.iter()
        .map(|(kind, text)| paint(kind, text).to_string())
        .collect()
}

/// Print a layout as a header line and an offset/size/field table.
pub fn print_layout(layout: &Layout, show_padding: bool) {
    let kind = if layout.is_value_type { "struct" } else { "class" };
    println!(
        "{} {}  size {}, padding {}",
        kind.blue(),
        colorize(&layout.name),
        layout.total_size.to_string().bold(),
        layout.total_padding.to_string().bold()
    );
    println!(
        "{}",
        format!(
            "layout {:?}, pack {}, size {}",
            layout.attribute_kind, layout.attribute_pack, layout.attribute_size
        )
        .dimmed()
    );
    println!();

    let mut tw = TabWriter::new(vec![
        ("Offset", Align::Right),
        ("Size", Align::Right),
        ("Field", Align::Left),
    ]);
    for row in layout.fields_with_paddings() {
        let indent = "  ".repeat(row.level);
        match row.entry {
            Entry::Field(field) => {
                let marker = if row.overlaps { " (overlaps)".red().to_string() } else { String::new() };
                let visibility = if field.is_public { "" } else { "-" };
                tw.row(vec![
                    row.offset.to_string(),
                    field.size.to_string(),
                    format!("{indent}{visibility}{}{marker}", colorize(&field.type_and_name)),
                ]);
            }
            Entry::Padding(padding) if show_padding => {
                tw.row(vec![
                    row.offset.to_string(),
                    padding.size.to_string(),
                    format!("{indent}{}", format!("padding ({} bytes)", padding.size).red()),
                ]);
            }
            Entry::Padding(_) => {}
        }
    }
    tw.print();
}
