//! Line-format directory parser.
//!
//! One channel per line, `<name>,<url>`. There is no header, no comment
//! syntax and no quoting: a line contributes a record only when splitting on
//! `,` yields exactly two fields. Everything else is skipped silently.

use crate::record::Record;

pub const FIELD_SEPARATOR: char = ',';

pub fn parse_directory(text: &str) -> Vec<Record> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Record> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut fields = line.split(FIELD_SEPARATOR);
    let name = fields.next()?;
    let url = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    Some(Record::new(name, url))
}

/// Render records back into the line format, one `name,url` per line.
pub fn serialize_lines(records: &[Record]) -> String {
    records
        .iter()
        .map(|r| format!("{}{}{}", r.name, FIELD_SEPARATOR, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}
