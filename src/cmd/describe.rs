/*!
describe.rs

Fixed-width metadata listing for `--desc`.

One row per parameter (sorted IMPORTING, EXPORTING, CHANGING, TABLES, then
by name). A parameter with a structure or table line type is followed by an
indented block listing that type's fields. Nested types inside those fields
are shown by name only.
*/

use crate::cmd::format::pad_right;
use crate::rfc::{FieldDescription, FunctionDescription, ParameterDescription, TypeDescription};

const PARAMETER_COLUMNS: [(&str, usize); 10] = [
    ("name", 20),
    ("parameter_type", 17),
    ("direction", 11),
    ("nuc_length", 10),
    ("uc_length", 9),
    ("decimals", 9),
    ("default_value", 15),
    ("optional", 10),
    ("type_description", 15),
    ("parameter_text", 20),
];

const FIELD_COLUMNS: [(&str, usize); 8] = [
    ("name", 20),
    ("field_type", 17),
    ("nuc_length", 10),
    ("nuc_offset", 10),
    ("uc_length", 9),
    ("uc_offset", 9),
    ("decimals", 10),
    ("type_description", 15),
];

const INDENT: &str = "    ";

fn header(columns: &[(&str, usize)]) -> String {
    columns
        .iter()
        .map(|(key, width)| pad_right(&key.to_ascii_uppercase(), *width))
        .collect::<Vec<_>>()
        .join(" ")
}

fn row(cells: &[String], columns: &[(&str, usize)]) -> String {
    cells
        .iter()
        .zip(columns)
        .map(|(cell, (_, width))| pad_right(cell, *width))
        .collect::<Vec<_>>()
        .join(" ")
}

fn optional_name(name: Option<&str>) -> String {
    name.unwrap_or("None").to_string()
}

fn flag(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

fn parameter_cells(p: &ParameterDescription) -> Vec<String> {
    vec![
        p.name.clone(),
        p.parameter_type.name(),
        p.direction.to_string(),
        p.nuc_length.to_string(),
        p.uc_length.to_string(),
        p.decimals.to_string(),
        p.default_value.clone(),
        flag(p.optional),
        optional_name(p.type_description.as_ref().map(|t| t.name.as_str())),
        p.parameter_text.clone(),
    ]
}

fn field_cells(f: &FieldDescription) -> Vec<String> {
    vec![
        f.name.clone(),
        f.field_type.name(),
        f.nuc_length.to_string(),
        f.nuc_offset.to_string(),
        f.uc_length.to_string(),
        f.uc_offset.to_string(),
        f.decimals.to_string(),
        optional_name(f.type_description.as_deref()),
    ]
}

fn structure_block(t: &TypeDescription, out: &mut Vec<String>) {
    out.push(format!(
        "{INDENT}-----------( Structure of {} (n/uc_length={}/{})--",
        t.name, t.nuc_length, t.uc_length
    ));
    out.push(format!("{INDENT}{}", header(&FIELD_COLUMNS)));
    for f in &t.fields {
        out.push(format!("{INDENT}{}", row(&field_cells(f), &FIELD_COLUMNS)));
    }
    out.push(format!("{INDENT}-----------( Structure of {} )-----------", t.name));
}

/// Render the full listing, one line per entry (no trailing newline).
pub fn render_description(desc: &FunctionDescription) -> String {
    let rule = "-".repeat(PARAMETER_COLUMNS.iter().map(|(_, w)| w).sum());
    let mut out = vec![header(&PARAMETER_COLUMNS)];
    for p in desc.sorted_parameters() {
        out.push(row(&parameter_cells(p), &PARAMETER_COLUMNS));
        if let Some(t) = &p.type_description {
            structure_block(t, &mut out);
        }
        out.push(rule.clone());
    }
    out.join("\n")
}
