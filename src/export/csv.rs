use super::format_number;
use crate::table::TableRow;

/// Fixed column order of the CSV export.
pub const CSV_HEADER: [&str; 11] = [
    "Date",
    "Status",
    "Primary symptom",
    "Secondary symptoms",
    "Pain",
    "Systolic",
    "Diastolic",
    "MAP",
    "Heart rate",
    "Oxygen saturation",
    "Context",
];

/// Quote a cell when it contains a comma, a double quote or a newline.
pub fn escape_csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Newlines in free text become single spaces.
fn collapse_newlines(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn row_cells(row: &TableRow) -> [String; 11] {
    let status = if row.is_emergency { "Urgency" } else { "Normal" };
    let pressure = row.pressure;
    [
        row.date_time.clone(),
        status.to_string(),
        row.symptom_primary.clone().unwrap_or_default(),
        row.symptom_secondary.join("; "),
        row.pain_level.map(|p| p.to_string()).unwrap_or_default(),
        pressure.map(|p| p.systolic.to_string()).unwrap_or_default(),
        pressure.map(|p| p.diastolic.to_string()).unwrap_or_default(),
        pressure.map(|p| p.map.to_string()).unwrap_or_default(),
        format_number(row.heart_rate),
        format_number(row.oxygen_saturation),
        collapse_newlines(row.context.as_deref().unwrap_or_default()),
    ]
}

/// Header plus one line per row, in the given order, LF-separated.
pub fn to_csv(rows: &[TableRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        CSV_HEADER
            .iter()
            .map(|h| escape_csv_cell(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        lines.push(
            row_cells(row)
                .iter()
                .map(|c| escape_csv_cell(c))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}
