//! Printable history report.
//!
//! The HTML is self-contained (styles inlined, no external assets) so any
//! print-to-PDF renderer can consume it directly. Every user-entered string
//! goes through [`escape_html`] before interpolation.

use chrono::{NaiveDate, Utc};

use super::format_number;
use crate::models::PatientInfo;
use crate::table::TableRow;

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render the report issued today (UTC).
pub fn to_pdf_html(
    patient: &PatientInfo,
    doctor_name: &str,
    rows: &[TableRow],
    range_label: &str,
) -> String {
    render_report_html(patient, doctor_name, rows, range_label, Utc::now().date_naive())
}

/// Render the report with an explicit issue date.
pub fn render_report_html(
    patient: &PatientInfo,
    doctor_name: &str,
    rows: &[TableRow],
    range_label: &str,
    issued_on: NaiveDate,
) -> String {
    let patient_age = patient
        .age
        .map(|age| format!(" &middot; {age} years"))
        .unwrap_or_default();
    let body = if rows.is_empty() {
        r#"<tr><td colspan="7" class="empty">No records in this period.</td></tr>"#.to_string()
    } else {
        rows.iter().map(render_row).collect::<Vec<_>>().join("\n")
    };
    let emergencies = rows.iter().filter(|r| r.is_emergency).count();

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Symptom history &middot; {patient_name}</title>
<style>
body{{margin:24px;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;color:#1c1917;font-size:12px}}
h1{{font-size:18px;margin:0 0 4px}}
.meta{{color:#57534e;margin:0 0 16px}}
table{{width:100%;border-collapse:collapse}}
th{{text-align:left;background:#f5f5f4;border-bottom:2px solid #d6d3d1;padding:6px}}
td{{border-bottom:1px solid #e7e5e4;padding:6px;vertical-align:top}}
tr.emergency td{{background:#fef2f2}}
.status-urgency{{font-weight:700;color:#b91c1c}}
.text-red{{color:#b91c1c;font-weight:600}}
.bg-alert{{background:#fee2e2}}
.empty{{text-align:center;color:#78716c}}
</style>
</head>
<body>
<h1>Symptom history</h1>
<p class="meta">Patient: <strong>{patient_name}</strong>{patient_age}<br>
Prepared for: {doctor_name}<br>
Period: {range_label} &middot; {count} records &middot; {emergencies} urgent<br>
Issued: {issued}</p>
<table>
<thead>
<tr><th>Date</th><th>Status</th><th>Symptoms</th><th>Pain</th><th>Blood pressure</th><th>HR / SpO2</th><th>Context</th></tr>
</thead>
<tbody>
{body}
</tbody>
</table>
</body>
</html>"##,
        patient_name = escape_html(&patient.name),
        patient_age = patient_age,
        doctor_name = escape_html(doctor_name),
        range_label = escape_html(range_label),
        count = rows.len(),
        emergencies = emergencies,
        issued = issued_on.format("%d/%m/%Y"),
        body = body,
    )
}

fn render_row(row: &TableRow) -> String {
    let (row_class, status) = if row.is_emergency {
        (r#" class="emergency""#, r#"<span class="status-urgency">URGENCY</span>"#)
    } else {
        ("", "Normal")
    };

    let mut symptoms = escape_html(row.primary_label());
    if !row.symptom_secondary.is_empty() {
        symptoms.push_str("<br><small>");
        symptoms.push_str(&escape_html(&row.secondary_label()));
        symptoms.push_str("</small>");
    }

    let pressure = match row.pressure {
        Some(p) => {
            let class = if row.is_high_pressure { r#" class="text-red""# } else { "" };
            format!("<td{class}>{}/{} (MAP {})</td>", p.systolic, p.diastolic, p.map)
        }
        None => "<td></td>".to_string(),
    };

    let vitals_class = if row.is_low_oxygen { r#" class="bg-alert""# } else { "" };
    let heart_rate = format_number(row.heart_rate);
    let spo2 = row
        .oxygen_saturation
        .map(|v| format!("{v}%"))
        .unwrap_or_default();
    let vitals = match (heart_rate.is_empty(), spo2.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("{heart_rate} bpm"),
        (true, false) => spo2,
        (false, false) => format!("{heart_rate} bpm / {spo2}"),
    };

    let pain = row.pain_level.map(|p| p.to_string()).unwrap_or_default();
    let context = escape_html(row.context.as_deref().map(str::trim).unwrap_or_default());

    format!(
        "<tr{row_class}><td>{date}</td><td>{status}</td><td>{symptoms}</td><td>{pain}</td>{pressure}<td{vitals_class}>{vitals}</td><td>{context}</td></tr>",
        date = escape_html(&row.date_time),
    )
}
