//! Exports of the filtered, sorted history: CSV text and an HTML report
//! handed to an external print-to-PDF renderer.
//!
//! Callers pass rows already filtered and sorted; exports keep that order.

pub mod csv;
pub mod report;

pub use csv::{escape_csv_cell, to_csv};
pub use report::{escape_html, render_report_html, to_pdf_html};

/// Format an optional number without a trailing ".0".
pub(crate) fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_render_without_decimals() {
        assert_eq!(format_number(Some(97.0)), "97");
        assert_eq!(format_number(Some(97.5)), "97.5");
        assert_eq!(format_number(None), "");
    }
}
