//! CSV export of a meeting's registrants.
//!
//! Fixed column order and a UTF-8 byte-order-mark so spreadsheet imports
//! pick the right encoding. The attachment filename is derived from the
//! meeting date and title.

use convene_types::{Meeting, Registrant};

const BOM: &str = "\u{FEFF}";
const HEADER: &str = "first-name,last-name,address,zip,city,country,created-timestamp";

/// Renders registrants as a CSV attachment.
///
/// Returns `(filename, bytes)`; the filename follows
/// `exportedMeeting-<date>-<snake_title>.csv`.
pub fn render_csv(meeting: &Meeting, registrants: &[Registrant]) -> (String, Vec<u8>) {
    let filename = format!(
        "exportedMeeting-{}-{}.csv",
        meeting.date,
        snake_title(&meeting.title)
    );

    let mut out = String::with_capacity(64 + registrants.len() * 80);
    out.push_str(BOM);
    out.push_str(HEADER);
    out.push('\n');

    for r in registrants {
        let created = chrono::DateTime::from_timestamp_millis(r.created_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let fields = [
            r.first_name.as_str(),
            r.last_name.as_str(),
            r.address.as_str(),
            r.zip.as_str(),
            r.city.as_str(),
            r.country.as_str(),
            created.as_str(),
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    (filename, out.into_bytes())
}

/// Lowercases the title and maps anything outside `[a-z0-9]` to `_`.
fn snake_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Quotes a field when it contains a delimiter, quote or newline.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
