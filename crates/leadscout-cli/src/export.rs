//! CSV export of ranked leads.
//!
//! Hand-rolled RFC-4180 quoting; the column set mirrors what downstream
//! spreadsheet consumers expect.

use std::path::Path;

use leadscout_core::Lead;

const HEADER: &[&str] = &[
    "Business Name",
    "Website",
    "Email",
    "Phone",
    "Address",
    "Instagram",
    "Facebook",
    "Twitter",
    "TikTok",
    "Rating",
    "Review Count",
    "Quality Score",
    "Source",
    "Processing Time",
];

/// Write `leads` to `path` as CSV, one row per lead, in the given order.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub(crate) fn write_csv(path: &Path, leads: &[Lead]) -> anyhow::Result<()> {
    let mut out = String::new();
    out.push_str(&HEADER.join(","));
    out.push('\n');

    for lead in leads {
        let row = [
            field(&lead.name),
            field(&lead.website),
            field(&lead.email),
            field(&lead.phone),
            field(&lead.address),
            field(&lead.instagram),
            field(&lead.facebook),
            field(&lead.twitter),
            field(&lead.tiktok),
            lead.rating.to_string(),
            lead.review_count.to_string(),
            lead.quality_score.to_string(),
            lead.source.to_string(),
            format!("{:.2}s", lead.processing_time),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    std::fs::write(path, out)?;
    Ok(())
}

/// Quote a field when it contains a comma, quote, or line break; embedded
/// quotes are doubled.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(name: &str, address: &str) -> Lead {
        let mut lead = Lead {
            name: name.to_string(),
            address: address.to_string(),
            ..Lead::default()
        };
        lead.recompute_quality();
        lead
    }

    #[test]
    fn plain_fields_are_unquoted() {
        assert_eq!(field("Joe's Pizza"), "Joe's Pizza");
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        assert_eq!(field("123 Main St, Austin, TX"), "\"123 Main St, Austin, TX\"");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(field("The \"Best\" Bar"), "\"The \"\"Best\"\" Bar\"");
    }

    #[test]
    fn writes_header_plus_one_row_per_lead() {
        let path = std::env::temp_dir().join(format!("leadscout_export_{}.csv", std::process::id()));
        let leads = vec![
            lead("Joe's Pizza", "123 Main St, Austin, TX"),
            lead("Haywire", ""),
        ];

        write_csv(&path, &leads).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Business Name,Website,Email"));
        assert!(lines[1].contains("\"123 Main St, Austin, TX\""));
        assert!(lines[2].starts_with("Haywire"));
    }
}
