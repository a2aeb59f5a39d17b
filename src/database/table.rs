use chrono::{DateTime, NaiveDateTime};

use super::document::Document;

pub const STYLESHEET_LINK: &str =
    "<link href='https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css' rel='stylesheet'>";

/// Renders message records as a Date / Summary / Tag / ID table.
///
/// An empty slice still yields the header and an empty body.
pub fn render_message_table(records: &[Document]) -> String {
    let rows: String = records
        .iter()
        .map(|record| {
            let url = match record.str_field("url") {
                Some(url) if !url.is_empty() => url.to_string(),
                _ => "#".to_string(),
            };
            format!(
                "<tr class='border-b'>\
                 <td class='px-4 py-2'>{}</td>\
                 <td class='px-4 py-2'>{}</td>\
                 <td class='px-4 py-2'>{}</td>\
                 <td class='px-4 py-2'><a href='{}' class='text-blue-500 underline' target='_blank'>{}</a></td>\
                 </tr>",
                format_upload_date(&record.text("uploadDate")),
                record.text("summary"),
                record.text("tag"),
                url,
                record.text("id"),
            )
        })
        .collect();

    format!(
        "{}<div class='overflow-x-auto'>\
         <table class='min-w-full bg-white border border-gray-200'>\
         <thead class='bg-gray-100'><tr>\
         <th class='px-4 py-2 border-b'>Date</th>\
         <th class='px-4 py-2 border-b'>Summary</th>\
         <th class='px-4 py-2 border-b'>Tag</th>\
         <th class='px-4 py-2 border-b'>ID</th>\
         </tr></thead>\
         <tbody>{}</tbody></table></div>",
        STYLESHEET_LINK, rows
    )
}

/// `Monday, 04 March 2024, 09:30 AM`; unparseable input is returned as-is.
pub fn format_upload_date(raw: &str) -> String {
    const DISPLAY: &str = "%A, %d %B %Y, %I:%M %p";

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format(DISPLAY).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return parsed.format(DISPLAY).to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_records_render_header_only() {
        let html = render_message_table(&[]);

        assert!(html.contains("<th class='px-4 py-2 border-b'>Date</th>"));
        assert!(html.contains("<tbody></tbody>"));
        assert!(!html.contains("<tr class='border-b'>"));
    }

    #[test]
    fn rows_link_id_to_url_with_hash_fallback() {
        let records = vec![
            Document::new()
                .with("id", "m1")
                .with("summary", "Site visit")
                .with("tag", "operations")
                .with("uploadDate", "2024-03-04T09:30:00Z")
                .with("url", "https://example.org/m1"),
            Document::new().with("id", "m2"),
        ];

        let html = render_message_table(&records);

        assert!(html.contains("Monday, 04 March 2024, 09:30 AM"));
        assert!(html.contains("<a href='https://example.org/m1' class='text-blue-500 underline' target='_blank'>m1</a>"));
        assert!(html.contains("<a href='#' class='text-blue-500 underline' target='_blank'>m2</a>"));
    }

    #[test]
    fn unparseable_dates_are_kept_verbatim() {
        assert_eq!(format_upload_date("last week"), "last week");
        assert_eq!(
            format_upload_date("2024-03-04T14:05:00"),
            "Monday, 04 March 2024, 02:05 PM"
        );
    }
}
