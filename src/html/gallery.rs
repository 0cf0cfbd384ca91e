//! Gallery page rendering

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::storage::StoredPhoto;
use crate::upload::HomeworkId;

/// Render the gallery for one homework id.
///
/// `photos` are shown in the order given, which the store returns most recent first.
/// Capture times are displayed at `display_offset`, or in the host's zone when `None`.
pub fn render_gallery(
    homework_id: &HomeworkId,
    photos: &[StoredPhoto],
    display_offset: Option<FixedOffset>,
    now: DateTime<Utc>,
) -> String {
    let title = encode_text(homework_id.as_str());

    let mut body = String::new();
    if photos.is_empty() {
        body.push_str("    <p class=\"empty\">No photos have been uploaded yet.</p>\n");
    } else {
        body.push_str("    <ul class=\"photos\">\n");
        for photo in photos {
            let url = encode_double_quoted_attribute(&photo.url()).into_owned();
            let absolute = match display_offset {
                Some(offset) => format_capture_time(&photo.captured_at.with_timezone(&offset)),
                None => format_capture_time(&photo.captured_at.with_timezone(&Local)),
            };
            let relative = humanize_since(photo.captured_at.with_timezone(&Utc), now);
            body.push_str(&format!(
                concat!(
                    "      <li>\n",
                    "        <a href=\"{url}\"><img src=\"{url}\" alt=\"{alt}\"></a>\n",
                    "        <p><time datetime=\"{iso}\">{absolute}</time> ({relative})</p>\n",
                    "      </li>\n",
                ),
                url = url,
                alt = encode_double_quoted_attribute(&photo.file_name),
                iso = encode_double_quoted_attribute(&photo.captured_at.to_rfc3339()),
                absolute = encode_text(&absolute),
                relative = encode_text(&relative),
            ));
        }
        body.push_str("    </ul>\n");
    }

    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "  <head>\n",
            "    <meta charset=\"utf-8\">\n",
            "    <title>Photos for {title}</title>\n",
            "  </head>\n",
            "  <body>\n",
            "    <h1>Photos for {title}</h1>\n",
            "{body}",
            "  </body>\n",
            "</html>\n",
        ),
        title = title,
        body = body,
    )
}

/// Absolute timestamp as shown in the gallery, e.g. `Mar 1, 2024 5:04 PM`
pub fn format_capture_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%b %-d, %Y %-I:%M %p").to_string()
}

/// Coarse relative time, e.g. "3 minutes ago". Instants in the future read "just now".
pub fn humanize_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 10 {
        return "just now".to_string();
    }

    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let (count, unit, article) = if secs < MINUTE {
        return format!("{} seconds ago", secs);
    } else if secs < HOUR {
        (secs / MINUTE, "minute", "a")
    } else if secs < DAY {
        (secs / HOUR, "hour", "an")
    } else if secs < MONTH {
        (secs / DAY, "day", "a")
    } else if secs < YEAR {
        (secs / MONTH, "month", "a")
    } else {
        (secs / YEAR, "year", "a")
    };

    if count == 1 {
        format!("{} {} ago", article, unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}
