//! Google Calendar link construction
//!
//! Pure string building: no network, no state.

use std::sync::LazyLock;

use regex::Regex;
use urlencoding::encode;

use crate::extractor::EventDetails;

const GCAL_BASE_URL: &str = "https://www.google.com/calendar/render?action=TEMPLATE";

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:http|ftp)s?://(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)$",
    )
    .expect("valid pattern")
});

/// Build a Google Calendar event-template URL from extracted fields
///
/// Title, location and description are percent-encoded; the dates field is
/// passed through as-is (it is validated upstream). The trailing
/// `openExternalBrowser=1` keeps LINE's in-app browser from swallowing the
/// link.
#[must_use]
pub fn google_calendar_url(details: &EventDetails) -> String {
    format!(
        "{GCAL_BASE_URL}&text={}&dates={}&location={}&details={}&openExternalBrowser=1",
        encode(&details.title),
        details.time,
        encode(&details.location),
        encode(&details.content),
    )
}

/// Loose http/ftp URL validity check
#[must_use]
pub fn is_url_valid(url: &str) -> bool {
    URL_RE.is_match(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> EventDetails {
        EventDetails {
            time: "20240409T070000Z/20240409T080000Z".to_string(),
            location: "Taipei City".to_string(),
            title: "Opening & ceremony".to_string(),
            content: "Bring your badge.".to_string(),
        }
    }

    #[test]
    fn calendar_url_encodes_text_fields() {
        let url = google_calendar_url(&details());

        assert!(url.starts_with(GCAL_BASE_URL));
        assert!(url.contains("text=Opening%20%26%20ceremony"));
        assert!(url.contains("location=Taipei%20City"));
        // dates stay unencoded so the interval slash survives
        assert!(url.contains("dates=20240409T070000Z/20240409T080000Z"));
        assert!(url.ends_with("&openExternalBrowser=1"));
    }

    #[test]
    fn built_calendar_url_passes_the_validity_check() {
        assert!(is_url_valid(&google_calendar_url(&details())));
    }

    #[test]
    fn url_validity_matrix() {
        assert!(is_url_valid("https://example.com/path?q=1"));
        assert!(is_url_valid("http://localhost:8080/"));
        assert!(is_url_valid("https://10.0.0.1/img.png"));
        assert!(!is_url_valid("example.com"));
        assert!(!is_url_valid("not a url"));
        assert!(!is_url_valid("file:///etc/passwd"));
    }
}
