//! Extraction of collection events from the rendered 311 results calendar.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use curbside_core::model::{CollectionEvent, WasteStream};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::ScrapeError;

const HEADING_SELECTOR: &str = r#"h2, h3, [role="heading"]"#;
const CELL_SELECTOR: &str = r#"[role="gridcell"]"#;

static MONTH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})",
    )
    .expect("month header pattern is valid")
});

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Pull every collection day out of the results page.
///
/// The displayed month comes from the first heading that reads like `March 2025`;
/// `today` supplies the month and year when no heading does.
///
/// # Errors
///
/// Returns [`ScrapeError::Selector`] if one of the built-in selectors fails to parse.
pub fn extract_calendar(html: &str, today: NaiveDate) -> Result<Vec<CollectionEvent>, ScrapeError> {
    let document = Html::parse_document(html);
    let headings = parse_selector(HEADING_SELECTOR)?;
    let cells = parse_selector(CELL_SELECTOR)?;

    let (year, month) = document
        .select(&headings)
        .find_map(|heading| parse_month_header(&element_text(heading)))
        .unwrap_or((today.year(), today.month()));

    let mut events: Vec<CollectionEvent> = document
        .select(&cells)
        .filter_map(|cell| classify_cell(&element_text(cell), year, month))
        .collect();
    events.sort_by_key(|event| event.date);
    Ok(events)
}

/// Parse `<Month> <Year>` out of heading text.
#[must_use]
pub fn parse_month_header(text: &str) -> Option<(i32, u32)> {
    let captures = MONTH_HEADER.captures(text)?;
    let month_name = captures.get(1)?.as_str();
    let year = captures.get(2)?.as_str().parse().ok()?;
    let index = MONTHS.iter().position(|name| *name == month_name)?;
    let month = u32::try_from(index).ok()?.checked_add(1)?;
    Some((year, month))
}

/// Turn the text of one calendar cell into an event.
///
/// The first line must be the day number and the remaining lines must mention at least
/// one waste stream; anything else yields `None`.
#[must_use]
pub fn classify_cell(text: &str, year: i32, month: u32) -> Option<CollectionEvent> {
    let mut lines = text.trim().lines();
    let day_line = lines.next()?.trim();
    if day_line.is_empty() || !day_line.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let description = lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if description.is_empty() {
        return None;
    }

    let streams = WasteStream::classify(&description);
    if streams.is_empty() {
        return None;
    }
    let day = day_line.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(CollectionEvent::from_streams(date, &streams))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_selector(selector: &'static str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|err| ScrapeError::Selector {
        selector,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn cell_with_day_and_streams_becomes_event() {
        let event = classify_cell("15\nGarbage, Recycling", 2025, 3).expect("event");
        assert_eq!(event.date, date(2025, 3, 15));
        assert_eq!(event.kind, "Garbage, Recycling");
    }

    #[test]
    fn cell_without_keywords_is_skipped() {
        assert!(classify_cell("15\nNo collection", 2025, 3).is_none());
        assert!(classify_cell("15", 2025, 3).is_none());
        assert!(classify_cell("15\n  \n", 2025, 3).is_none());
        assert!(classify_cell("Mon\nGarbage", 2025, 3).is_none());
    }

    #[test]
    fn impossible_dates_are_skipped() {
        assert!(classify_cell("31\nGarbage", 2025, 4).is_none());
        assert!(classify_cell("0\nGarbage", 2025, 4).is_none());
    }

    #[test]
    fn yard_waste_label_comes_first() {
        let event = classify_cell("7\nrecycling\nYARD trimmings", 2025, 5).expect("event");
        assert_eq!(event.kind, "Yard waste, Recycling");
    }

    #[test]
    fn month_header_parses_name_and_year() {
        assert_eq!(parse_month_header("Collection calendar for March 2025"), Some((2025, 3)));
        assert_eq!(parse_month_header("December\n2024"), Some((2024, 12)));
        assert_eq!(parse_month_header("My Collection Schedule"), None);
        assert_eq!(parse_month_header("March"), None);
    }

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <h2>My Collection Schedule</h2>
          <div role="heading">February 2025</div>
          <table><tbody>
            <tr>
              <td role="gridcell"><span>3</span><div>Garbage</div><div>Recycling</div></td>
              <td role="gridcell"><span>4</span></td>
              <td role="gridcell"><span>5</span><div>No collection</div></td>
            </tr>
            <tr>
              <td role="gridcell"><span>10</span><div>Yard waste</div><div>Garbage</div></td>
              <td role="gridcell"><span>30</span><div>Garbage</div></td>
            </tr>
          </tbody></table>
        </body></html>
    "#;

    #[test]
    fn extracts_events_using_the_calendar_header() {
        let events = extract_calendar(RESULTS_PAGE, date(2030, 7, 1)).expect("extract");
        assert_eq!(
            events,
            vec![
                CollectionEvent {
                    date: date(2025, 2, 3),
                    kind: "Garbage, Recycling".to_owned(),
                },
                CollectionEvent {
                    date: date(2025, 2, 10),
                    kind: "Yard waste, Garbage".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn falls_back_to_today_without_a_header() {
        let page = r#"<table><tbody><tr>
            <td role="gridcell"><b>21</b><i>Recycling</i></td>
            <td role="gridcell"><b>2</b><i>Garbage</i></td>
        </tr></tbody></table>"#;
        let events = extract_calendar(page, date(2025, 6, 9)).expect("extract");
        let dates: Vec<NaiveDate> = events.iter().map(|event| event.date).collect();
        assert_eq!(dates, vec![date(2025, 6, 2), date(2025, 6, 21)]);
    }
}
