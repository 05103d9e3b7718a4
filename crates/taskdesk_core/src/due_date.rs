//! Due-date references embedded in free-form task titles.
//!
//! Three formal patterns are recognized, tried in this order: slash dates
//! (`5/12`, `5/12/26`), weekday names (`wednesday`, `wed`) and month-day
//! pairs (`may 12`, `jan 5`). Informal words such as "tod" or "tomorrow" are
//! not part of the grammar.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset, Weekday};

const WEEKDAYS: [(&str, &str, Weekday); 7] = [
    ("sunday", "sun", Weekday::Sunday),
    ("monday", "mon", Weekday::Monday),
    ("tuesday", "tue", Weekday::Tuesday),
    ("wednesday", "wed", Weekday::Wednesday),
    ("thursday", "thu", Weekday::Thursday),
    ("friday", "fri", Weekday::Friday),
    ("saturday", "sat", Weekday::Saturday),
];

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static SLASH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})/([0-9]{1,2})(?:/([0-9]{2,4}))?").expect("slash date pattern")
});

// Full names first, then abbreviations; within each pass Sunday comes first.
static WEEKDAY_RES: LazyLock<Vec<(Regex, Weekday)>> = LazyLock::new(|| {
    let full = WEEKDAYS.iter().map(|(name, _, day)| (*name, *day));
    let short = WEEKDAYS.iter().map(|(_, abbr, day)| (*abbr, *day));
    full.chain(short)
        .map(|(word, day)| {
            let re = Regex::new(&format!(r"(?i)\b{word}\b")).expect("weekday pattern");
            (re, day)
        })
        .collect()
});

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec|january|february|march|april|may|june|july|august|september|october|november|december)\s+([0-9]{1,2})\b",
    )
    .expect("month day pattern")
});

/// Result of a single extraction attempt.
///
/// `date` is set exactly when `matched_text` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DateMatch {
    pub date: Option<Date>,
    pub matched_text: String,
}

impl DateMatch {
    pub fn none() -> Self {
        Self::default()
    }

    fn found(date: Date, matched_text: &str) -> Self {
        Self {
            date: Some(date),
            matched_text: matched_text.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub cleaned_text: String,
    pub due_date: Option<Date>,
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn local_today() -> Date {
    OffsetDateTime::now_utc().to_offset(local_offset()).date()
}

/// Midnight of `date` in the local offset, the form due dates are stored in.
pub fn due_at_midnight(date: Date) -> OffsetDateTime {
    date.midnight().assume_offset(local_offset())
}

pub fn extract(text: &str) -> DateMatch {
    extract_on(text, local_today())
}

pub fn extract_on(text: &str, today: Date) -> DateMatch {
    match find_reference(text, today) {
        Some((date, span)) => DateMatch::found(date, &text[span]),
        None => DateMatch::none(),
    }
}

/// Date and byte span of the first recognized reference in `text`.
fn find_reference(text: &str, today: Date) -> Option<(Date, Range<usize>)> {
    if text.trim().is_empty() {
        return None;
    }

    slash_date(text, today)
        .or_else(|| weekday(text, today))
        .or_else(|| month_day(text, today))
}

pub fn strip_date_reference(text: &str) -> Stripped {
    strip_date_reference_on(text, local_today())
}

pub fn strip_date_reference_on(text: &str, today: Date) -> Stripped {
    match find_reference(text, today) {
        Some((date, span)) => {
            let mut cleaned = String::with_capacity(text.len() - span.len());
            cleaned.push_str(&text[..span.start]);
            cleaned.push_str(&text[span.end..]);
            Stripped {
                cleaned_text: cleaned.trim().to_string(),
                due_date: Some(date),
            }
        }
        None => Stripped {
            cleaned_text: text.to_string(),
            due_date: None,
        },
    }
}

fn slash_date(input: &str, today: Date) -> Option<(Date, Range<usize>)> {
    let captures = SLASH_DATE_RE.captures(input)?;
    let month = captures[1].parse::<i64>().ok()?;
    let day = captures[2].parse::<i64>().ok()?;
    let year = match captures.get(3) {
        Some(raw) => {
            let year = raw.as_str().parse::<i32>().ok()?;
            match year {
                0..=49 => year + 2000,
                50..=99 => year + 1900,
                _ => year,
            }
        }
        None => today.year(),
    };

    let date = rolled_date(year, month - 1, day)?;
    Some((date, captures.get(0)?.range()))
}

fn weekday(input: &str, today: Date) -> Option<(Date, Range<usize>)> {
    let (span, target) = WEEKDAY_RES
        .iter()
        .find_map(|(re, day)| re.find(input).map(|found| (found.range(), *day)))?;

    let current = i64::from(today.weekday().number_days_from_sunday());
    let wanted = i64::from(target.number_days_from_sunday());
    let date = today.checked_add(Duration::days((wanted - current).rem_euclid(7)))?;
    Some((date, span))
}

fn month_day(input: &str, today: Date) -> Option<(Date, Range<usize>)> {
    let captures = MONTH_DAY_RE.captures(input)?;
    let name = captures[1].to_ascii_lowercase();
    let month_index = MONTH_ABBREVIATIONS
        .iter()
        .position(|abbr| name.starts_with(abbr))?;
    let day = captures[2].parse::<i64>().ok()?;

    let current_index = usize::from(u8::from(today.month())) - 1;
    let year = if month_index < current_index {
        today.year() + 1
    } else {
        today.year()
    };

    let date = rolled_date(year, month_index as i64, day)?;
    Some((date, captures.get(0)?.range()))
}

/// Builds a date from a 0-based month and a 1-based day, carrying overflow
/// into the following months and years (13/1 is January of the next year,
/// 2/30 lands in March).
fn rolled_date(year: i32, month_index: i64, day: i64) -> Option<Date> {
    let months = i64::from(year) * 12 + month_index;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(months.rem_euclid(12) + 1).ok()?).ok()?;
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    first.checked_add(Duration::days(day - 1))
}

#[cfg(test)]
mod tests {
    use super::{DateMatch, extract_on, strip_date_reference_on};
    use time::macros::date;
    use time::{Date, Duration, Weekday};

    const WEEKDAY_WORDS: [(&str, Weekday); 14] = [
        ("sunday", Weekday::Sunday),
        ("monday", Weekday::Monday),
        ("tuesday", Weekday::Tuesday),
        ("wednesday", Weekday::Wednesday),
        ("thursday", Weekday::Thursday),
        ("friday", Weekday::Friday),
        ("saturday", Weekday::Saturday),
        ("sun", Weekday::Sunday),
        ("mon", Weekday::Monday),
        ("tue", Weekday::Tuesday),
        ("wed", Weekday::Wednesday),
        ("thu", Weekday::Thursday),
        ("fri", Weekday::Friday),
        ("sat", Weekday::Saturday),
    ];

    fn found(text: &str, today: Date) -> Date {
        extract_on(text, today)
            .date
            .unwrap_or_else(|| panic!("expected a date in {text:?}"))
    }

    #[test]
    fn slash_date_without_year_uses_current_year() {
        let today = date!(2026 - 10 - 19);
        let result = extract_on("dentist 5/12", today);

        assert_eq!(result.date, Some(date!(2026 - 05 - 12)));
        assert_eq!(result.matched_text, "5/12");
    }

    #[test]
    fn slash_date_two_digit_years_pivot_at_fifty() {
        let today = date!(2026 - 10 - 19);

        assert_eq!(found("5/12/49", today), date!(2049 - 05 - 12));
        assert_eq!(found("5/12/50", today), date!(1950 - 05 - 12));
        assert_eq!(found("5/12/99", today), date!(1999 - 05 - 12));
        assert_eq!(found("12/31/00", today), date!(2000 - 12 - 31));
        assert_eq!(found("1/2/2031", today), date!(2031 - 01 - 02));
    }

    #[test]
    fn slash_date_round_trips_every_month_and_day() {
        let today = date!(2026 - 10 - 19);
        let mut day = date!(2026 - 01 - 01);
        while day.year() == 2026 {
            let text = format!("{}/{}", u8::from(day.month()), day.day());
            assert_eq!(found(&text, today), day);
            day = day.next_day().unwrap();
        }
    }

    #[test]
    fn slash_date_rolls_over_out_of_range_parts() {
        let today = date!(2026 - 10 - 19);

        assert_eq!(found("13/1", today), date!(2027 - 01 - 01));
        assert_eq!(found("2/30/2026", today), date!(2026 - 03 - 02));
        assert_eq!(found("3/0/2026", today), date!(2026 - 02 - 28));
    }

    #[test]
    fn weekday_resolves_within_the_coming_week() {
        let mut today = date!(2026 - 10 - 18);
        for _ in 0..7 {
            for (word, weekday) in WEEKDAY_WORDS {
                let text = format!("meeting {word}");
                let result = found(&text, today);
                let offset = (result - today).whole_days();

                assert_eq!(result.weekday(), weekday, "{text} on {today}");
                assert!((0..=6).contains(&offset), "{text} on {today}");
                if today.weekday() == weekday {
                    assert_eq!(offset, 0, "{text} on {today}");
                }
            }
            today += Duration::days(1);
        }
    }

    #[test]
    fn weekday_match_is_case_insensitive_and_whole_word() {
        let monday = date!(2026 - 10 - 19);

        let result = extract_on("Standup WED", monday);
        assert_eq!(result.date, Some(date!(2026 - 10 - 21)));
        assert_eq!(result.matched_text, "wed");

        assert_eq!(extract_on("plan the wedding", monday), DateMatch::none());
    }

    #[test]
    fn full_weekday_names_win_over_abbreviations() {
        let monday = date!(2026 - 10 - 19);
        let result = extract_on("mon or friday", monday);

        assert_eq!(result.matched_text, "friday");
        assert_eq!(result.date, Some(date!(2026 - 10 - 23)));
    }

    #[test]
    fn month_day_uses_current_year_when_month_not_passed() {
        let today = date!(2026 - 05 - 20);

        assert_eq!(found("may 12", today), date!(2026 - 05 - 12));
        assert_eq!(found("Pay rent June 1", today), date!(2026 - 06 - 01));
        assert_eq!(found("january 15", date!(2026 - 01 - 02)), date!(2026 - 01 - 15));
    }

    #[test]
    fn month_day_rolls_elapsed_month_to_next_year() {
        let today = date!(2026 - 12 - 01);
        let result = extract_on("due jan 5", today);

        assert_eq!(result.date, Some(date!(2027 - 01 - 05)));
        assert_eq!(result.matched_text, "jan 5");
    }

    #[test]
    fn month_name_needs_a_day_number() {
        let today = date!(2026 - 10 - 19);

        assert_eq!(extract_on("marching band", today), DateMatch::none());
        assert_eq!(extract_on("may be later", today), DateMatch::none());
    }

    #[test]
    fn slash_date_takes_priority_over_weekday() {
        let today = date!(2026 - 10 - 19);
        let result = extract_on("wed 11/4", today);

        assert_eq!(result.date, Some(date!(2026 - 11 - 04)));
        assert_eq!(result.matched_text, "11/4");
    }

    #[test]
    fn weekday_takes_priority_over_month_day() {
        let monday = date!(2026 - 10 - 19);
        let result = extract_on("dec 3 or tue", monday);

        assert_eq!(result.matched_text, "tue");
    }

    #[test]
    fn informal_words_are_not_dates() {
        let today = date!(2026 - 10 - 19);

        for text in ["Buy groceries tod", "call back tom", "today", "tomorrow", ""] {
            let result = extract_on(text, today);
            assert_eq!(result, DateMatch::none(), "{text:?}");
        }
    }

    #[test]
    fn strip_removes_first_match_from_original_text() {
        let monday = date!(2026 - 10 - 19);
        let stripped = strip_date_reference_on("Call mom WED", monday);

        assert_eq!(stripped.cleaned_text, "Call mom");
        assert_eq!(stripped.due_date, Some(date!(2026 - 10 - 21)));
    }

    #[test]
    fn strip_cuts_the_matched_word_not_an_earlier_prefix() {
        let monday = date!(2026 - 10 - 19);
        let stripped = strip_date_reference_on("Wedding on wed", monday);

        assert_eq!(stripped.cleaned_text, "Wedding on");
        assert_eq!(stripped.due_date, Some(date!(2026 - 10 - 21)));
    }

    #[test]
    fn strip_keeps_surrounding_case_and_non_ascii_text() {
        let monday = date!(2026 - 10 - 19);
        let stripped = strip_date_reference_on("Überweisung Jan 5 prüfen", monday);

        assert_eq!(stripped.cleaned_text, "Überweisung  prüfen");
        assert_eq!(stripped.due_date, Some(date!(2027 - 01 - 05)));
    }

    #[test]
    fn strip_trims_after_removing_leading_reference() {
        let today = date!(2026 - 10 - 19);
        let stripped = strip_date_reference_on("  11/4 Renew passport ", today);

        assert_eq!(stripped.cleaned_text, "Renew passport");
        assert_eq!(stripped.due_date, Some(date!(2026 - 11 - 04)));
    }

    #[test]
    fn strip_without_match_returns_text_unchanged() {
        let today = date!(2026 - 10 - 19);
        let stripped = strip_date_reference_on(" Buy groceries tod ", today);

        assert_eq!(stripped.cleaned_text, " Buy groceries tod ");
        assert_eq!(stripped.due_date, None);
    }
}
