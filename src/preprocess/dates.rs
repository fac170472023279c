//! Date-range extraction from lowercased query text.
//!
//! Recognized phrasings are tried as an ordered list of independent
//! matchers; the first one that produces a range wins and later matchers
//! are not attempted. Anything unrecognized is left in the text for the
//! embedding step.

use chrono::{Datelike, Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::preprocess::stopwords::{month_number, MONTH_NAMES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    fn single(day: NaiveDate) -> Self {
        DateRange { from: day, to: day }
    }
}

type Matcher = fn(&str, NaiveDate) -> Option<DateRange>;

/// Priority order matters: "last march" must not fall through to the
/// bare month-name matcher, and "march 2024" must be claimed before the
/// absolute-date scan sees the year.
const MATCHERS: &[Matcher] = &[
    match_relative_day,
    match_last_named_month,
    match_last_month,
    match_last_week,
    match_last_year,
    match_month_year,
    match_absolute_dates,
];

pub fn extract(text: &str, today: NaiveDate) -> Option<DateRange> {
    MATCHERS.iter().find_map(|matcher| matcher(text, today))
}

fn month_span(year: i32, month: u32) -> Option<DateRange> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(DateRange {
        from,
        to: next.pred_opt()?,
    })
}

fn match_relative_day(text: &str, today: NaiveDate) -> Option<DateRange> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b(today|yesterday|tomorrow)\b").unwrap());

    let day = match RE.captures(text)?.get(1)?.as_str() {
        "today" => today,
        "yesterday" => today.pred_opt()?,
        "tomorrow" => today.succ_opt()?,
        _ => return None,
    };
    Some(DateRange::single(day))
}

/// "last march" means the most recent March that is not later than the
/// current month; a named month past the current one rolls back a year.
fn match_last_named_month(text: &str, today: NaiveDate) -> Option<DateRange> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(r"\blast\s+({})\b", MONTH_NAMES.join("|"))).unwrap()
    });

    let month = month_number(RE.captures(text)?.get(1)?.as_str())?;
    let year = if month > today.month() {
        today.year() - 1
    } else {
        today.year()
    };
    month_span(year, month)
}

fn match_last_month(text: &str, today: NaiveDate) -> Option<DateRange> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\blast\s+month\b").unwrap());
    if !RE.is_match(text) {
        return None;
    }

    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    month_span(year, month)
}

/// The most recently completed Monday-Sunday span.
fn match_last_week(text: &str, today: NaiveDate) -> Option<DateRange> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\blast\s+week\b").unwrap());
    if !RE.is_match(text) {
        return None;
    }

    let monday_this_week =
        today.checked_sub_days(Days::new(today.weekday().num_days_from_monday() as u64))?;
    let from = monday_this_week.checked_sub_days(Days::new(7))?;
    let to = from.checked_add_days(Days::new(6))?;
    Some(DateRange { from, to })
}

fn match_last_year(text: &str, today: NaiveDate) -> Option<DateRange> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\blast\s+year\b").unwrap());
    if !RE.is_match(text) {
        return None;
    }

    let year = today.year() - 1;
    Some(DateRange {
        from: NaiveDate::from_ymd_opt(year, 1, 1)?,
        to: NaiveDate::from_ymd_opt(year, 12, 31)?,
    })
}

fn match_month_year(text: &str, _today: NaiveDate) -> Option<DateRange> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(r"\b({})\s+(\d{{4}})\b", MONTH_NAMES.join("|"))).unwrap()
    });

    let caps = RE.captures(text)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let year: i32 = caps.get(2)?.as_str().parse().ok()?;
    month_span(year, month)
}

/// Fallback scan for absolute dates anywhere in the text. One date makes a
/// one-day range; several distinct dates collapse to [min, max].
fn match_absolute_dates(text: &str, today: NaiveDate) -> Option<DateRange> {
    let mut found = scan_absolute_dates(text, today);
    found.sort();
    found.dedup();

    match (found.first(), found.last()) {
        (Some(&first), Some(&last)) => Some(DateRange {
            from: first,
            to: last,
        }),
        _ => None,
    }
}

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").unwrap());
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({})\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s*(\d{{4}}))?",
        MONTH_NAMES.join("|")
    ))
    .unwrap()
});
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({})\b(?:,?\s*(\d{{4}}))?",
        MONTH_NAMES.join("|")
    ))
    .unwrap()
});

fn scan_absolute_dates(text: &str, today: NaiveDate) -> Vec<NaiveDate> {
    let mut found = vec![];

    for caps in ISO_DATE.captures_iter(text) {
        let parsed = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        );
        if let (Ok(y), Ok(m), Ok(d)) = parsed {
            found.extend(NaiveDate::from_ymd_opt(y, m, d));
        }
    }

    // day-first, matching the invoice data's locale
    for caps in SLASH_DATE.captures_iter(text) {
        let parsed = (
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        );
        if let (Ok(d), Ok(m), Ok(mut y)) = parsed {
            if y < 100 {
                y += 2000;
            }
            found.extend(NaiveDate::from_ymd_opt(y, m, d));
        }
    }

    for caps in MONTH_DAY.captures_iter(text) {
        let month = month_number(&caps[1]);
        let day = caps[2].parse::<u32>().ok();
        let year = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .unwrap_or(today.year());
        if let (Some(m), Some(d)) = (month, day) {
            found.extend(NaiveDate::from_ymd_opt(year, m, d));
        }
    }

    for caps in DAY_MONTH.captures_iter(text) {
        let day = caps[1].parse::<u32>().ok();
        let month = month_number(&caps[2]);
        let year = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .unwrap_or(today.year());
        if let (Some(d), Some(m)) = (day, month) {
            found.extend(NaiveDate::from_ymd_opt(year, m, d));
        }
    }

    found
}

/// Patterns removed from the working text once date extraction has run,
/// whether or not a matcher produced a range from them.
static REMOVAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let months = MONTH_NAMES.join("|");
    [
        r"\b(today|yesterday|tomorrow)\b".to_string(),
        format!(r"\b(last|next)\s+(week|month|year|{months})\b"),
        r"\b\d{4}-\d{1,2}-\d{1,2}\b".to_string(),
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\b".to_string(),
        format!(r"\b({months})\s+\d{{1,2}}(st|nd|rd|th)?\b(,?\s*\d{{4}})?"),
        format!(r"\b\d{{1,2}}(st|nd|rd|th)?\s+({months})\b(,?\s*\d{{4}})?"),
        format!(r"\b({months})\s+\d{{4}}\b"),
    ]
    .into_iter()
    .map(|p| Regex::new(&p).unwrap())
    .collect()
});

static DANGLING_PAIRS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\bbetween\s+and\b", r"\bfrom\s+to\b"]
        .into_iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});
static TRAILING_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(and|to|from|for|between)\s*$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip every recognized date substring and collapse the connector words
/// it leaves dangling.
pub fn strip_date_text(text: &str) -> String {
    let mut out = text.to_string();
    for pattern in REMOVAL_PATTERNS.iter() {
        out = pattern.replace_all(&out, " ").into_owned();
    }
    for pattern in DANGLING_PAIRS.iter() {
        out = pattern.replace_all(&out, " ").into_owned();
    }
    let out = WHITESPACE.replace_all(&out, " ").into_owned();
    let out = TRAILING_CONNECTOR.replace_all(out.trim(), "").into_owned();
    out.trim().to_string()
}
