//! Free-text date/time strings to `{start_date, end_date}`.
//!
//! Grammars are tried most-specific first: ranges across months, ranges within a
//! month, then single dates (month-first, ISO, US numeric, day-first). Times of day
//! are pulled out of the text before the date grammars run, so `"July 16, 2025
//! 8:00 PM - 10:00 PM"` and `("July 16, 2025", "8pm")` resolve the same way.
//! Anything else is a [`ParseFailure`]; this module never guesses a date.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{ParseFailure, ParseFailureReason};

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b\.?";

// Seconds, fractions and the UTC offset are consumed so they never read as a time of day.
static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{1,2}-\d{1,2})t(\d{1,2}:\d{2})(?::\d{2}(?:\.\d+)?)?(?:z|[+-]\d{2}:?\d{2})?")
        .unwrap()
});
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues|tue|weds|wed|thurs|thur|thu|fri|sat|sun)\b\.?,?",
    )
    .unwrap()
});
static RANGE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(?:to|through|thru|until|till)\s+").unwrap());
static OPEN_ENDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:to|through|thru|until|till)\b").unwrap());
static NOON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnoon\b").unwrap());
static MIDNIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bmidnight\b").unwrap());
static TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(\d{1,2})(?::(\d{2}))?(?::\d{2})?\s*(am|pm)\b|\b(\d{1,2}):(\d{2})(?::\d{2})?\b",
    )
    .unwrap()
});

// "7 - 10pm": the bare first hour is written out so it can borrow the meridiem
static BARE_HOUR_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})\s*-\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm))\b").unwrap()
});

static MONTH_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^{MONTH},?$")).unwrap());

static CROSS_MONTH_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b{MONTH}\s*(\d{{1,2}})\b(?:,?\s*(\d{{4}})\b)?\s*-\s*{MONTH}\s*(\d{{1,2}})\b(?:,?\s*(\d{{4}})\b)?"
    ))
    .unwrap()
});
static SAME_MONTH_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b{MONTH}\s*(\d{{1,2}})\s*-\s*(\d{{1,2}})\b(?:,?\s*(\d{{4}})\b)?"
    ))
    .unwrap()
});
static MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b{MONTH}\s*(\d{{1,2}})\b(?:,?\s*(\d{{4}})\b)?")).unwrap()
});
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static US_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}})\s+{MONTH}(?:,?\s*(\d{{4}})\b)?")).unwrap()
});

/// Per-venue-class timing defaults applied when the listing leaves times out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueDefaults {
    #[serde(with = "hhmm")]
    pub open_time: NaiveTime,
    /// `None` means "open time plus `duration_hours`"
    #[serde(default, with = "hhmm_opt")]
    pub close_time: Option<NaiveTime>,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: u32,
}

/// Longest default event length accepted from config, one week
pub const MAX_DURATION_HOURS: u32 = 168;

fn default_duration_hours() -> u32 {
    2
}

impl VenueDefaults {
    pub fn new(open_time: NaiveTime, close_time: Option<NaiveTime>, duration_hours: u32) -> Self {
        Self {
            open_time,
            close_time,
            duration_hours,
        }
    }

    pub fn library() -> Self {
        Self::new(hm(13, 0), Some(hm(15, 0)), 2)
    }

    pub fn gallery() -> Self {
        Self::new(hm(10, 0), Some(hm(17, 0)), 2)
    }

    pub fn nightclub() -> Self {
        Self::new(hm(21, 0), None, 4)
    }

    pub fn generic() -> Self {
        Self::new(hm(19, 0), None, 2)
    }

    pub fn default_duration(&self) -> Duration {
        Duration::hours(i64::from(self.duration_hours.min(MAX_DURATION_HOURS)))
    }

    pub fn opening_on(&self, day: NaiveDate) -> NaiveDateTime {
        day.and_time(self.open_time)
    }

    /// Closing instant for a day. A close time at or before the open time is past midnight.
    pub fn closing_on(&self, day: NaiveDate) -> NaiveDateTime {
        match self.close_time {
            Some(close) if close > self.open_time => day.and_time(close),
            Some(close) => (day + Duration::days(1)).and_time(close),
            None => self.opening_on(day) + self.default_duration(),
        }
    }
}

impl Default for VenueDefaults {
    fn default() -> Self {
        Self::generic()
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// A resolved event span in venue-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy)]
struct ClockReading {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
}

impl ClockReading {
    fn to_time(self) -> Result<NaiveTime, ParseFailureReason> {
        let hour = match self.meridiem {
            Some(_) if self.hour == 0 || self.hour > 12 => {
                return Err(ParseFailureReason::InvalidTimeOfDay)
            }
            Some(Meridiem::Am) if self.hour == 12 => 0,
            Some(Meridiem::Am) => self.hour,
            Some(Meridiem::Pm) if self.hour < 12 => self.hour + 12,
            Some(Meridiem::Pm) => 12,
            None => self.hour,
        };
        NaiveTime::from_hms_opt(hour, self.minute, 0).ok_or(ParseFailureReason::InvalidTimeOfDay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartialDate {
    year: Option<i32>,
    month: u32,
    day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateMatch {
    Single(PartialDate),
    Range(PartialDate, PartialDate),
}

/// Turns scraped date/time strings into a [`DateRange`]
pub struct DateRangeParser;

impl DateRangeParser {
    /// Parse `date_text` (plus an optional separate `time_text`) relative to `reference_now`.
    ///
    /// Years left out of the text default to the reference year and roll forward one
    /// year when that day has already passed.
    pub fn parse(
        date_text: &str,
        time_text: &str,
        reference_now: NaiveDateTime,
        defaults: &VenueDefaults,
    ) -> Result<DateRange, ParseFailure> {
        Self::parse_inner(date_text, time_text, reference_now, defaults)
            .map_err(|reason| ParseFailure::new(date_text, reason))
    }

    fn parse_inner(
        date_text: &str,
        time_text: &str,
        reference_now: NaiveDateTime,
        defaults: &VenueDefaults,
    ) -> Result<DateRange, ParseFailureReason> {
        let date_part = normalize(date_text);
        let time_part = normalize(time_text);

        // "Until July 10" names an end but no start
        if OPEN_ENDED.is_match(&date_part) {
            return Err(ParseFailureReason::NoRecognizedDate);
        }

        let mut readings = clock_readings(&time_part);
        if readings.is_empty() {
            readings = clock_readings(&date_part);
        }
        let date_only = TIME_OF_DAY.replace_all(&date_part, " ");

        let matched = match_date(&date_only)?;
        let (first_day, last_day) = resolve_days(matched, reference_now.date())?;
        let is_range = matches!(matched, DateMatch::Range(..));

        let times = readings
            .into_iter()
            .take(2)
            .map(ClockReading::to_time)
            .collect::<Result<Vec<_>, _>>()?;

        let (start_date, mut end_date) = match times.as_slice() {
            [start, end] => {
                let start_date = first_day.and_time(*start);
                let mut end_date = last_day.and_time(*end);
                if !is_range && end < start {
                    // 10pm - 2am
                    end_date += Duration::days(1);
                }
                (start_date, end_date)
            }
            [start] => {
                let start_date = first_day.and_time(*start);
                let end_date = if is_range {
                    defaults.closing_on(last_day)
                } else {
                    start_date + defaults.default_duration()
                };
                (start_date, end_date)
            }
            _ => (defaults.opening_on(first_day), defaults.closing_on(last_day)),
        };

        if end_date < start_date {
            end_date = start_date + defaults.default_duration();
        }

        Ok(DateRange {
            start_date,
            end_date,
        })
    }
}

fn normalize(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace(['\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}'], "-")
        .replace("a.m.", "am")
        .replace("p.m.", "pm");
    let lowered = ISO_DATETIME.replace_all(&lowered, "${1} ${2}");
    let lowered = ORDINAL.replace_all(&lowered, "${1}");
    let lowered = WEEKDAY.replace_all(&lowered, " ");
    let lowered = RANGE_WORD.replace_all(&lowered, " - ");
    let lowered = NOON.replace_all(&lowered, "12:00 pm");
    let lowered = MIDNIGHT.replace_all(&lowered, "12:00 am");
    let lowered = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    expand_bare_hour_ranges(&lowered)
}

fn expand_bare_hour_ranges(text: &str) -> String {
    BARE_HOUR_RANGE
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let before = &text[..caps.get(0).map_or(0, |m| m.start())];
            // "aug 15 - 7pm" is a day followed by a time, not an hour range
            let follows_date = before.ends_with(['-', '/'])
                || before
                    .split_whitespace()
                    .last()
                    .is_some_and(|word| MONTH_WORD.is_match(word));
            if follows_date {
                whole.to_string()
            } else {
                format!("{}:00 - {}", &caps[1], &caps[2])
            }
        })
        .into_owned()
}

fn clock_readings(text: &str) -> Vec<ClockReading> {
    let mut readings: Vec<ClockReading> = TIME_OF_DAY
        .captures_iter(text)
        .filter_map(|caps| {
            if let Some(hour) = caps.get(1) {
                Some(ClockReading {
                    hour: hour.as_str().parse().ok()?,
                    minute: caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?,
                    meridiem: caps.get(3).map(|m| {
                        if m.as_str() == "am" {
                            Meridiem::Am
                        } else {
                            Meridiem::Pm
                        }
                    }),
                })
            } else {
                Some(ClockReading {
                    hour: caps.get(4)?.as_str().parse().ok()?,
                    minute: caps.get(5)?.as_str().parse().ok()?,
                    meridiem: None,
                })
            }
        })
        .collect();

    // "7:00 - 9:00 pm": the first time borrows the second's meridiem unless that
    // would put it after the end.
    for i in 0..readings.len().saturating_sub(1) {
        let next = readings[i + 1];
        if readings[i].meridiem.is_some() || readings[i].hour > 12 {
            continue;
        }
        if let Some(meridiem) = next.meridiem {
            let mut borrowed = readings[i];
            borrowed.meridiem = Some(meridiem);
            let fits = match (borrowed.to_time(), next.to_time()) {
                (Ok(start), Ok(end)) => start <= end,
                _ => false,
            };
            readings[i].meridiem = if fits {
                Some(meridiem)
            } else if meridiem == Meridiem::Pm {
                Some(Meridiem::Am)
            } else {
                None
            };
        }
    }
    readings
}

fn match_date(text: &str) -> Result<DateMatch, ParseFailureReason> {
    if let Some(caps) = CROSS_MONTH_RANGE.captures(text) {
        let start = partial(&caps, 1, 2, 3)?;
        let end = partial(&caps, 4, 5, 6)?;
        return Ok(DateMatch::Range(start, end));
    }
    if let Some(caps) = SAME_MONTH_RANGE.captures(text) {
        let start = partial(&caps, 1, 2, 4)?;
        let end = partial(&caps, 1, 3, 4)?;
        return Ok(DateMatch::Range(start, end));
    }
    if let Some(caps) = MONTH_FIRST.captures(text) {
        return Ok(DateMatch::Single(partial(&caps, 1, 2, 3)?));
    }
    if let Some(caps) = ISO_DATE.captures(text) {
        return Ok(DateMatch::Single(PartialDate {
            year: Some(number(&caps, 1)?),
            month: number(&caps, 2)?,
            day: number(&caps, 3)?,
        }));
    }
    if let Some(caps) = US_NUMERIC.captures(text) {
        return Ok(DateMatch::Single(PartialDate {
            year: Some(number(&caps, 3)?),
            month: number(&caps, 1)?,
            day: number(&caps, 2)?,
        }));
    }
    if let Some(caps) = DAY_FIRST.captures(text) {
        return Ok(DateMatch::Single(partial(&caps, 2, 1, 3)?));
    }
    Err(ParseFailureReason::NoRecognizedDate)
}

fn partial(
    caps: &Captures<'_>,
    month_group: usize,
    day_group: usize,
    year_group: usize,
) -> Result<PartialDate, ParseFailureReason> {
    let month = caps
        .get(month_group)
        .and_then(|m| month_number(m.as_str()))
        .ok_or(ParseFailureReason::NoRecognizedDate)?;
    let year = match caps.get(year_group) {
        Some(_) => Some(number(caps, year_group)?),
        None => None,
    };
    Ok(PartialDate {
        year,
        month,
        day: number(caps, day_group)?,
    })
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Result<T, ParseFailureReason> {
    caps.get(group)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or(ParseFailureReason::NoRecognizedDate)
}

fn month_number(token: &str) -> Option<u32> {
    let month = match token.trim_end_matches('.').get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, ParseFailureReason> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ParseFailureReason::InvalidCalendarDate)
}

/// A yearless date lands in the reference year, or the next one if it has already passed.
fn upcoming(month: u32, day: u32, today: NaiveDate) -> Result<NaiveDate, ParseFailureReason> {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date >= today => Ok(date),
        _ => ymd(today.year() + 1, month, day),
    }
}

fn resolve_days(
    matched: DateMatch,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ParseFailureReason> {
    match matched {
        DateMatch::Single(date) => {
            let day = match date.year {
                Some(year) => ymd(year, date.month, date.day)?,
                None => upcoming(date.month, date.day, today)?,
            };
            Ok((day, day))
        }
        DateMatch::Range(first, last) => match (first.year, last.year) {
            (Some(first_year), Some(last_year)) => Ok((
                ymd(first_year, first.month, first.day)?,
                ymd(last_year, last.month, last.day)?,
            )),
            (None, Some(last_year)) => {
                let end = ymd(last_year, last.month, last.day)?;
                let start = ymd(last_year, first.month, first.day)?;
                if start > end {
                    // "Dec 28 - Jan 3, 2026"
                    Ok((ymd(last_year - 1, first.month, first.day)?, end))
                } else {
                    Ok((start, end))
                }
            }
            (Some(first_year), None) => {
                let start = ymd(first_year, first.month, first.day)?;
                Ok((start, following(start, last)?))
            }
            (None, None) => {
                let start = upcoming(first.month, first.day, today)?;
                Ok((start, following(start, last)?))
            }
        },
    }
}

/// Yearless range end: same year as the start, or the next if that would precede it
fn following(start: NaiveDate, last: PartialDate) -> Result<NaiveDate, ParseFailureReason> {
    let end = ymd(start.year(), last.month, last.day)?;
    if end < start {
        ymd(start.year() + 1, last.month, last.day)
    } else {
        Ok(end)
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(serde::de::Error::custom)
    }
}

mod hhmm_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&time.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn now() -> NaiveDateTime {
        at(2025, 6, 1, 9, 0)
    }

    fn parse(date: &str, time: &str, defaults: VenueDefaults) -> Result<DateRange, ParseFailure> {
        DateRangeParser::parse(date, time, now(), &defaults)
    }

    #[test]
    fn test_single_date_uses_gallery_hours() {
        let range = parse("July 4, 2025", "", VenueDefaults::gallery()).unwrap();
        assert_eq!(range.start_date, at(2025, 7, 4, 10, 0));
        assert_eq!(range.end_date, at(2025, 7, 4, 17, 0));
    }

    #[test]
    fn test_single_date_uses_library_hours() {
        let range = parse("Saturday, August 9, 2025", "", VenueDefaults::library()).unwrap();
        assert_eq!(range.start_date, at(2025, 8, 9, 13, 0));
        assert_eq!(range.end_date, at(2025, 8, 9, 15, 0));
    }

    #[test]
    fn test_nightclub_default_runs_past_midnight() {
        let range = parse("Aug 15, 2025", "", VenueDefaults::nightclub()).unwrap();
        assert_eq!(range.start_date, at(2025, 8, 15, 21, 0));
        assert_eq!(range.end_date, at(2025, 8, 16, 1, 0));
    }

    #[test]
    fn test_cross_month_range_uses_open_and_close() {
        let range = parse("July 4 - July 10, 2025", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 7, 4, 19, 0));
        assert_eq!(range.end_date, at(2025, 7, 10, 21, 0));

        let range = parse("June 28, 2025 – July 3, 2025", "", VenueDefaults::gallery()).unwrap();
        assert_eq!(range.start_date, at(2025, 6, 28, 10, 0));
        assert_eq!(range.end_date, at(2025, 7, 3, 17, 0));
    }

    #[test]
    fn test_same_month_range() {
        let range = parse("Sept 12th – 14th, 2025", "", VenueDefaults::gallery()).unwrap();
        assert_eq!(range.start_date, at(2025, 9, 12, 10, 0));
        assert_eq!(range.end_date, at(2025, 9, 14, 17, 0));
    }

    #[test]
    fn test_range_across_years_without_explicit_start_year() {
        let range = parse("Dec 28 - Jan 3, 2026", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 12, 28, 19, 0));
        assert_eq!(range.end_date, at(2026, 1, 3, 21, 0));
    }

    #[test]
    fn test_missing_year_rolls_forward_when_past() {
        let range = parse("Jan 3", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2026, 1, 3, 19, 0));
        assert_eq!(range.end_date, at(2026, 1, 3, 21, 0));
    }

    #[test]
    fn test_missing_year_stays_when_upcoming() {
        let range = parse("October 31st", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 10, 31, 19, 0));

        // The reference day itself has not passed yet
        let range = parse("June 1", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 6, 1, 19, 0));
    }

    #[test]
    fn test_explicit_time_range_in_date_text() {
        let range = parse("July 16, 2025 8:00 PM - 10:00 PM", "", VenueDefaults::gallery()).unwrap();
        assert_eq!(range.start_date, at(2025, 7, 16, 20, 0));
        assert_eq!(range.end_date, at(2025, 7, 16, 22, 0));
    }

    #[test]
    fn test_separate_time_text_with_start_only_uses_duration() {
        let range = parse("March 3rd, 2026", "7:30 p.m.", VenueDefaults::nightclub()).unwrap();
        assert_eq!(range.start_date, at(2026, 3, 3, 19, 30));
        assert_eq!(range.end_date, at(2026, 3, 3, 23, 30));
    }

    #[test]
    fn test_time_range_borrows_meridiem() {
        let range = parse("Nov 2, 2025", "7:00 - 9:00 pm", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 11, 2, 19, 0));
        assert_eq!(range.end_date, at(2025, 11, 2, 21, 0));

        let range = parse("Nov 2, 2025", "11:00 - 1:00 pm", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 11, 2, 11, 0));
        assert_eq!(range.end_date, at(2025, 11, 2, 13, 0));
    }

    #[test]
    fn test_bare_start_hour_borrows_meridiem() {
        for time in ["7 - 10pm", "7-10 pm", "7 to 10 p.m."] {
            let range = parse("Aug 15, 2025", time, VenueDefaults::generic()).unwrap();
            assert_eq!(range.start_date, at(2025, 8, 15, 19, 0), "{time}");
            assert_eq!(range.end_date, at(2025, 8, 15, 22, 0), "{time}");
        }

        let range = parse("Sept 14, 2025", "11 - 1:30 pm", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 9, 14, 11, 0));
        assert_eq!(range.end_date, at(2025, 9, 14, 13, 30));

        let range = parse("Aug 15, 2025 7 - 10pm", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 8, 15, 19, 0));
        assert_eq!(range.end_date, at(2025, 8, 15, 22, 0));
    }

    #[test]
    fn test_day_before_a_time_is_not_an_hour() {
        let range = parse("Aug 15 - 7pm", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 8, 15, 19, 0));
    }

    #[test]
    fn test_open_ended_text_is_a_failure() {
        for text in ["Until July 10, 2025", "Through Friday, Aug 1", "till Dec 24"] {
            let failure = parse(text, "", VenueDefaults::generic()).unwrap_err();
            assert_eq!(failure.reason, ParseFailureReason::NoRecognizedDate, "{text}");
            assert_eq!(failure.text, text);
        }
    }

    #[test]
    fn test_oversized_duration_does_not_overflow() {
        let defaults = VenueDefaults::new(hm(19, 0), None, u32::MAX);
        let range = parse("July 4, 2025", "", defaults).unwrap();
        assert_eq!(range.end_date, at(2025, 7, 11, 19, 0));
    }

    #[test]
    fn test_overnight_time_range_ends_next_day() {
        let range = parse("Fri Sep 5 2025", "10pm - 2am", VenueDefaults::nightclub()).unwrap();
        assert_eq!(range.start_date, at(2025, 9, 5, 22, 0));
        assert_eq!(range.end_date, at(2025, 9, 6, 2, 0));
    }

    #[test]
    fn test_twelve_hour_conversion() {
        let cases = [
            ("12am", (0, 0)),
            ("12pm", (12, 0)),
            ("12:30 am", (0, 30)),
            ("1pm", (13, 0)),
            ("11:15 am", (11, 15)),
            ("noon", (12, 0)),
            ("midnight", (0, 0)),
            ("18:45", (18, 45)),
        ];
        for (time, (h, m)) in cases {
            let range = parse("May 20, 2026", time, VenueDefaults::generic()).unwrap();
            assert_eq!(range.start_date, at(2026, 5, 20, h, m), "time text {time}");
        }
    }

    #[test]
    fn test_iso_and_numeric_dates() {
        let range = parse("2025-07-04T19:30:00", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 7, 4, 19, 30));
        assert_eq!(range.end_date, at(2025, 7, 4, 21, 30));

        let range = parse("07/04/2025", "", VenueDefaults::gallery()).unwrap();
        assert_eq!(range.start_date, at(2025, 7, 4, 10, 0));

        let range = parse("4 July 2025", "", VenueDefaults::gallery()).unwrap();
        assert_eq!(range.start_date, at(2025, 7, 4, 10, 0));
    }

    #[test]
    fn test_iso_offset_is_not_a_time_of_day() {
        for text in [
            "2025-07-04T19:30:00-04:00",
            "2025-07-04T19:30:00+0530",
            "2025-07-04T19:30:00.000Z",
            "2025-07-04T19:30-04:00",
        ] {
            let range = parse(text, "", VenueDefaults::generic()).unwrap();
            assert_eq!(range.start_date, at(2025, 7, 4, 19, 30), "{text}");
            assert_eq!(range.end_date, at(2025, 7, 4, 21, 30), "{text}");
        }
    }

    #[test]
    fn test_range_with_start_time() {
        let range = parse("Aug 1 through Aug 3, 2025", "6pm", VenueDefaults::gallery()).unwrap();
        assert_eq!(range.start_date, at(2025, 8, 1, 18, 0));
        assert_eq!(range.end_date, at(2025, 8, 3, 17, 0));
    }

    #[test]
    fn test_unrecognized_text_is_a_failure() {
        let failure = parse("See website for details", "", VenueDefaults::generic()).unwrap_err();
        assert_eq!(failure.text, "See website for details");
        assert_eq!(failure.reason, ParseFailureReason::NoRecognizedDate);

        let failure = parse("", "", VenueDefaults::generic()).unwrap_err();
        assert_eq!(failure.reason, ParseFailureReason::NoRecognizedDate);

        let failure = parse("July 2025", "", VenueDefaults::generic()).unwrap_err();
        assert_eq!(failure.reason, ParseFailureReason::NoRecognizedDate);
    }

    #[test]
    fn test_invalid_calendar_date_is_a_failure() {
        let failure = parse("February 30, 2025", "", VenueDefaults::generic()).unwrap_err();
        assert_eq!(failure.reason, ParseFailureReason::InvalidCalendarDate);

        let failure = parse("2025-13-01", "", VenueDefaults::generic()).unwrap_err();
        assert_eq!(failure.reason, ParseFailureReason::InvalidCalendarDate);
    }

    #[test]
    fn test_invalid_time_is_a_failure() {
        let failure = parse("July 4, 2025", "13pm", VenueDefaults::generic()).unwrap_err();
        assert_eq!(failure.reason, ParseFailureReason::InvalidTimeOfDay);
    }

    #[test]
    fn test_inverted_explicit_range_is_clamped() {
        let range = parse("July 10, 2025 - July 4, 2025", "", VenueDefaults::generic()).unwrap();
        assert_eq!(range.start_date, at(2025, 7, 10, 19, 0));
        assert_eq!(range.end_date, at(2025, 7, 10, 21, 0));
    }

    #[test]
    fn test_start_never_after_end() {
        let inputs = [
            ("July 4, 2025", "9pm - 8pm"),
            ("Dec 31", "11pm"),
            ("Jan 5 - 3, 2026", ""),
            ("April 1st 2026", "23:30 - 00:15"),
            ("Oct 3 - Sept 1", ""),
        ];
        for defaults in [
            VenueDefaults::library(),
            VenueDefaults::gallery(),
            VenueDefaults::nightclub(),
            VenueDefaults::generic(),
        ] {
            for (date, time) in inputs {
                let range = parse(date, time, defaults).unwrap();
                assert!(range.start_date <= range.end_date, "{date} / {time}");
            }
        }
    }

    #[test]
    fn test_venue_defaults_from_toml() {
        let defaults: VenueDefaults = toml::from_str(
            r#"
            open_time = "11:00"
            close_time = "02:00"
            "#,
        )
        .unwrap();
        assert_eq!(defaults.duration_hours, 2);
        let day = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap();
        assert_eq!(defaults.closing_on(day), at(2025, 7, 5, 2, 0));
    }
}
