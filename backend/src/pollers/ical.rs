//! Minimal iCalendar (RFC 5545) reader for free/busy feeds.
//!
//! Only what the room feeds need is understood: line unfolding, content
//! lines with parameters, component nesting, `FREEBUSY` periods inside
//! `VFREEBUSY` and, optionally, the time span of each `VEVENT`.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use conffree_shared::{Interval, IntervalType};
use thiserror::Error;

use super::time::{local_midnight, resolve_local};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("feed is not an iCalendar document")]
    NotCalendar,

    #[error("line {line}: malformed content line")]
    MalformedLine { line: usize },

    #[error("line {line}: END:{found} does not close {expected}")]
    UnbalancedComponent {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("feed ended inside {0}")]
    Unterminated(String),

    #[error("invalid date-time '{0}'")]
    InvalidDateTime(String),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("invalid period '{0}'")]
    InvalidPeriod(String),

    #[error("{component} is missing required property {property}")]
    MissingProperty {
        component: &'static str,
        property: &'static str,
    },
}

/// One unfolded `NAME;PARAM=VALUE:VALUE` line
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentLine {
    name: String,
    params: Vec<(String, String)>,
    value: String,
}

impl ContentLine {
    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn is_date_only(&self) -> bool {
        matches!(self.param("VALUE"), Some(v) if v.eq_ignore_ascii_case("DATE"))
            || (self.value.len() == 8 && self.value.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Properties of a `VEVENT` collected until its `END` line
#[derive(Debug, Default)]
struct EventProps {
    dtstart: Option<ContentLine>,
    dtend: Option<ContentLine>,
    duration: Option<String>,
    transparent: bool,
}

impl EventProps {
    fn record(&mut self, line: &ContentLine) {
        match line.name.as_str() {
            "DTSTART" => self.dtstart = Some(line.clone()),
            "DTEND" => self.dtend = Some(line.clone()),
            "DURATION" => self.duration = Some(line.value.clone()),
            "TRANSP" => self.transparent = line.value.trim().eq_ignore_ascii_case("TRANSPARENT"),
            _ => {}
        }
    }

    fn into_interval(self, tz: Tz) -> Result<Interval, ParseError> {
        let dtstart = self.dtstart.ok_or(ParseError::MissingProperty {
            component: "VEVENT",
            property: "DTSTART",
        })?;
        let start = parse_date_time(&dtstart, tz)?;

        let end = if let Some(dtend) = &self.dtend {
            parse_date_time(dtend, tz)?
        } else if let Some(duration) = &self.duration {
            start
                .checked_add_signed(parse_duration(duration)?)
                .ok_or_else(|| ParseError::InvalidDuration(duration.clone()))?
        } else if dtstart.is_date_only() {
            let date = parse_date(&dtstart.value)?;
            match date.succ_opt() {
                Some(next) => local_midnight(tz, next),
                None => start,
            }
        } else {
            start
        };

        if end < start {
            return Err(ParseError::InvalidPeriod(format!(
                "{}/{}",
                dtstart.value,
                end.format("%Y%m%dT%H%M%SZ")
            )));
        }

        let kind = if self.transparent {
            IntervalType::Free
        } else {
            IntervalType::Busy
        };
        Ok(Interval::new(start, end, kind))
    }
}

/// Parse a feed into intervals.
///
/// `tz` resolves floating and date-only values. With `include_events`, every
/// `VEVENT` contributes an interval as well as the `VFREEBUSY` periods.
pub fn parse_feed(input: &str, tz: Tz, include_events: bool) -> Result<Vec<Interval>, ParseError> {
    let input = input.trim_start_matches('\u{feff}');
    let mut stack: Vec<String> = Vec::new();
    let mut saw_calendar = false;
    let mut event: Option<EventProps> = None;
    let mut intervals = Vec::new();

    for (number, raw) in unfold(input) {
        let line = parse_content_line(&raw, number)?;

        match line.name.as_str() {
            "BEGIN" => {
                let component = line.value.trim().to_ascii_uppercase();
                if stack.is_empty() {
                    if component != "VCALENDAR" {
                        return Err(ParseError::NotCalendar);
                    }
                    saw_calendar = true;
                }
                if component == "VEVENT" && include_events {
                    event = Some(EventProps::default());
                }
                stack.push(component);
            }
            "END" => {
                let component = line.value.trim().to_ascii_uppercase();
                let open = stack.pop().ok_or_else(|| ParseError::UnbalancedComponent {
                    line: number,
                    expected: "nothing".to_string(),
                    found: component.clone(),
                })?;
                if open != component {
                    return Err(ParseError::UnbalancedComponent {
                        line: number,
                        expected: open,
                        found: component,
                    });
                }
                if component == "VEVENT" {
                    if let Some(props) = event.take() {
                        intervals.push(props.into_interval(tz)?);
                    }
                }
            }
            _ => match stack.last().map(String::as_str) {
                None => return Err(ParseError::NotCalendar),
                Some("VFREEBUSY") if line.name == "FREEBUSY" => {
                    intervals.extend(parse_freebusy(&line, tz)?);
                }
                Some("VEVENT") => {
                    if let Some(props) = event.as_mut() {
                        props.record(&line);
                    }
                }
                _ => {}
            },
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::Unterminated(open));
    }
    if !saw_calendar {
        return Err(ParseError::NotCalendar);
    }

    Ok(intervals)
}

/// Join folded lines, keeping the 1-based number of each logical line's
/// first physical line.
fn unfold(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (index, raw) in input.lines().enumerate() {
        if let Some(continuation) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(continuation);
                continue;
            }
        }
        if raw.trim().is_empty() {
            continue;
        }
        lines.push((index + 1, raw.to_string()));
    }

    lines
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn parse_content_line(line: &str, number: usize) -> Result<ContentLine, ParseError> {
    let malformed = || ParseError::MalformedLine { line: number };

    let name_end = line.find([';', ':']).ok_or_else(malformed)?;
    let name = &line[..name_end];
    if !is_name(name) {
        return Err(malformed());
    }

    let mut params = Vec::new();
    let mut rest = &line[name_end..];
    while let Some(after) = rest.strip_prefix(';') {
        let eq = after.find('=').ok_or_else(malformed)?;
        let param_name = &after[..eq];
        if !is_name(param_name) {
            return Err(malformed());
        }

        let mut cursor = &after[eq + 1..];
        let mut values = Vec::new();
        loop {
            let (value, remainder) = match cursor.strip_prefix('"') {
                Some(quoted) => {
                    let close = quoted.find('"').ok_or_else(malformed)?;
                    (&quoted[..close], &quoted[close + 1..])
                }
                None => {
                    let end = cursor.find([',', ';', ':']).ok_or_else(malformed)?;
                    (&cursor[..end], &cursor[end..])
                }
            };
            values.push(value);
            match remainder.strip_prefix(',') {
                Some(next) => cursor = next,
                None => {
                    rest = remainder;
                    break;
                }
            }
        }

        params.push((param_name.to_ascii_uppercase(), values.join(",")));
    }

    let value = rest.strip_prefix(':').ok_or_else(malformed)?;
    Ok(ContentLine {
        name: name.to_ascii_uppercase(),
        params,
        value: value.to_string(),
    })
}

fn parse_freebusy(line: &ContentLine, tz: Tz) -> Result<Vec<Interval>, ParseError> {
    let kind = line
        .param("FBTYPE")
        .map(IntervalType::from_fbtype)
        .unwrap_or(IntervalType::Busy);

    line.value
        .split(',')
        .map(str::trim)
        .filter(|period| !period.is_empty())
        .map(|period| {
            let (start, end) = parse_period(period, tz)?;
            Ok(Interval::new(start, end, kind))
        })
        .collect()
}

/// `start/end` or `start/duration`
fn parse_period(period: &str, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>), ParseError> {
    let (start, end) = period
        .split_once('/')
        .ok_or_else(|| ParseError::InvalidPeriod(period.to_string()))?;

    let start = parse_date_time_value(start, None, tz)?;
    let end = if end.trim_start_matches(['+', '-']).starts_with('P') {
        start
            .checked_add_signed(parse_duration(end)?)
            .ok_or_else(|| ParseError::InvalidPeriod(period.to_string()))?
    } else {
        parse_date_time_value(end, None, tz)?
    };

    if end < start {
        return Err(ParseError::InvalidPeriod(period.to_string()));
    }
    Ok((start, end))
}

fn parse_date_time(line: &ContentLine, tz: Tz) -> Result<DateTime<Utc>, ParseError> {
    if line.is_date_only() {
        return Ok(local_midnight(tz, parse_date(&line.value)?));
    }
    parse_date_time_value(&line.value, line.param("TZID"), tz)
}

fn parse_date(value: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d")
        .map_err(|_| ParseError::InvalidDateTime(value.to_string()))
}

/// UTC (`...Z`), zoned via `TZID`, or floating in `tz`.
///
/// Unknown `TZID`s (e.g. Windows zone names) fall back to `tz`.
fn parse_date_time_value(
    value: &str,
    tzid: Option<&str>,
    tz: Tz,
) -> Result<DateTime<Utc>, ParseError> {
    let value = value.trim();
    let invalid = || ParseError::InvalidDateTime(value.to_string());

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        return Ok(naive.and_utc());
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
    let zone = tzid
        .and_then(|id| id.trim_start_matches('/').parse::<Tz>().ok())
        .unwrap_or(tz);
    Ok(resolve_local(zone, naive))
}

/// RFC 5545 `dur-value`, e.g. `PT1H30M`, `P1D`, `-P2W`
fn parse_duration(value: &str) -> Result<Duration, ParseError> {
    let invalid = || ParseError::InvalidDuration(value.to_string());
    let trimmed = value.trim();

    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let body = unsigned.strip_prefix('P').ok_or_else(invalid)?;

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_unit = false;

    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            'W' | 'D' | 'H' | 'M' | 'S' => {
                let n: i64 = digits.parse().map_err(|_| invalid())?;
                digits.clear();
                let part = match (c, in_time) {
                    ('W', false) => Duration::try_weeks(n),
                    ('D', false) => Duration::try_days(n),
                    ('H', true) => Duration::try_hours(n),
                    ('M', true) => Duration::try_minutes(n),
                    ('S', true) => Duration::try_seconds(n),
                    _ => return Err(invalid()),
                };
                total = part
                    .and_then(|part| total.checked_add(&part))
                    .ok_or_else(invalid)?;
                saw_unit = true;
            }
            _ => return Err(invalid()),
        }
    }

    if !digits.is_empty() || !saw_unit {
        return Err(invalid());
    }

    Ok(if negative { -total } else { total })
}
