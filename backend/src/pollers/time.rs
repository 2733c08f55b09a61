use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolve a wall-clock time in `tz` to an absolute instant.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times that
/// fall into a gap (clocks going forward) are moved past the gap.
pub fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(local) = tz.from_local_datetime(&naive).earliest() {
        return local.with_timezone(&Utc);
    }

    naive
        .checked_add_signed(Duration::hours(1))
        .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Local midnight at the start of `date` in `tz`.
pub fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// First instant of the day after `now`'s local date.
pub fn start_of_next_day(now: DateTime<Tz>) -> DateTime<Utc> {
    match now.date_naive().succ_opt() {
        Some(tomorrow) => local_midnight(now.timezone(), tomorrow),
        None => DateTime::<Utc>::MAX_UTC,
    }
}
