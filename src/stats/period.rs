//! Period resolution in the reference zone.
//!
//! Every boundary here is a civil boundary of the fixed UTC-3 zone: a "day" runs
//! from 00:00:00.000 to 23:59:59.999 local time, months and years likewise.
//! Windows are inclusive on both ends.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, TimeDelta, Utc,
};

use crate::config::{DATE_ONLY_PLACEMENT_HOUR, REFERENCE_UTC_OFFSET_SECS};
use crate::error::{AppError, Result};
use crate::types::BetFilters;

/// Relative period token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Monthly,
    Yearly,
}

impl Period {
    pub fn granularity(self) -> Granularity {
        match self {
            Period::Daily => Granularity::Day,
            Period::Monthly => Granularity::Month,
            Period::Yearly => Granularity::Year,
        }
    }
}

impl std::str::FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Period::Daily),
            "monthly" => Ok(Period::Monthly),
            "yearly" => Ok(Period::Yearly),
            other => Err(AppError::validation(format!(
                "period must be one of daily, monthly, yearly; got `{other}`"
            ))),
        }
    }
}

/// Bucket size for the profit-by-date breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
    Year,
}

/// Inclusive instant range. A missing bound is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start: Some(start), end: Some(end) }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e)
    }
}

/// Concrete window plus the bucket granularity it should be reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub window: Window,
    pub granularity: Granularity,
}

pub fn reference_zone() -> FixedOffset {
    FixedOffset::east_opt(REFERENCE_UTC_OFFSET_SECS).expect("reference offset is within one day")
}

/// Interpret a wall-clock time of the reference zone as an instant.
fn local_to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    (local - TimeDelta::seconds(i64::from(REFERENCE_UTC_OFFSET_SECS))).and_utc()
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    local_to_utc(date.and_time(NaiveTime::MIN))
}

/// [first instant of `first`, last millisecond before `next`).
fn span(first: NaiveDate, next: NaiveDate) -> Window {
    Window::between(
        local_midnight(first),
        local_midnight(next) - TimeDelta::milliseconds(1),
    )
}

fn out_of_range() -> AppError {
    AppError::validation("date is out of the supported range")
}

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(out_of_range)
}

pub fn day_window(day: NaiveDate) -> Result<Window> {
    Ok(span(day, day.succ_opt().ok_or_else(out_of_range)?))
}

/// `month` is 1-indexed, as on the wire.
pub fn month_window(year: i32, month: u32) -> Result<Window> {
    let first = date(year, month, 1)?;
    let next = if month == 12 { date(year + 1, 1, 1)? } else { date(year, month + 1, 1)? };
    Ok(span(first, next))
}

pub fn year_window(year: i32) -> Result<Window> {
    Ok(span(date(year, 1, 1)?, date(year + 1, 1, 1)?))
}

/// Calendar date of `now` in the reference zone.
pub fn local_today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&reference_zone()).date_naive()
}

/// The day, month or year containing `now`.
pub fn current_window(period: Period, now: DateTime<Utc>) -> Result<Window> {
    let today = local_today(now);
    match period {
        Period::Daily => day_window(today),
        Period::Monthly => month_window(today.year(), today.month()),
        Period::Yearly => year_window(today.year()),
    }
}

/// The day, month or year immediately before the one containing `now`.
pub fn previous_window(period: Period, now: DateTime<Utc>) -> Result<Window> {
    let today = local_today(now);
    match period {
        Period::Daily => day_window(today.pred_opt().ok_or_else(out_of_range)?),
        Period::Monthly if today.month() == 1 => month_window(today.year() - 1, 12),
        Period::Monthly => month_window(today.year(), today.month() - 1),
        Period::Yearly => year_window(today.year() - 1),
    }
}

fn all_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse `YYYY-MM` into (year, 1-indexed month).
pub fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let invalid = || AppError::validation(format!("month must be formatted as YYYY-MM, got `{raw}`"));
    let (y, m) = raw.split_once('-').ok_or_else(invalid)?;
    if !all_digits(y, 4) || !all_digits(m, 2) {
        return Err(invalid());
    }
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Parse `YYYY`.
pub fn parse_year(raw: &str) -> Result<i32> {
    if !all_digits(raw, 4) {
        return Err(AppError::validation(format!("year must be formatted as YYYY, got `{raw}`")));
    }
    raw.parse()
        .map_err(|_| AppError::validation(format!("year must be formatted as YYYY, got `{raw}`")))
}

fn parse_date_only(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// An explicit range bound: RFC 3339 instant, or a bare date meaning the
/// start (or end) of that day in the reference zone.
fn parse_bound(raw: &str, bound: Bound, field: &str) -> Result<DateTime<Utc>> {
    if let Some(day) = parse_date_only(raw) {
        let window = day_window(day)?;
        let instant = match bound {
            Bound::Start => window.start,
            Bound::End => window.end,
        };
        return instant.ok_or_else(out_of_range);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| AppError::validation(format!("{field} must be RFC 3339 or YYYY-MM-DD, got `{raw}`")))
}

/// Window from `startDate`/`endDate` alone.
pub fn explicit_window(start: Option<&str>, end: Option<&str>) -> Result<Window> {
    Ok(Window {
        start: start.map(|s| parse_bound(s, Bound::Start, "startDate")).transpose()?,
        end: end.map(|e| parse_bound(e, Bound::End, "endDate")).transpose()?,
    })
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve a filter set against `now`.
///
/// Precedence: month, then year, then startDate/endDate, then the relative
/// period token; with none of them the window is unbounded. The bucket
/// granularity always follows the period token (day when absent).
pub fn resolve(filters: &BetFilters, now: DateTime<Utc>) -> Result<ResolvedPeriod> {
    let period = non_blank(&filters.period)
        .map(str::parse::<Period>)
        .transpose()?;
    let granularity = period.map_or(Granularity::Day, Period::granularity);

    let start = non_blank(&filters.start_date);
    let end = non_blank(&filters.end_date);

    let window = if let Some(month) = non_blank(&filters.month) {
        let (year, month) = parse_month(month)?;
        month_window(year, month)?
    } else if let Some(year) = non_blank(&filters.year) {
        year_window(parse_year(year)?)?
    } else if start.is_some() || end.is_some() {
        explicit_window(start, end)?
    } else if let Some(period) = period {
        current_window(period, now)?
    } else {
        Window::default()
    };

    Ok(ResolvedPeriod { window, granularity })
}

/// Bucket key of an instant: `YYYY-MM-DD`, `YYYY-MM` or `YYYY` in the reference zone.
pub fn bucket_key(t: DateTime<Utc>, granularity: Granularity) -> String {
    let local = t.with_timezone(&reference_zone());
    let fmt = match granularity {
        Granularity::Day => "%Y-%m-%d",
        Granularity::Month => "%Y-%m",
        Granularity::Year => "%Y",
    };
    local.format(fmt).to_string()
}

/// When a bet was placed, truncated to whole milliseconds so it always lands
/// inside the window its bucket key names. Absent means now; a bare date means
/// noon of that day in the reference zone; a naive date-time is read as
/// reference-zone wall time.
pub fn parse_placed_at(raw: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    placed_instant(raw, now).map(|t| t.trunc_subsecs(3))
}

fn placed_instant(raw: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(now);
    };
    if let Some(day) = parse_date_only(raw) {
        let noon = NaiveTime::from_hms_opt(DATE_ONLY_PLACEMENT_HOUR, 0, 0).ok_or_else(out_of_range)?;
        return Ok(local_to_utc(day.and_time(noon)));
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(local_to_utc)
        .ok_or_else(|| AppError::validation(format!("placedAt is not a valid date, got `{raw}`")))
}
