use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// The 12 two-hour bins of a day, in display order. Each label is the
/// column suffix of `login_heatmap` with the `h` prefix stripped and `_`
/// rendered as `-`.
pub const BIN_LABELS: [&str; 12] = [
    "00-02", "02-04", "04-06", "06-08", "08-10", "10-12", "12-14", "14-16", "16-18", "18-20",
    "20-22", "22-24",
];

/// Maps a login timestamp to (weekday id, bin label) in the target
/// timezone. Weekday ids are 1=Monday .. 7=Sunday, computed on the local
/// calendar day so events near midnight bucket onto the audience's day.
pub fn login_bucket(ts: DateTime<Utc>, tz: Tz) -> (i16, &'static str) {
    let local = ts.with_timezone(&tz);
    let weekday_id = local.weekday().number_from_monday() as i16;
    let bin = BIN_LABELS[(local.hour() / 2) as usize];
    (weekday_id, bin)
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Today's date on the target timezone's calendar.
pub fn local_today(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// UTC bounds of the closed date window [from, to] with inclusive day
/// boundaries on the target timezone's calendar. The upper bound is
/// exclusive: midnight at the start of the day after `to`.
pub fn day_window_utc(from: NaiveDate, to: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_midnight_utc(from, tz), local_midnight_utc(to + chrono::Duration::days(1), tz))
}

fn local_midnight_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    // A DST gap can swallow local midnight; take the earliest valid instant.
    tz.from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
        .with_timezone(&Utc)
}
