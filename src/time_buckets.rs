use std::fmt;
use std::fmt::{Display, Formatter};
use chrono::{DateTime, TimeZone};

/// Time label used for the current conditions
pub const NOW: &str = "now";
pub const TODAY: &str = "today";
pub const TOMORROW: &str = "tomorrow";

/// Published identity of one forecast interval, e.g. ("tomorrow", "13:00")
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketLabel {
    pub day: String,
    pub time: String,
}

impl BucketLabel {
    pub fn new(day: &str, time: &str) -> BucketLabel {
        BucketLabel { day: day.to_string(), time: time.to_string() }
    }

    /// The bucket used for current conditions
    pub fn now() -> BucketLabel {
        BucketLabel::new(TODAY, NOW)
    }
}

impl Display for BucketLabel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {}", self.day, self.time)
    }
}

/// Maps a unix timestamp to a bucket label relative to 'now'.
///
/// The day part is "today" if the timestamp falls on the same local calendar day as 'now',
/// "tomorrow" if it falls on the day after, and otherwise the full weekday name. The time
/// part is the local clock time as HH:MM.
///
/// Returns None if the timestamp can't be represented as a date.
///
/// # Arguments
///
/// * 'timestamp' - unix timestamp in seconds
/// * 'now' - the instant of bucketing, its time zone is used for the local calendar
pub fn bucket<Tz: TimeZone>(timestamp: i64, now: &DateTime<Tz>) -> Option<BucketLabel>
where
    Tz::Offset: Display,
{
    let local = DateTime::from_timestamp(timestamp, 0)?.with_timezone(&now.timezone());

    let date = local.date_naive();
    let today = now.date_naive();
    let day = if date == today {
        TODAY.to_string()
    } else if today.succ_opt() == Some(date) {
        TOMORROW.to_string()
    } else {
        local.format("%A").to_string()
    };

    Some(BucketLabel { day, time: local.format("%H:%M").to_string() })
}
