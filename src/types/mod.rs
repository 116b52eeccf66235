//! Additional wire types and external type integration.
//!
//! - [`PgInterval`]: the `interval` type, all three components preserved
//! - [`PgTimeTz`]: the `timetz` type, time of day plus zone offset
//! - [`Json`]: serde integration for `json`/`jsonb`, requires the `json`
//!   feature
//!
//! The `time` and `uuid` scalar integrations live with the value codec
//! itself since their binary forms are part of the core oid table.
use crate::decode::DecodeError;

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::Json;

/// The `interval` type: `i64` microseconds, `i32` days, `i32` months.
///
/// Months and days travel separately because their length in microseconds
/// depends on the calendar; none of the components are collapsed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PgInterval {
    pub microseconds: i64,
    pub days: i32,
    pub months: i32,
}

/// The `timetz` type: time of day plus the UTC offset captured with it.
///
/// The offset is kept in raw seconds as transmitted; postgres counts
/// positive offsets west of Greenwich, the reverse of ISO 8601.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PgTimeTz {
    pub time: time::Time,
    pub offset_seconds: i32,
}

// The server's binary calendar: day zero is 2000-01-01, timestamps count
// microseconds from 2000-01-01 00:00:00.
pub(crate) const PG_EPOCH_JULIAN: i32 = 2_451_545;
pub(crate) const MICROS_PER_DAY: i64 = 86_400_000_000;

pub(crate) fn date_from_days(days: i32) -> Result<time::Date, DecodeError> {
    time::Date::from_julian_day(PG_EPOCH_JULIAN.wrapping_add(days))
        .map_err(|_| DecodeError::out_of_range("date out of range"))
}

pub(crate) fn days_from_date(date: time::Date) -> i32 {
    date.to_julian_day() - PG_EPOCH_JULIAN
}

pub(crate) fn time_from_micros(micros: i64) -> Result<time::Time, DecodeError> {
    if !(0..MICROS_PER_DAY).contains(&micros) {
        return Err(DecodeError::out_of_range("time of day out of range"));
    }
    let (secs, micro) = (micros / 1_000_000, (micros % 1_000_000) as u32);
    time::Time::from_hms_micro(
        (secs / 3600) as u8,
        (secs / 60 % 60) as u8,
        (secs % 60) as u8,
        micro,
    )
    .map_err(|_| DecodeError::out_of_range("time of day out of range"))
}

pub(crate) fn micros_from_time(time: time::Time) -> i64 {
    let (h, m, s, micro) = time.as_hms_micro();
    (i64::from(h) * 3600 + i64::from(m) * 60 + i64::from(s)) * 1_000_000 + i64::from(micro)
}

pub(crate) fn timestamp_from_micros(micros: i64) -> Result<time::PrimitiveDateTime, DecodeError> {
    let days = micros.div_euclid(MICROS_PER_DAY);
    let rem = micros.rem_euclid(MICROS_PER_DAY);
    let days = i32::try_from(days).map_err(|_| DecodeError::out_of_range("timestamp out of range"))?;
    Ok(time::PrimitiveDateTime::new(date_from_days(days)?, time_from_micros(rem)?))
}

pub(crate) fn micros_from_timestamp(ts: time::PrimitiveDateTime) -> i64 {
    i64::from(days_from_date(ts.date())) * MICROS_PER_DAY + micros_from_time(ts.time())
}

#[cfg(test)]
mod test {
    use time::macros::{date, datetime, time};

    use super::*;

    #[test]
    fn epoch_is_day_zero() {
        assert_eq!(days_from_date(date!(2000 - 01 - 01)), 0);
        assert_eq!(date_from_days(0).unwrap(), date!(2000 - 01 - 01));
        assert_eq!(days_from_date(date!(2000 - 01 - 02)), 1);
        assert_eq!(days_from_date(date!(1999 - 12 - 31)), -1);
    }

    #[test]
    fn time_micros_round_trip() {
        let noon = time!(12:34:56.000789);
        assert_eq!(time_from_micros(micros_from_time(noon)).unwrap(), noon);
        assert_eq!(micros_from_time(time!(0:00)), 0);
        assert!(time_from_micros(MICROS_PER_DAY).is_err());
        assert!(time_from_micros(-1).is_err());
    }

    #[test]
    fn timestamp_micros_round_trip() {
        let ts = datetime!(2024-02-29 23:59:59.999999);
        assert_eq!(timestamp_from_micros(micros_from_timestamp(ts)).unwrap(), ts);

        // negative microseconds land before the epoch
        let early = datetime!(1970-01-01 0:00);
        assert!(micros_from_timestamp(early) < 0);
        assert_eq!(timestamp_from_micros(micros_from_timestamp(early)).unwrap(), early);
    }
}
