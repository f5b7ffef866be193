//! Binning periods and temporal membership of observations
//!
//! Two period kinds exist. A plain time range accepts observations with
//! `start <= t < end`. A spatiotemporal data day shifts the window with
//! longitude so that one day of a sun-synchronous sensor is not split in the
//! middle of a swath: the day boundary crosses the date line at
//! `start + min_data_hour` UTC and moves westward with the sun at 15°/hour.
//! East of Greenwich the shift is `(180 - lon) / 15` hours, west of it
//! `(-180 - lon) / 15` hours, so observations on both sides of the date line
//! taken minutes apart land in the same data day.

use crate::errors::{BinningError, Result};
use crate::geo::normalize_lon;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DATE_INPUT_PATTERN: &str = "%Y-%m-%d";
pub const DATETIME_INPUT_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// How observations are filtered in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeFilterMethod {
    /// Every observation is used
    #[default]
    None,
    /// Products and observations must fall in `[start, end)`
    TimeRange,
    /// Longitude-dependent data-day window
    SpatiotemporalDataDay,
}

/// Position of an observation or product relative to the binning period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Previous,
    Current,
    Subsequent,
}

/// The time window of a binning run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataPeriod {
    TimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    SpatiotemporalDataDay {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_data_hour: f64,
    },
}

fn days(value: f64) -> Duration {
    #[allow(clippy::cast_possible_truncation)]
    Duration::milliseconds((value * 86_400_000.0).round() as i64)
}

fn hours(value: f64) -> Duration {
    #[allow(clippy::cast_possible_truncation)]
    Duration::milliseconds((value * 3_600_000.0).round() as i64)
}

/// Hours by which the data-day window at `lon` trails the date-line boundary
#[must_use]
pub fn data_day_offset_hours(lon: f64) -> f64 {
    let lon = normalize_lon(lon);
    if lon >= 0.0 {
        (180.0 - lon) / 15.0
    } else {
        (-180.0 - lon) / 15.0
    }
}

fn classify(t: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Membership {
    if t < start {
        Membership::Previous
    } else if t >= end {
        Membership::Subsequent
    } else {
        Membership::Current
    }
}

impl DataPeriod {
    #[must_use]
    pub fn time_range(start: DateTime<Utc>, duration_days: f64) -> Self {
        Self::TimeRange {
            start,
            end: start + days(duration_days),
        }
    }

    #[must_use]
    pub fn spatiotemporal_data_day(start: DateTime<Utc>, duration_days: f64, min_data_hour: f64) -> Self {
        Self::SpatiotemporalDataDay {
            start,
            end: start + days(duration_days),
            min_data_hour,
        }
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            Self::TimeRange { start, .. } | Self::SpatiotemporalDataDay { start, .. } => *start,
        }
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        match self {
            Self::TimeRange { end, .. } | Self::SpatiotemporalDataDay { end, .. } => *end,
        }
    }

    /// Where an observation at longitude `lon` and time `time` falls
    #[must_use]
    pub fn observation_membership(&self, lon: f64, time: DateTime<Utc>) -> Membership {
        match *self {
            Self::TimeRange { start, end } => classify(time, start, end),
            Self::SpatiotemporalDataDay {
                start,
                end,
                min_data_hour,
            } => {
                let shift = hours(min_data_hour + data_day_offset_hours(lon));
                classify(time, start + shift, end + shift)
            }
        }
    }

    /// Whether a product acquired between `product_start` and `product_end`
    /// can contribute observations to this period
    #[must_use]
    pub fn product_membership(&self, product_start: DateTime<Utc>, product_end: DateTime<Utc>) -> Membership {
        let (window_start, window_end) = match *self {
            Self::TimeRange { start, end } => (start, end),
            Self::SpatiotemporalDataDay {
                start,
                end,
                min_data_hour,
            } => (
                start + hours(min_data_hour - 12.0),
                end + hours(min_data_hour + 12.0),
            ),
        };
        if product_end < window_start {
            Membership::Previous
        } else if product_start >= window_end {
            Membership::Subsequent
        } else {
            Membership::Current
        }
    }
}

/// Parse a start date given as `yyyy-MM-dd` or `yyyy-MM-dd HH:mm:ss` (UTC)
///
/// # Errors
///
/// Returns a configuration error if neither pattern matches.
pub fn parse_start_date_utc(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, DATETIME_INPUT_PATTERN) {
        return Ok(Utc.from_utc_datetime(&datetime));
    }
    NaiveDate::parse_from_str(text, DATE_INPUT_PATTERN)
        .map(|date| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
        .map_err(|e| {
            BinningError::config(format!(
                "error while parsing start date parameter '{text}': {e} \
                 (expected 'yyyy-MM-dd HH:mm:ss' or 'yyyy-MM-dd')"
            ))
        })
}
