use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("invalid date {value:?}, expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

/// Optional calendar-day window over email creation times.
///
/// Both ends are inclusive whole days in UTC: `end` covers everything up to
/// (but excluding) midnight of the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateWindow {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, WindowError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(WindowError::Inverted { start, end });
            }
        }
        Ok(Self { start, end })
    }

    /// Build a window from optional `YYYY-MM-DD` strings. Blank strings count as absent.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, WindowError> {
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    /// Lower bound (inclusive) and upper bound (exclusive) as UTC instants.
    pub fn bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let lower = self.start.map(start_of_day);
        let upper = self
            .end
            .and_then(|day| day.succ_opt())
            .map(start_of_day);
        (lower, upper)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let (lower, upper) = self.bounds();
        lower.is_none_or(|l| at >= l) && upper.is_none_or(|u| at < u)
    }

    /// `YYYY-MM-DD` of each bound, or `"all"` when open.
    pub fn labels(&self) -> (String, String) {
        let label = |day: Option<NaiveDate>| {
            day.map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "all".to_string())
        };
        (label(self.start), label(self.end))
    }
}

fn parse_day(raw: Option<&str>) -> Result<Option<NaiveDate>, WindowError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Some)
            .map_err(|_| WindowError::InvalidDate {
                value: value.to_string(),
            }),
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
