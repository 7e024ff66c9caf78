//! Fetch window: the UTC range of timestamps eligible for one run

use chrono::{DateTime, Duration, Utc};

use crate::error::PipelineError;

/// Closed interval `[start, end]`, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, PipelineError> {
        if start >= end {
            return Err(PipelineError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window of `hours` ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, hours: u32) -> Result<Self, PipelineError> {
        let start = now
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .ok_or_else(|| {
                PipelineError::Config(format!("fetch_hours {hours} reaches before the earliest date"))
            })?;
        Self::new(start, now)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    /// arXiv `submittedDate` range clause, minute precision.
    pub fn submitted_date_clause(&self) -> String {
        format!(
            "submittedDate:[{} TO {}]",
            self.start.format("%Y%m%d%H%M"),
            self.end.format("%Y%m%d%H%M")
        )
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M UTC")
        )
    }
}
