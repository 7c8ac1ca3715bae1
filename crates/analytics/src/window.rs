use chrono::{DateTime, Datelike, TimeZone, Utc};

use flame_core::{DomainError, DomainResult};

/// A calendar month in UTC, as the half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

impl MonthWindow {
    pub fn new(year: i32, month: u32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation("Month must be between 1 and 12"));
        }
        let start = first_of_month(year, month)
            .ok_or_else(|| DomainError::validation("Year is out of range"))?;
        let (ny, nm) = next_month(year, month);
        let end = first_of_month(ny, nm).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok(Self {
            year,
            month,
            start,
            end,
        })
    }

    /// The month `t` falls in.
    pub fn containing(t: DateTime<Utc>) -> Self {
        Self::new(t.year(), t.month()).unwrap_or(Self {
            year: t.year(),
            month: t.month(),
            start: t,
            end: t,
        })
    }

    pub fn previous(&self) -> Self {
        let (year, month) = if self.month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, self.month - 1)
        };
        Self::new(year, month).unwrap_or(Self {
            year,
            month,
            start: self.start,
            end: self.start,
        })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_half_open() {
        let w = MonthWindow::new(2024, 2).unwrap();
        assert!(w.contains(Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()));
        assert!(!w.contains(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert!(w.contains(w.start));
    }

    #[test]
    fn previous_of_january_is_last_december() {
        let jan = MonthWindow::containing(Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap());
        let dec = jan.previous();
        assert_eq!((dec.year, dec.month), (2024, 12));
        assert_eq!(dec.end, jan.start);
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        assert!(MonthWindow::new(2024, 0).is_err());
        assert!(MonthWindow::new(2024, 13).is_err());
    }
}
