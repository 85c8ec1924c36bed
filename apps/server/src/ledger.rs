use chrono::{NaiveDate, NaiveTime};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::Booking;
use crate::schedule::WeeklySchedule;
use crate::store::{self, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{barber} is already booked on {date} at {}", .time.format("%H:%M"))]
    Conflict {
        barber: String,
        date: NaiveDate,
        time: NaiveTime,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Admin view filter. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub barbers: Option<Vec<String>>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn is_empty(&self) -> bool {
        self.barbers.is_none() && self.from.is_none() && self.to.is_none()
    }

    fn matches(&self, booking: &Booking) -> bool {
        self.barbers
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| *n == booking.barber))
            && self.from.map_or(true, |from| booking.date >= from)
            && self.to.map_or(true, |to| booking.date <= to)
    }
}

/// All bookings, kept in memory and rewritten to `path` after every append.
///
/// Lookups are linear scans; a shop's bookings stay small enough for that.
#[derive(Debug)]
pub struct BookingLedger {
    path: PathBuf,
    records: Vec<Booking>,
}

impl BookingLedger {
    pub async fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = store::load(&path).await?;
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn records(&self) -> &[Booking] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_conflict(&self, date: NaiveDate, time: NaiveTime, barber: &str) -> bool {
        self.records
            .iter()
            .any(|b| b.date == date && b.time == time && b.barber == barber)
    }

    /// Schedule slots for `date` that `barber` has not been booked for yet.
    pub fn available_slots(
        &self,
        schedule: &WeeklySchedule,
        date: NaiveDate,
        barber: &str,
    ) -> Vec<NaiveTime> {
        let taken: HashSet<NaiveTime> = self
            .records
            .iter()
            .filter(|b| b.date == date && b.barber == barber)
            .map(|b| b.time)
            .collect();

        schedule
            .slots_for(date)
            .into_iter()
            .filter(|t| !taken.contains(t))
            .collect()
    }

    /// Add `booking` and rewrite the file.
    ///
    /// Nothing changes on conflict. If the rewrite fails the record is dropped
    /// again so memory never holds a booking the file does not.
    pub async fn append(&mut self, booking: Booking) -> Result<(), LedgerError> {
        if self.has_conflict(booking.date, booking.time, &booking.barber) {
            return Err(LedgerError::Conflict {
                barber: booking.barber,
                date: booking.date,
                time: booking.time,
            });
        }

        self.records.push(booking);
        if let Err(e) = store::persist(&self.path, &self.records).await {
            self.records.pop();
            tracing::error!("Failed to persist {}: {}", self.path.display(), e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Matching bookings ordered by date, then time.
    pub fn filtered(&self, filter: &BookingFilter) -> Vec<Booking> {
        let mut rows: Vec<Booking> = self
            .records
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        rows
    }
}
