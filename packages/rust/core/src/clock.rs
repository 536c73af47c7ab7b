//! Source of "today" for prompt building and date defaulting.

use chrono::{Local, NaiveDate, TimeZone, Utc};

/// The calendar date and zone a resolution is anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<Tz> {
    /// The caller's local calendar date at invocation time.
    pub date: NaiveDate,
    /// Zone used to turn local dates/times into instants.
    pub zone: Tz,
}

/// Provides the reference date and zone for an invocation.
pub trait Clock: Send + Sync {
    type Zone: TimeZone + Send + Sync;

    /// Read the current reference point.
    fn reference(&self) -> Reference<Self::Zone>;
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    type Zone = C::Zone;

    fn reference(&self) -> Reference<Self::Zone> {
        (**self).reference()
    }
}

/// Wall clock in a fixed zone.
#[derive(Debug, Clone)]
pub struct SystemClock<Tz> {
    zone: Tz,
}

impl<Tz: TimeZone> SystemClock<Tz> {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }
}

impl SystemClock<Local> {
    /// Wall clock in the operating system's local zone.
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl<Tz> Clock for SystemClock<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    type Zone = Tz;

    fn reference(&self) -> Reference<Tz> {
        let now = Utc::now().with_timezone(&self.zone);
        Reference {
            date: now.date_naive(),
            zone: self.zone.clone(),
        }
    }
}

/// Clock pinned to a single date. Used by tests and `--date`.
#[derive(Debug, Clone)]
pub struct FixedClock<Tz> {
    date: NaiveDate,
    zone: Tz,
}

impl<Tz: TimeZone> FixedClock<Tz> {
    pub fn new(date: NaiveDate, zone: Tz) -> Self {
        Self { date, zone }
    }
}

impl<Tz> Clock for FixedClock<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    type Zone = Tz;

    fn reference(&self) -> Reference<Tz> {
        Reference {
            date: self.date,
            zone: self.zone.clone(),
        }
    }
}
