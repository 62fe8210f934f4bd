// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::str::FromStr;

use jiff::SignedDuration;
use jiff::civil::Date;
use jiff::civil::DateTime;
use jiff::civil::Time;
use jiff::fmt::strtime;

use crate::Error;

/// The calendar unit of a time-based rollover.
///
/// The unit fixes both the base interval and the timestamp prefix of rotated filenames. Prefixes
/// are zero-padded from the year down, so they sort lexically in creation order.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Granularity {
    /// One second; files look like `2024-08-10-17-12-52_app.log`.
    Second,
    /// One minute; files look like `2024-08-10-17-12_app.log`.
    Minute,
    /// One hour; files look like `2024-08-10-17_app.log`.
    Hour,
    /// One day; files look like `2024-08-10_app.log`.
    Day,
}

impl Granularity {
    /// The length of one unit, in seconds.
    pub fn unit_seconds(&self) -> i64 {
        match self {
            Granularity::Second => 1,
            Granularity::Minute => 60,
            Granularity::Hour => 60 * 60,
            Granularity::Day => 24 * 60 * 60,
        }
    }

    /// The rollover interval: `multiplier` units.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfiguration`](crate::ErrorKind::InvalidConfiguration) if `multiplier`
    /// is zero.
    pub fn interval(&self, multiplier: u32) -> Result<SignedDuration, Error> {
        if multiplier == 0 {
            return Err(Error::invalid_configuration(
                "rollover multiplier must be positive",
            ));
        }
        Ok(SignedDuration::from_secs(
            self.unit_seconds() * i64::from(multiplier),
        ))
    }

    /// The strftime pattern of the filename prefix.
    pub fn date_format(&self) -> &'static str {
        match self {
            Granularity::Second => "%Y-%m-%d-%H-%M-%S",
            Granularity::Minute => "%Y-%m-%d-%H-%M",
            Granularity::Hour => "%Y-%m-%d-%H",
            Granularity::Day => "%Y-%m-%d",
        }
    }

    /// Parse a filename prefix written with [`date_format`](Granularity::date_format).
    ///
    /// Fields the pattern does not carry default to zero.
    pub fn parse_date(&self, input: &str) -> Option<DateTime> {
        let tm = strtime::parse(self.date_format(), input).ok()?;
        let date = Date::new(tm.year()?, tm.month()?, tm.day()?).ok()?;
        let time = Time::new(
            tm.hour().unwrap_or(0),
            tm.minute().unwrap_or(0),
            tm.second().unwrap_or(0),
            0,
        )
        .ok()?;
        Some(date.to_datetime(time))
    }

    fn name(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Granularity::Second,
            Granularity::Minute,
            Granularity::Hour,
            Granularity::Day,
        ]
        .into_iter()
        .find(|g| s.eq_ignore_ascii_case(g.name()))
        .ok_or_else(|| Error::invalid_configuration("unknown granularity").with_context("name", s))
    }
}
