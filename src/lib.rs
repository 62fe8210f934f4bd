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

//! Rotalog is a leveled logging library writing bracketed text lines to the console, a plain file,
//! or a rotating file.
//!
//! # Overview
//!
//! A [`Logger`] holds a severity threshold, a set of [`FormatFlags`], and exactly one
//! [`Destination`](append::Destination). Each call at or above the threshold is formatted into a
//! pooled buffer and written to the destination in a single call:
//!
//! ```text
//! [Error | 2024/08/11 22:44:57.172 | main.rs:51] Hello error!
//! ```
//!
//! File destinations roll over by size (numbered backups), by time (timestamp-prefixed files), or
//! by time with a bounded number of backups. Logging never fails observably; write and rollover
//! errors go to a [`Trap`].
//!
//! # Examples
//!
//! Log to stdout:
//!
//! ```
//! use rotalog::FormatFlags;
//! use rotalog::Level;
//!
//! let logger = rotalog::console(Level::Debug, FormatFlags::LEVEL | FormatFlags::TIME);
//! logger.info("This is an info message.");
//! rotalog::warn!(logger, "{} retries left", 3);
//! ```
//!
//! Log to a file rolling over at 10 MiB and keeping 5 backups:
//!
//! ```no_run
//! use rotalog::Level;
//!
//! let logger = rotalog::size_rotating("logs/app.log", 10 * 1024 * 1024, 5, Level::Info)?;
//! logger.error("Error message.");
//! logger.close();
//! # Ok::<(), rotalog::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::path::PathBuf;

pub mod append;
pub mod bridge;
pub mod buffer;
pub mod layout;
pub mod trap;

mod error;
mod flags;
mod level;
mod logger;
mod record;

pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::flags::FormatFlags;
pub use self::level::Level;
pub use self::logger::Logger;
pub use self::record::Record;
pub use self::record::RecordBuilder;
pub use self::trap::Trap;

use self::append::FileBuilder;
use self::append::Granularity;
use self::append::SizeRotatingFileBuilder;
use self::append::Stdout;
use self::append::TimeRotatingFileBuilder;
use self::append::TimeSizeRotatingFileBuilder;

/// Create a logger printing to stdout.
pub fn console(level: Level, flags: FormatFlags) -> Logger {
    Logger::new(Stdout::default(), level, flags)
}

/// Create a logger appending to the file at `path`, with every field printed.
///
/// # Errors
///
/// Return an error if the parent directories or the file cannot be created.
pub fn file(path: impl Into<PathBuf>, level: Level) -> Result<Logger, Error> {
    let destination = FileBuilder::new(path).build()?;
    Ok(Logger::new(destination, level, FormatFlags::all()))
}

/// Create a logger rolling `path` over to numbered backups once it would exceed `max_bytes`.
///
/// # Errors
///
/// Return an error if `max_bytes` is zero, or if the file cannot be created.
pub fn size_rotating(
    path: impl Into<PathBuf>,
    max_bytes: u64,
    backup_count: usize,
    level: Level,
) -> Result<Logger, Error> {
    let destination = SizeRotatingFileBuilder::new(path, max_bytes)
        .backup_count(backup_count)
        .build()?;
    Ok(Logger::new(destination, level, FormatFlags::all()))
}

/// Create a logger starting a new timestamp-prefixed file every `multiplier` `granularity` units.
///
/// # Errors
///
/// Return an error if `multiplier` is zero, or if the file cannot be created.
pub fn time_rotating(
    path: impl Into<PathBuf>,
    granularity: Granularity,
    multiplier: u32,
    level: Level,
) -> Result<Logger, Error> {
    let destination = TimeRotatingFileBuilder::new(path, granularity)
        .multiplier(multiplier)
        .build()?;
    Ok(Logger::new(destination, level, FormatFlags::all()))
}

/// Like [`time_rotating`], keeping at most `backup_count` rotated files.
///
/// # Errors
///
/// Return an error if `multiplier` is zero, or if the file cannot be created.
pub fn time_size_rotating(
    path: impl Into<PathBuf>,
    granularity: Granularity,
    multiplier: u32,
    backup_count: usize,
    level: Level,
) -> Result<Logger, Error> {
    let destination = TimeSizeRotatingFileBuilder::new(path, granularity, backup_count)
        .multiplier(multiplier)
        .build()?;
    Ok(Logger::new(destination, level, FormatFlags::all()))
}
