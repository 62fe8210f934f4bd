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

//! Destinations that formatted log lines are written to.
//!
//! A [`Logger`](crate::Logger) owns exactly one destination at a time. The file-based
//! destinations apply their rotation policy inside [`Destination::write`], before the bytes
//! reach the disk, so a single line is never split across two files.

use std::fmt;
use std::fs;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use crate::Error;

mod clock;
mod plain;
mod rotating;
mod rotation;
mod stdio;
mod timed;

pub use self::plain::File;
pub use self::plain::FileBuilder;
pub use self::rotating::SizeRotatingFile;
pub use self::rotating::SizeRotatingFileBuilder;
pub use self::rotation::Granularity;
pub use self::stdio::Null;
pub use self::stdio::Stderr;
pub use self::stdio::Stdout;
pub use self::stdio::Stream;
pub use self::timed::TimeRotatingFile;
pub use self::timed::TimeRotatingFileBuilder;
pub use self::timed::TimeSizeRotatingFile;
pub use self::timed::TimeSizeRotatingFileBuilder;

/// A write target for formatted log lines.
///
/// Implementors are always driven under the logger's destination lock, so they see one caller at
/// a time.
pub trait Destination: fmt::Debug + Send + 'static {
    /// Write one formatted line in full, returning the number of bytes written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error>;

    /// Flush any buffered bytes.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Release the underlying handle. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), Error>;
}

impl<T: Destination> From<T> for Box<dyn Destination> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

fn closed_error() -> Error {
    Error::destination_io("destination is closed")
}

// parent directories are created recursively
fn create_log_dir(filepath: &Path) -> Result<PathBuf, Error> {
    let dir = match filepath.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|err| {
        Error::destination_io("failed to create log directory")
            .with_context("dir", dir.display())
            .with_source(err)
    })?;
    Ok(dir)
}

fn open_log_file(filepath: &Path, truncate: bool) -> Result<fs::File, Error> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options.open(filepath).map_err(|err| {
        Error::destination_io("failed to open log file")
            .with_context("path", filepath.display())
            .with_source(err)
    })
}
