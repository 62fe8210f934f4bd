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

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use jiff::SignedDuration;
use jiff::Timestamp;
use jiff::Zoned;
use jiff::civil::DateTime;

use crate::Error;
use crate::Trap;
use crate::append::Destination;
use crate::append::clock::Clock;
use crate::append::closed_error;
use crate::append::create_log_dir;
use crate::append::open_log_file;
use crate::append::rotation::Granularity;
use crate::trap::DefaultTrap;

/// A destination that starts a new file every interval.
///
/// Files are named `<stamp>_<basename>` next to the configured path, where `<stamp>` is the local
/// time at which the file was opened, formatted with the [`Granularity`] pattern. Old files are
/// kept forever; see [`TimeSizeRotatingFile`] for bounded retention.
#[derive(Debug)]
pub struct TimeRotatingFile {
    state: State,
    writer: Option<fs::File>,
}

impl TimeRotatingFile {
    /// Creates a new [`TimeRotatingFileBuilder`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rotalog::append::Granularity;
    /// use rotalog::append::TimeRotatingFile;
    ///
    /// let builder = TimeRotatingFile::builder("logs/app.log", Granularity::Hour).multiplier(6);
    /// ```
    #[must_use]
    pub fn builder(
        filepath: impl Into<PathBuf>,
        granularity: Granularity,
    ) -> TimeRotatingFileBuilder {
        TimeRotatingFileBuilder::new(filepath, granularity)
    }

    /// The path of the file currently written.
    pub fn path(&self) -> &Path {
        &self.state.current_path
    }

    fn rollover(&mut self, now: &Zoned) {
        let next_path = self.state.filepath_at(now);
        match open_log_file(&next_path, false) {
            Ok(file) => {
                if let Some(mut previous) = self.writer.replace(file) {
                    if let Err(err) = previous.flush() {
                        let err =
                            Error::rotation_io("failed to flush previous writer").with_source(err);
                        self.state.trap.trap(&err);
                    }
                }
                self.state.current_path = next_path;
            }
            Err(err) => {
                // keep writing to the old file
                let err = Error::rotation_io("failed to open next log file").with_source(err);
                self.state.trap.trap(&err);
            }
        }

        self.state.rollover_at = next_rollover(now, self.state.interval);
        self.state.prune();
    }
}

impl Destination for TimeRotatingFile {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        if self.state.closed {
            return Err(closed_error());
        }

        let now = self.state.clock.now();
        if self.state.should_rollover(&now) {
            self.rollover(&now);
        }

        if self.writer.is_none() {
            self.writer = Some(open_log_file(&self.state.current_path, false)?);
        }
        let writer = self.writer.as_mut().ok_or_else(closed_error)?;
        writer.write_all(bytes).map_err(|err| {
            Error::destination_io("failed to write log file")
                .with_context("path", self.state.current_path.display())
                .with_source(err)
        })?;
        Ok(bytes.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        self.state.closed = true;
        match self.writer.take() {
            Some(mut writer) => writer.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }
}

/// A builder for configuring [`TimeRotatingFile`].
#[derive(Debug)]
pub struct TimeRotatingFileBuilder {
    // required
    filepath: PathBuf,
    granularity: Granularity,

    // has default
    multiplier: u32,
    clock: Clock,
    trap: Box<dyn Trap>,
    #[cfg(test)]
    undeletable: Vec<PathBuf>,
}

impl TimeRotatingFileBuilder {
    /// Creates a new [`TimeRotatingFileBuilder`] rolling over every `granularity` unit.
    #[must_use]
    pub fn new(filepath: impl Into<PathBuf>, granularity: Granularity) -> Self {
        Self {
            filepath: filepath.into(),
            granularity,
            multiplier: 1,
            clock: Clock::default(),
            trap: Box::new(DefaultTrap::default()),
            #[cfg(test)]
            undeletable: vec![],
        }
    }

    /// Set how many granularity units make up one interval. Default to one.
    #[must_use]
    pub fn multiplier(mut self, n: u32) -> Self {
        self.multiplier = n;
        self
    }

    /// Set the trap receiving rollover failures.
    #[must_use]
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    #[cfg(test)]
    fn clock(mut self, clock: impl Into<Clock>) -> Self {
        self.clock = clock.into();
        self
    }

    // removing this file fails as if it were locked by another process
    #[cfg(test)]
    fn undeletable(mut self, filepath: impl Into<PathBuf>) -> Self {
        self.undeletable.push(filepath.into());
        self
    }

    /// Builds the [`TimeRotatingFile`] and opens the file for the current interval.
    ///
    /// # Errors
    ///
    /// Return an error if either:
    ///
    /// * The multiplier is zero.
    /// * The path has no UTF-8 file name.
    /// * The log directory or the log file cannot be created.
    pub fn build(self) -> Result<TimeRotatingFile, Error> {
        self.build_with_retention(None)
    }

    fn build_with_retention(self, backup_count: Option<usize>) -> Result<TimeRotatingFile, Error> {
        let Self {
            filepath,
            granularity,
            multiplier,
            clock,
            trap,
            #[cfg(test)]
            undeletable,
        } = self;

        let interval = granularity.interval(multiplier)?;
        let log_filename = match filepath.file_name().and_then(|name| name.to_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(Error::invalid_configuration(
                    "log path must end with a UTF-8 file name",
                )
                .with_context("path", filepath.display()));
            }
        };
        let log_dir = create_log_dir(&filepath)?;

        let now = clock.now();
        let mut state = State {
            log_dir,
            log_filename,
            granularity,
            interval,
            rollover_at: next_rollover(&now, interval),
            current_path: PathBuf::new(),
            backup_count,
            clock,
            closed: false,
            trap,
            #[cfg(test)]
            undeletable,
        };
        state.current_path = state.filepath_at(&now);
        let writer = open_log_file(&state.current_path, false)?;
        state.prune();

        Ok(TimeRotatingFile {
            state,
            writer: Some(writer),
        })
    }
}

/// A [`TimeRotatingFile`] that keeps at most `backup_count` rotated files.
///
/// Candidates are the files in the log directory named `<stamp>_<basename>` whose stamp parses
/// with the granularity pattern; anything else in the directory is left alone. The oldest
/// candidates are deleted after every rollover and once at construction. The file currently
/// written never counts as a backup.
#[derive(Debug)]
pub struct TimeSizeRotatingFile {
    inner: TimeRotatingFile,
}

impl TimeSizeRotatingFile {
    /// Creates a new [`TimeSizeRotatingFileBuilder`].
    #[must_use]
    pub fn builder(
        filepath: impl Into<PathBuf>,
        granularity: Granularity,
        backup_count: usize,
    ) -> TimeSizeRotatingFileBuilder {
        TimeSizeRotatingFileBuilder::new(filepath, granularity, backup_count)
    }

    /// The path of the file currently written.
    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

impl Destination for TimeSizeRotatingFile {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        self.inner.write(bytes)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<(), Error> {
        self.inner.close()
    }
}

/// A builder for configuring [`TimeSizeRotatingFile`].
#[derive(Debug)]
pub struct TimeSizeRotatingFileBuilder {
    inner: TimeRotatingFileBuilder,
    backup_count: usize,
}

impl TimeSizeRotatingFileBuilder {
    /// Creates a new [`TimeSizeRotatingFileBuilder`].
    #[must_use]
    pub fn new(
        filepath: impl Into<PathBuf>,
        granularity: Granularity,
        backup_count: usize,
    ) -> Self {
        Self {
            inner: TimeRotatingFileBuilder::new(filepath, granularity),
            backup_count,
        }
    }

    /// Set how many granularity units make up one interval. Default to one.
    #[must_use]
    pub fn multiplier(mut self, n: u32) -> Self {
        self.inner = self.inner.multiplier(n);
        self
    }

    /// Set the trap receiving rollover and pruning failures.
    #[must_use]
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.inner = self.inner.trap(trap);
        self
    }

    #[cfg(test)]
    fn clock(mut self, clock: impl Into<Clock>) -> Self {
        self.inner = self.inner.clock(clock);
        self
    }

    #[cfg(test)]
    fn undeletable(mut self, filepath: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.undeletable(filepath);
        self
    }

    /// Builds the [`TimeSizeRotatingFile`], pruning stale backups left by earlier runs.
    ///
    /// # Errors
    ///
    /// Same as [`TimeRotatingFileBuilder::build`].
    pub fn build(self) -> Result<TimeSizeRotatingFile, Error> {
        let inner = self.inner.build_with_retention(Some(self.backup_count))?;
        Ok(TimeSizeRotatingFile { inner })
    }
}

fn next_rollover(now: &Zoned, interval: SignedDuration) -> Timestamp {
    now.timestamp()
        .checked_add(interval)
        .unwrap_or(Timestamp::MAX)
}

#[derive(Debug)]
struct LogFile {
    filepath: PathBuf,
    datetime: DateTime,
}

// oldest is the least
fn compare_logfile(a: &LogFile, b: &LogFile) -> Ordering {
    a.datetime
        .cmp(&b.datetime)
        .then_with(|| a.filepath.cmp(&b.filepath))
}

#[derive(Debug)]
struct State {
    log_dir: PathBuf,
    log_filename: String,
    granularity: Granularity,
    interval: SignedDuration,
    rollover_at: Timestamp,
    current_path: PathBuf,
    backup_count: Option<usize>,
    clock: Clock,
    closed: bool,
    trap: Box<dyn Trap>,
    #[cfg(test)]
    undeletable: Vec<PathBuf>,
}

impl State {
    fn filepath_at(&self, now: &Zoned) -> PathBuf {
        let stamp = now.strftime(self.granularity.date_format());
        self.log_dir.join(format!("{stamp}_{}", self.log_filename))
    }

    fn should_rollover(&self, now: &Zoned) -> bool {
        now.timestamp() > self.rollover_at
    }

    fn prune(&self) {
        if let Some(backup_count) = self.backup_count {
            if let Err(err) = self.delete_oldest_logs(backup_count) {
                self.trap.trap(&err);
            }
        }
    }

    fn list_logfiles(&self) -> Result<Vec<LogFile>, Error> {
        let read_dir = fs::read_dir(&self.log_dir).map_err(|err| {
            Error::rotation_io("failed to read log dir")
                .with_context("dir", self.log_dir.display())
                .with_source(err)
        })?;

        let files = read_dir
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let filepath = entry.path();
                if filepath == self.current_path {
                    return None;
                }

                // only files are created here, not directories or symlinks
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }

                let filename = entry.file_name();
                // if the filename is not a UTF-8 string, skip it.
                let filename = filename.to_str()?;
                let (stamp, basename) = filename.split_once('_')?;
                if basename != self.log_filename {
                    return None;
                }
                let datetime = self.granularity.parse_date(stamp)?;

                Some(LogFile { filepath, datetime })
            })
            .collect::<Vec<_>>();

        Ok(files)
    }

    fn delete_oldest_logs(&self, max_files: usize) -> Result<(), Error> {
        let mut files = self.list_logfiles()?;
        if files.len() <= max_files {
            return Ok(());
        }

        files.sort_by(compare_logfile);
        for file in files.iter().take(files.len() - max_files) {
            let filepath = &file.filepath;
            if let Err(err) = self.remove_logfile(filepath) {
                let err = Error::rotation_io("failed to remove old log")
                    .with_context("path", filepath.display())
                    .with_source(err);
                self.trap.trap(&err);
            }
        }

        Ok(())
    }

    fn remove_logfile(&self, filepath: &Path) -> io::Result<()> {
        #[cfg(test)]
        if self.undeletable.iter().any(|path| path == filepath) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        fs::remove_file(filepath)
    }
}
