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

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::Error;
use crate::Trap;
use crate::append::Destination;
use crate::append::closed_error;
use crate::append::create_log_dir;
use crate::append::open_log_file;
use crate::trap::DefaultTrap;

/// A destination that rolls the file over once it would exceed a size threshold.
///
/// Backups are numbered: `<path>.1` is the most recent, up to `<path>.<backup_count>`. With no
/// backups kept, a rollover truncates the file in place.
///
/// The threshold is checked before each write, so a line is never split across two files. A
/// single line larger than the threshold is written alone into a fresh file.
#[derive(Debug)]
pub struct SizeRotatingFile {
    state: State,
    writer: Option<fs::File>,
}

impl SizeRotatingFile {
    /// Creates a new [`SizeRotatingFileBuilder`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rotalog::append::SizeRotatingFile;
    ///
    /// let builder = SizeRotatingFile::builder("logs/app.log", 10 * 1024 * 1024).backup_count(5);
    /// ```
    #[must_use]
    pub fn builder(filepath: impl Into<PathBuf>, max_bytes: u64) -> SizeRotatingFileBuilder {
        SizeRotatingFileBuilder::new(filepath, max_bytes)
    }

    /// The path of the active file.
    pub fn path(&self) -> &Path {
        &self.state.filepath
    }

    fn rollover(&mut self) {
        // release the handle before touching the file on disk
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.flush() {
                let err = Error::rotation_io("failed to flush previous writer").with_source(err);
                self.state.trap.trap(&err);
            }
        }

        let truncate = match self.state.shift_backups() {
            Ok(()) => true,
            Err(err) => {
                self.state.trap.trap(&err);
                false
            }
        };

        self.state.current_bytes = 0;
        match open_log_file(&self.state.filepath, truncate) {
            Ok(file) => {
                // the old content is kept when it could not be archived
                if !truncate {
                    self.state.current_bytes = file_size(&file, &self.state.filepath)
                        .unwrap_or_else(|err| {
                            self.state.trap.trap(&err);
                            self.state.max_bytes
                        });
                }
                self.writer = Some(file);
            }
            Err(err) => {
                let err = Error::rotation_io("failed to reopen log file after rollover")
                    .with_source(err);
                self.state.trap.trap(&err);
            }
        }
    }

    fn reopen(&mut self) -> Result<(), Error> {
        if self.state.closed {
            return Err(closed_error());
        }
        self.writer = Some(open_log_file(&self.state.filepath, false)?);
        Ok(())
    }
}

impl Destination for SizeRotatingFile {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        if self.state.closed {
            return Err(closed_error());
        }
        if self.state.should_rollover(bytes.len()) {
            self.rollover();
        }

        // a failed rollover may have left no handle behind
        if self.writer.is_none() {
            self.reopen()?;
        }
        let writer = self.writer.as_mut().ok_or_else(closed_error)?;
        writer.write_all(bytes).map_err(|err| {
            Error::destination_io("failed to write log file")
                .with_context("path", self.state.filepath.display())
                .with_source(err)
        })?;
        self.state.current_bytes += bytes.len() as u64;
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

/// A builder for configuring [`SizeRotatingFile`].
#[derive(Debug)]
pub struct SizeRotatingFileBuilder {
    // required
    filepath: PathBuf,
    max_bytes: u64,

    // has default
    backup_count: usize,
    trap: Box<dyn Trap>,
}

impl SizeRotatingFileBuilder {
    /// Creates a new [`SizeRotatingFileBuilder`] rolling over at `max_bytes`.
    #[must_use]
    pub fn new(filepath: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            filepath: filepath.into(),
            max_bytes,
            backup_count: 0,
            trap: Box::new(DefaultTrap::default()),
        }
    }

    /// Set the number of numbered backups to keep. Default to zero.
    #[must_use]
    pub fn backup_count(mut self, n: usize) -> Self {
        self.backup_count = n;
        self
    }

    /// Set the trap receiving rollover failures.
    #[must_use]
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Builds the [`SizeRotatingFile`].
    ///
    /// An existing file is appended to, and its size counts toward the threshold.
    ///
    /// # Errors
    ///
    /// Return an error if either:
    ///
    /// * `max_bytes` is zero.
    /// * The log directory or the log file cannot be created.
    pub fn build(self) -> Result<SizeRotatingFile, Error> {
        let Self {
            filepath,
            max_bytes,
            backup_count,
            trap,
        } = self;

        if max_bytes == 0 {
            return Err(Error::invalid_configuration("max bytes must be positive")
                .with_context("path", filepath.display()));
        }

        create_log_dir(&filepath)?;
        let writer = open_log_file(&filepath, false)?;
        let current_bytes = file_size(&writer, &filepath)?;

        let state = State {
            filepath,
            max_bytes,
            current_bytes,
            backup_count,
            closed: false,
            trap,
        };
        Ok(SizeRotatingFile {
            state,
            writer: Some(writer),
        })
    }
}

fn file_size(file: &fs::File, filepath: &Path) -> Result<u64, Error> {
    let metadata = file.metadata().map_err(|err| {
        Error::destination_io("failed to stat log file")
            .with_context("path", filepath.display())
            .with_source(err)
    })?;
    Ok(metadata.len())
}

#[derive(Debug)]
struct State {
    filepath: PathBuf,
    max_bytes: u64,
    current_bytes: u64,
    backup_count: usize,
    closed: bool,
    trap: Box<dyn Trap>,
}

impl State {
    fn should_rollover(&self, pending: usize) -> bool {
        self.current_bytes > 0 && self.current_bytes.saturating_add(pending as u64) > self.max_bytes
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = OsString::from(self.filepath.as_os_str());
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    // Shift the contiguous run `.1..k` up by one, dropping `.N` once the run is full, then
    // archive the active file as `.1`. Backups past the first gap are never touched.
    //
    // Failures on the older backups are trapped and skipped; only a failure to archive the active
    // file is returned, since truncating it then would lose its content.
    fn shift_backups(&self) -> Result<(), Error> {
        let n = self.backup_count;
        if n == 0 {
            return Ok(());
        }

        let mut run = 0;
        while run < n && fs::exists(self.backup_path(run + 1)).is_ok_and(|ok| ok) {
            run += 1;
        }

        if run == n {
            let oldest = self.backup_path(n);
            if let Err(err) = fs::remove_file(&oldest) {
                let err = Error::rotation_io("failed to remove oldest backup")
                    .with_context("path", oldest.display())
                    .with_source(err);
                self.trap.trap(&err);
            }
            run = n - 1;
        }

        for i in (1..=run).rev() {
            let from = self.backup_path(i);
            let to = self.backup_path(i + 1);
            if let Err(err) = fs::rename(&from, &to) {
                let err = Error::rotation_io("failed to rotate backup")
                    .with_context("from", from.display())
                    .with_context("to", to.display())
                    .with_source(err);
                self.trap.trap(&err);
            }
        }

        let archive = self.backup_path(1);
        fs::rename(&self.filepath, &archive).map_err(|err| {
            Error::rotation_io("failed to archive log file")
                .with_context("from", self.filepath.display())
                .with_context("to", archive.display())
                .with_source(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rand::Rng;
    use rand::distr::Alphanumeric;
    use tempfile::TempDir;

    use super::*;
    use crate::ErrorKind;
    use crate::trap::NoopTrap;
    use crate::trap::testing::RecordingTrap;

    fn line(tag: &str, len: usize) -> String {
        let mut line = format!("{tag}:");
        line.extend(std::iter::repeat_n('x', len - tag.len() - 2));
        line.push('\n');
        assert_eq!(line.len(), len);
        line
    }

    #[test]
    fn test_zero_max_bytes_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = SizeRotatingFile::builder(temp_dir.path().join("app.log"), 0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert!(!temp_dir.path().join("app.log").exists());
    }

    #[test]
    fn test_rollover_at_crossing_write() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let mut writer = SizeRotatingFile::builder(&filepath, 100)
            .backup_count(3)
            .trap(NoopTrap::default())
            .build()
            .unwrap();

        let a = line("a", 40);
        let b = line("b", 40);
        let c = line("c", 40);
        writer.write(a.as_bytes()).unwrap();
        writer.write(b.as_bytes()).unwrap();
        assert!(!writer.state.backup_path(1).exists());

        // 80 + 40 > 100
        writer.write(c.as_bytes()).unwrap();
        assert_eq!(
            fs::read_to_string(writer.state.backup_path(1)).unwrap(),
            format!("{a}{b}")
        );
        assert_eq!(fs::read_to_string(&filepath).unwrap(), c);
        assert_eq!(writer.state.current_bytes, 40);
        assert!(!writer.state.backup_path(2).exists());
    }

    #[test]
    fn test_exact_fit_does_not_rollover() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let mut writer = SizeRotatingFile::builder(&filepath, 80)
            .backup_count(1)
            .build()
            .unwrap();

        writer.write(line("a", 40).as_bytes()).unwrap();
        writer.write(line("b", 40).as_bytes()).unwrap();
        assert!(!writer.state.backup_path(1).exists());
        assert_eq!(fs::metadata(&filepath).unwrap().len(), 80);
    }

    #[test]
    fn test_backup_rotation_order() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let mut writer = SizeRotatingFile::builder(&filepath, 10)
            .backup_count(3)
            .trap(NoopTrap::default())
            .build()
            .unwrap();

        // each write fills the file, so every following write rolls over once
        for i in 0..6 {
            writer.write(line(&i.to_string(), 10).as_bytes()).unwrap();
        }
        writer.close().unwrap();

        let mut names = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, ["app.log", "app.log.1", "app.log.2", "app.log.3"]);

        assert_eq!(fs::read_to_string(&filepath).unwrap(), line("5", 10));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("app.log.1")).unwrap(),
            line("4", 10)
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("app.log.2")).unwrap(),
            line("3", 10)
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("app.log.3")).unwrap(),
            line("2", 10)
        );
    }

    #[test]
    fn test_zero_backups_truncates_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let mut writer = SizeRotatingFile::builder(&filepath, 50)
            .backup_count(0)
            .build()
            .unwrap();

        writer.write(line("old", 40).as_bytes()).unwrap();
        writer.write(line("new", 40).as_bytes()).unwrap();

        assert_eq!(fs::read_to_string(&filepath).unwrap(), line("new", 40));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_oversized_line_goes_alone_into_fresh_file() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let mut writer = SizeRotatingFile::builder(&filepath, 20)
            .backup_count(2)
            .build()
            .unwrap();

        let big = line("big", 64);
        writer.write(big.as_bytes()).unwrap();
        assert!(!writer.state.backup_path(1).exists());
        assert_eq!(fs::read_to_string(&filepath).unwrap(), big);

        let small = line("s", 8);
        writer.write(small.as_bytes()).unwrap();
        assert_eq!(
            fs::read_to_string(writer.state.backup_path(1)).unwrap(),
            big
        );
        assert_eq!(fs::read_to_string(&filepath).unwrap(), small);
    }

    #[test]
    fn test_existing_file_seeds_counter() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let previous = line("previous run", 90);
        fs::write(&filepath, &previous).unwrap();

        let mut writer = SizeRotatingFile::builder(&filepath, 100)
            .backup_count(1)
            .build()
            .unwrap();
        assert_eq!(writer.state.current_bytes, 90);

        let next = line("next", 20);
        writer.write(next.as_bytes()).unwrap();
        assert_eq!(
            fs::read_to_string(writer.state.backup_path(1)).unwrap(),
            previous
        );
        assert_eq!(fs::read_to_string(&filepath).unwrap(), next);
    }

    #[test]
    fn test_archive_failure_keeps_content() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let trap = RecordingTrap::default();
        let mut writer = SizeRotatingFile::builder(&filepath, 100)
            .backup_count(1)
            .trap(trap.clone())
            .build()
            .unwrap();

        // a directory in place of `.1` makes the archive rename fail
        fs::create_dir(writer.state.backup_path(1)).unwrap();
        fs::write(writer.state.backup_path(1).join("keep"), b"").unwrap();

        let mut expected = String::new();
        for i in 0..19 {
            let line = line(&i.to_string(), 10);
            writer.write(line.as_bytes()).unwrap();
            expected.push_str(&line);

            // the counter keeps tracking the file it is appending to
            let len = fs::metadata(&filepath).unwrap().len();
            assert_eq!(writer.state.current_bytes, len);
        }
        assert_eq!(fs::read_to_string(&filepath).unwrap(), expected);

        let errors = trap.errors();
        assert!(
            errors
                .iter()
                .any(|(kind, message)| *kind == ErrorKind::RotationIo
                    && message == "failed to archive log file"),
            "{errors:?}"
        );

        // once the obstacle is gone, the next write rolls over normally
        fs::remove_dir_all(writer.state.backup_path(1)).unwrap();
        writer.write(line("z", 10).as_bytes()).unwrap();
        assert_eq!(
            fs::read_to_string(writer.state.backup_path(1)).unwrap(),
            expected
        );
        assert_eq!(fs::read_to_string(&filepath).unwrap(), line("z", 10));
        assert_eq!(writer.state.current_bytes, 10);
    }

    #[test]
    fn test_unbounded_backup_count() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let mut writer = SizeRotatingFile::builder(&filepath, 10)
            .backup_count(usize::MAX)
            .build()
            .unwrap();

        for i in 0..5 {
            writer.write(line(&i.to_string(), 10).as_bytes()).unwrap();
        }
        writer.close().unwrap();

        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 5);
        for n in 1..=4 {
            assert_eq!(
                fs::read_to_string(writer.state.backup_path(n)).unwrap(),
                line(&(4 - n).to_string(), 10)
            );
        }
    }

    #[test]
    fn test_backups_past_a_gap_are_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let filepath = temp_dir.path().join("app.log");
        let mut writer = SizeRotatingFile::builder(&filepath, 10)
            .backup_count(3)
            .build()
            .unwrap();
        fs::write(writer.state.backup_path(3), "stale").unwrap();

        writer.write(line("a", 10).as_bytes()).unwrap();
        writer.write(line("b", 10).as_bytes()).unwrap();

        assert_eq!(
            fs::read_to_string(writer.state.backup_path(1)).unwrap(),
            line("a", 10)
        );
        assert!(!writer.state.backup_path(2).exists());
        assert_eq!(
            fs::read_to_string(writer.state.backup_path(3)).unwrap(),
            "stale"
        );
    }

    #[test]
    fn test_write_after_close_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = SizeRotatingFile::builder(temp_dir.path().join("app.log"), 10)
            .build()
            .unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(
            writer.write(b"late\n").unwrap_err().kind(),
            ErrorKind::DestinationIo
        );
    }

    #[test]
    fn test_file_rolling_via_file_size() {
        test_file_rolling_for_specific_file_size(3, 1000);
        test_file_rolling_for_specific_file_size(10, 8888);
        test_file_rolling_for_specific_file_size(20, 6666);
    }

    fn test_file_rolling_for_specific_file_size(backup_count: usize, max_bytes: u64) {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = SizeRotatingFile::builder(temp_dir.path().join("app.log"), max_bytes)
            .backup_count(backup_count)
            .build()
            .unwrap();

        let mut total = 0;
        for _ in 0..(backup_count * 4) {
            let rand_str = generate_random_string();
            total += rand_str.len() as u64;
            assert_eq!(writer.write(rand_str.as_bytes()).unwrap(), rand_str.len());
            assert!(writer.state.current_bytes <= max_bytes);
        }
        writer.close().unwrap();

        let files = fs::read_dir(temp_dir.path()).unwrap().count();
        assert!(files <= backup_count + 1);
        for entry in fs::read_dir(temp_dir.path()).unwrap() {
            let len = entry.unwrap().metadata().unwrap().len();
            assert!(len <= max_bytes && len <= total);
        }
    }

    fn generate_random_string() -> String {
        let mut rng = rand::rng();
        let len = rng.random_range(50..=100);
        let random_string: String = std::iter::repeat(())
            .map(|()| rng.sample(Alphanumeric))
            .map(char::from)
            .take(len)
            .collect();

        random_string
    }
}
