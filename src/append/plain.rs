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

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::Error;
use crate::append::Destination;
use crate::append::closed_error;
use crate::append::create_log_dir;
use crate::append::open_log_file;

/// A destination appending to a single file that never rotates.
#[derive(Debug)]
pub struct File {
    filepath: PathBuf,
    writer: Option<fs::File>,
}

impl File {
    /// Creates a new [`FileBuilder`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rotalog::append::File;
    ///
    /// let builder = File::builder("logs/app.log");
    /// ```
    #[must_use]
    pub fn builder(filepath: impl Into<PathBuf>) -> FileBuilder {
        FileBuilder::new(filepath)
    }

    /// The path being written.
    pub fn path(&self) -> &Path {
        &self.filepath
    }
}

impl Destination for File {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        let writer = self.writer.as_mut().ok_or_else(closed_error)?;
        writer.write_all(bytes).map_err(|err| {
            Error::destination_io("failed to write log file")
                .with_context("path", self.filepath.display())
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
        match self.writer.take() {
            Some(mut writer) => writer.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }
}

/// A builder for configuring [`File`].
#[derive(Debug)]
pub struct FileBuilder {
    // required
    filepath: PathBuf,
}

impl FileBuilder {
    /// Creates a new [`FileBuilder`].
    #[must_use]
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
        }
    }

    /// Builds the [`File`], creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns a [`DestinationIo`](crate::ErrorKind::DestinationIo) error if the directory or the
    /// file cannot be created.
    pub fn build(self) -> Result<File, Error> {
        let filepath = self.filepath;
        create_log_dir(&filepath)?;
        let writer = open_log_file(&filepath, false)?;
        Ok(File {
            filepath,
            writer: Some(writer),
        })
    }
}
