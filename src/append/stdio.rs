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
use std::io;
use std::io::Write;

use crate::Error;
use crate::append::Destination;
use crate::append::closed_error;

/// A destination that prints log lines to stdout.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Stdout {}

impl Destination for Stdout {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        io::stdout()
            .write_all(bytes)
            .map_err(Error::from_io_error)?;
        Ok(bytes.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        io::stdout().flush().map_err(Error::from_io_error)
    }

    fn close(&mut self) -> Result<(), Error> {
        self.flush()
    }
}

/// A destination that prints log lines to stderr.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Stderr {}

impl Destination for Stderr {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        io::stderr()
            .write_all(bytes)
            .map_err(Error::from_io_error)?;
        Ok(bytes.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        io::stderr().flush().map_err(Error::from_io_error)
    }

    fn close(&mut self) -> Result<(), Error> {
        self.flush()
    }
}

/// A destination over any [`io::Write`], e.g. a socket or an in-memory buffer.
///
/// Closing flushes and drops the writer.
pub struct Stream<W> {
    writer: Option<W>,
}

impl<W: io::Write> Stream<W> {
    /// Wrap `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }
}

impl<W> fmt::Debug for Stream<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("closed", &self.writer.is_none())
            .finish_non_exhaustive()
    }
}

impl<W: io::Write + Send + 'static> Destination for Stream<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        let writer = self.writer.as_mut().ok_or_else(closed_error)?;
        writer.write_all(bytes).map_err(Error::from_io_error)?;
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

/// A destination that discards everything.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Null {}

impl Destination for Null {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        Ok(bytes.len())
    }

    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
