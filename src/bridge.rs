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

//! The opt-in process-wide logger and the bridge from the [`log`] crate.
//!
//! Nothing here is set up implicitly. A program owns its [`Logger`] and passes it around; only a
//! call to [`set_default`] makes one logger reachable from anywhere.

use std::sync::OnceLock;

use crate::Error;
use crate::Logger;

static DEFAULT_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Install `logger` as the process-wide default.
///
/// With the `bridge-log` feature, the logger is also installed as the [`log`] crate's global
/// logger and the `log` max level is set to `Trace`; filtering stays with the logger's own
/// threshold.
///
/// # Errors
///
/// Returns [`InvalidConfiguration`](crate::ErrorKind::InvalidConfiguration) if a default logger
/// was already set, or if another logger owns the `log` facade. In the latter case the default
/// logger is still set.
///
/// # Examples
///
/// ```
/// use rotalog::FormatFlags;
/// use rotalog::Level;
///
/// let logger = rotalog::console(Level::Info, FormatFlags::all());
/// let logger = rotalog::bridge::set_default(logger).unwrap();
/// logger.info("ready");
/// log::warn!("through the log facade");
/// ```
pub fn set_default(logger: Logger) -> Result<&'static Logger, Error> {
    DEFAULT_LOGGER.set(logger).map_err(|logger| {
        // the rejected logger is dropped here, closing its destination
        drop(logger);
        Error::invalid_configuration("default logger has already been set")
    })?;

    let logger = default_logger()
        .ok_or_else(|| Error::invalid_configuration("default logger has not been set"))?;

    #[cfg(feature = "bridge-log")]
    {
        log::set_logger(logger).map_err(|err| {
            Error::invalid_configuration("failed to set up the log crate global logger")
                .with_source(err)
        })?;
        log::set_max_level(log::LevelFilter::Trace);
    }

    Ok(logger)
}

/// The logger installed by [`set_default`], if any.
pub fn default_logger() -> Option<&'static Logger> {
    DEFAULT_LOGGER.get()
}

#[cfg(feature = "bridge-log")]
impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        Logger::enabled(self, metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        Logger::log(
            self,
            &crate::Record::builder()
                .args(*record.args())
                .level(record.level().into())
                .file(record.file())
                .line(record.line())
                .build(),
        );
    }

    fn flush(&self) {
        Logger::flush(self);
    }
}
