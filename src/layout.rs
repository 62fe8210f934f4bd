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

use std::io::Write;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::Error;
use crate::FormatFlags;
use crate::record::Record;

const SEPARATOR: &[u8] = b" | ";

/// A layout that formats log record as bracketed text.
///
/// Output format:
///
/// ```text
/// [Error | 2024/08/11 22:44:57.172 | file.rs:51] Hello error!
/// [Warn  | 2024/08/11 22:44:57.172 | file.rs:52] Hello warn!
/// [Info  | 2024/08/11 22:44:57.172 | file.rs:53] Hello info!
/// ```
///
/// Each bracketed field is present only if its flag is set, and `" | "` appears only between two
/// present fields. With no flag set, a line is the bare message. A trailing newline is appended
/// unless the message already ends with one.
///
/// The timestamp is rendered in the system timezone unless [`timezone`](TextLayout::timezone) is
/// set.
///
/// # Examples
///
/// ```
/// use rotalog::FormatFlags;
/// use rotalog::layout::TextLayout;
///
/// let layout = TextLayout::new(FormatFlags::LEVEL | FormatFlags::TIME);
/// ```
#[derive(Debug, Clone)]
pub struct TextLayout {
    flags: FormatFlags,
    timezone: TimeZone,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self::new(FormatFlags::default())
    }
}

impl TextLayout {
    /// Create a layout that prints the fields in `flags`.
    pub fn new(flags: FormatFlags) -> Self {
        Self {
            flags,
            timezone: TimeZone::system(),
        }
    }

    /// Set the timezone for timestamps.
    ///
    /// Defaults to the system timezone if not set.
    ///
    /// # Examples
    ///
    /// ```
    /// use jiff::tz::TimeZone;
    /// use rotalog::layout::TextLayout;
    ///
    /// let layout = TextLayout::default().timezone(TimeZone::UTC);
    /// ```
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.timezone = tz;
        self
    }

    /// The fields this layout prints.
    pub fn flags(&self) -> FormatFlags {
        self.flags
    }

    /// Append the formatted record to `buf`.
    pub fn format(&self, record: &Record, buf: &mut Vec<u8>) -> Result<(), Error> {
        let flags = self.flags;
        if !flags.is_empty() {
            buf.push(b'[');

            let mut first = true;
            let mut separate = |buf: &mut Vec<u8>| {
                if !first {
                    buf.extend_from_slice(SEPARATOR);
                }
                first = false;
            };

            if flags.contains(FormatFlags::LEVEL) {
                separate(buf);
                buf.extend_from_slice(record.level().as_str().as_bytes());
            }
            if flags.contains(FormatFlags::TIME) {
                separate(buf);
                self.format_time(record.time(), buf)?;
            }
            if flags.contains(FormatFlags::FILE) {
                separate(buf);
                let file = record.filename().unwrap_or("???");
                let line = record.line().unwrap_or_default();
                write!(buf, "{file}:{line}").map_err(Error::from_io_error)?;
            }

            buf.extend_from_slice(b"] ");
        }

        let start = buf.len();
        write!(buf, "{}", record.args()).map_err(Error::from_io_error)?;
        if buf.len() == start || buf.last() != Some(&b'\n') {
            buf.push(b'\n');
        }
        Ok(())
    }

    // 2006/01/02 15:04:05.000
    fn format_time(&self, ts: Timestamp, buf: &mut Vec<u8>) -> Result<(), Error> {
        let zoned = ts.to_zoned(self.timezone.clone());
        write!(
            buf,
            "{}.{:03}",
            zoned.strftime("%Y/%m/%d %H:%M:%S"),
            zoned.millisecond()
        )
        .map_err(Error::from_io_error)
    }
}
