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
use std::panic::Location;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use jiff::tz::TimeZone;

use crate::Error;
use crate::FormatFlags;
use crate::Level;
use crate::Record;
use crate::Trap;
use crate::append::Destination;
use crate::buffer::BufferPool;
use crate::layout::TextLayout;
use crate::trap::DefaultTrap;

/// A leveled logger writing formatted lines to one [`Destination`].
///
/// A record is written iff its level is at least the logger's threshold. Records are formatted
/// into a pooled buffer outside of any lock; only the final write to the destination is
/// serialized, so lines from concurrent callers never interleave.
///
/// Logging never fails observably. Formatting and write errors are handed to the logger's
/// [`Trap`] and the record is dropped.
///
/// # Closing
///
/// [`close`](Logger::close) flips the closed flag and closes the destination exactly once. Records
/// logged afterwards are dropped. There is no barrier between the two: a record that passed the
/// closed check right before `close` may still reach the destination, or be dropped if the
/// destination is already gone.
///
/// # Examples
///
/// ```
/// use rotalog::FormatFlags;
/// use rotalog::Level;
/// use rotalog::Logger;
/// use rotalog::append::Stderr;
///
/// let logger = Logger::new(Stderr::default(), Level::Info, FormatFlags::all());
/// logger.info("service started");
/// logger.debug("dropped below the threshold");
/// logger.close();
/// ```
#[derive(Debug)]
pub struct Logger {
    level: AtomicU8,
    closed: AtomicBool,
    layout: TextLayout,
    destination: Mutex<Option<Box<dyn Destination>>>,
    pool: BufferPool,
    trap: Box<dyn Trap>,
}

impl Logger {
    /// Create a logger bound to an already opened destination.
    pub fn new(
        destination: impl Into<Box<dyn Destination>>,
        level: Level,
        flags: FormatFlags,
    ) -> Self {
        Self {
            level: AtomicU8::new(level.into()),
            closed: AtomicBool::new(false),
            layout: TextLayout::new(flags),
            destination: Mutex::new(Some(destination.into())),
            pool: BufferPool::default(),
            trap: Box::new(DefaultTrap::default()),
        }
    }

    /// Set the trap receiving formatting and write failures.
    #[must_use]
    pub fn with_trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Set the timezone of the timestamp field. Default to the system timezone.
    #[must_use]
    pub fn with_timezone(mut self, tz: TimeZone) -> Self {
        self.layout = self.layout.clone().timezone(tz);
        self
    }

    /// Replace the buffer pool with one retaining at most `capacity` free buffers.
    #[must_use]
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool = BufferPool::new(capacity);
        self
    }

    /// The current threshold.
    pub fn level(&self) -> Level {
        let level = self.level.load(Ordering::Relaxed);
        Level::try_from(level).unwrap_or(Level::Trace)
    }

    /// Atomically replace the threshold. Calls in flight may observe either value.
    pub fn set_level(&self, level: Level) {
        self.level.store(level.into(), Ordering::Relaxed);
    }

    /// Replace the threshold by level name, e.g. `"warn"`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfiguration`](crate::ErrorKind::InvalidConfiguration) for an unknown
    /// name; the threshold is left unchanged.
    pub fn set_level_by_name(&self, name: &str) -> Result<(), Error> {
        let level = name.parse::<Level>()?;
        self.set_level(level);
        Ok(())
    }

    /// The fields printed before each message.
    pub fn flags(&self) -> FormatFlags {
        self.layout.flags()
    }

    /// Whether a record at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        !self.is_closed() && level >= self.level()
    }

    /// Whether [`close`](Logger::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn destination(&self) -> MutexGuard<'_, Option<Box<dyn Destination>>> {
        self.destination.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the current destination and install `destination` in its place.
    ///
    /// No write interleaves with the swap. Once the logger is closed, `destination` is closed
    /// right away instead of being installed.
    pub fn set_handler(&self, destination: impl Into<Box<dyn Destination>>) {
        let mut destination = destination.into();
        let mut current = self.destination();

        if self.is_closed() {
            drop(current);
            if let Err(err) = destination.close() {
                self.trap.trap(&err);
            }
            return;
        }

        if let Some(mut previous) = current.replace(destination) {
            if let Err(err) = previous.close() {
                self.trap.trap(&err);
            }
        }
    }

    /// Format `record` and write it to the destination, if its level passes the threshold.
    pub fn log(&self, record: &Record) {
        if !self.enabled(record.level()) {
            return;
        }

        let mut buf = self.pool.get();
        if let Err(err) = self.layout.format(record, &mut buf) {
            self.trap.trap(&err);
            return;
        }

        let mut destination = self.destination();
        if let Some(destination) = destination.as_mut() {
            if let Err(err) = destination.write(&buf) {
                self.trap.trap(&err);
            }
        }
    }

    /// Flush the destination.
    pub fn flush(&self) {
        if let Some(destination) = self.destination().as_mut() {
            if let Err(err) = destination.flush() {
                self.trap.trap(&err);
            }
        }
    }

    /// Close the destination. Only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let destination = self.destination().take();
        if let Some(mut destination) = destination {
            if let Err(err) = destination.close() {
                self.trap.trap(&err);
            }
        }
    }

    #[track_caller]
    fn log_at(&self, level: Level, msg: &dyn fmt::Display) {
        if !self.enabled(level) {
            return;
        }

        self.log(
            &Record::builder()
                .level(level)
                .location(Location::caller())
                .args(format_args!("{msg}"))
                .build(),
        );
    }

    /// Log `msg` at [`Level::Trace`], recording the caller's location.
    #[track_caller]
    pub fn trace(&self, msg: impl fmt::Display) {
        self.log_at(Level::Trace, &msg);
    }

    /// Log `msg` at [`Level::Debug`], recording the caller's location.
    #[track_caller]
    pub fn debug(&self, msg: impl fmt::Display) {
        self.log_at(Level::Debug, &msg);
    }

    /// Log `msg` at [`Level::Info`], recording the caller's location.
    #[track_caller]
    pub fn info(&self, msg: impl fmt::Display) {
        self.log_at(Level::Info, &msg);
    }

    /// Log `msg` at [`Level::Warn`], recording the caller's location.
    #[track_caller]
    pub fn warn(&self, msg: impl fmt::Display) {
        self.log_at(Level::Warn, &msg);
    }

    /// Log `msg` at [`Level::Error`], recording the caller's location.
    #[track_caller]
    pub fn error(&self, msg: impl fmt::Display) {
        self.log_at(Level::Error, &msg);
    }

    /// Log `msg` at [`Level::Fatal`], recording the caller's location.
    ///
    /// This only logs; the process keeps running.
    #[track_caller]
    pub fn fatal(&self, msg: impl fmt::Display) {
        self.log_at(Level::Fatal, &msg);
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Log a formatted message at the given level, recording the call site.
///
/// ```
/// use rotalog::FormatFlags;
/// use rotalog::Level;
/// use rotalog::Logger;
/// use rotalog::append::Null;
///
/// let logger = Logger::new(Null::default(), Level::Debug, FormatFlags::all());
/// rotalog::log!(logger, Level::Warn, "disk {}% full", 93);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger: &$crate::Logger = &$logger;
        let level: $crate::Level = $level;
        if logger.enabled(level) {
            logger.log(
                &$crate::Record::builder()
                    .level(level)
                    .file(::core::option::Option::Some(::core::file!()))
                    .line(::core::option::Option::Some(::core::line!()))
                    .args(::core::format_args!($($arg)+))
                    .build(),
            );
        }
    }};
}

/// Log a formatted message at [`Level::Trace`](crate::Level::Trace).
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Trace, $($arg)+) };
}

/// Log a formatted message at [`Level::Debug`](crate::Level::Debug).
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Debug, $($arg)+) };
}

/// Log a formatted message at [`Level::Info`](crate::Level::Info).
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Info, $($arg)+) };
}

/// Log a formatted message at [`Level::Warn`](crate::Level::Warn).
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Warn, $($arg)+) };
}

/// Log a formatted message at [`Level::Error`](crate::Level::Error).
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Error, $($arg)+) };
}

/// Log a formatted message at [`Level::Fatal`](crate::Level::Fatal). The process keeps running.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Fatal, $($arg)+) };
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::ErrorKind;
    use crate::append::Stream;
    use crate::trap::testing::RecordingTrap;

    #[derive(Debug, Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Counting {
        writes: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl Destination for Counting {
        fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(bytes.len())
        }

        fn close(&mut self) -> Result<(), Error> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl Destination for Broken {
        fn write(&mut self, _: &[u8]) -> Result<usize, Error> {
            Err(Error::destination_io("disk on fire"))
        }

        fn close(&mut self) -> Result<(), Error> {
            Err(Error::destination_io("still on fire"))
        }
    }

    fn buffered(level: Level, flags: FormatFlags) -> (Logger, SharedBuf) {
        let buf = SharedBuf::default();
        let logger = Logger::new(Stream::new(buf.clone()), level, flags);
        (logger, buf)
    }

    #[test]
    fn test_threshold_filtering() {
        for threshold in Level::ALL {
            let (logger, buf) = buffered(threshold, FormatFlags::LEVEL);
            for level in Level::ALL {
                logger.log(&Record::builder().level(level).args(format_args!("msg")).build());
            }

            let expected = Level::ALL
                .iter()
                .filter(|level| **level >= threshold)
                .map(|level| format!("[{level}] msg\n"))
                .collect::<String>();
            assert_eq!(buf.contents(), expected, "threshold {threshold}");
        }
    }

    #[test]
    fn test_set_level() {
        let (logger, buf) = buffered(Level::Error, FormatFlags::empty());
        logger.info("hidden");
        logger.set_level(Level::Info);
        assert_eq!(logger.level(), Level::Info);
        logger.info("shown");

        logger.set_level_by_name("WARN").unwrap();
        assert_eq!(logger.level(), Level::Warn);
        let err = logger.set_level_by_name("verbose").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(logger.level(), Level::Warn);

        logger.info("hidden again");
        assert_eq!(buf.contents(), "shown\n");
    }

    #[test]
    fn test_caller_location() {
        let (logger, buf) = buffered(Level::Trace, FormatFlags::FILE);
        let line = line!() + 1;
        logger.warn("from here");
        assert_eq!(buf.contents(), format!("[logger.rs:{line}] from here\n"));
    }

    #[test]
    fn test_macros() {
        let (logger, buf) = buffered(Level::Debug, FormatFlags::LEVEL | FormatFlags::FILE);
        let line = line!() + 1;
        crate::warn!(logger, "{} of {}", 3, 4);
        crate::trace!(&logger, "dropped");
        crate::fatal!(&logger, "keep going\n");
        assert_eq!(
            buf.contents(),
            format!(
                "[Warn  | logger.rs:{line}] 3 of 4\n[Fatal | logger.rs:{}] keep going\n",
                line + 2
            )
        );
    }

    #[test]
    fn test_timestamp_in_timezone() {
        let buf = SharedBuf::default();
        let logger = Logger::new(Stream::new(buf.clone()), Level::Info, FormatFlags::TIME)
            .with_timezone(TimeZone::fixed(jiff::tz::offset(8)));
        let now = "2024-08-11T14:44:57.172105Z".parse().unwrap();
        logger.log(&Record::builder().time(now).args(format_args!("tick")).build());
        assert_eq!(buf.contents(), "[2024/08/11 22:44:57.172] tick\n");
    }

    #[test]
    fn test_close_is_idempotent() {
        let counting = Counting::default();
        let logger = Logger::new(counting.clone(), Level::Info, FormatFlags::all());
        logger.info("before");
        logger.close();
        logger.close();
        logger.info("after");
        assert!(logger.is_closed());
        assert!(!logger.enabled(Level::Fatal));
        drop(logger);

        assert_eq!(counting.writes.load(Ordering::SeqCst), 1);
        assert_eq!(counting.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_handler() {
        let first = Counting::default();
        let second = Counting::default();
        let third = Counting::default();

        let logger = Logger::new(first.clone(), Level::Info, FormatFlags::all());
        logger.info("to first");
        logger.set_handler(second.clone());
        assert_eq!(first.closes.load(Ordering::SeqCst), 1);
        logger.info("to second");

        logger.close();
        logger.set_handler(third.clone());
        logger.info("dropped");

        assert_eq!(first.writes.load(Ordering::SeqCst), 1);
        assert_eq!(second.writes.load(Ordering::SeqCst), 1);
        assert_eq!(second.closes.load(Ordering::SeqCst), 1);
        assert_eq!(third.writes.load(Ordering::SeqCst), 0);
        assert_eq!(third.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_trapped() {
        let trap = RecordingTrap::default();
        let logger =
            Logger::new(Broken, Level::Info, FormatFlags::all()).with_trap(trap.clone());
        logger.error("lost");
        logger.close();

        let errors = trap.errors();
        assert_eq!(
            errors,
            [
                (ErrorKind::DestinationIo, "disk on fire".to_string()),
                (ErrorKind::DestinationIo, "still on fire".to_string()),
            ]
        );
    }

    #[test]
    fn test_buffers_are_reused() {
        let logger = Logger::new(crate::append::Null::default(), Level::Info, FormatFlags::all())
            .with_pool_capacity(2);
        for i in 0..10 {
            crate::info!(logger, "line {i}");
        }
        assert_eq!(logger.pool.len(), 1);
    }
}
