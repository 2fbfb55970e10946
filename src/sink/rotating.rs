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

use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use jiff::Zoned;
use jiff::civil::Date;

use crate::Clock;
use crate::Error;
use crate::sink::Disk;
use crate::sink::LocalDisk;
use crate::sink::Sink;

/// The placeholder in a path template replaced by the `YYYY-MM-DD` date of the file.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// A writer that switches to a new file whenever the calendar date of its clock changes.
///
/// Clones share the same underlying file, and every write checks the date and writes under one
/// lock.
///
/// # Examples
///
/// ```no_run
/// use logrelay::sink::RotatingFileWriter;
///
/// let writer = RotatingFileWriter::builder("logs/app-{date}.log")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RotatingFileWriter {
    state: Arc<Mutex<State>>,
}

impl RotatingFileWriter {
    /// Creates a new [`RotatingFileWriterBuilder`] for the given path template.
    #[must_use]
    pub fn builder(template: impl Into<String>) -> RotatingFileWriterBuilder {
        RotatingFileWriterBuilder::new(template)
    }

    /// The path of the file currently written to.
    pub fn current_path(&self) -> String {
        self.state().current.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        let now = state.clock.now();
        if state.should_rotate(&now) {
            state.rotate(&now)?;
        }
        state.file.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        let now = state.clock.now();
        if state.should_rotate(&now) {
            state.rotate(&now)?;
        }
        state.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state().file.flush()
    }
}

impl Sink for RotatingFileWriter {
    fn close(&mut self) -> io::Result<()> {
        self.state().file.close()
    }
}

/// A builder for configuring [`RotatingFileWriter`].
#[derive(Debug)]
pub struct RotatingFileWriterBuilder {
    template: String,
    disk: Arc<dyn Disk>,
    clock: Clock,
}

impl RotatingFileWriterBuilder {
    /// Creates a new [`RotatingFileWriterBuilder`].
    ///
    /// Every occurrence of `{date}` in `template` is replaced by the date of the file.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            disk: Arc::new(LocalDisk::default()),
            clock: Clock::DefaultClock,
        }
    }

    /// Sets the disk the files are opened on.
    ///
    /// Default to a [`LocalDisk`] rooted at the working directory.
    #[must_use]
    pub fn disk(mut self, disk: Arc<dyn Disk>) -> Self {
        self.disk = disk;
        self
    }

    /// Sets the clock the date is read from.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the [`RotatingFileWriter`], opening the file for the current date.
    ///
    /// # Errors
    ///
    /// Return an error if the file for the current date cannot be opened.
    pub fn build(self) -> Result<RotatingFileWriter, Error> {
        let Self {
            template,
            disk,
            clock,
        } = self;

        let now = clock.now();
        let date = now.date();
        let current = render_path(&template, date);
        let file = disk.open_append(&current).map_err(|err| {
            Error::from_io_error(err).with_context("path", current.as_str())
        })?;

        let state = State {
            template,
            disk,
            clock,
            date,
            current,
            file,
        };
        Ok(RotatingFileWriter {
            state: Arc::new(Mutex::new(state)),
        })
    }
}

#[derive(Debug)]
struct State {
    template: String,
    disk: Arc<dyn Disk>,
    clock: Clock,
    // the rotation key
    date: Date,
    current: String,
    file: Box<dyn Sink>,
}

impl State {
    fn should_rotate(&self, now: &Zoned) -> bool {
        now.date() != self.date
    }

    // The old file is only closed once the new one opened. A failed open leaves the old file
    // current and the date unchanged, so the next write retries.
    fn rotate(&mut self, now: &Zoned) -> io::Result<()> {
        let date = now.date();
        let path = render_path(&self.template, date);
        let file = self.disk.open_append(&path)?;

        let mut previous = std::mem::replace(&mut self.file, file);
        let _ = previous.close();
        self.date = date;
        self.current = path;
        Ok(())
    }
}

fn render_path(template: &str, date: Date) -> String {
    template.replace(DATE_PLACEHOLDER, &date.to_string())
}
