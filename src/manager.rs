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

//! Buffering of log entries and their dispatch to streams.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::Clock;
use crate::Error;
use crate::Level;
use crate::Stream;
use crate::record::Context;
use crate::record::Entry;
use crate::record::merge_contexts;

thread_local! {
    // depth of the flushes running on this thread
    static FLUSHING: Cell<usize> = const { Cell::new(0) };
}

/// Whether a [`Manager::flush`] is running on the current thread.
///
/// Enqueuing from inside a flush, such as a stream or serializer logging through a bridge, would
/// wait on the lock the flush holds.
pub(crate) fn flushing_on_current_thread() -> bool {
    FLUSHING.with(|depth| depth.get() > 0)
}

struct FlushingGuard;

impl FlushingGuard {
    fn enter() -> Self {
        FLUSHING.with(|depth| depth.set(depth.get() + 1));
        FlushingGuard
    }
}

impl Drop for FlushingGuard {
    fn drop(&mut self) {
        FLUSHING.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Buffers log entries and dispatches them to the registered streams on [`Manager::flush`].
///
/// Enqueuing never performs I/O. Every method, including `flush`, holds one exclusive lock for
/// its whole duration, so a flush never interleaves with enqueuing or with another flush.
///
/// Streams are dispatched to in ascending order of their identifiers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use logrelay::Level;
/// use logrelay::Manager;
/// use logrelay::sink::Stdout;
/// use logrelay::stream::SinkStream;
///
/// let manager = Manager::default();
/// let stream = SinkStream::builder(Stdout::default())
///     .level(Level::Warning)
///     .shared_sink()
///     .build();
/// manager.add_stream("console", Arc::new(stream)).unwrap();
///
/// manager.broadcast(Level::Error, "disk almost full", []);
/// manager.flush().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Manager {
    state: Mutex<State>,
    clock: Clock,
}

#[derive(Debug, Default)]
struct State {
    buffer: Vec<Entry>,
    streams: BTreeMap<String, Arc<dyn Stream>>,
}

impl Manager {
    /// Create a manager timestamping entries with `clock`.
    pub fn new(clock: Clock) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue an entry targeted at `channel`.
    ///
    /// `contexts` are merged from left to right into a fresh context; later keys win.
    pub fn signal<'a>(
        &self,
        level: Level,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        let context = merge_contexts(contexts);
        let entry = Entry::new(self.clock.now(), level, channel, message, context);
        self.state().buffer.push(entry);
    }

    /// Enqueue an entry for every stream, regardless of their channels.
    pub fn broadcast<'a>(
        &self,
        level: Level,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.signal(level, "", message, contexts);
    }

    /// The number of entries waiting for a flush.
    pub fn pending(&self) -> usize {
        self.state().buffer.len()
    }

    /// Dispatch every buffered entry, in enqueue order, to every stream.
    ///
    /// # Errors
    ///
    /// The first error returned by a stream aborts the flush and is returned. The buffer is only
    /// cleared once every entry was dispatched, so after an error the whole buffer is kept and
    /// the next flush dispatches it again, including to the streams that already received a
    /// part of it.
    pub fn flush(&self) -> Result<(), Error> {
        let mut state = self.state();
        let _flushing = FlushingGuard::enter();

        for entry in &state.buffer {
            for stream in state.streams.values() {
                match entry.channel() {
                    Some(channel) => stream.signal(
                        entry.timestamp(),
                        entry.level(),
                        channel,
                        entry.message(),
                        entry.context(),
                    )?,
                    None => stream.broadcast(
                        entry.timestamp(),
                        entry.level(),
                        entry.message(),
                        entry.context(),
                    )?,
                }
            }
        }

        state.buffer.clear();
        Ok(())
    }

    /// Whether a stream is registered under `id`.
    pub fn has_stream(&self, id: &str) -> bool {
        self.state().streams.contains_key(id)
    }

    /// The identifiers of the registered streams, sorted.
    pub fn list_streams(&self) -> Vec<String> {
        self.state().streams.keys().cloned().collect()
    }

    /// Look up the stream registered under `id`.
    ///
    /// # Errors
    ///
    /// Return a [`StreamNotFound`](crate::ErrorKind::StreamNotFound) error if no stream is
    /// registered under `id`.
    pub fn get_stream(&self, id: &str) -> Result<Arc<dyn Stream>, Error> {
        self.state()
            .streams
            .get(id)
            .cloned()
            .ok_or_else(|| Error::stream_not_found(id))
    }

    /// Register `stream` under `id`.
    ///
    /// # Errors
    ///
    /// Return a [`DuplicateStream`](crate::ErrorKind::DuplicateStream) error, leaving the
    /// registry untouched, if a stream is already registered under `id`.
    pub fn add_stream(&self, id: impl Into<String>, stream: Arc<dyn Stream>) -> Result<(), Error> {
        let id = id.into();
        let mut state = self.state();
        if state.streams.contains_key(&id) {
            return Err(Error::duplicate_stream(&id));
        }
        state.streams.insert(id, stream);
        Ok(())
    }

    /// Close the stream registered under `id` and unregister it.
    ///
    /// # Errors
    ///
    /// Return a [`StreamNotFound`](crate::ErrorKind::StreamNotFound) error if no stream is
    /// registered under `id`, or the error of closing the stream, in which case it stays
    /// registered.
    pub fn remove_stream(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state();
        let stream = state
            .streams
            .get(id)
            .ok_or_else(|| Error::stream_not_found(id))?;
        stream.close()?;
        state.streams.remove(id);
        Ok(())
    }

    /// Close and unregister every stream, in ascending order of their identifiers.
    ///
    /// # Errors
    ///
    /// The first close error aborts and is returned. Streams closed before it are unregistered;
    /// the failing stream and the ones after it stay registered.
    pub fn remove_all_streams(&self) -> Result<(), Error> {
        let mut state = self.state();
        while let Some(entry) = state.streams.first_entry() {
            entry.get().close()?;
            entry.remove();
        }
        Ok(())
    }
}
