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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use crate::Clock;
use crate::Config;
use crate::Error;
use crate::Level;
use crate::Manager;
use crate::Stream;
use crate::config::Resources;
use crate::config::StreamConfig;
use crate::flusher::Flusher;
use crate::record::Context;
use crate::serializer::Serializer;
use crate::sink::Disk;
use crate::trap::Trap;

/// The entry point of the engine.
///
/// A logger owns a [`Manager`], the serializers and disks streams are created with, and the
/// background flusher. Entries are buffered until [`Logger::flush`], or until the flusher ticks.
///
/// # Examples
///
/// ```
/// use logrelay::Level;
/// use logrelay::Logger;
///
/// let logger = Logger::builder().build().unwrap();
/// logger.warning_signal("ops", "disk almost full", []);
/// logger.flush().unwrap();
/// logger.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Logger {
    manager: Arc<Manager>,
    serializers: Mutex<BTreeMap<String, Arc<dyn Serializer>>>,
    disks: BTreeMap<String, Arc<dyn Disk>>,
    config: Config,
    clock: Clock,
    trap: Arc<dyn Trap>,
    flusher: Mutex<Option<Flusher>>,
}

impl Logger {
    pub(super) fn new(
        manager: Arc<Manager>,
        serializers: BTreeMap<String, Arc<dyn Serializer>>,
        disks: BTreeMap<String, Arc<dyn Disk>>,
        config: Config,
        clock: Clock,
        trap: Arc<dyn Trap>,
    ) -> Self {
        Self {
            manager,
            serializers: Mutex::new(serializers),
            disks,
            config,
            clock,
            trap,
            flusher: Mutex::new(None),
        }
    }

    fn serializers(&self) -> MutexGuard<'_, BTreeMap<String, Arc<dyn Serializer>>> {
        self.serializers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flusher(&self) -> MutexGuard<'_, Option<Flusher>> {
        self.flusher.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The configuration the logger was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The manager buffering and dispatching entries.
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Enqueue an entry targeted at `channel`. See [`Manager::signal`].
    pub fn signal<'a>(
        &self,
        level: Level,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.manager.signal(level, channel, message, contexts);
    }

    /// Enqueue an entry for every stream. See [`Manager::broadcast`].
    pub fn broadcast<'a>(
        &self,
        level: Level,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.manager.broadcast(level, message, contexts);
    }

    /// Enqueue an entry at [`Level::Fatal`] targeted at `channel`.
    pub fn fatal_signal<'a>(
        &self,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.signal(Level::Fatal, channel, message, contexts);
    }

    /// Enqueue an entry at [`Level::Fatal`] for every stream.
    pub fn fatal_broadcast<'a>(
        &self,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.broadcast(Level::Fatal, message, contexts);
    }

    /// Enqueue an entry at [`Level::Error`] targeted at `channel`.
    pub fn error_signal<'a>(
        &self,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.signal(Level::Error, channel, message, contexts);
    }

    /// Enqueue an entry at [`Level::Error`] for every stream.
    pub fn error_broadcast<'a>(
        &self,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.broadcast(Level::Error, message, contexts);
    }

    /// Enqueue an entry at [`Level::Warning`] targeted at `channel`.
    pub fn warning_signal<'a>(
        &self,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.signal(Level::Warning, channel, message, contexts);
    }

    /// Enqueue an entry at [`Level::Warning`] for every stream.
    pub fn warning_broadcast<'a>(
        &self,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.broadcast(Level::Warning, message, contexts);
    }

    /// Enqueue an entry at [`Level::Notice`] targeted at `channel`.
    pub fn notice_signal<'a>(
        &self,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.signal(Level::Notice, channel, message, contexts);
    }

    /// Enqueue an entry at [`Level::Notice`] for every stream.
    pub fn notice_broadcast<'a>(
        &self,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.broadcast(Level::Notice, message, contexts);
    }

    /// Enqueue an entry at [`Level::Info`] targeted at `channel`.
    pub fn info_signal<'a>(
        &self,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.signal(Level::Info, channel, message, contexts);
    }

    /// Enqueue an entry at [`Level::Info`] for every stream.
    pub fn info_broadcast<'a>(
        &self,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.broadcast(Level::Info, message, contexts);
    }

    /// Enqueue an entry at [`Level::Debug`] targeted at `channel`.
    pub fn debug_signal<'a>(
        &self,
        channel: &str,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.signal(Level::Debug, channel, message, contexts);
    }

    /// Enqueue an entry at [`Level::Debug`] for every stream.
    pub fn debug_broadcast<'a>(
        &self,
        message: &str,
        contexts: impl IntoIterator<Item = &'a Context>,
    ) {
        self.broadcast(Level::Debug, message, contexts);
    }

    /// Dispatch every buffered entry. See [`Manager::flush`].
    pub fn flush(&self) -> Result<(), Error> {
        self.manager.flush()
    }

    /// Whether a serializer is registered under `id`.
    pub fn has_serializer(&self, id: &str) -> bool {
        self.serializers().contains_key(id)
    }

    /// The identifiers of the registered serializers, sorted.
    pub fn list_serializers(&self) -> Vec<String> {
        self.serializers().keys().cloned().collect()
    }

    /// Look up the serializer registered under `id`.
    ///
    /// # Errors
    ///
    /// Return a [`SerializerNotFound`](crate::ErrorKind::SerializerNotFound) error if no
    /// serializer is registered under `id`.
    pub fn get_serializer(&self, id: &str) -> Result<Arc<dyn Serializer>, Error> {
        self.serializers()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::serializer_not_found(id))
    }

    /// Register `serializer` under `id`.
    ///
    /// # Errors
    ///
    /// Return a [`DuplicateSerializer`](crate::ErrorKind::DuplicateSerializer) error if a
    /// serializer is already registered under `id`.
    pub fn add_serializer(
        &self,
        id: impl Into<String>,
        serializer: Arc<dyn Serializer>,
    ) -> Result<(), Error> {
        let id = id.into();
        let mut serializers = self.serializers();
        if serializers.contains_key(&id) {
            return Err(Error::duplicate_serializer(&id));
        }
        serializers.insert(id, serializer);
        Ok(())
    }

    /// Whether a stream is registered under `id`. See [`Manager::has_stream`].
    pub fn has_stream(&self, id: &str) -> bool {
        self.manager.has_stream(id)
    }

    /// The identifiers of the registered streams, sorted. See [`Manager::list_streams`].
    pub fn list_streams(&self) -> Vec<String> {
        self.manager.list_streams()
    }

    /// Look up the stream registered under `id`. See [`Manager::get_stream`].
    pub fn get_stream(&self, id: &str) -> Result<Arc<dyn Stream>, Error> {
        self.manager.get_stream(id)
    }

    /// Register `stream` under `id`. See [`Manager::add_stream`].
    pub fn add_stream(&self, id: impl Into<String>, stream: Arc<dyn Stream>) -> Result<(), Error> {
        self.manager.add_stream(id, stream)
    }

    /// Close the stream registered under `id` and unregister it. See [`Manager::remove_stream`].
    pub fn remove_stream(&self, id: &str) -> Result<(), Error> {
        self.manager.remove_stream(id)
    }

    /// Close and unregister every stream. See [`Manager::remove_all_streams`].
    pub fn remove_all_streams(&self) -> Result<(), Error> {
        self.manager.remove_all_streams()
    }

    /// Create a stream from `config`, resolving its serializer and disk against the registries
    /// and the configured defaults. The stream is not registered.
    ///
    /// # Errors
    ///
    /// Return an error if the serializer or disk is unknown, or the file cannot be opened.
    pub fn create_stream(&self, config: &StreamConfig) -> Result<Arc<dyn Stream>, Error> {
        let serializers = self.serializers();
        let resources = Resources {
            serializers: &serializers,
            disks: &self.disks,
            defaults: &self.config.defaults,
            clock: &self.clock,
        };
        let stream = config.build(resources)?;
        Ok(Arc::new(stream))
    }

    /// Create the stream configured under `id` and register it under the same id.
    ///
    /// # Errors
    ///
    /// Return a [`StreamNotFound`](crate::ErrorKind::StreamNotFound) error if no stream is
    /// configured under `id`, or the error of creating or registering it.
    pub fn boot_stream(&self, id: &str) -> Result<(), Error> {
        let config = self
            .config
            .streams
            .get(id)
            .ok_or_else(|| Error::stream_not_found(id))?;
        let stream = self.create_stream(config)?;
        self.manager.add_stream(id, stream)
    }

    /// Create and register every configured stream, in ascending order of their identifiers.
    pub fn boot_streams(&self) -> Result<(), Error> {
        for id in self.config.streams.keys() {
            self.boot_stream(id)?;
        }
        Ok(())
    }

    /// The period of the running flusher, if any.
    pub fn flush_interval(&self) -> Option<Duration> {
        self.flusher().as_ref().map(Flusher::interval)
    }

    /// Replace the flusher with one ticking every `interval`; `None` or zero stops it.
    ///
    /// # Errors
    ///
    /// Return an error if the new flusher cannot start. The previous flusher is stopped anyway.
    pub fn set_flush_interval(&self, interval: Option<Duration>) -> Result<(), Error> {
        let mut slot = self.flusher();
        if let Some(mut flusher) = slot.take() {
            if let Err(err) = flusher.close() {
                self.trap.trap(&err);
            }
        }

        if let Some(interval) = interval.filter(|d| !d.is_zero()) {
            let flusher = Flusher::start(self.manager.clone(), interval, self.trap.clone())?;
            *slot = Some(flusher);
        }
        Ok(())
    }

    /// Stop the flusher, flush the buffer, then close and unregister every stream and close every
    /// serializer.
    ///
    /// # Errors
    ///
    /// The first error aborts the shutdown and is returned.
    pub fn close(&self) -> Result<(), Error> {
        if let Some(mut flusher) = self.flusher().take() {
            flusher.close()?;
        }
        self.manager.flush()?;
        self.manager.remove_all_streams()?;
        for serializer in self.serializers().values() {
            serializer.close()?;
        }
        Ok(())
    }

    /// A [`log`] bridge enqueuing records into this logger.
    #[cfg(feature = "bridge-log")]
    pub fn log_bridge(&self) -> crate::bridge::LogBridge {
        crate::bridge::LogBridge::new(self.manager.clone(), self.trap.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::Write;
    use std::str::FromStr;

    use jiff::Zoned;
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;
    use crate::ManualClock;
    use crate::serializer::TextSerializer;
    use crate::sink::Sink;
    use crate::stream::SinkStream;

    #[derive(Debug, Clone, Default)]
    struct MemorySink {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl MemorySink {
        fn contents(&self) -> String {
            String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for MemorySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink for MemorySink {
        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // Strip the timestamp of every line.
    fn messages(sink: &MemorySink) -> Vec<String> {
        sink.contents()
            .lines()
            .map(|line| {
                assert!(line.starts_with("2024-03-01T08:00:00"), "{line}");
                line.split_once(' ').unwrap().1.to_string()
            })
            .collect()
    }

    fn clock() -> ManualClock {
        ManualClock::new(Zoned::from_str("2024-03-01T08:00:00+00:00[UTC]").unwrap())
    }

    #[test]
    fn test_level_shortcuts() {
        let sink = MemorySink::default();
        let stream = SinkStream::builder(sink.clone())
            .level(Level::Debug)
            .channel("ops")
            .build();
        let logger = Logger::builder()
            .clock(clock())
            .stream("memory", Arc::new(stream))
            .build()
            .unwrap();

        logger.fatal_signal("ops", "a", []);
        logger.error_broadcast("b", []);
        logger.warning_signal("web", "c", []);
        logger.notice_broadcast("d", []);
        logger.info_signal("ops", "e", []);
        logger.debug_broadcast("f", []);
        logger.flush().unwrap();

        assert_eq!(
            messages(&sink),
            vec!["[FATAL] a", "[ERROR] b", "[NOTICE] d", "[INFO] e", "[DEBUG] f"]
        );
    }

    #[test]
    fn test_builtin_serializers() {
        let logger = Logger::builder().build().unwrap();
        assert_eq!(logger.list_serializers(), vec!["json", "string"]);
        assert!(logger.has_serializer("json"));
        assert!(!logger.has_serializer("xml"));

        let err = logger.get_serializer("xml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializerNotFound);

        let err = logger
            .add_serializer("json", Arc::new(TextSerializer::default()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateSerializer);

        logger
            .add_serializer("plain", Arc::new(TextSerializer::default()))
            .unwrap();
        assert!(logger.get_serializer("plain").is_ok());
    }

    #[test]
    fn test_boot_configured_streams() {
        let config = Config::from_value(json!({
            "boot": true,
            "streams": {
                "out": { "driver": "console" },
                "err": { "driver": "console", "target": "stderr", "level": "error" }
            }
        }))
        .unwrap();
        let logger = Logger::builder().config(config).build().unwrap();
        assert_eq!(logger.list_streams(), vec!["err", "out"]);
        assert_eq!(logger.get_stream("err").unwrap().level(), Level::Error);
        assert_eq!(logger.get_stream("out").unwrap().level(), Level::Info);
        logger.close().unwrap();
        assert!(logger.list_streams().is_empty());
    }

    #[test]
    fn test_streams_are_booted_on_demand() {
        let config = Config::from_value(json!({
            "streams": { "out": { "driver": "console" } }
        }))
        .unwrap();
        let logger = Logger::builder().config(config).build().unwrap();
        assert!(logger.list_streams().is_empty());

        logger.boot_stream("out").unwrap();
        assert!(logger.has_stream("out"));
        let err = logger.boot_stream("out").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateStream);
        let err = logger.boot_stream("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StreamNotFound);
    }

    #[test]
    fn test_replace_flush_interval() {
        let logger = Logger::builder().build().unwrap();
        assert_eq!(logger.flush_interval(), None);

        logger
            .set_flush_interval(Some(Duration::from_secs(60)))
            .unwrap();
        assert_eq!(logger.flush_interval(), Some(Duration::from_secs(60)));

        logger
            .set_flush_interval(Some(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(logger.flush_interval(), Some(Duration::from_secs(30)));

        logger.set_flush_interval(None).unwrap();
        assert_eq!(logger.flush_interval(), None);
    }

    #[test]
    fn test_configured_flusher_starts_on_build() {
        let config = Config::from_value(json!({ "flusher": { "frequency": "1m" } })).unwrap();
        let logger = Logger::builder().config(config).build().unwrap();
        assert_eq!(logger.flush_interval(), Some(Duration::from_secs(60)));
        logger.close().unwrap();
        assert_eq!(logger.flush_interval(), None);
    }

    #[test]
    fn test_close_flushes_pending_entries() {
        let sink = MemorySink::default();
        let stream = SinkStream::builder(sink.clone()).build();
        let logger = Logger::builder()
            .clock(clock())
            .stream("memory", Arc::new(stream))
            .build()
            .unwrap();

        logger.info_broadcast("last words", []);
        logger.close().unwrap();
        assert_eq!(messages(&sink), vec!["[INFO] last words"]);
        assert_eq!(logger.manager().pending(), 0);
    }
}
