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

//! Output streams filtering entries by level and channel.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use jiff::Zoned;
use serde_json::Value;

use crate::Error;
use crate::Level;
use crate::record::CHANNEL_KEY;
use crate::record::Context;
use crate::serializer::Serializer;
use crate::serializer::TextSerializer;
use crate::sink::Sink;

/// The channel that makes a stream accept every channel.
pub const WILDCARD_CHANNEL: &str = "*";

/// A destination of log entries that the [`Manager`](crate::Manager) dispatches to.
///
/// A stream keeps a severity threshold and a channel allow-list, and decides on its own whether
/// an entry is emitted.
pub trait Stream: fmt::Debug + Send + Sync + 'static {
    /// The severity threshold.
    fn level(&self) -> Level;

    /// Replace the severity threshold.
    fn set_level(&self, level: Level);

    /// Whether `channel` is in the allow-list, compared literally.
    fn has_channel(&self, channel: &str) -> bool;

    /// The sorted allow-list.
    fn list_channels(&self) -> Vec<String>;

    /// Add `channel` to the allow-list. Adding a present channel does nothing.
    fn add_channel(&self, channel: &str);

    /// Remove `channel` from the allow-list. Removing an absent channel does nothing.
    fn remove_channel(&self, channel: &str);

    /// Empty the allow-list.
    fn remove_all_channels(&self);

    /// Emit an entry targeted at `channel`.
    ///
    /// Entries for channels the stream does not accept are dropped without error.
    fn signal(
        &self,
        timestamp: &Zoned,
        level: Level,
        channel: &str,
        message: &str,
        context: &Context,
    ) -> Result<(), Error>;

    /// Emit an entry regardless of the allow-list.
    ///
    /// Entries more verbose than the threshold are dropped without error.
    fn broadcast(
        &self,
        timestamp: &Zoned,
        level: Level,
        message: &str,
        context: &Context,
    ) -> Result<(), Error>;

    /// Release the sink of the stream if the stream owns it.
    fn close(&self) -> Result<(), Error>;
}

#[derive(Debug)]
struct Filter {
    level: Level,
    // always sorted and deduplicated
    channels: Vec<String>,
}

impl Filter {
    fn accepts_channel(&self, channel: &str) -> bool {
        self.find(WILDCARD_CHANNEL).is_ok() || self.find(channel).is_ok()
    }

    fn find(&self, channel: &str) -> Result<usize, usize> {
        self.channels
            .binary_search_by(|c| c.as_str().cmp(channel))
    }
}

/// A [`Stream`] serializing entries and writing them to a [`Sink`].
///
/// # Examples
///
/// ```
/// use logrelay::Level;
/// use logrelay::Stream;
/// use logrelay::sink::Stdout;
/// use logrelay::stream::SinkStream;
///
/// let stream = SinkStream::builder(Stdout::default())
///     .level(Level::Warning)
///     .channel("ops")
///     .shared_sink()
///     .build();
/// assert!(stream.has_channel("ops"));
/// ```
#[derive(Debug)]
pub struct SinkStream {
    filter: Mutex<Filter>,
    serializer: Arc<dyn Serializer>,
    sink: Mutex<Box<dyn Sink>>,
    owns_sink: bool,
}

impl SinkStream {
    /// Create a new [`SinkStreamBuilder`] writing to `sink`.
    #[must_use]
    pub fn builder(sink: impl Into<Box<dyn Sink>>) -> SinkStreamBuilder {
        SinkStreamBuilder::new(sink)
    }

    /// Whether closing the stream closes its sink.
    pub fn owns_sink(&self) -> bool {
        self.owns_sink
    }

    fn filter(&self) -> MutexGuard<'_, Filter> {
        self.filter.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sink(&self) -> MutexGuard<'_, Box<dyn Sink>> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Stream for SinkStream {
    fn level(&self) -> Level {
        self.filter().level
    }

    fn set_level(&self, level: Level) {
        self.filter().level = level;
    }

    fn has_channel(&self, channel: &str) -> bool {
        self.filter().find(channel).is_ok()
    }

    fn list_channels(&self) -> Vec<String> {
        self.filter().channels.clone()
    }

    fn add_channel(&self, channel: &str) {
        let mut filter = self.filter();
        if let Err(pos) = filter.find(channel) {
            filter.channels.insert(pos, channel.to_string());
        }
    }

    fn remove_channel(&self, channel: &str) {
        let mut filter = self.filter();
        if let Ok(pos) = filter.find(channel) {
            filter.channels.remove(pos);
        }
    }

    fn remove_all_channels(&self) {
        self.filter().channels.clear();
    }

    fn signal(
        &self,
        timestamp: &Zoned,
        level: Level,
        channel: &str,
        message: &str,
        context: &Context,
    ) -> Result<(), Error> {
        if !self.filter().accepts_channel(channel) {
            return Ok(());
        }

        let mut context = context.clone();
        context.insert(CHANNEL_KEY.to_string(), Value::from(channel));
        self.broadcast(timestamp, level, message, &context)
    }

    fn broadcast(
        &self,
        timestamp: &Zoned,
        level: Level,
        message: &str,
        context: &Context,
    ) -> Result<(), Error> {
        if !self.level().accepts(level) {
            return Ok(());
        }

        let bytes = self
            .serializer
            .serialize(timestamp, level, message, context)?;
        self.sink()
            .write_all(&bytes)
            .map_err(Error::from_io_error)
    }

    fn close(&self) -> Result<(), Error> {
        if !self.owns_sink {
            return Ok(());
        }
        self.sink().close().map_err(Error::from_io_error)
    }
}

/// A builder to configure and create a [`SinkStream`].
#[derive(Debug)]
pub struct SinkStreamBuilder {
    level: Level,
    channels: Vec<String>,
    serializer: Arc<dyn Serializer>,
    sink: Box<dyn Sink>,
    owns_sink: bool,
}

impl SinkStreamBuilder {
    /// Create a new stream builder writing to `sink`.
    #[must_use]
    pub fn new(sink: impl Into<Box<dyn Sink>>) -> Self {
        Self {
            level: Level::Info,
            channels: vec![],
            serializer: Arc::new(TextSerializer::default()),
            sink: sink.into(),
            owns_sink: true,
        }
    }

    /// Set the severity threshold.
    ///
    /// Default to [`Level::Info`].
    #[must_use]
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Add a channel to the allow-list.
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    /// Add channels to the allow-list.
    #[must_use]
    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.extend(channels.into_iter().map(Into::into));
        self
    }

    /// Set the serializer.
    ///
    /// Default to [`TextSerializer`].
    #[must_use]
    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Mark the sink as shared, so that closing the stream leaves it open.
    ///
    /// By default the stream owns its sink.
    #[must_use]
    pub fn shared_sink(mut self) -> Self {
        self.owns_sink = false;
        self
    }

    /// Build the [`SinkStream`].
    pub fn build(self) -> SinkStream {
        let Self {
            level,
            mut channels,
            serializer,
            sink,
            owns_sink,
        } = self;

        channels.sort();
        channels.dedup();

        SinkStream {
            filter: Mutex::new(Filter { level, channels }),
            serializer,
            sink: Mutex::new(sink),
            owns_sink,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::str::FromStr;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::serializer::JsonSerializer;

    #[derive(Debug, Clone, Default)]
    struct MemorySink {
        written: Arc<Mutex<Vec<u8>>>,
        closed: Arc<Mutex<bool>>,
        fail_write: bool,
    }

    impl MemorySink {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.written.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn is_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }
    }

    impl Write for MemorySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_write {
                return Err(io::Error::other("write failed"));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink for MemorySink {
        fn close(&mut self) -> io::Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn now() -> Zoned {
        Zoned::from_str("2024-08-10T12:00:00[UTC]").unwrap()
    }

    fn json_stream(sink: &MemorySink, level: Level, channels: &[&str]) -> SinkStream {
        SinkStream::builder(sink.clone())
            .level(level)
            .channels(channels.iter().copied())
            .serializer(Arc::new(JsonSerializer::default()))
            .build()
    }

    #[test]
    fn test_channels_stay_sorted_and_unique() {
        let stream = json_stream(&MemorySink::default(), Level::Debug, &["b", "a", "b"]);
        assert_eq!(stream.list_channels(), vec!["a", "b"]);

        stream.add_channel("c");
        stream.add_channel("0");
        stream.add_channel("a");
        assert_eq!(stream.list_channels(), vec!["0", "a", "b", "c"]);

        stream.remove_channel("b");
        stream.remove_channel("missing");
        assert_eq!(stream.list_channels(), vec!["0", "a", "c"]);

        stream.remove_all_channels();
        assert!(stream.list_channels().is_empty());
    }

    #[test]
    fn test_signal_filters_by_channel() {
        let sink = MemorySink::default();
        let stream = json_stream(&sink, Level::Debug, &["ops"]);

        stream
            .signal(&now(), Level::Info, "other", "dropped", &Context::new())
            .unwrap();
        stream
            .signal(&now(), Level::Info, "ops", "kept", &Context::new())
            .unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        let value: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["message"], json!("kept"));
        assert_eq!(value["channel"], json!("ops"));
    }

    #[test]
    fn test_signal_does_not_touch_caller_context() {
        let sink = MemorySink::default();
        let stream = json_stream(&sink, Level::Debug, &["*"]);
        let context = Context::new();

        stream
            .signal(&now(), Level::Info, "ops", "kept", &context)
            .unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn test_wildcard_accepts_every_channel() {
        let sink = MemorySink::default();
        let stream = json_stream(&sink, Level::Debug, &["ops", "*"]);
        assert!(stream.has_channel("*"));
        assert!(!stream.has_channel("billing"));

        stream
            .signal(&now(), Level::Info, "billing", "kept", &Context::new())
            .unwrap();
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn test_broadcast_filters_by_level() {
        let sink = MemorySink::default();
        let stream = json_stream(&sink, Level::Notice, &[]);

        for (level, message) in [(Level::Info, "a"), (Level::Notice, "b"), (Level::Fatal, "c")] {
            stream
                .broadcast(&now(), level, message, &Context::new())
                .unwrap();
        }

        let messages = sink
            .lines()
            .iter()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["message"].clone())
            .collect::<Vec<_>>();
        assert_eq!(messages, vec![json!("b"), json!("c")]);
    }

    #[test]
    fn test_none_threshold_disables_stream() {
        let sink = MemorySink::default();
        let stream = json_stream(&sink, Level::Debug, &["*"]);
        stream.set_level(Level::None);
        assert_eq!(stream.level(), Level::None);

        stream
            .broadcast(&now(), Level::Fatal, "dropped", &Context::new())
            .unwrap();
        stream
            .signal(&now(), Level::Fatal, "ops", "dropped", &Context::new())
            .unwrap();
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_write_error_is_returned() {
        let sink = MemorySink {
            fail_write: true,
            ..Default::default()
        };
        let stream = json_stream(&sink, Level::Debug, &[]);

        let err = stream
            .broadcast(&now(), Level::Info, "lost", &Context::new())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }

    #[test]
    fn test_close_respects_sink_ownership() {
        let owned = MemorySink::default();
        json_stream(&owned, Level::Debug, &[]).close().unwrap();
        assert!(owned.is_closed());

        let shared = MemorySink::default();
        let stream = SinkStream::builder(shared.clone()).shared_sink().build();
        assert!(!stream.owns_sink());
        stream.close().unwrap();
        assert!(!shared.is_closed());
    }

    proptest! {
        #[test]
        fn test_channel_match_ignores_insertion_order(
            mut channels in proptest::collection::vec("[a-c*]{1,2}", 0..6),
            query in "[a-c]{1,2}",
        ) {
            let forward = json_stream(&MemorySink::default(), Level::Debug, &[]);
            for c in &channels {
                forward.add_channel(c);
            }
            channels.reverse();
            let backward = json_stream(&MemorySink::default(), Level::Debug, &[]);
            for c in &channels {
                backward.add_channel(c);
            }

            let expected = channels.iter().any(|c| c == "*" || *c == query);
            prop_assert_eq!(forward.filter().accepts_channel(&query), expected);
            prop_assert_eq!(backward.filter().accepts_channel(&query), expected);
            prop_assert_eq!(forward.list_channels(), backward.list_channels());
        }

        #[test]
        fn test_add_then_remove_restores_channels(
            channels in proptest::collection::btree_set("[a-z]{1,4}", 0..6),
            extra in "[a-z]{1,4}",
        ) {
            prop_assume!(!channels.contains(&extra));
            let stream = json_stream(&MemorySink::default(), Level::Debug, &[]);
            for c in &channels {
                stream.add_channel(c);
            }
            let before = stream.list_channels();

            stream.add_channel(&extra);
            stream.remove_channel(&extra);
            prop_assert_eq!(stream.list_channels(), before);
        }
    }
}
