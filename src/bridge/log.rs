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

use std::sync::Arc;

use serde_json::Value;

use crate::Level;
use crate::Manager;
use crate::manager::flushing_on_current_thread;
use crate::record::Context;
use crate::trap::Trap;

/// The context key holding the target of a bridged record.
pub const TARGET_KEY: &str = "target";

/// A [`log::Log`] implementation enqueuing records into a [`Manager`].
///
/// Records are broadcast, or signaled to a channel named after their target with
/// [`LogBridge::target_as_channel`]. Key-values are copied into the context as strings, along
/// with the target under `"target"`. Records stay buffered until the manager is flushed.
///
/// Records logged while a flush runs on the same thread, for instance by a serializer or a sink,
/// are dropped.
#[derive(Debug)]
pub struct LogBridge {
    manager: Arc<Manager>,
    trap: Arc<dyn Trap>,
    target_as_channel: bool,
    max_level: log::LevelFilter,
}

impl LogBridge {
    /// Create a bridge to `manager`, reporting flush errors to `trap`.
    pub fn new(manager: Arc<Manager>, trap: Arc<dyn Trap>) -> Self {
        Self {
            manager,
            trap,
            target_as_channel: false,
            max_level: log::LevelFilter::Trace,
        }
    }

    /// Signal records to the channel named after their target instead of broadcasting them.
    pub fn target_as_channel(mut self, yes: bool) -> Self {
        self.target_as_channel = yes;
        self
    }

    /// Set the global maximum level passed to [`log::set_max_level`].
    ///
    /// Default to [`log::LevelFilter::Trace`].
    pub fn max_level(mut self, max_level: log::LevelFilter) -> Self {
        self.max_level = max_level;
        self
    }

    /// Install the bridge as the global logger of the `log` crate.
    ///
    /// # Errors
    ///
    /// Return an error if a global logger is already installed.
    pub fn apply(self) -> Result<(), log::SetLoggerError> {
        let max_level = self.max_level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) || flushing_on_current_thread() {
            return;
        }

        let mut context = Context::new();

        struct KeyValueVisitor<'a> {
            context: &'a mut Context,
        }

        impl<'kvs> log::kv::VisitSource<'kvs> for KeyValueVisitor<'_> {
            fn visit_pair(
                &mut self,
                key: log::kv::Key<'kvs>,
                value: log::kv::Value<'kvs>,
            ) -> Result<(), log::kv::Error> {
                self.context
                    .insert(key.to_string(), Value::String(value.to_string()));
                Ok(())
            }
        }

        let mut visitor = KeyValueVisitor {
            context: &mut context,
        };
        // collecting into a map never fails
        let _ = record.key_values().visit(&mut visitor);
        context.insert(
            TARGET_KEY.to_string(),
            Value::String(record.target().to_string()),
        );

        let message = record.args().to_string();
        let level = Level::from(record.level());
        if self.target_as_channel {
            self.manager
                .signal(level, record.target(), &message, [&context]);
        } else {
            self.manager.broadcast(level, &message, [&context]);
        }
    }

    fn flush(&self) {
        if flushing_on_current_thread() {
            return;
        }
        if let Err(err) = self.manager.flush() {
            self.trap.trap(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::Write;
    use std::sync::Mutex;

    use jiff::Zoned;
    use log::Log;
    use serde_json::json;

    use super::*;
    use crate::Error;
    use crate::serializer::JsonSerializer;
    use crate::serializer::Serializer;
    use crate::sink::Sink;
    use crate::stream::SinkStream;
    use crate::trap::DefaultTrap;

    #[derive(Debug, Clone, Default)]
    struct MemorySink {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl MemorySink {
        fn records(&self) -> Vec<Value> {
            let buf = self.buf.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
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

    fn setup(channels: &[&str]) -> (Arc<Manager>, MemorySink) {
        let sink = MemorySink::default();
        let stream = SinkStream::builder(sink.clone())
            .level(Level::Debug)
            .channels(channels.iter().copied())
            .serializer(Arc::new(JsonSerializer::default()))
            .build();
        let manager = Arc::new(Manager::default());
        manager.add_stream("memory", Arc::new(stream)).unwrap();
        (manager, sink)
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(Level::from(log::Level::Error), Level::Error);
        assert_eq!(Level::from(log::Level::Warn), Level::Warning);
        assert_eq!(Level::from(log::Level::Info), Level::Info);
        assert_eq!(Level::from(log::Level::Debug), Level::Debug);
        assert_eq!(Level::from(log::Level::Trace), Level::Debug);
    }

    #[test]
    fn test_records_are_buffered_then_flushed() {
        let (manager, sink) = setup(&[]);
        let bridge = LogBridge::new(manager.clone(), Arc::new(DefaultTrap::default()));

        let kvs: &[(&str, &str)] = &[("user", "alice")];
        bridge.log(
            &log::Record::builder()
                .args(format_args!("signed in"))
                .level(log::Level::Warn)
                .target("auth")
                .key_values(&kvs)
                .build(),
        );
        assert_eq!(manager.pending(), 1);
        assert!(sink.records().is_empty());

        bridge.flush();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], json!("signed in"));
        assert_eq!(records[0]["level"], json!("WARNING"));
        assert_eq!(records[0]["user"], json!("alice"));
        assert_eq!(records[0]["target"], json!("auth"));
    }

    #[test]
    fn test_target_as_channel() {
        let (manager, sink) = setup(&["auth"]);
        let bridge = LogBridge::new(manager.clone(), Arc::new(DefaultTrap::default()))
            .target_as_channel(true);

        for target in ["auth", "db"] {
            bridge.log(
                &log::Record::builder()
                    .args(format_args!("hello"))
                    .level(log::Level::Info)
                    .target(target)
                    .build(),
            );
        }
        bridge.flush();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["channel"], json!("auth"));
        assert_eq!(manager.get_stream("memory").unwrap().list_channels(), vec!["auth"]);
    }

    #[test]
    fn test_max_level_drops_records() {
        let (manager, _) = setup(&[]);
        let bridge = LogBridge::new(manager.clone(), Arc::new(DefaultTrap::default()))
            .max_level(log::LevelFilter::Info);

        bridge.log(
            &log::Record::builder()
                .args(format_args!("noisy"))
                .level(log::Level::Debug)
                .build(),
        );
        assert_eq!(manager.pending(), 0);
    }

    // Logs through a bridge to the manager it is flushed by.
    #[derive(Debug)]
    struct LoggingSerializer {
        bridge: LogBridge,
    }

    impl Serializer for LoggingSerializer {
        fn serialize(
            &self,
            timestamp: &Zoned,
            level: Level,
            message: &str,
            context: &Context,
        ) -> Result<Vec<u8>, Error> {
            self.bridge.log(
                &log::Record::builder()
                    .args(format_args!("serializing {message}"))
                    .level(log::Level::Debug)
                    .build(),
            );
            self.bridge.flush();
            JsonSerializer::default().serialize(timestamp, level, message, context)
        }
    }

    #[test]
    fn test_logging_while_flushing_is_dropped() {
        let manager = Arc::new(Manager::default());
        let sink = MemorySink::default();
        let serializer = LoggingSerializer {
            bridge: LogBridge::new(manager.clone(), Arc::new(DefaultTrap::default())),
        };
        let stream = SinkStream::builder(sink.clone())
            .serializer(Arc::new(serializer))
            .build();
        manager.add_stream("memory", Arc::new(stream)).unwrap();

        manager.broadcast(Level::Info, "hello", []);
        manager.flush().unwrap();
        assert_eq!(manager.pending(), 0);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], json!("hello"));
    }
}
