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

//! Configuration documents for serializers, streams and the flusher.
//!
//! # Examples
//!
//! ```
//! use logrelay::config::Config;
//!
//! let config = Config::from_json_str(
//!     r#"{
//!         "defaults": { "level": "notice", "serializer": "json" },
//!         "boot": true,
//!         "flusher": { "frequency": "500ms" },
//!         "streams": {
//!             "console": { "driver": "console", "channels": ["*"] },
//!             "daily": { "driver": "rotating-file", "path": "logs/app-{date}.log" }
//!         }
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(config.streams.len(), 2);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use jiff::SignedDuration;
use serde::Deserialize;
use serde::Deserializer;
use serde_json::Value;

use crate::Clock;
use crate::Error;
use crate::ErrorKind;
use crate::Level;
use crate::serializer::JsonSerializer;
use crate::serializer::Serializer;
use crate::serializer::TextSerializer;
use crate::sink::Disk;
use crate::sink::RotatingFileWriter;
use crate::sink::Sink;
use crate::sink::Stderr;
use crate::sink::Stdout;
use crate::stream::SinkStream;

/// The id of the text serializer registered by default.
pub const TEXT_SERIALIZER: &str = "string";
/// The id of the JSON serializer registered by default.
pub const JSON_SERIALIZER: &str = "json";
/// The id of the local disk registered by default.
pub const DEFAULT_DISK: &str = "default";

/// The whole configuration of a [`Logger`](crate::Logger).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Values used when a stream does not set its own.
    pub defaults: Defaults,
    /// Whether every configured stream is created and registered when the logger is built.
    pub boot: bool,
    /// The periodic flush.
    pub flusher: FlusherConfig,
    /// Serializers by id.
    pub serializers: BTreeMap<String, SerializerConfig>,
    /// Streams by id.
    pub streams: BTreeMap<String, StreamConfig>,
}

impl Config {
    /// Parse a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Return a [`ConfigInvalid`](ErrorKind::ConfigInvalid) error if the document does not
    /// describe a configuration.
    pub fn from_json_str(s: &str) -> Result<Config, Error> {
        serde_json::from_str(s).map_err(config_invalid)
    }

    /// Read a configuration out of a JSON value.
    ///
    /// # Errors
    ///
    /// Return a [`ConfigInvalid`](ErrorKind::ConfigInvalid) error if the value does not
    /// describe a configuration.
    pub fn from_value(value: Value) -> Result<Config, Error> {
        serde_json::from_value(value).map_err(config_invalid)
    }
}

fn config_invalid(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::ConfigInvalid, "invalid log configuration").with_source(err)
}

/// Values used when a stream does not set its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// The threshold of streams, parsed with [`Level::parse`].
    #[serde(deserialize_with = "deserialize_default_level")]
    pub level: Level,
    /// The id of the serializer of streams.
    pub serializer: String,
    /// The id of the disk of file streams.
    pub disk: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            level: Level::Info,
            serializer: TEXT_SERIALIZER.to_string(),
            disk: DEFAULT_DISK.to_string(),
        }
    }
}

fn deserialize_default_level<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Level::parse(&value, Some(Level::Info)))
}

/// The periodic flush.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FlusherConfig {
    /// The period between two flushes, such as `"1s"` or `"PT0.5S"`.
    ///
    /// Absent, zero or negative disables the flusher.
    pub frequency: Option<SignedDuration>,
}

impl FlusherConfig {
    /// The period as a positive [`Duration`], if the flusher is enabled.
    pub fn interval(&self) -> Option<Duration> {
        self.frequency
            .and_then(|d| Duration::try_from(d).ok())
            .filter(|d| !d.is_zero())
    }
}

/// The kinds of serializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "driver")]
pub enum SerializerConfig {
    /// A [`TextSerializer`].
    #[serde(rename = "string")]
    Text,
    /// A [`JsonSerializer`].
    #[serde(rename = "json")]
    Json,
}

impl SerializerConfig {
    /// Create the serializer.
    pub fn build(&self) -> Arc<dyn Serializer> {
        match self {
            SerializerConfig::Text => Arc::new(TextSerializer::default()),
            SerializerConfig::Json => Arc::new(JsonSerializer::default()),
        }
    }
}

/// The kinds of streams.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "driver", rename_all = "kebab-case")]
pub enum StreamConfig {
    /// A stream printing to the console, which it never closes.
    Console(ConsoleStreamConfig),
    /// A stream appending to one file.
    File(FileStreamConfig),
    /// A stream appending to a file switched every day.
    RotatingFile(FileStreamConfig),
}

/// Which console output a console stream prints to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    /// The standard output.
    #[default]
    Stdout,
    /// The standard error.
    Stderr,
}

/// The settings of a console stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleStreamConfig {
    /// The threshold, parsed with [`Level::parse`]. Default to [`Defaults::level`].
    pub level: Option<Value>,
    /// The serializer id. Default to [`Defaults::serializer`].
    pub serializer: Option<String>,
    /// The channel allow-list; entries that are not strings are ignored.
    pub channels: Vec<Value>,
    /// The console output.
    pub target: ConsoleTarget,
}

/// The settings of a file or rotating file stream.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStreamConfig {
    /// The file path on the disk; for rotating files, a template where `{date}` is replaced by
    /// the date of the file.
    pub path: String,
    /// The disk id. Default to [`Defaults::disk`].
    #[serde(default)]
    pub disk: Option<String>,
    /// The threshold, parsed with [`Level::parse`]. Default to [`Defaults::level`].
    #[serde(default)]
    pub level: Option<Value>,
    /// The serializer id. Default to [`Defaults::serializer`].
    #[serde(default)]
    pub serializer: Option<String>,
    /// The channel allow-list; entries that are not strings are ignored.
    #[serde(default)]
    pub channels: Vec<Value>,
}

/// What streams are built from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Resources<'a> {
    pub(crate) serializers: &'a BTreeMap<String, Arc<dyn Serializer>>,
    pub(crate) disks: &'a BTreeMap<String, Arc<dyn Disk>>,
    pub(crate) defaults: &'a Defaults,
    pub(crate) clock: &'a Clock,
}

impl Resources<'_> {
    fn level(&self, value: Option<&Value>) -> Level {
        match value {
            Some(value) => Level::parse(value, Some(self.defaults.level)),
            None => self.defaults.level,
        }
    }

    fn serializer(&self, id: Option<&str>) -> Result<Arc<dyn Serializer>, Error> {
        let id = id.unwrap_or(&self.defaults.serializer);
        self.serializers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::serializer_not_found(id))
    }

    fn disk(&self, id: Option<&str>) -> Result<Arc<dyn Disk>, Error> {
        let id = id.unwrap_or(&self.defaults.disk);
        self.disks
            .get(id)
            .cloned()
            .ok_or_else(|| Error::disk_not_found(id))
    }
}

fn channels(values: &[Value]) -> impl Iterator<Item = &str> {
    values.iter().filter_map(Value::as_str)
}

impl StreamConfig {
    /// Create the stream, resolving its serializer and disk.
    pub(crate) fn build(&self, resources: Resources<'_>) -> Result<SinkStream, Error> {
        match self {
            StreamConfig::Console(config) => {
                let sink: Box<dyn Sink> = match config.target {
                    ConsoleTarget::Stdout => Box::new(Stdout::default()),
                    ConsoleTarget::Stderr => Box::new(Stderr::default()),
                };
                let stream = SinkStream::builder(sink)
                    .level(resources.level(config.level.as_ref()))
                    .serializer(resources.serializer(config.serializer.as_deref())?)
                    .channels(channels(&config.channels))
                    .shared_sink()
                    .build();
                Ok(stream)
            }
            StreamConfig::File(config) => {
                let serializer = resources.serializer(config.serializer.as_deref())?;
                let disk = resources.disk(config.disk.as_deref())?;
                let file = disk.open_append(&config.path).map_err(|err| {
                    Error::from_io_error(err).with_context("path", config.path.as_str())
                })?;
                let stream = SinkStream::builder(file)
                    .level(resources.level(config.level.as_ref()))
                    .serializer(serializer)
                    .channels(channels(&config.channels))
                    .build();
                Ok(stream)
            }
            StreamConfig::RotatingFile(config) => {
                let serializer = resources.serializer(config.serializer.as_deref())?;
                let disk = resources.disk(config.disk.as_deref())?;
                let writer = RotatingFileWriter::builder(config.path.as_str())
                    .disk(disk)
                    .clock(resources.clock.clone())
                    .build()?;
                let stream = SinkStream::builder(writer)
                    .level(resources.level(config.level.as_ref()))
                    .serializer(serializer)
                    .channels(channels(&config.channels))
                    .build();
                Ok(stream)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Stream;
    use crate::sink::LocalDisk;

    #[test]
    fn test_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.defaults.level, Level::Info);
        assert_eq!(config.defaults.serializer, TEXT_SERIALIZER);
        assert_eq!(config.defaults.disk, DEFAULT_DISK);
        assert!(!config.boot);
        assert_eq!(config.flusher.interval(), None);
    }

    #[test]
    fn test_parse_full_document() {
        let config = Config::from_value(json!({
            "defaults": { "level": 3, "serializer": "json", "disk": "logs" },
            "boot": true,
            "flusher": { "frequency": "250ms" },
            "serializers": { "plain": { "driver": "string" } },
            "streams": {
                "console": { "driver": "console", "target": "stderr", "channels": ["ops", 1] },
                "file": { "driver": "file", "path": "app.log", "level": "debug" },
                "daily": { "driver": "rotating-file", "path": "app-{date}.log" }
            }
        }))
        .unwrap();

        assert_eq!(config.defaults.level, Level::Warning);
        assert!(config.boot);
        assert_eq!(config.flusher.interval(), Some(Duration::from_millis(250)));
        assert_eq!(config.serializers["plain"], SerializerConfig::Text);
        assert!(matches!(
            &config.streams["console"],
            StreamConfig::Console(c) if c.target == ConsoleTarget::Stderr
        ));
        assert!(matches!(&config.streams["file"], StreamConfig::File(c) if c.path == "app.log"));
        assert!(matches!(
            &config.streams["daily"],
            StreamConfig::RotatingFile(c) if c.path == "app-{date}.log"
        ));
    }

    #[test]
    fn test_unrecognized_default_level_falls_back_to_info() {
        let config = Config::from_value(json!({ "defaults": { "level": "loud" } })).unwrap();
        assert_eq!(config.defaults.level, Level::Info);
    }

    #[test]
    fn test_rejects_unknown_driver_and_missing_path() {
        let err = Config::from_value(json!({ "streams": { "s": { "driver": "syslog" } } }))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = Config::from_value(json!({ "streams": { "s": { "driver": "file" } } }))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_build_console_stream() {
        let serializers = BTreeMap::from([(
            TEXT_SERIALIZER.to_string(),
            SerializerConfig::Text.build(),
        )]);
        let disks = BTreeMap::new();
        let defaults = Defaults::default();
        let clock = Clock::default();
        let resources = Resources {
            serializers: &serializers,
            disks: &disks,
            defaults: &defaults,
            clock: &clock,
        };

        let config: StreamConfig = serde_json::from_value(json!({
            "driver": "console",
            "level": "error",
            "channels": ["b", "a", null]
        }))
        .unwrap();
        let stream = config.build(resources).unwrap();
        assert_eq!(stream.level(), Level::Error);
        assert_eq!(stream.list_channels(), vec!["a", "b"]);
        assert!(!stream.owns_sink());

        let config: StreamConfig = serde_json::from_value(json!({
            "driver": "console",
            "level": "unknown",
            "serializer": "json"
        }))
        .unwrap();
        let err = config.build(resources).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializerNotFound);
    }

    #[test]
    fn test_build_file_stream_requires_known_disk() {
        let serializers = BTreeMap::from([(
            TEXT_SERIALIZER.to_string(),
            SerializerConfig::Text.build(),
        )]);
        let disks: BTreeMap<String, Arc<dyn Disk>> = BTreeMap::from([(
            "other".to_string(),
            Arc::new(LocalDisk::default()) as Arc<dyn Disk>,
        )]);
        let defaults = Defaults::default();
        let clock = Clock::default();
        let resources = Resources {
            serializers: &serializers,
            disks: &disks,
            defaults: &defaults,
            clock: &clock,
        };

        let config: StreamConfig =
            serde_json::from_value(json!({ "driver": "file", "path": "app.log" })).unwrap();
        let err = config.build(resources).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiskNotFound);
    }
}
