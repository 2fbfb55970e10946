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

use super::Logger;
use crate::Clock;
use crate::Config;
use crate::Error;
use crate::Manager;
use crate::Stream;
use crate::config::DEFAULT_DISK;
use crate::config::JSON_SERIALIZER;
use crate::config::SerializerConfig;
use crate::config::TEXT_SERIALIZER;
use crate::serializer::Serializer;
use crate::sink::Disk;
use crate::sink::LocalDisk;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// A builder to configure and create a [`Logger`].
///
/// The serializers `"string"` and `"json"` and a local disk `"default"` rooted at the working
/// directory are always registered; configured and explicitly added ones come on top and replace
/// them on a clash.
#[must_use = "call `build` to create the logger"]
#[derive(Debug, Default)]
pub struct Builder {
    config: Config,
    clock: Clock,
    trap: Option<Arc<dyn Trap>>,
    serializers: BTreeMap<String, Arc<dyn Serializer>>,
    disks: BTreeMap<String, Arc<dyn Disk>>,
    streams: Vec<(String, Arc<dyn Stream>)>,
}

impl Builder {
    /// Create a builder with an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the clock timestamping entries and driving file rotation.
    pub fn clock(mut self, clock: impl Into<Clock>) -> Self {
        self.clock = clock.into();
        self
    }

    /// Set the trap receiving errors of the background flusher.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Trap) -> Self {
        self.trap = Some(Arc::new(trap));
        self
    }

    /// Register a serializer under `id`.
    pub fn serializer(mut self, id: impl Into<String>, serializer: Arc<dyn Serializer>) -> Self {
        self.serializers.insert(id.into(), serializer);
        self
    }

    /// Register a disk under `id`.
    pub fn disk(mut self, id: impl Into<String>, disk: Arc<dyn Disk>) -> Self {
        self.disks.insert(id.into(), disk);
        self
    }

    /// Register a stream under `id` when the logger is built.
    pub fn stream(mut self, id: impl Into<String>, stream: Arc<dyn Stream>) -> Self {
        self.streams.push((id.into(), stream));
        self
    }

    /// Create the logger.
    ///
    /// When the configuration sets `boot`, every configured stream is created and registered. The
    /// flusher starts if a frequency is configured.
    ///
    /// # Errors
    ///
    /// Return an error if a stream cannot be created or registered, or the flusher cannot start.
    pub fn build(self) -> Result<Logger, Error> {
        let Builder {
            config,
            clock,
            trap,
            serializers: extra_serializers,
            disks: extra_disks,
            streams,
        } = self;

        let mut serializers = BTreeMap::new();
        serializers.insert(
            TEXT_SERIALIZER.to_string(),
            SerializerConfig::Text.build(),
        );
        serializers.insert(
            JSON_SERIALIZER.to_string(),
            SerializerConfig::Json.build(),
        );
        for (id, serializer) in &config.serializers {
            serializers.insert(id.clone(), serializer.build());
        }
        serializers.extend(extra_serializers);

        let mut disks: BTreeMap<String, Arc<dyn Disk>> = BTreeMap::new();
        disks.insert(DEFAULT_DISK.to_string(), Arc::new(LocalDisk::default()));
        disks.extend(extra_disks);

        let trap = trap.unwrap_or_else(|| Arc::new(DefaultTrap::default()));
        let manager = Arc::new(Manager::new(clock.clone()));
        for (id, stream) in streams {
            manager.add_stream(id, stream)?;
        }

        let logger = Logger::new(manager, serializers, disks, config, clock, trap);
        if logger.config().boot {
            logger.boot_streams()?;
        }
        if let Some(interval) = logger.config().flusher.interval() {
            logger.set_flush_interval(Some(interval))?;
        }
        Ok(logger)
    }
}

impl Logger {
    /// Create a [`Builder`].
    pub fn builder() -> Builder {
        Builder::new()
    }
}

