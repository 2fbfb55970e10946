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

//! A buffered log distribution engine.
//!
//! Entries are enqueued on a [`Manager`] with a [`Level`], an optional channel, a message and a
//! context, and stay buffered until the next flush. A flush hands every entry, in enqueue order,
//! to every registered [`Stream`]; each stream filters by its severity threshold and channel
//! allow-list, serializes what it accepts and writes it to its sink (the console, a file or a
//! [`RotatingFileWriter`](sink::RotatingFileWriter) switching files every day).
//!
//! The [`Logger`] facade builds streams from a [`Config`], keeps the serializer and disk
//! registries, and runs a background [`Flusher`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use logrelay::Level;
//! use logrelay::Logger;
//! use logrelay::sink::Stdout;
//! use logrelay::stream::SinkStream;
//!
//! let stream = SinkStream::builder(Stdout::default())
//!     .level(Level::Notice)
//!     .channel("ops")
//!     .shared_sink()
//!     .build();
//!
//! let logger = Logger::builder()
//!     .stream("console", Arc::new(stream))
//!     .build()
//!     .unwrap();
//!
//! logger.warning_signal("ops", "disk almost full", []);
//! logger.info_broadcast("filtered out by the threshold", []);
//! logger.flush().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod clock;
mod error;
mod level;
mod manager;

pub mod config;
pub mod flusher;
pub mod logger;
pub mod record;
pub mod serializer;
pub mod sink;
pub mod stream;
pub mod trap;

#[cfg(feature = "bridge-log")]
pub mod bridge;

pub use self::clock::Clock;
pub use self::clock::ManualClock;
pub use self::config::Config;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::flusher::Flusher;
pub use self::level::Level;
pub use self::level::ParseLevelError;
pub use self::logger::Builder;
pub use self::logger::Logger;
pub use self::manager::Manager;
pub use self::stream::Stream;
