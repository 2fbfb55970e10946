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

//! Serializers turning log entries into bytes.

use std::fmt;

use jiff::Zoned;

use crate::Error;
use crate::Level;
use crate::record::Context;

mod json;
mod text;

pub use self::json::JsonSerializer;
pub use self::text::TextSerializer;

/// A serializer formats one log entry into the bytes a stream writes to its sink.
///
/// Serializers are shared between streams and must not keep per-entry state.
pub trait Serializer: fmt::Debug + Send + Sync + 'static {
    /// Format a log entry.
    fn serialize(
        &self,
        timestamp: &Zoned,
        level: Level,
        message: &str,
        context: &Context,
    ) -> Result<Vec<u8>, Error>;

    /// Release any resource held by the serializer.
    ///
    /// Default to a no-op.
    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

pub(crate) const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%3f%z";
