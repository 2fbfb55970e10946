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

//! Buffered log entries and their context.

use jiff::Zoned;
use serde_json::Map;
use serde_json::Value;

use crate::Level;

/// Arbitrary key-values attached to a log entry.
pub type Context = Map<String, Value>;

/// The context key a stream stores the channel of a targeted entry under.
pub const CHANNEL_KEY: &str = "channel";

/// Merge `contexts` into a fresh [`Context`], from left to right.
///
/// Later contexts overwrite the keys of earlier ones.
pub fn merge_contexts<'a>(contexts: impl IntoIterator<Item = &'a Context>) -> Context {
    let mut merged = Context::new();
    for ctx in contexts {
        for (k, v) in ctx {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

/// One buffered log record.
#[derive(Clone, Debug)]
pub struct Entry {
    // observed at enqueue time
    timestamp: Zoned,
    level: Level,
    // empty for broadcast entries
    channel: String,
    message: String,
    context: Context,
}

impl Entry {
    /// Create an entry targeted at `channel`.
    ///
    /// An empty channel makes a broadcast entry.
    pub fn new(
        timestamp: Zoned,
        level: Level,
        channel: impl Into<String>,
        message: impl Into<String>,
        context: Context,
    ) -> Self {
        Self {
            timestamp,
            level,
            channel: channel.into(),
            message: message.into(),
            context,
        }
    }

    /// The time the entry was enqueued.
    pub fn timestamp(&self) -> &Zoned {
        &self.timestamp
    }

    /// The severity of the entry.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The targeted channel, or `None` for a broadcast entry.
    pub fn channel(&self) -> Option<&str> {
        if self.channel.is_empty() {
            None
        } else {
            Some(&self.channel)
        }
    }

    /// The message body.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The key-values of the entry.
    pub fn context(&self) -> &Context {
        &self.context
    }
}
