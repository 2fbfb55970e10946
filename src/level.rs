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

//! Log severity levels.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// An enum representing the available severity levels, ordered from the least to the most
/// verbose.
///
/// [`Level::None`] is a sentinel: no entry qualifies for it, and a stream whose threshold is
/// `None` emits nothing.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub enum Level {
    /// The "none" level.
    #[default]
    None = 0,
    /// The "fatal" level.
    ///
    /// Designates failures the process cannot recover from.
    Fatal = 1,
    /// The "error" level.
    ///
    /// Designates very serious errors.
    Error = 2,
    /// The "warning" level.
    ///
    /// Designates hazardous situations.
    Warning = 3,
    /// The "notice" level.
    ///
    /// Designates normal but significant conditions.
    Notice = 4,
    /// The "info" level.
    ///
    /// Designates useful information.
    Info = 5,
    /// The "debug" level.
    ///
    /// Designates lower priority information.
    Debug = 6,
}

const LEVELS: [Level; 7] = [
    Level::None,
    Level::Fatal,
    Level::Error,
    Level::Warning,
    Level::Notice,
    Level::Info,
    Level::Debug,
];

impl Level {
    /// Every level, from the least to the most verbose.
    pub fn iter() -> impl Iterator<Item = Level> {
        LEVELS.into_iter()
    }

    /// The lower-case name of the level.
    pub const fn name(&self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Notice => "notice",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    /// The upper-case name of the level, as printed by the serializers.
    pub const fn label(&self) -> &'static str {
        match self {
            Level::None => "NONE",
            Level::Fatal => "FATAL",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    /// The numeric value of the level.
    pub const fn value(&self) -> u8 {
        *self as u8
    }

    /// Look up a level by its numeric value.
    pub fn from_value(value: i64) -> Option<Level> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| LEVELS.get(idx).copied())
    }

    /// Look up a level by its lower-case name. The match is case-sensitive.
    pub fn from_name(name: &str) -> Option<Level> {
        LEVELS.into_iter().find(|level| level.name() == name)
    }

    /// Parse a level out of a loosely typed value.
    ///
    /// Integers are validated against the defined range and strings are matched against the
    /// level names. Anything unrecognized, out of range, or of another type resolves to
    /// `default`, or to [`Level::None`] when no default is given.
    ///
    /// A typed level can be passed through its [`Value`] conversion.
    ///
    /// # Examples
    ///
    /// ```
    /// use logrelay::Level;
    /// use serde_json::json;
    ///
    /// assert_eq!(Level::parse(&json!("notice"), None), Level::Notice);
    /// assert_eq!(Level::parse(&json!(2), None), Level::Error);
    /// assert_eq!(Level::parse(&json!(42), Some(Level::Info)), Level::Info);
    /// assert_eq!(Level::parse(&json!(true), None), Level::None);
    /// assert_eq!(Level::parse(&Level::Debug.into(), None), Level::Debug);
    /// ```
    pub fn parse(value: &Value, default: Option<Level>) -> Level {
        let parsed = match value {
            Value::Number(n) => n.as_i64().and_then(Level::from_value),
            Value::String(s) => Level::from_name(s),
            _ => None,
        };
        parsed.or(default).unwrap_or(Level::None)
    }

    /// Whether a stream whose threshold is `self` emits an entry at `level`.
    pub fn accepts(&self, level: Level) -> bool {
        *self != Level::None && level <= *self
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The error returned when a string names no level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: {:?}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::from_name(s).ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

impl From<Level> for Value {
    fn from(level: Level) -> Self {
        Value::from(level.value())
    }
}
