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

use jiff::Zoned;

use crate::Error;
use crate::Level;
use crate::record::Context;
use crate::serializer::Serializer;
use crate::serializer::TIME_FORMAT;

/// A serializer that formats log entries as lines of text.
///
/// The context of the entry is not printed.
///
/// Output format:
///
/// ```text
/// 2024-08-11T22:44:57.172+0800 [ERROR] Hello error!
/// 2024-08-11T22:44:57.172+0800 [WARNING] Hello warning!
/// 2024-08-11T22:44:57.172+0800 [INFO] Hello info!
/// ```
///
/// # Examples
///
/// ```
/// use logrelay::serializer::TextSerializer;
///
/// let text_serializer = TextSerializer::default();
/// ```
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct TextSerializer {}

impl Serializer for TextSerializer {
    fn serialize(
        &self,
        timestamp: &Zoned,
        level: Level,
        message: &str,
        _: &Context,
    ) -> Result<Vec<u8>, Error> {
        let time = timestamp.strftime(TIME_FORMAT);
        let level = level.label();
        Ok(format!("{time} [{level}] {message}\n").into_bytes())
    }
}
