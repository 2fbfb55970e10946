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
use serde_json::Value;

use crate::Error;
use crate::Level;
use crate::record::Context;
use crate::serializer::Serializer;
use crate::serializer::TIME_FORMAT;

/// A serializer that formats log entries as JSON objects, one per line.
///
/// The object holds the context of the entry plus the `time`, `level` and `message` fields, which
/// take precedence over context keys of the same name.
///
/// Output format:
///
/// ```json
/// {"level":"ERROR","message":"Hello error!","time":"2024-08-11T22:44:57.172+0800","user":"alice"}
/// {"channel":"ops","level":"INFO","message":"Hello info!","time":"2024-08-11T22:44:57.172+0800"}
/// ```
///
/// # Examples
///
/// ```
/// use logrelay::serializer::JsonSerializer;
///
/// let json_serializer = JsonSerializer::default();
/// ```
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct JsonSerializer {}

impl Serializer for JsonSerializer {
    fn serialize(
        &self,
        timestamp: &Zoned,
        level: Level,
        message: &str,
        context: &Context,
    ) -> Result<Vec<u8>, Error> {
        let mut object = context.clone();
        object.insert(
            "time".to_string(),
            Value::String(timestamp.strftime(TIME_FORMAT).to_string()),
        );
        object.insert("level".to_string(), Value::from(level.label()));
        object.insert("message".to_string(), Value::from(message));

        let mut bytes = serde_json::to_vec(&object).map_err(Error::from_json_error)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
