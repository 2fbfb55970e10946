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

//! Byte sinks that streams write serialized entries to.

use std::fmt;
use std::io;

mod disk;
mod rotating;
mod stdio;

pub use self::disk::Disk;
pub use self::disk::LocalDisk;
pub use self::disk::LocalFile;
pub use self::rotating::RotatingFileWriter;
pub use self::rotating::RotatingFileWriterBuilder;
pub use self::stdio::Stderr;
pub use self::stdio::Stdout;

/// A writable and closable byte output.
pub trait Sink: io::Write + fmt::Debug + Send + 'static {
    /// Release the underlying resource.
    ///
    /// Writing to a closed sink is an error.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: Sink> From<T> for Box<dyn Sink> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
