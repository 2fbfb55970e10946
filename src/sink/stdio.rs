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

use std::io;
use std::io::Write;

use crate::sink::Sink;

/// A sink that prints to stdout.
///
/// Closing it only flushes; the process standard output stays open.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Stdout {}

impl Write for Stdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

impl Sink for Stdout {
    fn close(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// A sink that prints to stderr.
///
/// Closing it only flushes; the process standard error stays open.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Stderr {}

impl Write for Stderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::stderr().lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl Sink for Stderr {
    fn close(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
