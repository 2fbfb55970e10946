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

use std::fmt;
use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::sink::Sink;

/// A file system that log files are opened on.
pub trait Disk: fmt::Debug + Send + Sync + 'static {
    /// Open `path` for appending, creating it if missing.
    fn open_append(&self, path: &str) -> io::Result<Box<dyn Sink>>;
}

/// A [`Disk`] backed by the local file system, resolving relative paths against a root
/// directory.
///
/// # Examples
///
/// ```
/// use logrelay::sink::LocalDisk;
///
/// let disk = LocalDisk::new("logs");
/// ```
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    /// Create a disk rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory relative paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for LocalDisk {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Disk for LocalDisk {
    fn open_append(&self, path: &str) -> io::Result<Box<dyn Sink>> {
        let path = self.root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        Ok(Box::new(LocalFile {
            path,
            file: Some(file),
        }))
    }
}

/// A file opened by [`LocalDisk`].
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    file: Option<fs::File>,
}

impl LocalFile {
    /// The path the file was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> io::Result<&mut fs::File> {
        self.file.as_mut().ok_or_else(|| {
            io::Error::other(format!("file already closed: {}", self.path.display()))
        })
    }
}

impl Write for LocalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Sink for LocalFile {
    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }
}
