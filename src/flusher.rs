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

//! A background thread flushing a manager periodically.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;

use crate::Error;
use crate::ErrorKind;
use crate::Manager;
use crate::trap::Trap;

/// Flushes a [`Manager`] every interval on a dedicated thread.
///
/// Flush errors are sent to the trap and the next tick flushes again. Dropping the flusher stops
/// the thread and waits for it.
#[derive(Debug)]
pub struct Flusher {
    interval: Duration,
    state: Option<FlusherState>,
}

#[derive(Debug)]
struct FlusherState {
    shutdown: Sender<()>,
    thread_handle: JoinHandle<()>,
}

impl Flusher {
    /// Start flushing `manager` every `interval`.
    ///
    /// # Errors
    ///
    /// Return an error if `interval` is zero or the thread cannot be spawned.
    pub fn start(
        manager: Arc<Manager>,
        interval: Duration,
        trap: Arc<dyn Trap>,
    ) -> Result<Flusher, Error> {
        if interval.is_zero() {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "flush interval must not be zero",
            ));
        }

        let (shutdown, receiver) = crossbeam_channel::bounded(1);
        let worker = Worker {
            manager,
            interval,
            trap,
            shutdown: receiver,
        };
        let thread_handle = std::thread::Builder::new()
            .name("logrelay-flusher".to_string())
            .spawn(move || worker.run())
            .map_err(|err| {
                Error::new(ErrorKind::Unexpected, "failed to spawn flusher thread").with_source(err)
            })?;

        Ok(Flusher {
            interval,
            state: Some(FlusherState {
                shutdown,
                thread_handle,
            }),
        })
    }

    /// The period between two flushes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the thread and wait for it to exit.
    ///
    /// A flush in progress completes first. Closing twice does nothing.
    pub fn close(&mut self) -> Result<(), Error> {
        let Some(FlusherState {
            shutdown,
            thread_handle,
        }) = self.state.take()
        else {
            return Ok(());
        };

        drop(shutdown);
        thread_handle
            .join()
            .map_err(|_| Error::new(ErrorKind::Unexpected, "flusher thread panicked"))
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct Worker {
    manager: Arc<Manager>,
    interval: Duration,
    trap: Arc<dyn Trap>,
    shutdown: Receiver<()>,
}

impl Worker {
    fn run(self) {
        loop {
            match self.shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = self.manager.flush() {
                        self.trap.trap(&err);
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}
