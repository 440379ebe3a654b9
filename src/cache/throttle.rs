// src/cache/throttle.rs

//! Keyed, coalescing disk writes.
//!
//! Every path has one slot holding the latest requested operation. The first
//! caller to enqueue for an idle slot gets a [`WriteLease`] and is responsible
//! for draining it; later callers just replace the pending operation. Two
//! writes of the same path are at least `delay` apart, and a burst of requests
//! collapses into a single write of the last one.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::errors::Result;
use crate::fs::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Write(Vec<u8>),
    Remove,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<WriteOp>,
    active: bool,
    /// Earliest time the next operation on this path may run.
    ready_at: Option<Instant>,
}

type Slots = Arc<Mutex<HashMap<PathBuf, Slot>>>;

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<PathBuf, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Slot {
    /// Nothing queued, nobody draining, and no spacing left to enforce.
    fn is_idle(&self, now: Instant) -> bool {
        !self.active && self.pending.is_none() && self.ready_at.is_none_or(|at| at <= now)
    }
}

/// Mark `path`'s slot inactive, dropping it once it holds no state.
fn release(slots: &mut HashMap<PathBuf, Slot>, path: &Path) {
    let now = Instant::now();
    if let Some(slot) = slots.get_mut(path) {
        slot.active = false;
        if slot.is_idle(now) {
            slots.remove(path);
        }
    }
}

#[derive(Clone)]
pub struct ThrottledWriter {
    fs: Arc<dyn FileSystem>,
    delay: Duration,
    slots: Slots,
}

impl fmt::Debug for ThrottledWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottledWriter")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl ThrottledWriter {
    pub fn new(fs: Arc<dyn FileSystem>, delay: Duration) -> Self {
        Self {
            fs,
            delay,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record `op` as the latest operation for `path`.
    ///
    /// Returns a lease when nobody is draining this path yet. Never blocks, so
    /// it is safe to call while holding other locks.
    #[must_use = "a returned lease must be run or the operation is lost"]
    pub fn enqueue(&self, path: impl Into<PathBuf>, op: WriteOp) -> Option<WriteLease> {
        let path = path.into();
        let mut slots = lock(&self.slots);
        let now = Instant::now();
        slots.retain(|_, slot| !slot.is_idle(now));
        let slot = slots.entry(path.clone()).or_default();
        slot.pending = Some(op);
        if slot.active {
            trace!(?path, "coalesced write");
            return None;
        }
        slot.active = true;
        Some(WriteLease {
            writer: self.clone(),
            path,
            done: false,
        })
    }

    /// Whether any path still has an undrained operation.
    pub fn has_pending(&self) -> bool {
        lock(&self.slots)
            .values()
            .any(|slot| slot.active || slot.pending.is_some())
    }

    fn perform(&self, path: &Path, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::Write(bytes) => {
                trace!(?path, len = bytes.len(), "writing");
                self.fs.write(path, &bytes)?;
            }
            WriteOp::Remove => {
                if self.fs.exists(path) {
                    trace!(?path, "removing");
                    self.fs.remove(path)?;
                }
            }
        }
        Ok(())
    }
}

enum Next {
    Wait(Instant),
    Perform(WriteOp),
}

/// Exclusive right to drain one path's slot.
#[must_use = "a lease does nothing until run"]
pub struct WriteLease {
    writer: ThrottledWriter,
    path: PathBuf,
    done: bool,
}

impl fmt::Debug for WriteLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteLease").field("path", &self.path).finish()
    }
}

impl WriteLease {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Perform pending operations until the slot is empty.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let next = {
                let mut slots = lock(&self.writer.slots);
                let Some(slot) = slots.get_mut(&self.path) else {
                    self.done = true;
                    return Ok(());
                };
                match (slot.ready_at, slot.pending.take()) {
                    (_, None) => {
                        release(&mut slots, &self.path);
                        self.done = true;
                        return Ok(());
                    }
                    (Some(at), Some(op)) if at > Instant::now() => {
                        slot.pending = Some(op);
                        Next::Wait(at)
                    }
                    (_, Some(op)) => {
                        slot.ready_at = Some(Instant::now() + self.writer.delay);
                        Next::Perform(op)
                    }
                }
            };

            match next {
                Next::Wait(at) => tokio::time::sleep_until(at).await,
                Next::Perform(op) => self.writer.perform(&self.path, op)?,
            }
        }
    }
}

impl Drop for WriteLease {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // Never ran, or failed midway: release the slot so the next enqueue
        // gets a fresh lease.
        let mut slots = lock(&self.writer.slots);
        if let Some(slot) = slots.get_mut(&self.path) {
            slot.pending = None;
        }
        release(&mut slots, &self.path);
    }
}
