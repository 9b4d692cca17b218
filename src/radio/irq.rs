//! # SX127x Completion Notification
//!
//! DIO0 signals the end of a transmission or reception. The edge handler
//! runs in interrupt context and does nothing but post a non-blocking wake
//! to a per-device worker thread. The worker decides what completed, latches
//! the matching done flag and invokes the registered callback.
//!
//! ## Flow
//!
//! ```text
//! DIO0 edge ──> WakeSender::wake ──try_send──> [sync_channel(1)]
//!                                                     │
//!                    CompletionWorker thread <────────┘
//!                           │ reads trigger
//!                           ├─ TX: tx_done = true
//!                           ├─ RX: rx_done = true
//!                           └─ callback(status, reason)
//! ```
//!
//! The wake channel holds a single message, so interrupts arriving before
//! the worker runs collapse into one wake and only the most recently armed
//! trigger is observed. One operation may be in flight per device.

use crate::constants::WORKER_STOP_TIMEOUT_MS;
use crate::error::DriverError;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(0);

/// Identity of one driver instance, carried in every wake message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        DeviceId(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sx127x#{}", self.0)
    }
}

/// Why the completion callback was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    RxDone,
    TxDone,
}

/// Operation the next DIO0 edge refers to
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    None = 0,
    RxDone = 1,
    TxDone = 2,
}

impl CompletionTrigger {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CompletionTrigger::RxDone,
            2 => CompletionTrigger::TxDone,
            _ => CompletionTrigger::None,
        }
    }
}

/// Subscriber invoked from the worker thread
///
/// User context is whatever the closure captures.
pub type CompletionCallback = Arc<dyn Fn(&CompletionStatus, CompletionReason) + Send + Sync>;

/// Completion state shared between the driver and its worker
pub struct CompletionStatus {
    device: DeviceId,
    tx_done: AtomicBool,
    rx_done: AtomicBool,
    trigger: AtomicU8,
    callback: Mutex<Option<CompletionCallback>>,
}

impl fmt::Debug for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionStatus")
            .field("device", &self.device)
            .field("tx_done", &self.is_tx_done())
            .field("rx_done", &self.is_rx_done())
            .field("trigger", &self.trigger())
            .finish()
    }
}

impl CompletionStatus {
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            tx_done: AtomicBool::new(false),
            rx_done: AtomicBool::new(false),
            trigger: AtomicU8::new(CompletionTrigger::None as u8),
            callback: Mutex::new(None),
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn is_tx_done(&self) -> bool {
        self.tx_done.load(Ordering::Acquire)
    }

    pub fn is_rx_done(&self) -> bool {
        self.rx_done.load(Ordering::Acquire)
    }

    pub fn trigger(&self) -> CompletionTrigger {
        CompletionTrigger::from_u8(self.trigger.load(Ordering::Acquire))
    }

    /// Start a new operation: clear its done flag and point DIO0 at it
    pub fn arm(&self, trigger: CompletionTrigger) {
        match trigger {
            CompletionTrigger::TxDone => self.tx_done.store(false, Ordering::Release),
            CompletionTrigger::RxDone => self.rx_done.store(false, Ordering::Release),
            CompletionTrigger::None => {}
        }
        self.trigger.store(trigger as u8, Ordering::Release);
    }

    /// Stop attributing DIO0 edges to any operation
    pub fn disarm(&self) {
        self.trigger
            .store(CompletionTrigger::None as u8, Ordering::Release);
    }

    pub fn clear_rx_done(&self) {
        self.rx_done.store(false, Ordering::Release);
    }

    fn callback_slot(&self) -> MutexGuard<'_, Option<CompletionCallback>> {
        match self.callback.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_callback(&self, callback: CompletionCallback) {
        *self.callback_slot() = Some(callback);
    }

    pub fn clear_callback(&self) {
        *self.callback_slot() = None;
    }

    pub fn has_callback(&self) -> bool {
        self.callback_slot().is_some()
    }

    /// Worker side: resolve the pending trigger, latch and notify.
    ///
    /// The callback runs without the slot locked, so it may replace or
    /// clear itself.
    pub fn complete(&self) -> Option<CompletionReason> {
        let reason = match self.trigger() {
            CompletionTrigger::TxDone => {
                self.tx_done.store(true, Ordering::Release);
                CompletionReason::TxDone
            }
            CompletionTrigger::RxDone => {
                self.rx_done.store(true, Ordering::Release);
                CompletionReason::RxDone
            }
            CompletionTrigger::None => return None,
        };
        let callback = self.callback_slot().clone();
        if let Some(callback) = callback {
            callback(self, reason);
        }
        Some(reason)
    }
}

/// Message consumed by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Interrupt(DeviceId),
    Shutdown,
}

/// Interrupt-side handle: posts a wake without blocking
#[derive(Clone)]
pub struct WakeSender {
    device: DeviceId,
    tx: SyncSender<Wake>,
}

impl WakeSender {
    /// Safe to call from interrupt context. A wake already pending absorbs
    /// this one.
    pub fn wake(&self) {
        // Full: already pending. Disconnected: the worker has stopped.
        let _ = self.tx.try_send(Wake::Interrupt(self.device));
    }
}

/// Per-device worker thread
pub struct CompletionWorker {
    device: DeviceId,
    tx: SyncSender<Wake>,
    handle: Option<JoinHandle<()>>,
}

impl CompletionWorker {
    pub fn spawn(status: Arc<CompletionStatus>) -> Result<Self, DriverError> {
        let device = status.device();
        let (tx, rx) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name(format!("{device}-worker"))
            .spawn(move || run(status, rx))
            .map_err(|e| DriverError::Worker(e.to_string()))?;
        log::debug!("{device}: completion worker started");
        Ok(Self {
            device,
            tx,
            handle: Some(handle),
        })
    }

    pub fn waker(&self) -> WakeSender {
        WakeSender {
            device: self.device,
            tx: self.tx.clone(),
        }
    }

    /// Stop the thread and wait for it; idempotent.
    ///
    /// A callback that never returns would keep the worker from seeing the
    /// stop message. After `WORKER_STOP_TIMEOUT_MS` the thread is detached
    /// and left to exit once the callback returns.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let deadline = Instant::now() + Duration::from_millis(WORKER_STOP_TIMEOUT_MS);
        loop {
            match self.tx.try_send(Wake::Shutdown) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => break,
                Err(TrySendError::Full(_)) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TrySendError::Full(_)) => {
                    log::warn!("{}: completion worker busy, detaching", self.device);
                    return;
                }
            }
        }
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                log::warn!("{}: completion callback did not return, detaching worker", self.device);
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if handle.join().is_err() {
            log::error!("{}: completion worker panicked", self.device);
        } else {
            log::debug!("{}: completion worker stopped", self.device);
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for CompletionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(status: Arc<CompletionStatus>, rx: Receiver<Wake>) {
    let device = status.device();
    for wake in rx.iter() {
        match wake {
            Wake::Interrupt(id) if id == device => match status.complete() {
                Some(reason) => log::trace!("{device}: {reason:?}"),
                None => log::debug!("{device}: DIO0 edge with nothing armed"),
            },
            Wake::Interrupt(id) => {
                log::warn!("{device}: ignoring wake addressed to {id}");
            }
            Wake::Shutdown => break,
        }
    }
}
