//! Out-of-band bus adapter.
//!
//! Runs transfers on a dedicated worker thread that owns the I2C bus, and
//! fires the completion callback from that thread.  This is the host-side
//! stand-in for an interrupt-driven driver: the poll loop never waits, and
//! the completion genuinely races the next `tick()`.
//!
//! ```text
//!   poll loop                      bus worker thread
//!   ─────────                      ─────────────────
//!   issue_*() ──[BusMsg::Transfer]──▶  execute on I2c
//!                                      completion.complete()
//!   tick(): outcome.load(Acquire) ◀──────────┘
//! ```
//!
//! Requests travel over a bounded `embassy-sync` channel.  The worker
//! drives `receive()` with `futures_lite::future::block_on`; the poll loop
//! only ever `try_send`s, so a full queue rejects the transfer instead of
//! blocking.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use super::blocking_bus::{ChannelId, HandleAllocator};
use super::i2c_op::I2cOp;
use crate::app::ports::{IoIntent, TransferPort};
use crate::transfer::{TransferCompletion, TransferHandle};

/// Request queue depth.  The poller keeps at most one transfer in flight.
const REQUEST_DEPTH: usize = 4;

struct Request {
    handle: TransferHandle,
    address: u8,
    op: I2cOp,
    completion: Arc<TransferCompletion>,
}

enum BusMsg {
    Transfer(Request),
    Shutdown,
}

type RequestChannel = Channel<CriticalSectionRawMutex, BusMsg, REQUEST_DEPTH>;

/// [`TransferPort`] backed by a worker thread.
pub struct ThreadedBus {
    index: u8,
    opened: bool,
    completion: Option<Arc<TransferCompletion>>,
    handles: HandleAllocator,
    requests: Arc<RequestChannel>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedBus {
    /// Move `i2c` onto a new worker thread.  Each transfer takes at least
    /// `latency` to complete.
    pub fn spawn<I>(i2c: I, index: u8, latency: Duration) -> std::io::Result<Self>
    where
        I: I2c + Send + 'static,
    {
        let requests: Arc<RequestChannel> = Arc::new(Channel::new());
        let inbox = Arc::clone(&requests);
        let worker = thread::Builder::new()
            .name("i2c-worker".into())
            .spawn(move || {
                let mut i2c = i2c;
                while let BusMsg::Transfer(req) = futures_lite::future::block_on(inbox.receive()) {
                    if !latency.is_zero() {
                        thread::sleep(latency);
                    }
                    let (event, received) = req.op.execute(&mut i2c, req.address);
                    req.completion.complete(event, req.handle, received.as_slice());
                }
                info!("i2c worker: shutdown requested, exiting");
            })?;

        Ok(Self {
            index,
            opened: false,
            completion: None,
            handles: HandleAllocator::default(),
            requests,
            worker: Some(worker),
        })
    }

    fn submit(&mut self, channel: ChannelId, address: u8, op: Option<I2cOp>) -> Option<TransferHandle> {
        if !self.opened || channel.0 != self.index || self.worker.is_none() {
            return None;
        }
        let completion = Arc::clone(self.completion.as_ref()?);
        let op = op?;
        let handle = self.handles.next();
        let request = Request {
            handle,
            address,
            op,
            completion,
        };
        if self.requests.try_send(BusMsg::Transfer(request)).is_err() {
            warn!("i2c request queue full, transfer {:?} rejected", handle);
            return None;
        }
        Some(handle)
    }
}

impl Drop for ThreadedBus {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            // Waits for queue space; the worker is always draining.
            futures_lite::future::block_on(self.requests.send(BusMsg::Shutdown));
            if worker.join().is_err() {
                warn!("i2c worker panicked");
            }
        }
    }
}

impl TransferPort for ThreadedBus {
    type Channel = ChannelId;

    fn open(&mut self, index: u8, _intent: IoIntent) -> Option<ChannelId> {
        if index != self.index || self.worker.is_none() {
            return None;
        }
        self.opened = true;
        Some(ChannelId(index))
    }

    fn set_completion_handler(&mut self, _channel: ChannelId, completion: Arc<TransferCompletion>) {
        self.completion = Some(completion);
    }

    fn issue_read(&mut self, channel: ChannelId, address: u8, len: usize) -> Option<TransferHandle> {
        self.submit(channel, address, I2cOp::read(len))
    }

    fn issue_write(&mut self, channel: ChannelId, address: u8, tx: &[u8]) -> Option<TransferHandle> {
        self.submit(channel, address, I2cOp::write(tx))
    }

    fn issue_write_read(
        &mut self,
        channel: ChannelId,
        address: u8,
        tx: &[u8],
        rx_len: usize,
    ) -> Option<TransferHandle> {
        self.submit(channel, address, I2cOp::write_read(tx, rx_len))
    }
}
