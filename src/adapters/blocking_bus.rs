//! Inline-completing bus adapter.
//!
//! Implements [`TransferPort`] on top of any blocking embedded-hal 1.0
//! [`I2c`] bus.  Each `issue_*` call runs the transfer immediately and fires
//! the completion callback before returning, which is the degenerate case
//! of an interrupt that completes "instantly".  The poll FSM arms its flag
//! before issuing, so this ordering is safe.

use std::sync::Arc;

use embedded_hal::i2c::I2c;

use super::i2c_op::I2cOp;
use crate::app::ports::{IoIntent, TransferPort};
use crate::transfer::{TransferCompletion, TransferHandle};

/// Channel handle handed out by the bus adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelId(pub u8);

/// Monotonic transfer handle allocator that never yields `INVALID`.
#[derive(Debug, Default)]
pub(super) struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub(super) fn next(&mut self) -> TransferHandle {
        let handle = TransferHandle(self.next);
        self.next = self.next.wrapping_add(1);
        if self.next == TransferHandle::INVALID.0 {
            self.next = 0;
        }
        handle
    }
}

/// [`TransferPort`] over a blocking [`I2c`] bus.
pub struct BlockingBus<I> {
    i2c: I,
    index: u8,
    opened: bool,
    completion: Option<Arc<TransferCompletion>>,
    handles: HandleAllocator,
}

impl<I: I2c> BlockingBus<I> {
    /// Wrap `i2c` as driver instance `index`.
    pub fn new(i2c: I, index: u8) -> Self {
        Self {
            i2c,
            index,
            opened: false,
            completion: None,
            handles: HandleAllocator::default(),
        }
    }

    pub fn inner(&self) -> &I {
        &self.i2c
    }

    fn run(&mut self, channel: ChannelId, address: u8, op: Option<I2cOp>) -> Option<TransferHandle> {
        if !self.opened || channel.0 != self.index {
            return None;
        }
        let completion = Arc::clone(self.completion.as_ref()?);
        let op = op?;
        let handle = self.handles.next();
        let (event, received) = op.execute(&mut self.i2c, address);
        completion.complete(event, handle, received.as_slice());
        Some(handle)
    }
}

impl<I: I2c> TransferPort for BlockingBus<I> {
    type Channel = ChannelId;

    fn open(&mut self, index: u8, _intent: IoIntent) -> Option<ChannelId> {
        if index != self.index {
            return None;
        }
        self.opened = true;
        Some(ChannelId(index))
    }

    fn set_completion_handler(&mut self, _channel: ChannelId, completion: Arc<TransferCompletion>) {
        self.completion = Some(completion);
    }

    fn issue_read(&mut self, channel: ChannelId, address: u8, len: usize) -> Option<TransferHandle> {
        self.run(channel, address, I2cOp::read(len))
    }

    fn issue_write(&mut self, channel: ChannelId, address: u8, tx: &[u8]) -> Option<TransferHandle> {
        self.run(channel, address, I2cOp::write(tx))
    }

    fn issue_write_read(
        &mut self,
        channel: ChannelId,
        address: u8,
        tx: &[u8],
        rx_len: usize,
    ) -> Option<TransferHandle> {
        self.run(channel, address, I2cOp::write_read(tx, rx_len))
    }
}
