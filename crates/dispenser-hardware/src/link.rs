//! Host side of the board link.
//!
//! [`BoardLink`] owns the transport and the bus addressing, and is the only
//! way frames reach the board. Every write is followed by
//! [`TRANSMIT_DELAY`] of silence before the bus is released, so the board
//! has time to latch the frame. Writes from different tasks never
//! interleave: the menu upload holds the bus for all 96 frames.
//!
//! Ready line reads do not take the bus lock. A session polling for
//! completion must be able to see the line while a halt is being written.

use crate::traits::{DispenseTransport, PinLevel, TransportKind};
use dispenser_core::{BusConfig, Result, constants::TRANSMIT_DELAY};
use dispenser_protocol::{HaltFrame, MenuTable, OrderFrame, RecipeFrame};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, trace};

/// Counters for bus traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub write_failures: u64,
    pub ready_reads: u64,
}

/// Serialized access to the dispenser board.
#[derive(Debug)]
pub struct BoardLink<T> {
    transport: T,
    bus: BusConfig,
    bus_lock: Mutex<()>,
    frames_sent: AtomicU64,
    write_failures: AtomicU64,
    ready_reads: AtomicU64,
}

impl<T: DispenseTransport> BoardLink<T> {
    pub fn new(transport: T, bus: BusConfig) -> Self {
        Self {
            transport,
            bus,
            bus_lock: Mutex::new(()),
            frames_sent: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            ready_reads: AtomicU64::new(0),
        }
    }

    pub fn bus(&self) -> &BusConfig {
        &self.bus
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            ready_reads: self.ready_reads.load(Ordering::Relaxed),
        }
    }

    /// Write one block while holding the bus, then wait out the transmit delay.
    async fn write_locked(
        &self,
        _bus: &MutexGuard<'_, ()>,
        register: u8,
        payload: &[u8],
    ) -> Result<()> {
        trace!("Writing {} bytes to register {:#04x}", payload.len(), register);

        if let Err(e) = self
            .transport
            .write_block(self.bus.board_address, register, payload)
            .await
        {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                "Write to {} register {:#04x} failed: {}",
                self.transport.name(),
                register,
                e
            );
            return Err(e.into());
        }

        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(TRANSMIT_DELAY).await;
        Ok(())
    }

    /// Send one register of one recipe.
    ///
    /// # Errors
    /// Returns `Error::TransmitFailed` if the bus write fails. No retry.
    pub async fn write_recipe_block(&self, frame: &RecipeFrame) -> Result<()> {
        let guard = self.bus_lock.lock().await;
        self.write_locked(&guard, frame.bus_register(&self.bus), &frame.to_bytes())
            .await
    }

    /// Upload the whole recipe table, slot 0 register 0 first.
    ///
    /// The bus is held for the entire upload. The first failed write stops
    /// the upload; frames after it are not sent and nothing is retried, so
    /// the board may hold a mix of old and new slots.
    ///
    /// # Errors
    /// Returns `Error::TransmitFailed` for the first failing frame.
    pub async fn initialize_menu(&self, table: &MenuTable) -> Result<()> {
        let guard = self.bus_lock.lock().await;
        info!(
            "Uploading menu to {} ({} active recipes)",
            self.transport.name(),
            table.active_count()
        );

        for (sent, frame) in table.frames().enumerate() {
            if let Err(e) = self
                .write_locked(&guard, frame.bus_register(&self.bus), &frame.to_bytes())
                .await
            {
                error!(
                    "Menu upload stopped at recipe {} register {} after {} frames",
                    frame.recipe_id, frame.register, sent
                );
                return Err(e);
            }
        }

        debug!("Menu upload complete");
        Ok(())
    }

    /// Send an order frame.
    ///
    /// # Errors
    /// Returns `Error::TransmitFailed` if the bus write fails.
    pub async fn write_order_block(&self, frame: &OrderFrame) -> Result<()> {
        let guard = self.bus_lock.lock().await;
        debug!(
            "Sending order for recipe {} x{}",
            frame.recipe_id, frame.quantity
        );
        self.write_locked(&guard, self.bus.order_register, &frame.to_bytes())
            .await
    }

    /// Tell the board to stop pouring.
    ///
    /// # Errors
    /// Returns `Error::TransmitFailed` if the bus write fails.
    pub async fn send_halt(&self) -> Result<()> {
        let guard = self.bus_lock.lock().await;
        info!("Sending halt to {}", self.transport.name());
        self.write_locked(&guard, self.bus.halt_register, &HaltFrame.to_bytes())
            .await
    }

    /// Sample the ready line. `true` means the board is idle (line low).
    ///
    /// # Errors
    /// Returns `Error::TransmitFailed` if the line cannot be read.
    pub async fn read_ready_pin(&self) -> Result<bool> {
        self.ready_reads.fetch_add(1, Ordering::Relaxed);
        let level = self.transport.read_ready_line().await?;
        trace!("Ready line {}", level);
        Ok(level.is_ready())
    }
}
