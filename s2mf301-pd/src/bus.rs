//! Register access on top of a [`RegisterTransport`].
//!
//! Counts every transport failure and propagates it. The only retry is the optional
//! interrupt-status read retry, see [`crate::config::Config::bulk_read_retry`].
use s2mf301_traits::{RegisterTransport, TransportError};

use crate::config::BULK_READ_RETRIES;
use crate::registers::{InterruptMask, InterruptStatus, NUM_INT_STATUS, Register, RegisterValue};
use crate::timers::{Timer, TimerType};

/// A register bus with a hardware error counter.
#[derive(Debug)]
pub struct Bus<BUS: RegisterTransport> {
    transport: BUS,
    errors: u32,
}

impl<BUS: RegisterTransport> Bus<BUS> {
    /// Wrap a transport.
    pub fn new(transport: BUS) -> Self {
        Self { transport, errors: 0 }
    }

    /// Number of transport failures since creation.
    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// Access the underlying transport.
    pub fn transport(&mut self) -> &mut BUS {
        &mut self.transport
    }

    fn track<T>(&mut self, register: Register, result: Result<T, TransportError>) -> Result<T, TransportError> {
        if let Err(e) = &result {
            self.errors = self.errors.wrapping_add(1);
            error!("Register {:?} access failed: {:?} (errors: {})", register, e, self.errors);
        }
        result
    }

    /// Read a single register.
    pub async fn read(&mut self, register: Register) -> Result<u8, TransportError> {
        let result = self.transport.read(register.into()).await;
        let value = self.track(register, result)?;
        trace!("Read {:?}: {:#x}", register, value);
        Ok(value)
    }

    /// Write a single register.
    pub async fn write(&mut self, register: Register, value: u8) -> Result<(), TransportError> {
        trace!("Write {:?}: {:#x}", register, value);
        let result = self.transport.write(register.into(), value).await;
        self.track(register, result)
    }

    /// Read consecutive registers.
    pub async fn bulk_read(&mut self, register: Register, buffer: &mut [u8]) -> Result<(), TransportError> {
        let result = self.transport.bulk_read(register.into(), buffer).await;
        self.track(register, result)
    }

    /// Read consecutive registers, starting at an offset from a base register.
    pub async fn bulk_read_from(&mut self, base: Register, offset: u8, buffer: &mut [u8]) -> Result<(), TransportError> {
        let result = self.transport.bulk_read(u8::from(base) + offset, buffer).await;
        self.track(base, result)
    }

    /// Write consecutive registers.
    pub async fn bulk_write(&mut self, register: Register, data: &[u8]) -> Result<(), TransportError> {
        let result = self.transport.bulk_write(register.into(), data).await;
        self.track(register, result)
    }

    /// Read a typed register.
    pub async fn load<R: RegisterValue>(&mut self) -> Result<R, TransportError> {
        Ok(R::from(self.read(R::ADDRESS).await?))
    }

    /// Write a typed register.
    pub async fn store<R: RegisterValue>(&mut self, value: R) -> Result<(), TransportError> {
        self.write(R::ADDRESS, value.into()).await
    }

    /// Read-modify-write a typed register, returning the written value.
    pub async fn modify<R: RegisterValue>(&mut self, f: impl FnOnce(R) -> R) -> Result<R, TransportError> {
        let value = f(self.load::<R>().await?);
        self.store(value).await?;
        Ok(value)
    }

    /// Read all interrupt status registers, which clears them.
    ///
    /// With `retry`, a failed read is repeated up to [`BULK_READ_RETRIES`] times in total.
    pub async fn read_interrupt_status<TIMER: Timer>(&mut self, retry: bool) -> Result<InterruptStatus, TransportError> {
        let attempts = if retry { BULK_READ_RETRIES } else { 1 };
        let mut status = [0u8; NUM_INT_STATUS];

        let mut attempt = 1;
        loop {
            match self.bulk_read(Register::IntStatus0, &mut status).await {
                Ok(()) => return Ok(InterruptStatus(status)),
                Err(e) if attempt >= attempts => return Err(e),
                Err(_) => {
                    warn!("Interrupt status read failed, attempt {}/{}", attempt, attempts);
                    attempt += 1;
                    TimerType::new::<TIMER>(TimerType::BulkReadRetry).await;
                }
            }
        }
    }

    /// Program all interrupt masks at once.
    pub async fn set_interrupt_mask(&mut self, mask: InterruptMask) -> Result<(), TransportError> {
        self.bulk_write(Register::IntMask0, &mask.0).await
    }
}
