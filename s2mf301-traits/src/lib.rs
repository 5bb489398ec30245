//! S2MF301 transceiver traits.
//!
//! Provides the register transport trait through which the PD core talks to the
//! transceiver, typically over I2C.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
use core::future::Future;

/// Register transport error.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The device did not acknowledge an address or data byte.
    #[error("device did not acknowledge")]
    Nack,

    /// Arbitration loss or another bus-level fault.
    #[error("bus fault")]
    Bus,

    /// The transfer did not complete in time.
    #[error("transfer timed out")]
    Timeout,
}

/// Register transport trait, through which the PD core talks to the transceiver.
///
/// Implementations must not retry internally. Every failure is reported to the caller,
/// which decides whether to retry, ignore or abort.
pub trait RegisterTransport {
    /// Read a single register.
    fn read(&mut self, register: u8) -> impl Future<Output = Result<u8, TransportError>>;

    /// Write a single register.
    fn write(&mut self, register: u8, value: u8) -> impl Future<Output = Result<(), TransportError>>;

    /// Read consecutive registers, starting at `register`, into `buffer`.
    fn bulk_read(&mut self, register: u8, buffer: &mut [u8]) -> impl Future<Output = Result<(), TransportError>>;

    /// Write `data` to consecutive registers, starting at `register`.
    fn bulk_write(&mut self, register: u8, data: &[u8]) -> impl Future<Output = Result<(), TransportError>>;

    /// Mask or unmask the transceiver's interrupt line at the host.
    ///
    /// Defaults to doing nothing, for platforms that poll.
    fn set_interrupt_enabled(&mut self, _enabled: bool) {}
}
