//! USB-PD PHY and Type-C port core for the S2MF301 transceiver.
//!
//! The [`port::Port`] drives the transceiver through a [`s2mf301_traits::RegisterTransport`]:
//! it frames PD messages into the message buffer registers, aggregates interrupt status into a
//! sticky event mailbox, sequences attach and detach, and owns the CC role, reset and retry
//! logic. Policy decisions stay with the application, which is informed through a
//! [`device_policy_manager::DevicePolicyManager`].
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

// This must go first, so that the other modules see its macros.
mod fmt;

pub mod bus;
pub mod config;
pub mod counters;
pub mod device_policy_manager;
pub mod port;
pub mod protocol_layer;
pub mod registers;
pub mod status;
pub mod timers;
pub mod water;

#[cfg(test)]
pub mod dummy;

/// The power role that a port presents in message headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerRole {
    /// Provides power.
    Source,
    /// Consumes power.
    Sink,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Sink,
            true => Self::Source,
        }
    }
}

impl From<PowerRole> for bool {
    fn from(role: PowerRole) -> bool {
        match role {
            PowerRole::Sink => false,
            PowerRole::Source => true,
        }
    }
}

/// The data role of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataRole {
    /// Upstream facing port, the USB device.
    Ufp,
    /// Downstream facing port, the USB host.
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Ufp,
            true => Self::Dfp,
        }
    }
}

impl From<DataRole> for bool {
    fn from(role: DataRole) -> bool {
        match role {
            DataRole::Ufp => false,
            DataRole::Dfp => true,
        }
    }
}

/// The power role of a Type-C port, including the undecided dual-role state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortRole {
    /// Attached as sink.
    #[default]
    Sink,
    /// Attached as source.
    Source,
    /// Toggling between source and sink, pending attach.
    Drp,
}

impl From<PowerRole> for PortRole {
    fn from(role: PowerRole) -> Self {
        match role {
            PowerRole::Sink => Self::Sink,
            PowerRole::Source => Self::Source,
        }
    }
}
