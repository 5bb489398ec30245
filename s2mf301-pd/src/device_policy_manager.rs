//! The device policy manager (DPM) is informed about port status changes, and owns the board
//! resources that the port core cannot reach through the transceiver.
//!
//! This covers the PD policy engine, charger detection, the USB stack and VBUS/VCONN supplies.
//! Every method defaults to doing nothing, so that a device only implements what it has.
//!
//! The port calls into the DPM while holding its lock. Implementations must therefore not call
//! back into the [`crate::port::Port`].
use core::future::Future;

use uom::si::u32::ElectricPotential;

use crate::PowerRole;
use crate::port::Rid;

/// The role of the USB data stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UsbRole {
    /// No USB data connection.
    #[default]
    Detached,
    /// Acting as USB host (DFP).
    Host,
    /// Acting as USB device (UFP).
    Device,
}

/// Current advertised by an attached source through its Rp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RpCurrent {
    /// Default USB power.
    Default,
    /// 1.5 A.
    Level2,
    /// 3.0 A.
    Level3,
}

/// Status changes that the port reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// A partner attached or detached, for charger detection.
    Attach {
        /// Whether a partner is present.
        attached: bool,
        /// Whether this port provides power to it.
        source: bool,
    },
    /// A legacy charger is attached that only advertises default Rp current.
    TaAttach,
    /// The accessory ID resistor changed.
    Rid(Rid),
    /// The USB data role changed.
    Usb(UsbRole),
    /// This port started or stopped powering VBUS for the USB host stack.
    PowerSource(bool),
    /// A data role swap completed.
    DataRoleSwap,
    /// A power role swap completed, with the new role.
    PowerRoleSwap(PowerRole),
    /// The sink power contract was dropped during a power role swap.
    PowerContractReset,
    /// Water was detected (`true`) or the port dried (`false`).
    Water(bool),
    /// The Rp current of an attached source.
    RpLevel(RpCurrent),
    /// VBUS is shorted onto a CC pin.
    VbusShort,
}

/// Commands for the PD policy engine and manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PolicyCommand {
    /// Restart policy for a freshly attached partner.
    PlugAttach,
    /// Drop all policy state of the detached partner.
    PlugDetach,
    /// Reinitialize the policy engine after detach.
    Reinit,
    /// Run the policy engine, because events are pending.
    Kick,
    /// The partner sent a soft reset.
    SoftResetReceived,
    /// The partner signalled a hard reset.
    HardResetReceived,
    /// Request a soft reset towards the partner.
    RequestSoftReset,
    /// Exit alternate modes and release accessories.
    ExitModes,
    /// An analog audio accessory was found.
    AnalogAudio,
}

/// Trait for the device policy manager.
pub trait DevicePolicyManager {
    /// Report a status change.
    fn notify(&mut self, _notification: Notification) -> impl Future<Output = ()> {
        async {}
    }

    /// Command the policy engine.
    fn policy(&mut self, _command: PolicyCommand) -> impl Future<Output = ()> {
        async {}
    }

    /// Switch the VBUS supply that powers an attached sink.
    fn set_vbus(&mut self, _on: bool) -> impl Future<Output = ()> {
        async {}
    }

    /// Sample the VBUS voltage.
    ///
    /// Defaults to `None`, when no power meter is available.
    fn vbus_voltage(&mut self) -> impl Future<Output = Option<ElectricPotential>> {
        async { None }
    }

    /// Switch the VCONN regulator.
    fn set_vconn_regulator(&mut self, _on: bool) {}

    /// Pulse the VBUS discharge path. It is expected to switch off by itself.
    fn set_vbus_discharge(&mut self, _on: bool) {}

    /// Switch the OTG boost control line.
    fn set_otg_vctrl(&mut self, _on: bool) {}
}
