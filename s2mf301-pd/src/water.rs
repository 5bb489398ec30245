//! The water interlock, a narrow seam to an optional moisture detection subsystem.
//!
//! Attach is only committed once the interlock reports the port as dry. The detection
//! subsystem reports its result back through [`crate::port::Port::set_water_status`].
use core::future::Future;

use embassy_futures::select::{Either, select};

use crate::timers::{Timer, TimerType};

/// Why a water check is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaterEvent {
    /// A partner attached that presents Rp.
    AttachAsSink,
    /// A partner attached that presents Rd.
    AttachAsSource,
}

/// Result of a water check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WaterStatus {
    /// The port is dry.
    #[default]
    Dry,
    /// Moisture was detected on the port.
    Water,
}

/// Trait for a moisture detection subsystem.
pub trait WaterInterlock {
    /// Check the port for moisture.
    fn check(&mut self, event: WaterEvent) -> impl Future<Output = WaterStatus>;

    /// Whether the subsystem is probing for an OTG device, which needs Rp control while detached.
    fn is_otg_check(&self) -> bool {
        false
    }
}

/// An interlock for boards without moisture detection. The port is always dry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWaterInterlock;

impl WaterInterlock for NoWaterInterlock {
    async fn check(&mut self, _event: WaterEvent) -> WaterStatus {
        WaterStatus::Dry
    }
}

/// Run a water check, bounded by [`TimerType::WaterCheck`].
///
/// A check that does not finish in time counts as dry.
pub(crate) async fn check_bounded<WATER: WaterInterlock, TIMER: Timer>(
    water: &mut WATER,
    event: WaterEvent,
) -> WaterStatus {
    match select(water.check(event), TimerType::new::<TIMER>(TimerType::WaterCheck)).await {
        Either::First(status) => status,
        Either::Second(()) => {
            warn!("Water check for {:?} timed out", event);
            WaterStatus::Dry
        }
    }
}
