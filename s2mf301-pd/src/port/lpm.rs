//! Low-power mode, the water interlock result and MUIC events.
//!
//! Callers hold the low-power lock and pass its guarded flag in.
use embassy_sync::blocking_mutex::raw::RawMutex;
use s2mf301_traits::RegisterTransport;

use super::{CcState, Error, Locked, MuicEvent};
use crate::device_policy_manager::{DevicePolicyManager, Notification, UsbRole};
use crate::registers::{InterruptMask, PdCtrl, PlugCtrlRpRd, PullOverride};
use crate::timers::{Timer, TimerType};
use crate::water::{WaterInterlock, WaterStatus};

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock>
    Locked<'_, M, BUS, TIMER, DPM, WATER>
{
    /// Leave low-power mode and toggle again.
    pub(super) async fn set_normal_mode(&mut self, low_power: &mut bool) -> Result<(), Error> {
        debug!("Normal mode");
        self.bus.modify(|r: PdCtrl| r.with_lpm_en(false)).await?;
        *low_power = false;

        self.set_cc_state(CcState::Drp).await?;
        self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
        Ok(())
    }

    /// Enter low-power mode. An attached partner is torn down first.
    pub(super) async fn set_lpm_mode(&mut self, low_power: &mut bool) -> Result<(), Error> {
        debug!("Low-power mode");
        *low_power = true;

        self.set_cc_state(CcState::Open).await?;
        self.bus.set_interrupt_mask(InterruptMask::NONE).await?;
        let _ = self.bus.read_interrupt_status::<TIMER>(false).await?;

        self.bus.modify(|r: PdCtrl| r.with_lpm_en(true)).await?;
        self.bus
            .modify(|r: PlugCtrlRpRd| r.with_manual(PullOverride::RpSource))
            .await?;

        if !self.state.detach_valid {
            self.detach_init().await?;
            self.notify_detach().await;
        }

        Ok(())
    }

    pub(super) async fn set_water_status(&mut self, status: WaterStatus) -> Result<(), Error> {
        let was_wet = self.state.water_detected;

        match status {
            WaterStatus::Dry => {
                info!("Port is dry");
                self.state.water_detected = false;
                if was_wet {
                    self.dpm.notify(Notification::Water(false)).await;
                }

                self.set_cc_state(CcState::Drp).await?;
                self.delay(TimerType::WaterDrySettle).await;
                self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
            }
            WaterStatus::Water => {
                warn!("Water detected");
                self.state.water_detected = true;
                self.bus.set_interrupt_mask(InterruptMask::NONE).await?;

                self.dpm.set_vbus(false).await;
                self.dpm.notify(Notification::Usb(UsbRole::Detached)).await;
                if !was_wet {
                    self.dpm.notify(Notification::Water(true)).await;
                }

                self.set_cc_state(CcState::Rd).await?;
            }
        }

        Ok(())
    }

    pub(super) async fn muic_notification(&mut self, event: MuicEvent, low_power: &mut bool) -> Result<(), Error> {
        debug!("MUIC {:?}", event);

        match event {
            MuicEvent::Type3Attach => {
                if *low_power {
                    self.set_normal_mode(low_power).await?;
                }
            }
            MuicEvent::AbnormalOtgAttach => {
                warn!("Abnormal OTG device, VBUS stays off");
                self.state.killer = true;
            }
            MuicEvent::OtgAttach => self.otg_attach().await,
            MuicEvent::UndefinedRangeDetach => {
                self.set_normal_mode(low_power).await?;
                self.state.water_detected = false;
                self.dpm.notify(Notification::Water(false)).await;
                self.delay(TimerType::WaterDrySettle).await;
                self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
            }
            MuicEvent::Detach => {
                if !*low_power {
                    self.set_lpm_mode(low_power).await?;
                }
            }
        }

        Ok(())
    }
}
