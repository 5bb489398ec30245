//! CC line control: the manual CC state, Rp level, comparator thresholds and roles.
use embassy_sync::blocking_mutex::raw::RawMutex;
use s2mf301_traits::RegisterTransport;

use super::{Accessory, CcOpenReason, CcState, Error, Locked, PrSwapStage, RprdMode, ThresholdKind};
use crate::device_policy_manager::{DevicePolicyManager, Notification, PolicyCommand, RpCurrent, UsbRole};
use crate::registers::{
    CcLevel, CcMonitor, FsmInput, InterruptMask, PlugCtrl, PlugCtrlMsg, PlugCtrlPd12, PlugCtrlPort, PlugCtrlRpRd,
    PlugCtrlVbusMux, PlugMon2, PlugState, PortMode, PullOverride, Register, RpLevel, SLICE_MILLIVOLTS,
    SliceThreshold, VconnPin, threshold,
};
use crate::timers::{Timer, TimerType};
use crate::water::WaterInterlock;
use crate::{DataRole, PortRole, PowerRole};

/// The Rp current that the FSM monitor reports on either line.
pub(super) fn rp_current(monitor: CcMonitor) -> Option<RpCurrent> {
    [monitor.cc1(), monitor.cc2()]
        .into_iter()
        .find_map(|level| match level {
            CcLevel::Rp10k => Some(RpCurrent::Level3),
            CcLevel::Rp22k => Some(RpCurrent::Level2),
            CcLevel::Rp56k => Some(RpCurrent::Default),
            _ => None,
        })
}

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock>
    Locked<'_, M, BUS, TIMER, DPM, WATER>
{
    /// Move the manual CC state machine.
    ///
    /// A CC lockout forces [`CcState::Open`]. Otherwise, a latched RID refuses any change.
    pub(super) async fn set_cc_state(&mut self, requested: CcState) -> Result<(), Error> {
        let target = if self.state.manual_cc_open.is_any() {
            CcState::Open
        } else if self.state.rid.is_latched() {
            info!("CC state {:?} refused, RID {:?} is latched", requested, self.state.rid);
            return Ok(());
        } else {
            requested
        };

        if target == self.state.cc_state {
            return Ok(());
        }

        match target {
            CcState::Open => {
                self.bus
                    .modify(|r: PlugCtrlPort| r.with_mode(PortMode::Dfp).with_rp_sel(RpLevel::Rp0))
                    .await?;
                self.bus
                    .modify(|r: PlugCtrlRpRd| r.with_manual(PullOverride::Off))
                    .await?;
            }
            CcState::Rd => {
                self.bus
                    .modify(|r: PlugCtrlRpRd| r.with_manual(PullOverride::RdSink))
                    .await?;
                self.bus
                    .modify(|r: PlugCtrlPort| r.with_mode(PortMode::Ufp).with_rp_sel(RpLevel::Rp80))
                    .await?;
            }
            CcState::Drp => {
                self.bus
                    .modify(|r: PlugCtrlRpRd| r.with_manual(PullOverride::Off))
                    .await?;
                self.bus
                    .modify(|r: PlugCtrlPort| r.with_mode(PortMode::Drp).with_rp_sel(RpLevel::Rp80))
                    .await?;
            }
            CcState::Default => return Ok(()),
        }

        info!("CC state {:?} -> {:?}", self.state.cc_state, target);
        self.state.cc_state = target;
        Ok(())
    }

    /// Advertise an Rp level, and retune both comparator thresholds to it.
    pub(super) async fn set_rp_level(&mut self, level: RpLevel) -> Result<(), Error> {
        self.apply_rp_level(level, false).await
    }

    /// Re-apply the current Rp level, after a role change.
    pub(super) async fn refresh_rp_level(&mut self) -> Result<(), Error> {
        self.apply_rp_level(self.state.rp_level, true).await
    }

    async fn apply_rp_level(&mut self, level: RpLevel, force: bool) -> Result<(), Error> {
        if self.state.detach_valid && !self.water.is_otg_check() {
            debug!("Rp level {:?} ignored while detached", level);
            return Ok(());
        }

        if self.state.manual_cc_open.is_any() {
            debug!("Rp level {:?} ignored while CC is held open", level);
            return Ok(());
        }

        if !force && level == self.state.rp_level {
            return Ok(());
        }

        self.bus.modify(|r: PlugCtrlPort| r.with_rp_sel(level)).await?;
        self.state.rp_level = level;

        let rd = match level {
            RpLevel::Rp0 | RpLevel::Rp80 => threshold::MV_214,
            RpLevel::Rp180 => threshold::MV_428,
            RpLevel::Rp330 => threshold::MV_813,
        };
        let rp = match (self.state.power_role, level) {
            (PortRole::Source, RpLevel::Rp330) => threshold::MAX,
            (PortRole::Source, _) => threshold::MV_1626,
            _ => threshold::MAX,
        };

        self.set_threshold(ThresholdKind::Rd, rd).await?;
        self.set_threshold(ThresholdKind::Rp, rp).await
    }

    pub(super) async fn set_threshold(&mut self, kind: ThresholdKind, level: u8) -> Result<(), Error> {
        if level > threshold::MAX {
            return Err(Error::InvalidThreshold(level));
        }

        let value = SliceThreshold(0).with_level(level);
        match kind {
            ThresholdKind::Rd => {
                self.bus
                    .write(Register::PlugCtrlSetRd, value.with_enable(true).into())
                    .await?;
                self.state.rd_threshold = level;
            }
            ThresholdKind::Rp => {
                self.bus.write(Register::PlugCtrlSetRp, value.into()).await?;
                self.state.rp_threshold = level;
            }
        }

        trace!("{:?} threshold {} mV", kind, SLICE_MILLIVOLTS[level as usize]);
        Ok(())
    }

    /// Hand the CC lines back to the hardware toggle.
    pub(super) async fn assert_drp(&mut self) -> Result<(), Error> {
        self.bus
            .modify(|r: PlugCtrlRpRd| r.with_fsm_manual_en(false))
            .await?;
        self.bus
            .modify(|r: PlugCtrlPd12| r.with_fsm_input(FsmInput::None))
            .await?;
        Ok(())
    }

    /// Force the FSM to attached sink, keeping Rd on the CC line in use.
    async fn assert_rd(&mut self) -> Result<(), Error> {
        let (cc1, cc2) = (self.state.cc1, self.state.cc2);

        if cc1 == CcLevel::Rd {
            self.bus
                .modify(|r: PlugCtrlPd12| r.with_pd1_manual_on(true))
                .await?;
            if self.config.vconn_en {
                self.bus
                    .modify(|r: PlugCtrlRpRd| {
                        r.with_manual(PullOverride::Off)
                            .with_vconn_pin(VconnPin::Pd2)
                            .with_vconn_manual_en(true)
                    })
                    .await?;
            }
        } else if cc2 == CcLevel::Rd {
            self.bus
                .modify(|r: PlugCtrlPd12| r.with_pd2_manual_on(true))
                .await?;
            if self.config.vconn_en {
                self.bus
                    .modify(|r: PlugCtrlRpRd| {
                        r.with_manual(PullOverride::Off)
                            .with_vconn_pin(VconnPin::Pd1)
                            .with_vconn_manual_en(true)
                    })
                    .await?;
            }
        }

        self.bus
            .modify(|r: PlugCtrlPd12| r.with_fsm_input(FsmInput::AttachedSnk))
            .await?;
        self.bus
            .modify(|r: PlugCtrlRpRd| r.with_fsm_manual_en(true))
            .await?;
        Ok(())
    }

    /// Force the FSM to attached source.
    pub(super) async fn assert_rp(&mut self) -> Result<(), Error> {
        self.bus
            .modify(|r: PlugCtrlPd12| r.with_fsm_input(FsmInput::AttachedSrc))
            .await?;
        self.bus
            .modify(|r: PlugCtrlRpRd| r.with_fsm_manual_en(true))
            .await?;
        Ok(())
    }

    pub(super) async fn set_power_role(&mut self, role: PortRole) -> Result<(), Error> {
        info!("Power role {:?} -> {:?}", self.state.power_role, role);

        match role {
            PortRole::Sink => {
                self.state.pr_swap = true;
                self.state.power_role = role;
                self.refresh_rp_level().await?;
                self.assert_rd().await?;
                self.bus
                    .modify(|r: PlugCtrlMsg| r.with_power_role(PowerRole::Sink))
                    .await?;
            }
            PortRole::Source => {
                self.state.pr_swap = true;
                self.state.power_role = role;
                self.refresh_rp_level().await?;
                self.assert_rp().await?;
                self.bus
                    .modify(|r: PlugCtrlMsg| r.with_power_role(PowerRole::Source))
                    .await?;
            }
            PortRole::Drp => {
                // End of a swap. The negotiated role stays.
                self.state.pr_swap = false;
                self.refresh_rp_level().await?;
                self.delay(TimerType::RoleSwapSettle).await;
                self.assert_drp().await?;
            }
        }

        Ok(())
    }

    pub(super) async fn set_data_role(&mut self, role: DataRole) -> Result<(), Error> {
        self.bus.modify(|r: PlugCtrlMsg| r.with_data_role(role)).await?;
        info!("Data role {:?} -> {:?}", self.state.data_role, role);
        self.state.data_role = role;
        self.process_dr_swap().await;
        Ok(())
    }

    /// Swap host and device ownership of the USB stack.
    async fn process_dr_swap(&mut self) {
        self.dpm.notify(Notification::DataRoleSwap).await;

        let (source, next) = match self.state.usb {
            UsbRole::Host => (false, UsbRole::Device),
            UsbRole::Device => (true, UsbRole::Host),
            UsbRole::Detached => return,
        };

        self.dpm.notify(Notification::Usb(UsbRole::Detached)).await;
        self.dpm
            .notify(Notification::Attach { attached: true, source })
            .await;
        self.dpm.notify(Notification::Usb(next)).await;
        self.state.usb = next;
    }

    pub(super) async fn pr_swap(&mut self, stage: PrSwapStage) {
        debug!("Power role swap stage {:?}", stage);

        match stage {
            PrSwapStage::SinkOff => self.dpm.notify(Notification::PowerContractReset).await,
            PrSwapStage::SourceOn => {
                self.dpm.notify(Notification::PowerSource(true)).await;
                self.dpm
                    .notify(Notification::PowerRoleSwap(PowerRole::Source))
                    .await;
            }
            PrSwapStage::SourceOff => {
                self.dpm.notify(Notification::PowerContractReset).await;
                self.dpm
                    .notify(Notification::PowerRoleSwap(PowerRole::Sink))
                    .await;
            }
        }
    }

    /// Source VCONN on the CC line that does not carry the partner's Rd.
    pub(super) async fn set_vconn_source(&mut self, on: bool) -> Result<(), Error> {
        if !self.config.vconn_en {
            return Err(Error::VconnUnsupported);
        }

        let pin = if !on {
            VconnPin::None
        } else if self.state.cc1 == CcLevel::Rd {
            VconnPin::Pd2
        } else if self.state.cc2 == CcLevel::Rd {
            VconnPin::Pd1
        } else {
            warn!(
                "No Rd for VCONN, CC1 {:?}, CC2 {:?}",
                self.state.cc1, self.state.cc2
            );
            return Ok(());
        };

        self.bus
            .modify(|r: PlugCtrlRpRd| r.with_vconn_pin(pin).with_vconn_manual_en(true))
            .await?;
        self.state.vconn_source = on;
        debug!("VCONN {:?}", pin);
        Ok(())
    }

    pub(super) async fn set_otg_control(&mut self, on: bool) {
        if on && self.state.killer {
            info!("OTG VBUS refused for an abnormal device");
            return;
        }

        self.dpm.set_vbus(on).await;
    }

    pub(super) async fn get_rp_level(&mut self) -> Result<Option<RpCurrent>, Error> {
        let monitor = CcMonitor(self.bus.read(Register::PlugFsmMon).await?);
        Ok(rp_current(monitor))
    }

    pub(super) async fn pd_instead_of_vbus(&mut self, enable: bool) -> Result<(), Error> {
        if enable == self.state.cc_instead_of_vbus {
            return Ok(());
        }

        self.bus
            .modify(|r: PlugCtrlVbusMux| r.with_rd_or_vbus_mux_sel(false))
            .await?;
        self.bus
            .modify(|r: PlugCtrl| r.with_ufp_attach_opt_en(enable))
            .await?;
        self.state.cc_instead_of_vbus = enable;
        Ok(())
    }

    pub(super) async fn set_pd_control(&mut self, on: bool) -> Result<(), Error> {
        if self.state.detach_valid {
            debug!("PD control ignored while detached");
            return Ok(());
        }

        self.bus
            .modify(|r: PlugCtrl| r.with_eco_src_cap_rdy(on))
            .await?;
        Ok(())
    }

    /// Re-sample a source attach with an elevated Rp threshold, to reject noise.
    pub(super) async fn check_abnormal_attach(&mut self) -> Result<bool, Error> {
        self.set_threshold(ThresholdKind::Rp, threshold::MV_1626)
            .await?;
        self.delay(TimerType::AbnormalAttach).await;
        Ok(self.bus.load::<PlugMon2>().await?.plug_state() == PlugState::Source)
    }

    pub(super) async fn check_accessory(&mut self) -> Result<(), Error> {
        match (self.state.cc1, self.state.cc2) {
            (CcLevel::Rd, CcLevel::Rd) => {
                info!("Debug accessory attached");
                Err(Error::Accessory(Accessory::Debug))
            }
            (CcLevel::Ra, CcLevel::Ra) => {
                info!("Audio accessory attached");
                self.dpm.policy(PolicyCommand::AnalogAudio).await;
                Err(Error::Accessory(Accessory::Audio))
            }
            _ => Ok(()),
        }
    }

    pub(super) async fn cc_open_request(&mut self, reason: CcOpenReason, on: bool) -> Result<(), Error> {
        info!("CC open {:?}: {}", reason, on);
        self.state.manual_cc_open = self.state.manual_cc_open.with_reason(reason, on);

        if on {
            self.bus.set_interrupt_mask(InterruptMask::CC_OPEN).await?;
            self.set_cc_state(CcState::Open).await
        } else if self.state.water_detected {
            self.state.manual_cc_open.set_hiccup(false);
            self.set_cc_state(CcState::Rd).await
        } else {
            self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
            self.set_cc_state(CcState::Drp).await
        }
    }

    pub(super) async fn hiccup_expired(&mut self) -> Result<(), Error> {
        info!("CC hiccup hold expired");
        self.state.manual_cc_open.set_hiccup(true);
        self.set_cc_state(CcState::Open).await
    }

    pub(super) async fn energy_now(&mut self, vbus_mux: bool, ufp_attach_opt: bool) -> Result<(), Error> {
        let plug = self
            .bus
            .modify(|r: PlugCtrl| r.with_ufp_attach_opt_en(ufp_attach_opt))
            .await?;
        let mux = self
            .bus
            .modify(|r: PlugCtrlVbusMux| r.with_rd_or_vbus_mux_sel(vbus_mux))
            .await?;
        info!("Energy now, plug control {:#x}, VBUS mux {:#x}", plug.0, mux.0);
        Ok(())
    }

    /// Tear the attach down with the CC lines released, hold, then toggle again.
    async fn forced_detach(&mut self, hold_as_sink: bool) -> Result<(), Error> {
        self.delay(TimerType::ForcedDetachPulse).await;
        self.detach_init().await?;
        self.notify_detach().await;
        self.delay(TimerType::ForcedDetachHold).await;

        if hold_as_sink {
            self.assert_rd().await?;
        }
        self.set_rp_level(RpLevel::Rp80).await?;
        self.delay(TimerType::RoleSwap).await;
        self.assert_drp().await?;

        self.shared.schedule_attach();
        Ok(())
    }

    pub(super) async fn rprd_mode_change(&mut self, mode: RprdMode) -> Result<(), Error> {
        if *self.shared.low_power.lock().await {
            info!("Mode change to {:?} skipped in low-power mode", mode);
            return Ok(());
        }

        info!("Mode change to {:?}", mode);
        match mode {
            RprdMode::Dfp => {
                self.set_pd_control(false).await?;
                self.set_rp_level(RpLevel::Rp0).await?;
                self.assert_rp().await?;
                self.forced_detach(false).await
            }
            RprdMode::Ufp => {
                self.set_pd_control(false).await?;
                self.assert_rp().await?;
                self.set_rp_level(RpLevel::Rp0).await?;
                self.forced_detach(true).await
            }
            RprdMode::Drp => {
                self.bus
                    .modify(|r: PlugCtrlPort| r.with_mode(PortMode::Drp))
                    .await?;
                Ok(())
            }
        }
    }

    /// Force a re-detect, when attached to a partner that does not talk PD.
    pub(super) async fn probe_reset(&mut self) -> Result<(), Error> {
        if self.state.detach_valid || self.state.pd_support {
            return Ok(());
        }

        info!("Re-detecting partner without PD");
        self.set_pd_control(false).await?;
        self.assert_rp().await?;
        self.set_rp_level(RpLevel::Rp0).await?;
        self.forced_detach(false).await
    }
}
