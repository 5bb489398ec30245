//! Attach, detach and RID sequencing.
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;
use s2mf301_traits::RegisterTransport;
use uom::si::electric_potential::millivolt;

use super::cc::rp_current;
use super::{CcState, Error, Locked, Rid};
use crate::device_policy_manager::{DevicePolicyManager, Notification, PolicyCommand, RpCurrent, UsbRole};
use crate::registers::{
    AdcStatus, CcLevel, CcMonitor, FsmInput, InterruptMask, MsgSendCon, PlugCtrlMsg, PlugCtrlPd12, PlugCtrlPort,
    PlugCtrlRpRd, PlugMon2, PlugState, PortMode, Register, RpLevel,
};
use crate::timers::{Timer, TimerType};
use crate::water::{self, WaterEvent, WaterInterlock, WaterStatus};
use crate::{DataRole, PortRole, PowerRole};

/// Polls of the VBUS meter while waiting for VBUS removal.
const VBUS_REMOVAL_POLLS: usize = 50;

/// VBUS level below which it counts as removed, before Try.SNK.
const VBUS_REMOVED_MV: u32 = 3000;

/// VBUS level from which a source counts as present, during Try.SNK.
const VBUS_PRESENT_MV: u32 = 4000;

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock>
    Locked<'_, M, BUS, TIMER, DPM, WATER>
{
    async fn sample_cc(&mut self) -> Result<(), Error> {
        let monitor = CcMonitor(self.bus.read(Register::PlugMon1).await?);
        self.state.cc1 = monitor.cc1();
        self.state.cc2 = monitor.cc2();
        Ok(())
    }

    /// The attach sequencer.
    ///
    /// Classifies the plug, runs the water check and Try.SNK if configured, then commits
    /// the role. An unrecognized plug state leaves the role untouched.
    pub(super) async fn check_port_detect(&mut self) -> Result<(), Error> {
        let result = self.port_detect().await;

        if self.config.try_snk {
            self.bus
                .modify(|r: PlugCtrlRpRd| r.with_fsm_manual_en(false))
                .await?;
        }

        result
    }

    async fn port_detect(&mut self) -> Result<(), Error> {
        let mut plug = self.bus.load::<PlugMon2>().await?.plug_state();
        self.sample_cc().await?;
        info!(
            "Attach, plug state {:?}, CC1 {:?}, CC2 {:?}",
            plug, self.state.cc1, self.state.cc2
        );

        let event = match plug {
            PlugState::Sink => WaterEvent::AttachAsSink,
            PlugState::Source => WaterEvent::AttachAsSource,
            PlugState::Unknown(x) => return Err(Error::UnknownPlugState(x)),
        };

        self.set_manual_retry(false).await?;

        if water::check_bounded::<WATER, TIMER>(self.water, event).await == WaterStatus::Water {
            info!("Attach refused, water detected");
            return Err(Error::Water);
        }

        if self.config.try_snk && plug == PlugState::Source {
            self.wait_vbus_removal().await;
            self.check_accessory().await?;
            self.try_snk().await?;

            plug = self.bus.load::<PlugMon2>().await?.plug_state();
            self.sample_cc().await?;
        }

        match plug {
            PlugState::Sink => self.attach_as_sink().await?,
            PlugState::Source => self.attach_as_source().await?,
            PlugState::Unknown(x) => return Err(Error::UnknownPlugState(x)),
        }

        self.state.detach_valid = false;
        self.state.first_attach = true;
        self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
        Ok(())
    }

    async fn vbus_millivolts(&mut self) -> Option<u32> {
        self.dpm
            .vbus_voltage()
            .await
            .map(|voltage| voltage.get::<millivolt>())
    }

    /// Wait for a previous source to remove VBUS, so that Try.SNK starts clean.
    async fn wait_vbus_removal(&mut self) {
        for _ in 0..VBUS_REMOVAL_POLLS {
            match self.vbus_millivolts().await {
                Some(mv) if mv >= VBUS_REMOVED_MV => self.delay(TimerType::VbusRemovalPoll).await,
                _ => return,
            }
        }

        warn!("VBUS still present before Try.SNK");
    }

    /// The Try.SNK sub-state-machine.
    ///
    /// Debounces Rd and its absence with [`TimerType::TryCcDebounce`]. The whole decision is
    /// bounded by [`TimerType::TrySnkEscape`], after which the port stays a sink.
    async fn try_snk(&mut self) -> Result<(), Error> {
        self.bus
            .modify(|r: PlugCtrlPd12| r.with_fsm_input(FsmInput::AttachedSnk))
            .await?;
        self.bus
            .modify(|r: PlugCtrlRpRd| r.with_fsm_manual_en(true))
            .await?;
        self.delay(TimerType::DrpTry).await;

        let role = match select(self.try_snk_debounce(), TimerType::new::<TIMER>(TimerType::TrySnkEscape)).await {
            Either::First(role) => role?,
            Either::Second(()) => {
                warn!("Try.SNK did not settle, staying sink");
                PowerRole::Sink
            }
        };

        info!("Try.SNK resolved as {:?}", role);
        self.state.power_role = role.into();

        let fsm = match role {
            PowerRole::Sink => FsmInput::AttachedSnk,
            PowerRole::Source => FsmInput::AttachedSrc,
        };
        self.bus
            .modify(|r: PlugCtrlPd12| r.with_fsm_input(fsm))
            .await?;
        self.delay(TimerType::TryFsmSettle).await;

        if role == PowerRole::Source {
            let poll = TimerType::TrySnkPoll.millis();
            let debounce = TimerType::TryCcDebounce.millis();
            let mut elapsed = 0;
            loop {
                let monitor = CcMonitor(self.bus.read(Register::PlugMon1).await?);
                let rd = monitor.cc1() == CcLevel::Rd || monitor.cc2() == CcLevel::Rd;

                if rd && elapsed > debounce {
                    self.bus
                        .modify(|r: PlugCtrlPd12| r.with_fsm_input(FsmInput::AttachedSrc))
                        .await?;
                    self.bus
                        .modify(|r: PlugCtrlRpRd| r.with_fsm_manual_en(false))
                        .await?;
                    break;
                }

                if !rd && elapsed > TimerType::DrpTry.millis() {
                    info!("Try.Wait.SRC lost the sink");
                    self.bus
                        .modify(|r: PlugCtrlPd12| r.with_fsm_input(FsmInput::UnattachedSrc))
                        .await?;
                    self.bus
                        .modify(|r: PlugCtrlRpRd| r.with_fsm_manual_en(false))
                        .await?;
                    self.delay(TimerType::UnattachedSettle).await;
                    return Ok(());
                }

                self.delay(TimerType::TrySnkPoll).await;
                elapsed += poll;
            }
        }

        self.delay(TimerType::TryExitSettle).await;
        self.bus
            .read_interrupt_status::<TIMER>(self.config.bulk_read_retry)
            .await?;
        Ok(())
    }

    /// Sample CC until Rd (with VBUS) or its absence is stable for tTryCCDebounce.
    async fn try_snk_debounce(&mut self) -> Result<PowerRole, Error> {
        let poll = TimerType::TrySnkPoll.millis();
        let debounce = TimerType::TryCcDebounce.millis();

        let mut elapsed = 0;
        let mut rd_since: Option<u64> = None;
        let mut open_since: Option<u64> = None;

        loop {
            let vbus = self
                .vbus_millivolts()
                .await
                .is_none_or(|mv| mv >= VBUS_PRESENT_MV);

            if open_since.is_some_and(|since| elapsed - since >= debounce) {
                return Ok(PowerRole::Source);
            }

            if rd_since.is_some_and(|since| elapsed - since >= debounce) && vbus {
                return Ok(PowerRole::Sink);
            }

            let monitor = CcMonitor(self.bus.read(Register::PlugMon1).await?);
            if monitor.cc1() == CcLevel::Rd || monitor.cc2() == CcLevel::Rd {
                rd_since = rd_since.or(Some(elapsed));
                open_since = None;
            } else {
                open_since = open_since.or(Some(elapsed));
                rd_since = None;
            }

            self.delay(TimerType::TrySnkPoll).await;
            elapsed += poll;
        }
    }

    async fn attach_as_sink(&mut self) -> Result<(), Error> {
        self.dpm.set_vbus_discharge(false);
        self.dpm.set_otg_vctrl(false);

        self.state.detach_valid = false;
        self.state.power_role = PortRole::Sink;
        self.state.data_role = DataRole::Ufp;
        self.bus
            .modify(|r: PlugCtrlMsg| r.with_power_role(PowerRole::Sink).with_data_role(DataRole::Ufp))
            .await?;
        self.dpm.policy(PolicyCommand::PlugAttach).await;

        if self.config.vconn_en {
            self.dpm.set_vconn_regulator(true);
        }

        if self.state.usb == UsbRole::Host {
            self.dpm
                .notify(Notification::Attach {
                    attached: false,
                    source: true,
                })
                .await;
            self.dpm.notify(Notification::PowerSource(false)).await;
            self.dpm.set_vbus(false).await;
            self.dpm.notify(Notification::Usb(UsbRole::Detached)).await;
            self.state.usb = UsbRole::Detached;
            self.delay(TimerType::HostOffSettle).await;
        }

        self.dpm
            .notify(Notification::Attach {
                attached: true,
                source: false,
            })
            .await;

        if !matches!(self.state.rid, Rid::R523k | Rid::R619k) && self.state.usb == UsbRole::Detached {
            self.dpm.notify(Notification::Usb(UsbRole::Device)).await;
            self.state.usb = UsbRole::Device;
        }

        info!("Attached as sink");
        Ok(())
    }

    async fn attach_as_source(&mut self) -> Result<(), Error> {
        if !self.check_abnormal_attach().await? {
            info!("Abnormal source attach");
            return Err(Error::AbnormalAttach);
        }
        self.check_accessory().await?;

        self.dpm.set_otg_vctrl(true);

        self.state.detach_valid = false;
        self.state.power_role = PortRole::Source;
        self.state.data_role = DataRole::Dfp;
        self.bus
            .modify(|r: PlugCtrlMsg| r.with_power_role(PowerRole::Source).with_data_role(DataRole::Dfp))
            .await?;
        self.dpm.policy(PolicyCommand::PlugAttach).await;

        if self.state.usb == UsbRole::Device {
            self.dpm
                .notify(Notification::Attach {
                    attached: false,
                    source: false,
                })
                .await;
            self.dpm.notify(Notification::Usb(UsbRole::Detached)).await;
            self.state.usb = UsbRole::Detached;
        }

        if self.state.usb != UsbRole::Host {
            self.dpm
                .notify(Notification::Attach {
                    attached: true,
                    source: true,
                })
                .await;
        }

        if self.config.vconn_en {
            self.dpm.set_vconn_regulator(true);
            self.set_vconn_source(true).await?;
        }

        info!("Attached as source");
        self.delay(TimerType::SourceSettle(self.config.source_settle_ms))
            .await;
        Ok(())
    }

    /// Read the RID for a detach. Returns whether a latched RID suppresses the detach.
    pub(super) async fn detach_blocked_by_rid(&mut self) -> Result<bool, Error> {
        self.state.rid = self.read_rid().await?;
        Ok(self.state.rid.is_latched() && !self.state.first_attach)
    }

    /// Tear down the session and bring the transceiver back to toggling.
    pub(super) async fn detach_init(&mut self) -> Result<(), Error> {
        info!("Detach");
        self.check_pps_irq(false).await?;
        self.dpm.set_vbus_discharge(true);
        self.dpm.set_otg_vctrl(false);
        self.set_pd_control(false).await?;

        if self.state.power_role == PortRole::Source {
            self.dpm.set_vbus(false).await;
        }

        self.state.pd_support = false;
        self.set_rp_level(RpLevel::Rp80).await?;
        self.state.detach_valid = true;

        self.dpm.policy(PolicyCommand::PlugDetach).await;
        self.pps_enable(None).await?;
        self.shared.mailbox.clear();
        self.dpm.policy(PolicyCommand::Reinit).await;
        self.bus.store(MsgSendCon::HARD_EN).await?;

        if self.bus.load::<AdcStatus>().await?.rid() == 0 {
            self.soft_reset_pulse().await?;

            let port = self.bus.load::<PlugCtrlPort>().await?;
            if port.mode() != PortMode::Drp && !self.state.manual_cc_open.is_any() {
                self.bus.store(port.with_mode(PortMode::Drp)).await?;
                self.state.cc_state = CcState::Drp;
            }
        }

        self.bus
            .modify(|r: PlugCtrlMsg| r.with_power_role(PowerRole::Sink).with_data_role(DataRole::Ufp))
            .await?;

        self.state.rid = Rid::Max;
        self.state.factory_mode = false;
        self.state.pr_swap = false;
        self.state.vbus_short_checked = false;
        self.state.pd_vbus_short_checked = false;
        self.state.vbus_short = false;
        self.state.killer = false;
        self.state.first_goodcrc = false;
        self.state.source_cap_received = false;
        self.state.cc_instead_of_vbus = false;
        self.state.pps_enabled = false;
        self.state.give_sink_cap = 0;

        if self.config.vconn_en {
            self.dpm.set_vconn_regulator(false);
        }

        self.reg_init().await?;

        if self.config.vconn_en {
            self.set_vconn_source(false).await?;
        }

        Ok(())
    }

    /// Report a detach to the collaborators, releasing the USB stack.
    pub(super) async fn notify_detach(&mut self) {
        self.dpm
            .notify(Notification::Attach {
                attached: false,
                source: false,
            })
            .await;
        self.dpm.notify(Notification::Rid(Rid::Open)).await;
        self.dpm.policy(PolicyCommand::ExitModes).await;

        if self.state.usb != UsbRole::Detached {
            self.state.usb = UsbRole::Detached;
            self.dpm.notify(Notification::PowerSource(false)).await;
            self.dpm.notify(Notification::Usb(UsbRole::Detached)).await;
        }
    }

    /// Debounce and latch the RID.
    ///
    /// Moving between "open" and "none" is not reported, any other change is.
    pub(super) async fn check_rid(&mut self) -> Result<(), Error> {
        self.delay(TimerType::RidSettle).await;

        let code = self.bus.load::<AdcStatus>().await?.rid();
        let Some(rid) = Rid::from_code(code) else {
            warn!("RID code {} out of range", code);
            return Ok(());
        };

        if rid == Rid::Undefined || rid == self.state.rid {
            return Ok(());
        }

        let previous = self.state.rid;
        self.state.rid = rid;

        if previous.is_open_or_none() && rid.is_open_or_none() {
            debug!("RID {:?} -> {:?}", previous, rid);
        } else {
            info!("RID {:?} -> {:?}", previous, rid);
            self.notify_rid(rid).await;
        }

        Ok(())
    }

    async fn notify_rid(&mut self, rid: Rid) {
        self.state.factory_mode = rid == Rid::R523k;
        self.dpm.notify(Notification::Rid(rid)).await;

        match rid {
            Rid::R523k | Rid::R619k | Rid::Open => {
                self.dpm.notify(Notification::Usb(UsbRole::Detached)).await;
                self.state.usb = UsbRole::Detached;
            }
            Rid::R301k => {
                self.dpm.notify(Notification::Usb(UsbRole::Device)).await;
                self.state.usb = UsbRole::Device;
            }
            _ => {}
        }
    }

    /// Check once per session whether VBUS is shorted onto a CC line.
    pub(super) async fn vbus_short_check(&mut self) -> Result<(), Error> {
        if self.state.vbus_short_checked {
            return Ok(());
        }

        let fsm = CcMonitor(self.bus.read(Register::PlugFsmMon).await?);
        let rp = rp_current(fsm);
        let monitor = CcMonitor(self.bus.read(Register::PlugMon1).await?);

        if monitor.cc1() == CcLevel::Rp || monitor.cc2() == CcLevel::Rp {
            warn!("VBUS is shorted onto CC");
            self.state.vbus_short = true;
            self.dpm.notify(Notification::VbusShort).await;
        } else {
            self.state.vbus_short = false;
            if let Some(rp) = rp {
                self.dpm.notify(Notification::RpLevel(rp)).await;
                if rp == RpCurrent::Default {
                    self.dpm.notify(Notification::TaAttach).await;
                }
            }
        }

        self.state.vbus_short_checked = true;
        Ok(())
    }

    pub(super) async fn pd_vbus_short_check(&mut self) -> Result<(), Error> {
        if self.state.pd_vbus_short_checked {
            return Ok(());
        }

        self.state.vbus_short_checked = false;
        self.vbus_short_check().await?;
        self.state.pd_vbus_short_checked = true;
        Ok(())
    }

    /// Turn on host mode for an OTG device, if the port may source.
    pub(super) async fn otg_attach(&mut self) {
        if self.state.detach_valid
            || self.state.power_role == PortRole::Sink
            || self.state.killer
            || self.state.water_detected
        {
            debug!("OTG attach ignored");
            return;
        }

        info!("OTG attach");
        self.state.usb = UsbRole::Host;
        self.dpm.notify(Notification::PowerSource(true)).await;
        self.dpm.notify(Notification::Usb(UsbRole::Host)).await;
        self.dpm.set_vbus(true).await;
    }
}
