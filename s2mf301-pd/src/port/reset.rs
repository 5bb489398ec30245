//! Register initialization, the reset paths, message retries and PPS.
use embassy_sync::blocking_mutex::raw::RawMutex;
use s2mf301_traits::RegisterTransport;
use uom::si::electric_current::milliampere;
use uom::si::u32::ElectricCurrent;

use super::{Error, Locked, Rid, ThresholdKind};
use crate::device_policy_manager::DevicePolicyManager;
use crate::protocol_layer::message::header::{Header, SpecificationRevision};
use crate::registers::{
    AdcStatus, BmcCtrl, Etc, IFG_35US, InterruptMask, MsgSendCon, OCP_575MV, PPS_TIMER_8S, PdCtrl2, PhyCtrlIfg,
    PlugCtrl, PlugCtrlPd12, PlugCtrlPdHold, PlugCtrlRpRd, PlugCtrlSetMon, PlugCtrlVbusMux, PpsCtrl, PullOverride,
    Register, Retransmission, RpLevel, SopType, VconnPin, threshold,
};
use crate::timers::{Timer, TimerType};
use crate::water::WaterInterlock;

/// Timer programming sequences: select codes, then the value that is latched.
const TCC_TIMER: [u8; 4] = [0x10, 0x0d, 0x90, 0x00];
const RP_TIMER: [u8; 3] = [0x40, 0x02, 0xc0];
const RD_TIMER: [u8; 3] = [0x30, 0x06, 0xb0];

/// PPS minimum current, in 50 mA steps.
const PPS_MIN_CURRENT: u8 = (1000u16 / 50) as u8;

/// Hardware retransmissions per negotiated revision.
const RETRIES_R3_X: u8 = 2;
const RETRIES_R2_0: u8 = 3;

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock>
    Locked<'_, M, BUS, TIMER, DPM, WATER>
{
    /// Bring up the transceiver.
    ///
    /// A RID that was latched before boot (e.g. the factory jig) keeps the port attached, and
    /// PD control is switched on right away.
    pub(super) async fn init(&mut self) -> Result<(), Error> {
        let rid = self.read_rid().await?;

        self.reg_init().await?;
        self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
        let _ = self.bus.read_interrupt_status::<TIMER>(false).await?;

        if rid.is_latched() {
            info!("RID {:?} latched at init", rid);
            self.state.rid = rid;
            self.state.detach_valid = false;
            self.set_rp_level(RpLevel::Rp80).await?;
            self.set_pd_control(true).await?;
        } else {
            let shared = self.shared;
            let mut low_power = shared.low_power.lock().await;
            self.set_normal_mode(&mut low_power).await?;
        }

        Ok(())
    }

    /// The ADC's RID, with unclassified codes folded into [`Rid::Max`].
    pub(super) async fn read_rid(&mut self) -> Result<Rid, Error> {
        let code = self.bus.load::<AdcStatus>().await?.rid();
        Ok(match Rid::from_code(code) {
            Some(Rid::Undefined) | None => Rid::Max,
            Some(rid) => rid,
        })
    }

    /// Program every register that the transceiver loses on reset.
    pub(super) async fn reg_init(&mut self) -> Result<(), Error> {
        self.bus.modify(|r: PhyCtrlIfg| r.with_ifg(r.ifg() | IFG_35US)).await?;
        self.bus
            .modify(|r: MsgSendCon| r.with_hard_en(true).with_op_mode(false))
            .await?;
        self.bus.modify(|r: PdCtrl2| r.with_ocp(OCP_575MV)).await?;
        self.bus.modify(|r: PlugCtrlSetMon| r.with_rd(true)).await?;
        self.bus
            .modify(|r: PlugCtrlVbusMux| r.with_rd_or_vbus_mux_sel(false).with_send_en_clear_sel(true))
            .await?;
        self.bus.write(Register::PhyCtrl00, 0x80).await?;
        self.bus.modify(|r: BmcCtrl| r.with_bmc_rx_enable(true)).await?;
        self.bus.write(Register::DebounceLow, 0x3c).await?;
        self.bus.write(Register::DebounceHigh, 0x0f).await?;

        for select in TCC_TIMER {
            self.bus.write(Register::TimerSelect, select).await?;
        }
        self.bus.write(Register::TimerValue, 0).await?;

        for sequence in [RP_TIMER, RD_TIMER] {
            for select in sequence {
                self.bus.write(Register::TimerSelect, select).await?;
            }
            self.delay(TimerType::TimerLatch).await;
            self.bus.write(Register::TimerValue, 0).await?;
        }

        self.bus
            .modify(|r: PlugCtrlPdHold| r.with_support_accessory(true))
            .await?;
        self.bus
            .modify(|r: PpsCtrl| r.with_msg_irq_sel(true).with_pps_enable(false))
            .await?;
        self.bus
            .store(
                PlugCtrl(0)
                    .with_ssm_disable(true)
                    .with_vdm_disable(true)
                    .with_ufp_attach_opt_en(true),
            )
            .await?;
        self.bus
            .modify(|r: PlugCtrlPd12| r.with_pd1_manual_on(false).with_pd2_manual_on(false))
            .await?;

        self.bus.write(Register::PlugCtrlSetRd2, threshold::MV_599).await?;
        self.bus.write(Register::PlugCtrlSetRp2, threshold::MV_1198).await?;
        self.set_threshold(ThresholdKind::Rd, threshold::MV_257).await?;
        self.set_threshold(ThresholdKind::Rp, threshold::MAX).await?;

        if self.config.vconn_en {
            self.bus
                .modify(|r: PlugCtrlRpRd| r.with_manual(PullOverride::Off))
                .await?;
            self.bus
                .modify(|r: PlugCtrlRpRd| r.with_vconn_pin(VconnPin::None).with_vconn_manual_en(true))
                .await?;
        }

        Ok(())
    }

    /// Reset the protocol block, and forget the first GoodCRC.
    pub(super) async fn soft_reset(&mut self) -> Result<(), Error> {
        self.bus.store(MsgSendCon::OP_MODE_HARD_EN).await?;
        self.delay(TimerType::SoftResetSettle).await;
        self.set_manual_retry(false).await?;
        self.shared.mailbox.clear();
        self.state.first_goodcrc = false;
        self.soft_reset_pulse().await
    }

    pub(super) async fn soft_reset_pulse(&mut self) -> Result<(), Error> {
        self.bus.store(Etc(0).with_soft_reset(true)).await?;
        self.bus.store(Etc(0)).await?;
        Ok(())
    }

    /// Signal hard reset. Nothing is sent while a RID is latched.
    pub(super) async fn hard_reset(&mut self) -> Result<(), Error> {
        if self.state.rid.is_latched() {
            info!("Hard reset skipped, RID {:?} is latched", self.state.rid);
            return Ok(());
        }

        info!("Sending hard reset");
        self.bus.store(Retransmission(0).with_count(0)).await?;

        let send = MsgSendCon(0).with_sop(SopType::HardReset).with_op_mode(true);
        self.bus.store(send).await?;
        self.bus.store(send.with_send_msg_en(true)).await?;
        self.delay(TimerType::HardResetSignal).await;

        self.bus.store(MsgSendCon::OP_MODE_HARD_EN).await?;
        self.delay(TimerType::HardResetHold).await;
        self.bus.store(MsgSendCon::HARD_EN).await?;
        self.delay(TimerType::HardResetComplete).await;

        self.bus.store(Retransmission(0).with_count(3)).await?;
        self.soft_reset_pulse().await?;
        self.shared.mailbox.clear();
        Ok(())
    }

    /// With manual retry, the transceiver does not retransmit.
    pub(super) async fn set_manual_retry(&mut self, on: bool) -> Result<(), Error> {
        if on {
            debug!("Manual retry on");
            self.bus.store(Retransmission(0).with_count(0)).await?;
            self.state.manual_retry = true;
            Ok(())
        } else {
            self.state.manual_retry = false;
            self.set_revision(self.state.revision).await
        }
    }

    pub(super) async fn set_revision(&mut self, revision: SpecificationRevision) -> Result<(), Error> {
        if self.state.manual_retry {
            debug!("Revision {:?} kept for later, manual retry is on", revision);
            self.state.revision = revision;
            return Ok(());
        }

        let count = match revision {
            SpecificationRevision::R3_X => RETRIES_R3_X,
            SpecificationRevision::R2_0 => RETRIES_R2_0,
            SpecificationRevision::R1_0 => {
                warn!("Revision {:?} is not supported", revision);
                return Ok(());
            }
        };

        self.bus.store(Retransmission(0).with_count(count)).await?;
        self.state.revision = revision;
        Ok(())
    }

    /// Count sink capability exchanges. From the second one on, retries are manual.
    pub(super) async fn give_sink_cap(&mut self) -> Result<(), Error> {
        self.state.give_sink_cap = self.state.give_sink_cap.saturating_add(1);

        if self.state.give_sink_cap >= 2 && !self.state.manual_retry {
            self.delay(TimerType::SinkCapRetry).await;
            self.set_manual_retry(true).await?;
        }

        Ok(())
    }

    pub(super) async fn driver_reset(&mut self) -> Result<(), Error> {
        self.shared.mailbox.clear();
        *self.received = None;
        self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
        Ok(())
    }

    pub(super) async fn op_mode(&mut self, enable: bool) -> Result<(), Error> {
        if enable {
            self.bus.modify(|r: MsgSendCon| r.with_op_mode(true)).await?;
        } else {
            self.bus.store(MsgSendCon(0)).await?;
        }
        Ok(())
    }

    pub(super) async fn tx_msg(&mut self, header: Header, objects: &[u32]) -> Result<(), Error> {
        if self.state.detach_valid {
            debug!("Transmit skipped while detached");
            return Ok(());
        }

        Ok(self.protocol_layer().transmit(header, objects).await?)
    }

    /// Start (`true`) or stop counting Accept and PS_RDY for the PPS timing check.
    ///
    /// While counting, message type interrupts fire with the RX header rather than with
    /// message-pass.
    pub(super) async fn check_pps_irq(&mut self, enable: bool) -> Result<(), Error> {
        self.state.check_pps_irq = enable;
        if enable {
            self.state.pps_irq = Default::default();
        }
        self.bus.modify(|r: PpsCtrl| r.with_msg_irq_sel(!enable)).await?;
        Ok(())
    }

    pub(super) async fn pps_enable(&mut self, max_current: Option<ElectricCurrent>) -> Result<(), Error> {
        match max_current {
            Some(current) => {
                let steps = u8::try_from(current.get::<milliampere>() / 50).unwrap_or(u8::MAX);
                info!("PPS on, {} mA max", current.get::<milliampere>());

                self.bus.modify(|r: MsgSendCon| r.with_op_mode(false)).await?;
                self.bus
                    .modify(|r: PlugCtrlVbusMux| r.with_send_en_clear_sel(true))
                    .await?;
                self.bus
                    .modify(|r: PpsCtrl| r.with_pps_enable(true).with_pps_timer(PPS_TIMER_8S))
                    .await?;
                self.bus.write(Register::PpsMinCurrent, PPS_MIN_CURRENT).await?;
                self.bus.write(Register::PpsMaxCurrent, steps).await?;
                self.bus.set_interrupt_mask(InterruptMask::PPS).await?;
            }
            None => {
                debug!("PPS off");
                self.bus.modify(|r: MsgSendCon| r.with_op_mode(true)).await?;
                self.bus
                    .modify(|r: PlugCtrlVbusMux| r.with_send_en_clear_sel(false))
                    .await?;
                self.bus
                    .modify(|r: PpsCtrl| r.with_pps_enable(false).with_pps_timer(0))
                    .await?;
                self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
            }
        }

        self.state.pps_enabled = max_current.is_some();
        Ok(())
    }

    /// Pulse the analog reset bits of the PHY.
    async fn self_reset(&mut self) -> Result<(), Error> {
        const PHY01_RESET: u8 = 1 << 1;
        const PHY08_RESET: u8 = 1 << 5;
        const PHY00_RESET: u8 = 1 << 1;

        let value = self.bus.read(Register::PhyCtrl01).await?;
        self.bus.write(Register::PhyCtrl01, value | PHY01_RESET).await?;
        self.bus.write(Register::PhyCtrl01, value & !PHY01_RESET).await?;

        for (register, bit) in [(Register::PhyCtrl08, PHY08_RESET), (Register::PhyCtrl00, PHY00_RESET)] {
            let value = self.bus.read(register).await?;
            self.bus.write(register, value & !bit).await?;
            self.bus.write(register, value | bit).await?;
            self.bus.write(register, value & !bit).await?;
        }

        Ok(())
    }

    /// Reset the transceiver, program it from scratch and re-detect the plug.
    pub(super) async fn usbpd_reset(&mut self) -> Result<(), Error> {
        info!("Transceiver reset");
        self.self_reset().await?;
        self.delay(TimerType::SelfResetSettle).await;

        self.bus.set_interrupt_mask(InterruptMask::ENABLED).await?;
        let _ = self.bus.read_interrupt_status::<TIMER>(false).await?;

        let shared = self.shared;
        {
            let mut low_power = shared.low_power.lock().await;
            self.set_normal_mode(&mut low_power).await?;
        }

        self.reg_init().await?;
        shared.schedule_attach();
        Ok(())
    }
}
