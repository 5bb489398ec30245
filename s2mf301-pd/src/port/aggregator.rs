//! Status aggregation and dispatch.
//!
//! The aggregator turns raw interrupt status into mailbox events, with the few side
//! effects that cannot wait for dispatch. The dispatcher then consumes events in a fixed
//! priority: soft reset, detach, hard reset, then attach and RID.
use embassy_sync::blocking_mutex::raw::RawMutex;
use s2mf301_traits::RegisterTransport;

use super::{Error, Locked};
use crate::device_policy_manager::{DevicePolicyManager, PolicyCommand};
use crate::protocol_layer::classify::classify;
use crate::protocol_layer::message::header::{ControlMessageType, MessageType};
use crate::registers::{InterruptMask, InterruptStatus, MsgSendCon, PlugCtrlMsg, RpLevel};
use crate::status::{EventKind, StatusSet};
use crate::timers::Timer;
use crate::water::WaterInterlock;
use crate::{DataRole, PortRole};

/// Events that a soft reset from the partner leaves pending.
fn plug_events() -> StatusSet {
    [
        EventKind::Attach,
        EventKind::Detach,
        EventKind::Rid,
        EventKind::HardReset,
    ]
    .into_iter()
    .collect()
}

/// Log a failed side effect of aggregation, keeping the first error.
///
/// The status registers clear on read, so aggregation must run to the end.
fn keep_first(first: &mut Option<Error>, step: &str, result: Result<(), Error>) {
    if let Err(e) = result {
        warn!("{} failed during aggregation: {}", step, e);
        if first.is_none() {
            *first = Some(e);
        }
    }
}

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock>
    Locked<'_, M, BUS, TIMER, DPM, WATER>
{
    /// Read the interrupt status and merge it into the mailbox.
    ///
    /// A failing side effect does not stop aggregation. All events are posted, and the
    /// first error is returned.
    pub(super) async fn poll_status(&mut self) -> Result<(), Error> {
        let mut status = self
            .bus
            .read_interrupt_status::<TIMER>(self.config.bulk_read_retry)
            .await?;

        if status.is_idle() {
            return Ok(());
        }

        trace!("Interrupt status {:?}", status.0);

        let mut events = StatusSet::new();
        let result = self.aggregate(&mut status, &mut events).await;
        self.shared.mailbox.merge(events);
        result
    }

    async fn aggregate(&mut self, status: &mut InterruptStatus, events: &mut StatusSet) -> Result<(), Error> {
        let shared = self.shared;
        let mut first_error = None;

        if status.int0().goodcrc() && !self.state.first_goodcrc {
            self.state.first_goodcrc = true;

            let int4 = status.int4();
            if self.config.first_goodcrc_quirk && int4.msg_pass() && !status.int2().msg_request() {
                debug!("Dropping message pass of the first GoodCRC");
                status.set_int4(int4.with_msg_pass(false));
            }
        }

        let (int0, int1, int2, int3, int4, int5) = (
            status.int0(),
            status.int1(),
            status.int2(),
            status.int3(),
            status.int4(),
            status.int5(),
        );

        if int2.wakeup() {
            info!("Wakeup, resetting the transceiver");
            let result = self.usbpd_reset().await;
            keep_first(&mut first_error, "Transceiver reset", result);
        }

        if int2.wakeup() || int4.pd12_det_irq() {
            let result = self.bus.set_interrupt_mask(InterruptMask::ENABLED).await;
            keep_first(&mut first_error, "Interrupt unmask", result.map_err(Error::from));
        }

        if int4.usb_detach() {
            events.insert(EventKind::Detach);
        }

        if int4.plug_irq() {
            let low_power = *shared.low_power.lock().await;

            if low_power {
                debug!("Plug interrupt in low-power mode, retrying later");
                shared.low_power_retry.signal(());
            } else if !self.state.water_detected {
                events.insert(EventKind::Attach);
            }
        }

        if int5.hard_reset() {
            events.insert(EventKind::HardReset);
        }

        if int0.goodcrc() {
            events.insert(EventKind::GoodCrc);
            if self.state.pd_support || self.state.source_cap_received {
                let result = self.op_mode(true).await;
                keep_first(&mut first_error, "Op mode", result);
            }
        }

        if int1.pr_swap() {
            events.insert(EventKind::PrSwap);
        }

        if int1.dr_swap() {
            events.insert(EventKind::DrSwap);
        }

        if int0.accept() {
            events.insert(EventKind::Accept);
            if self.state.check_pps_irq {
                self.state.pps_irq.messages += 1;
            }
        }

        if int1.psrdy() {
            events.insert(EventKind::PsRdy);
            if self.state.check_pps_irq {
                self.state.pps_irq.messages += 1;
            }
        }

        if int1.reject() {
            events.insert(EventKind::Reject);
        }

        if int2.wait() {
            events.insert(EventKind::Wait);
        }

        if int4.msg_error() {
            let result = self.message_error(events).await;
            keep_first(&mut first_error, "Message error recovery", result);
        }

        if int1.ping() {
            events.insert(EventKind::Ping);
        }

        if int1.get_snk_cap() {
            events.insert(EventKind::GetSinkCap);
        }

        if int1.get_src_cap() {
            events.insert(EventKind::GetSourceCap);
        }

        if int2.vconn_swap() {
            events.insert(EventKind::VconnSwap);
        }

        if int3.uns_cmd_data() {
            if self.state.detach_valid {
                events.insert(EventKind::Attach);
            }
            events.insert(EventKind::Rid);
        } else if int4.msg_pass() {
            let result = self.receive(events).await;
            keep_first(&mut first_error, "Receive", result);
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn message_error(&mut self, events: &mut StatusSet) -> Result<(), Error> {
        debug!("Message error");
        events.insert(EventKind::MessageError);
        let cleared = self
            .bus
            .modify(|r: MsgSendCon| r.with_send_msg_en(false))
            .await;

        if self.state.pd_support {
            self.state.message_id.rollback();
        }

        if self.state.give_sink_cap >= 2 && self.state.manual_retry {
            info!("Message error after sink capabilities, requesting soft reset");
            self.dpm.policy(PolicyCommand::RequestSoftReset).await;
        }

        cleared.map(|_| ()).map_err(Error::from)
    }

    async fn receive(&mut self, events: &mut StatusSet) -> Result<(), Error> {
        let message = self.protocol_layer().receive().await?;

        if self.state.check_pps_irq
            && matches!(
                message.header.message_type(),
                MessageType::Control(ControlMessageType::Accept | ControlMessageType::PsRdy)
            )
        {
            self.state.pps_irq.passes += 1;
        }

        let kind = classify(&message, self.state.revision);
        if kind == Some(EventKind::SourceCap) {
            self.state.source_cap_received = true;
        }
        if let Some(kind) = kind {
            events.insert(kind);
        }

        events.insert(EventKind::MessagePass);
        *self.received = Some(message);
        Ok(())
    }

    /// One dispatcher pass. The coarse lock is held by the caller.
    pub(super) async fn dispatch(&mut self) -> Result<(), Error> {
        if let Err(e) = self.poll_status().await {
            warn!("Status poll failed: {}", e);
        }

        let shared = self.shared;
        let mut handled = false;

        if shared.mailbox.take(EventKind::SoftReset) {
            info!("Soft reset received");
            shared.mailbox.retain(plug_events());
            self.state.message_id.reset();
            self.dpm.policy(PolicyCommand::SoftResetReceived).await;
            handled = true;
        }

        if shared.mailbox.take(EventKind::Detach) {
            if self.detach_blocked_by_rid().await? {
                info!("Detach ignored, RID {:?} is latched", self.state.rid);
            } else {
                self.set_rp_level(RpLevel::Rp80).await?;

                let attach = shared.mailbox.take(EventKind::Attach);
                let rid = shared.mailbox.take(EventKind::Rid);

                self.detach_init().await?;
                self.notify_detach().await;

                if attach && self.attach_or_abandon().await? {
                    if rid {
                        self.check_rid().await?;
                    }
                    self.kick().await;
                }

                return Ok(());
            }
        } else if shared.mailbox.take(EventKind::HardReset) {
            return self.hard_reset_received().await;
        }

        if shared.mailbox.take(EventKind::Attach) && !self.state.pr_swap {
            if !self.attach_or_abandon().await? {
                return Ok(());
            }
            handled = true;
        }

        if shared.mailbox.take(EventKind::Rid) {
            self.check_rid().await?;
            handled = true;
        }

        if !handled && shared.mailbox.snapshot().is_empty() {
            return Ok(());
        }

        self.kick().await;
        Ok(())
    }

    /// Run the attach sequencer. An abandoned attach is logged, register failures propagate.
    async fn attach_or_abandon(&mut self) -> Result<bool, Error> {
        match self.check_port_detect().await {
            Ok(()) => Ok(true),
            Err(e @ Error::Transport(_)) => Err(e),
            Err(e) => {
                info!("Attach abandoned: {}", e);
                Ok(false)
            }
        }
    }

    /// Run the policy engine, unless the port is in low-power mode.
    async fn kick(&mut self) {
        let low_power = self.shared.low_power.lock().await;
        if !*low_power {
            self.dpm.policy(PolicyCommand::Kick).await;
        }
    }

    async fn hard_reset_received(&mut self) -> Result<(), Error> {
        info!("Hard reset received");
        self.set_pd_control(false).await?;
        self.soft_reset().await?;
        self.shared.mailbox.clear();

        let role = if self.state.power_role == PortRole::Source {
            DataRole::Dfp
        } else {
            DataRole::Ufp
        };
        self.bus
            .modify(|r: PlugCtrlMsg| r.with_data_role(role))
            .await?;
        self.state.data_role = role;

        self.dpm.policy(PolicyCommand::HardResetReceived).await;
        self.dpm.policy(PolicyCommand::Kick).await;
        Ok(())
    }
}
