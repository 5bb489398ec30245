use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use uom::si::electric_current::milliampere;
use uom::si::u32::ElectricCurrent;

use super::*;
use crate::PowerRole;
use crate::device_policy_manager::{Notification, PolicyCommand, UsbRole};
use crate::dummy::{DpmCall, DummyTimer, MockTransport, RecordingDpm};
use crate::protocol_layer::message::header::SpecificationRevision;
use crate::registers::{
    FsmInput, InterruptMask, MsgSendCon, NUM_INT_STATUS, PlugCtrl, PlugCtrlMsg, PlugCtrlPd12, PlugCtrlPort,
    PlugCtrlRpRd, PortMode, PpsCtrl, Register, VconnPin,
};

type TestPort = Port<NoopRawMutex, MockTransport, DummyTimer, RecordingDpm>;

fn port() -> TestPort {
    Port::new(MockTransport::new(), RecordingDpm::default(), Config::default())
}

fn port_with(config: Config) -> TestPort {
    Port::new(MockTransport::new(), RecordingDpm::default(), config)
}

fn interrupts(int0: u8, int4: u8) -> [u8; NUM_INT_STATUS] {
    let mut status = [0; NUM_INT_STATUS];
    status[0] = int0;
    status[4] = int4;
    status
}

const GOODCRC: u8 = 1 << 2;
const MSG_PASS: u8 = 1 << 1;
const MSG_ERROR: u8 = 1 << 0;
const PLUG_IRQ: u8 = 1 << 3;
const PD12_DET: u8 = 1 << 5;
const WAKEUP: u8 = 1 << 7;
const HARD_RESET: u8 = 1 << 0;

const PLUG_SINK: u8 = 0b001;
const PLUG_SOURCE: u8 = 0b010;
const CC1_RD: u8 = 0x02;

/// A timer that yields to the executor once, so that racing futures interleave.
struct YieldTimer;

impl Timer for YieldTimer {
    async fn after_millis(_milliseconds: u64) {
        tokio::task::yield_now().await
    }
}

fn accept_header() -> u16 {
    Header(0)
        .with_spec_revision(SpecificationRevision::R3_X)
        .with_message_type_raw(3)
        .with_num_objects(0)
        .0
}

#[tokio::test]
async fn cc_lockout_forces_open() {
    let port = port();
    let mut inner = port.inner.lock().await;
    inner.state.manual_cc_open = CcOpenReasons::default().with_hiccup(true);

    port.context(&mut inner).set_cc_state(CcState::Rd).await.unwrap();

    assert_eq!(inner.state.cc_state, CcState::Open);
    let mode = PlugCtrlPort(inner.bus.transport().get(Register::PlugCtrlPort)).mode();
    assert_eq!(mode, PortMode::Dfp);
}

#[tokio::test]
async fn latched_rid_refuses_cc_change() {
    let port = port();
    let mut inner = port.inner.lock().await;
    inner.state.rid = Rid::R523k;

    port.context(&mut inner).set_cc_state(CcState::Drp).await.unwrap();

    assert_eq!(inner.state.cc_state, CcState::Default);
    assert_eq!(inner.bus.transport().write_count(), 0);
}

#[tokio::test]
async fn detach_resets_session() {
    let port = port();
    let mut inner = port.inner.lock().await;
    inner.state = PortState {
        detach_valid: false,
        rp_level: RpLevel::Rp330,
        rid: Rid::R301k,
        pd_support: true,
        pps_enabled: true,
        check_pps_irq: true,
        give_sink_cap: 3,
        first_goodcrc: true,
        source_cap_received: true,
        pr_swap: true,
        vbus_short_checked: true,
        pd_vbus_short_checked: true,
        vbus_short: true,
        killer: true,
        cc_instead_of_vbus: true,
        factory_mode: true,
        usb: UsbRole::Device,
        ..PortState::default()
    };

    let mut context = port.context(&mut inner);
    context.detach_init().await.unwrap();
    context.notify_detach().await;

    let state = inner.state;
    assert!(state.detach_valid);
    assert_eq!(state.rp_level, RpLevel::Rp80);
    assert_eq!(state.rid, Rid::Max);
    assert!(!state.pd_support);
    assert!(!state.pps_enabled);
    assert!(!state.check_pps_irq);
    assert_eq!(state.give_sink_cap, 0);
    assert!(!state.first_goodcrc);
    assert!(!state.source_cap_received);
    assert!(!state.pr_swap);
    assert!(!state.vbus_short_checked);
    assert!(!state.pd_vbus_short_checked);
    assert!(!state.vbus_short);
    assert!(!state.killer);
    assert!(!state.cc_instead_of_vbus);
    assert!(!state.factory_mode);
    assert_eq!(state.usb, UsbRole::Detached);
    assert_eq!(
        inner.dpm.commands(),
        [PolicyCommand::PlugDetach, PolicyCommand::Reinit, PolicyCommand::ExitModes]
    );
}

#[tokio::test]
async fn dispatch_orders_soft_reset_detach_attach() {
    let port = port();
    port.inner
        .lock()
        .await
        .bus
        .transport()
        .set(Register::PlugMon2, 0b001);

    port.shared.mailbox.post(EventKind::Attach);
    port.shared.mailbox.post(EventKind::Detach);
    port.shared.mailbox.post(EventKind::SoftReset);
    port.service().await;

    let inner = port.inner.lock().await;
    assert_eq!(
        inner.dpm.commands(),
        [
            PolicyCommand::SoftResetReceived,
            PolicyCommand::PlugDetach,
            PolicyCommand::Reinit,
            PolicyCommand::ExitModes,
            PolicyCommand::PlugAttach,
            PolicyCommand::Kick,
        ]
    );
    assert!(!inner.state.detach_valid);
    assert_eq!(inner.state.power_role, PortRole::Sink);
    assert!(port.shared.mailbox.snapshot().is_empty());
}

#[tokio::test]
async fn first_goodcrc_drops_message_pass() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        let transport = inner.bus.transport();
        transport.queue_interrupts(interrupts(GOODCRC, MSG_PASS));
        transport.queue_interrupts(interrupts(GOODCRC, MSG_PASS));
        transport.queue_rx_header(accept_header());
    }

    port.poll_status().await.unwrap();
    assert!(port.get_status(EventKind::GoodCrc));
    assert!(!port.get_status(EventKind::MessagePass));
    assert!(port.rx_msg().await.is_none());

    port.poll_status().await.unwrap();
    assert!(port.get_status(EventKind::MessagePass));
    let message = port.rx_msg().await.unwrap();
    assert_eq!(message.header.0, accept_header());
}

#[tokio::test]
async fn goodcrc_quirk_can_be_disabled() {
    let port = port_with(Config {
        first_goodcrc_quirk: false,
        ..Default::default()
    });
    {
        let mut inner = port.inner.lock().await;
        let transport = inner.bus.transport();
        transport.queue_interrupts(interrupts(GOODCRC, MSG_PASS));
        transport.queue_rx_header(accept_header());
    }

    port.poll_status().await.unwrap();
    assert!(port.get_status(EventKind::MessagePass));
}

#[tokio::test]
async fn hard_reset_with_latched_rid_is_silent() {
    let port = port();
    port.inner.lock().await.state.rid = Rid::R619k;

    port.hard_reset().await.unwrap();

    assert_eq!(port.inner.lock().await.bus.transport().write_count(), 0);
}

#[tokio::test]
async fn hard_reset_sequence() {
    let port = port();
    port.shared.mailbox.post(EventKind::Accept);

    port.hard_reset().await.unwrap();

    let mut inner = port.inner.lock().await;
    let transport = inner.bus.transport();
    assert_eq!(
        transport.writes(Register::MsgSendCon),
        [0x16, 0x17, MsgSendCon::OP_MODE_HARD_EN.0, MsgSendCon::HARD_EN.0]
    );
    assert_eq!(transport.writes(Register::Retransmission), [0x00, 0x30]);
    assert_eq!(transport.writes(Register::Etc), [0x04, 0x00]);
    assert!(port.shared.mailbox.snapshot().is_empty());
}

#[tokio::test]
async fn source_attach_end_to_end() {
    let port = port_with(Config {
        vconn_en: true,
        ..Default::default()
    });
    {
        let mut inner = port.inner.lock().await;
        let transport = inner.bus.transport();
        transport.set(Register::PlugMon2, 0b010);
        transport.set(Register::PlugMon1, 0x02);
        transport.queue_interrupts(interrupts(0, PLUG_IRQ));
    }

    port.on_interrupt();
    port.service().await;

    let mut inner = port.inner.lock().await;
    let attached: Vec<_> = inner
        .dpm
        .notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::Attach { attached: true, .. }))
        .collect();
    assert_eq!(
        attached,
        [Notification::Attach {
            attached: true,
            source: true
        }]
    );
    assert_eq!(
        inner.dpm.commands(),
        [PolicyCommand::PlugAttach, PolicyCommand::Kick]
    );
    assert!(inner.dpm.calls.contains(&DpmCall::OtgVctrl(true)));

    assert!(!inner.state.detach_valid);
    assert!(inner.state.first_attach);
    assert!(inner.state.vconn_source);
    assert_eq!(inner.state.power_role, PortRole::Source);
    assert_eq!(inner.state.data_role, DataRole::Dfp);

    let rprd = PlugCtrlRpRd(inner.bus.transport().get(Register::PlugCtrlRpRd));
    assert_eq!(rprd.vconn_pin(), VconnPin::Pd2);
}

#[tokio::test]
async fn accessory_abandons_attach() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        let transport = inner.bus.transport();
        transport.set(Register::PlugMon2, 0b010);
        transport.set(Register::PlugMon1, 0x22);
    }
    port.shared.mailbox.post(EventKind::Attach);

    port.service().await;

    let inner = port.inner.lock().await;
    assert!(inner.state.detach_valid);
    assert!(inner.dpm.commands().is_empty());
}

#[tokio::test]
async fn rid_changes_are_reported_once() {
    let port = port();
    let mut inner = port.inner.lock().await;
    inner.bus.transport().queue_reads(Register::AdcStatus, &[0, 3, 5, 5]);

    let mut context = port.context(&mut inner);
    for _ in 0..4 {
        context.check_rid().await.unwrap();
    }

    let rids: Vec<_> = inner
        .dpm
        .notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::Rid(_)))
        .collect();
    assert_eq!(rids, [Notification::Rid(Rid::R255k), Notification::Rid(Rid::R523k)]);
    assert!(inner.state.factory_mode);
}

#[tokio::test]
async fn open_to_none_rid_is_quiet() {
    let port = port();
    let mut inner = port.inner.lock().await;
    inner.bus.transport().queue_reads(Register::AdcStatus, &[7, 9]);

    let mut context = port.context(&mut inner);
    context.check_rid().await.unwrap();
    context.check_rid().await.unwrap();

    assert_eq!(inner.state.rid, Rid::Open);
    assert!(inner.dpm.notifications().is_empty());
}

#[tokio::test]
async fn hardreset_flag_clears_once() {
    let port = port();

    port.check_hardreset();
    port.check_hardreset();
    assert!(port.is_hardreset_pending());

    select(port.hardreset_loop(), tokio::task::yield_now()).await;
    assert!(!port.is_hardreset_pending());
}

#[tokio::test]
async fn vconn_needs_board_support() {
    let port = port();
    assert_eq!(port.set_vconn_source(true).await, Err(Error::VconnUnsupported));
}

#[tokio::test]
async fn threshold_is_bounded() {
    let port = port();
    assert_eq!(
        port.set_threshold(ThresholdKind::Rd, 64).await,
        Err(Error::InvalidThreshold(64))
    );

    port.set_threshold(ThresholdKind::Rd, 63).await.unwrap();
    assert_eq!(port.snapshot().await.rd_threshold, 63);
}

#[tokio::test]
async fn plug_interrupt_in_low_power_is_deferred() {
    let port = port();
    port.enter_low_power().await.unwrap();
    assert!(port.is_low_power().await);

    port.inner
        .lock()
        .await
        .bus
        .transport()
        .queue_interrupts(interrupts(0, PLUG_IRQ));
    port.poll_status().await.unwrap();

    assert!(!port.get_status(EventKind::Attach));
    assert!(port.shared.low_power_retry.signaled());

    port.exit_low_power().await.unwrap();
    assert!(!port.is_low_power().await);
    assert_eq!(port.snapshot().await.cc_state, CcState::Drp);
}

#[tokio::test]
async fn low_power_entry_detaches() {
    let port = port();
    port.inner.lock().await.state.detach_valid = false;

    port.enter_low_power().await.unwrap();

    let inner = port.inner.lock().await;
    assert!(inner.state.detach_valid);
    assert!(inner.dpm.commands().contains(&PolicyCommand::PlugDetach));
}

#[tokio::test]
async fn water_is_reported_on_edges() {
    let port = port();

    port.set_water_status(WaterStatus::Water).await.unwrap();
    port.set_water_status(WaterStatus::Water).await.unwrap();
    assert_eq!(port.snapshot().await.cc_state, CcState::Rd);

    port.set_water_status(WaterStatus::Dry).await.unwrap();

    let mut inner = port.inner.lock().await;
    let water: Vec<_> = inner
        .dpm
        .notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::Water(_)))
        .collect();
    assert_eq!(water, [Notification::Water(true), Notification::Water(false)]);
    assert_eq!(inner.state.cc_state, CcState::Drp);
    assert_eq!(
        inner.bus.transport().bulk_written(Register::IntMask0),
        Some(InterruptMask::ENABLED.0.to_vec())
    );
}

#[tokio::test]
async fn wet_port_refuses_plug_interrupt() {
    let port = port();
    port.set_water_status(WaterStatus::Water).await.unwrap();

    port.inner
        .lock()
        .await
        .bus
        .transport()
        .queue_interrupts(interrupts(0, PLUG_IRQ));
    port.poll_status().await.unwrap();

    assert!(!port.get_status(EventKind::Attach));
}

#[tokio::test]
async fn abnormal_otg_device_keeps_vbus_off() {
    let port = port();
    port.muic_notification(MuicEvent::AbnormalOtgAttach).await.unwrap();
    port.set_otg_control(true).await;

    let inner = port.inner.lock().await;
    assert!(inner.state.killer);
    assert!(!inner.dpm.calls.contains(&DpmCall::Vbus(true)));
}

#[tokio::test]
async fn pps_limits_follow_max_current() {
    let port = port();
    port.pps_enable(Some(ElectricCurrent::new::<milliampere>(3000)))
        .await
        .unwrap();

    {
        let mut inner = port.inner.lock().await;
        assert!(inner.state.pps_enabled);
        let transport = inner.bus.transport();
        assert_eq!(transport.get(Register::PpsMinCurrent), 20);
        assert_eq!(transport.get(Register::PpsMaxCurrent), 60);
        assert!(PpsCtrl(transport.get(Register::PpsCtrl)).pps_enable());
        assert_eq!(transport.bulk_written(Register::IntMask0), Some(InterruptMask::PPS.0.to_vec()));
    }

    port.pps_enable(None).await.unwrap();
    assert!(!port.snapshot().await.pps_enabled);
}

#[tokio::test]
async fn second_sink_cap_switches_to_manual_retry() {
    let port = port();

    port.give_sink_cap().await.unwrap();
    assert!(!port.snapshot().await.manual_retry);

    port.give_sink_cap().await.unwrap();
    assert!(port.snapshot().await.manual_retry);
    assert_eq!(
        port.inner
            .lock()
            .await
            .bus
            .transport()
            .writes(Register::Retransmission),
        [0x00]
    );
}

#[tokio::test]
async fn revision_selects_retransmissions() {
    let port = port();

    port.set_revision(SpecificationRevision::R2_0).await.unwrap();
    port.set_revision(SpecificationRevision::R3_X).await.unwrap();

    assert_eq!(
        port.inner
            .lock()
            .await
            .bus
            .transport()
            .writes(Register::Retransmission),
        [0x30, 0x20]
    );
}

#[tokio::test]
async fn transmit_is_skipped_while_detached() {
    let port = port();
    let header = Header(0).with_message_type_raw(3);

    port.tx_msg(header, &[]).await.unwrap();

    assert_eq!(port.inner.lock().await.bus.transport().bulk_written(Register::MsgTxHeader), None);
}

#[tokio::test]
async fn message_id_wraps() {
    let port = port();
    for _ in 0..8 {
        port.increment_message_id().await;
    }
    assert_eq!(port.message_id().await.value(), 0);
}

#[tokio::test]
async fn failed_side_effect_keeps_later_events() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        inner.state.pd_support = true;
        inner.state.first_goodcrc = true;
        let transport = inner.bus.transport();
        transport.fail_register(Register::MsgSendCon);
        transport.queue_interrupts(interrupts(GOODCRC, MSG_PASS));
        transport.queue_rx_header(accept_header());
    }

    assert!(port.poll_status().await.is_err());

    assert!(port.get_status(EventKind::GoodCrc));
    assert!(port.get_status(EventKind::MessagePass));
    assert_eq!(port.rx_msg().await.unwrap().header.0, accept_header());
    assert_eq!(port.hardware_errors().await, 1);
}

#[tokio::test]
async fn message_error_recovers_transmitter() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        inner.state.pd_support = true;
        inner.state.give_sink_cap = 2;
        inner.state.manual_retry = true;
        inner.state.message_id = Counter::new_from_value(CounterType::MessageId, 3);
        let transport = inner.bus.transport();
        transport.set(Register::MsgSendCon, MsgSendCon::HARD_EN.with_send_msg_en(true).0);
        transport.queue_interrupts(interrupts(0, MSG_ERROR));
    }

    port.poll_status().await.unwrap();

    assert!(port.get_status(EventKind::MessageError));
    let mut inner = port.inner.lock().await;
    assert_eq!(inner.state.message_id.value(), 2);
    assert_eq!(inner.dpm.commands(), [PolicyCommand::RequestSoftReset]);
    let send = MsgSendCon(inner.bus.transport().get(Register::MsgSendCon));
    assert!(!send.send_msg_en());
    assert!(send.hard_en());
}

#[tokio::test]
async fn message_error_without_pd_keeps_message_id() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        inner.state.give_sink_cap = 2;
        inner.state.message_id = Counter::new_from_value(CounterType::MessageId, 3);
        inner.bus.transport().queue_interrupts(interrupts(0, MSG_ERROR));
    }

    port.poll_status().await.unwrap();

    let inner = port.inner.lock().await;
    assert_eq!(inner.state.message_id.value(), 3);
    assert!(inner.dpm.commands().is_empty());
}

#[tokio::test]
async fn hard_reset_received_restarts_protocol() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        inner.state.detach_valid = false;
        inner.state.power_role = PortRole::Source;
        inner.state.data_role = DataRole::Ufp;
        inner.state.first_goodcrc = true;
        let transport = inner.bus.transport();
        transport.set(Register::PlugCtrl, PlugCtrl(0).with_eco_src_cap_rdy(true).0);
        let mut status = [0; NUM_INT_STATUS];
        status[5] = HARD_RESET;
        transport.queue_interrupts(status);
    }
    port.shared.mailbox.post(EventKind::Accept);

    port.service().await;

    assert!(port.shared.mailbox.snapshot().is_empty());
    let mut inner = port.inner.lock().await;
    assert_eq!(
        inner.dpm.commands(),
        [PolicyCommand::HardResetReceived, PolicyCommand::Kick]
    );
    assert_eq!(inner.state.data_role, DataRole::Dfp);
    assert!(!inner.state.first_goodcrc);

    let transport = inner.bus.transport();
    assert_eq!(PlugCtrlMsg(transport.get(Register::PlugCtrlMsg)).data_role(), DataRole::Dfp);
    assert!(!PlugCtrl(transport.get(Register::PlugCtrl)).eco_src_cap_rdy());
    assert_eq!(transport.writes(Register::Etc), [0x04, 0x00]);
}

#[tokio::test]
async fn detach_is_ignored_while_rid_is_latched() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        inner.state.detach_valid = false;
        inner.bus.transport().set(Register::AdcStatus, 5);
    }
    port.shared.mailbox.post(EventKind::Detach);

    port.service().await;

    let inner = port.inner.lock().await;
    assert!(!inner.state.detach_valid);
    assert_eq!(inner.state.rid, Rid::R523k);
    assert!(inner.dpm.calls.is_empty());
}

#[tokio::test]
async fn try_snk_settles_as_sink() {
    let port = port_with(Config {
        try_snk: true,
        ..Default::default()
    });
    {
        let mut inner = port.inner.lock().await;
        let transport = inner.bus.transport();
        transport.queue_reads(Register::PlugMon2, &[PLUG_SOURCE, PLUG_SINK]);
        transport.set(Register::PlugMon1, CC1_RD);
    }
    port.shared.mailbox.post(EventKind::Attach);

    port.service().await;

    let mut inner = port.inner.lock().await;
    assert_eq!(inner.state.power_role, PortRole::Sink);
    assert_eq!(inner.dpm.commands(), [PolicyCommand::PlugAttach, PolicyCommand::Kick]);
    assert!(inner.dpm.notifications().contains(&Notification::Attach {
        attached: true,
        source: false
    }));

    let transport = inner.bus.transport();
    assert_eq!(PlugCtrlPd12(transport.get(Register::PlugCtrlPd12)).fsm_input(), FsmInput::AttachedSnk);
    assert!(!PlugCtrlRpRd(transport.get(Register::PlugCtrlRpRd)).fsm_manual_en());
}

#[tokio::test]
async fn try_snk_falls_back_to_source() {
    let port = port_with(Config {
        try_snk: true,
        ..Default::default()
    });
    {
        let mut inner = port.inner.lock().await;
        let transport = inner.bus.transport();
        transport.set(Register::PlugMon2, PLUG_SOURCE);
        transport.set(Register::PlugMon1, CC1_RD);
        // Rd at attach, open during Try.SNK, then Rd again in Try.Wait.SRC.
        let mut reads = [0; 21];
        reads[0] = CC1_RD;
        transport.queue_reads(Register::PlugMon1, &reads);
    }
    port.shared.mailbox.post(EventKind::Attach);

    port.service().await;

    let mut inner = port.inner.lock().await;
    assert_eq!(inner.state.power_role, PortRole::Source);
    assert!(inner.dpm.notifications().contains(&Notification::Attach {
        attached: true,
        source: true
    }));

    let transport = inner.bus.transport();
    assert_eq!(PlugCtrlPd12(transport.get(Register::PlugCtrlPd12)).fsm_input(), FsmInput::AttachedSrc);
    assert!(!PlugCtrlRpRd(transport.get(Register::PlugCtrlRpRd)).fsm_manual_en());
}

#[tokio::test]
async fn try_snk_escapes_on_time_limit() {
    let port: Port<NoopRawMutex, MockTransport, YieldTimer, RecordingDpm> = Port::new(
        MockTransport::new(),
        RecordingDpm {
            vbus_millivolts: Some(0),
            ..Default::default()
        },
        Config {
            try_snk: true,
            ..Default::default()
        },
    );
    {
        let mut inner = port.inner.lock().await;
        let transport = inner.bus.transport();
        transport.queue_reads(Register::PlugMon2, &[PLUG_SOURCE, PLUG_SINK]);
        transport.set(Register::PlugMon1, CC1_RD);
    }
    port.shared.mailbox.post(EventKind::Attach);

    // Rd never qualifies without VBUS, only the time limit ends the debounce.
    port.service().await;

    let mut inner = port.inner.lock().await;
    assert_eq!(inner.state.power_role, PortRole::Sink);
    assert!(!inner.state.detach_valid);
    let fsm = PlugCtrlPd12(inner.bus.transport().get(Register::PlugCtrlPd12)).fsm_input();
    assert_eq!(fsm, FsmInput::AttachedSnk);
}

#[tokio::test]
async fn wakeup_resets_transceiver() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        let mut status = [0; NUM_INT_STATUS];
        status[2] = WAKEUP;
        inner.bus.transport().queue_interrupts(status);
    }

    port.poll_status().await.unwrap();

    assert!(port.shared.plug_work.signaled());
    assert!(port.get_status(EventKind::Attach));
    assert!(!port.is_low_power().await);

    let mut inner = port.inner.lock().await;
    let transport = inner.bus.transport();
    assert_eq!(transport.writes(Register::PhyCtrl01), [0x02, 0x00]);
    assert_eq!(transport.bulk_written(Register::IntMask0), Some(InterruptMask::ENABLED.0.to_vec()));
}

#[tokio::test]
async fn pd12_detection_unmasks_interrupts() {
    let port = port();
    port.inner
        .lock()
        .await
        .bus
        .transport()
        .queue_interrupts(interrupts(0, PD12_DET));

    port.poll_status().await.unwrap();

    let mut inner = port.inner.lock().await;
    let transport = inner.bus.transport();
    assert_eq!(transport.bulk_written(Register::IntMask0), Some(InterruptMask::ENABLED.0.to_vec()));
    assert!(transport.writes(Register::PhyCtrl01).is_empty());
}

#[tokio::test]
async fn forced_dfp_detaches_and_reattaches() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        inner.state.detach_valid = false;
        inner.state.power_role = PortRole::Sink;
    }

    port.rprd_mode_change(RprdMode::Dfp).await.unwrap();

    assert!(port.shared.plug_work.signaled());
    assert!(port.get_status(EventKind::Attach));

    let mut inner = port.inner.lock().await;
    assert!(inner.state.detach_valid);
    assert_eq!(
        inner.dpm.commands(),
        [PolicyCommand::PlugDetach, PolicyCommand::Reinit, PolicyCommand::ExitModes]
    );

    let transport = inner.bus.transport();
    assert_eq!(PlugCtrlPd12(transport.get(Register::PlugCtrlPd12)).fsm_input(), FsmInput::None);
    assert!(!PlugCtrlRpRd(transport.get(Register::PlugCtrlRpRd)).fsm_manual_en());
}

#[tokio::test]
async fn mode_change_to_drp_only_sets_port_mode() {
    let port = port();

    port.rprd_mode_change(RprdMode::Drp).await.unwrap();

    let mut inner = port.inner.lock().await;
    assert!(inner.dpm.calls.is_empty());
    let mode = PlugCtrlPort(inner.bus.transport().get(Register::PlugCtrlPort)).mode();
    assert_eq!(mode, PortMode::Drp);
}

#[tokio::test]
async fn mode_change_is_skipped_in_low_power() {
    let port = port();
    port.enter_low_power().await.unwrap();
    port.inner.lock().await.bus.transport().clear_log();

    port.rprd_mode_change(RprdMode::Ufp).await.unwrap();

    assert_eq!(port.inner.lock().await.bus.transport().write_count(), 0);
    assert!(!port.shared.plug_work.signaled());
}

#[tokio::test]
async fn power_role_swap_drives_fsm() {
    let port = port();
    {
        let mut inner = port.inner.lock().await;
        inner.state.detach_valid = false;
        inner.state.power_role = PortRole::Sink;
    }

    port.set_power_role(PortRole::Source).await.unwrap();
    {
        let mut inner = port.inner.lock().await;
        assert!(inner.state.pr_swap);
        assert_eq!(inner.state.power_role, PortRole::Source);
        let transport = inner.bus.transport();
        assert_eq!(PlugCtrlMsg(transport.get(Register::PlugCtrlMsg)).power_role(), PowerRole::Source);
        assert_eq!(PlugCtrlPd12(transport.get(Register::PlugCtrlPd12)).fsm_input(), FsmInput::AttachedSrc);
        assert!(PlugCtrlRpRd(transport.get(Register::PlugCtrlRpRd)).fsm_manual_en());
    }

    port.set_power_role(PortRole::Drp).await.unwrap();

    let mut inner = port.inner.lock().await;
    assert!(!inner.state.pr_swap);
    assert_eq!(inner.state.power_role, PortRole::Source);
    let transport = inner.bus.transport();
    assert_eq!(PlugCtrlPd12(transport.get(Register::PlugCtrlPd12)).fsm_input(), FsmInput::None);
    assert!(!PlugCtrlRpRd(transport.get(Register::PlugCtrlRpRd)).fsm_manual_en());
}

#[tokio::test]
async fn data_role_swap_hands_usb_to_host() {
    let port = port();
    port.inner.lock().await.state.usb = UsbRole::Device;

    port.set_data_role(DataRole::Dfp).await.unwrap();

    assert_eq!(port.data_role().await, DataRole::Dfp);
    let mut inner = port.inner.lock().await;
    assert_eq!(inner.state.usb, UsbRole::Host);
    assert_eq!(
        inner.dpm.notifications(),
        [
            Notification::DataRoleSwap,
            Notification::Usb(UsbRole::Detached),
            Notification::Attach {
                attached: true,
                source: true
            },
            Notification::Usb(UsbRole::Host),
        ]
    );
    let role = PlugCtrlMsg(inner.bus.transport().get(Register::PlugCtrlMsg)).data_role();
    assert_eq!(role, DataRole::Dfp);
}
