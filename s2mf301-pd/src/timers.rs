//! Timers that are used by the port core.
use core::future::Future;

/// The timer trait to implement by the user application.
pub trait Timer {
    /// Expire after the specified number of milliseconds.
    fn after_millis(milliseconds: u64) -> impl Future<Output = ()>;

    /// Expire after the specified number of microseconds.
    ///
    /// Defaults to rounding up to whole milliseconds.
    fn after_micros(microseconds: u64) -> impl Future<Output = ()> {
        Self::after_millis(microseconds.div_ceil(1000))
    }
}

/// Protocol delays used by the port core.
///
/// The hard reset pulse timings are ordered and must not be collapsed.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerType {
    /// Hard reset signalling on the line.
    HardResetSignal,
    /// Hold between op-mode release and hard-enable.
    HardResetHold,
    /// Wait for the hard reset to complete, before restoring retransmissions.
    HardResetComplete,
    SoftResetSettle,
    SinkCapRetry,
    /// Settle before re-reading a PD2.0 header.
    HeaderReread,
    /// Back-off between interrupt status read attempts.
    BulkReadRetry,
    /// Re-check of a plug event while low power mode is active.
    LowPowerRetry,
    RidSettle,
    AbnormalAttach,
    /// tDRPTry
    DrpTry,
    /// tTryCCDebounce
    TryCcDebounce,
    TrySnkPoll,
    TrySnkEscape,
    TryFsmSettle,
    TryExitSettle,
    UnattachedSettle,
    VbusRemovalPoll,
    SourceSettle(u64),
    RoleSwapSettle,
    RoleSwap,
    ForcedDetachHold,
    ForcedDetachPulse,
    HostOffSettle,
    SelfResetSettle,
    WaterCheck,
    WaterDrySettle,
    HardResetFlag,
    HiccupHold(u64),
    TimerLatch,
}

impl TimerType {
    /// Duration of the delay, in microseconds.
    pub const fn micros(self) -> u64 {
        match self {
            TimerType::HardResetSignal => 200,
            TimerType::HardResetHold => 1,
            TimerType::HardResetComplete => 3_000,
            TimerType::SoftResetSettle => 1_500,
            TimerType::SinkCapRetry => 5_000,
            TimerType::HeaderReread => 500,
            TimerType::BulkReadRetry => 40_000,
            TimerType::LowPowerRetry => 40_000,
            TimerType::RidSettle => 5_000,
            TimerType::AbnormalAttach => 20_000,
            TimerType::DrpTry => 75_000,
            TimerType::TryCcDebounce => 15_000,
            TimerType::TrySnkPoll => 1_000,
            TimerType::TrySnkEscape => 1_500_000,
            TimerType::TryFsmSettle => 3_000,
            TimerType::TryExitSettle => 1_000,
            TimerType::UnattachedSettle => 20_000,
            TimerType::VbusRemovalPoll => 50_000,
            TimerType::SourceSettle(ms) => ms * 1_000,
            TimerType::RoleSwapSettle => 2_000,
            TimerType::RoleSwap => 500_000,
            TimerType::ForcedDetachHold => 600_000,
            TimerType::ForcedDetachPulse => 20_000,
            TimerType::HostOffSettle => 300_000,
            TimerType::SelfResetSettle => 20_000,
            TimerType::WaterCheck => 600_000,
            TimerType::WaterDrySettle => 50_000,
            TimerType::HardResetFlag => 2_500_000,
            TimerType::HiccupHold(seconds) => seconds * 1_000_000,
            TimerType::TimerLatch => 100,
        }
    }

    /// Duration of the delay, in milliseconds, rounded up.
    pub const fn millis(self) -> u64 {
        self.micros().div_ceil(1000)
    }

    /// Create a new timer for a given type.
    pub fn new<TIMER: Timer>(timer_type: TimerType) -> impl Future<Output = ()> {
        let micros = timer_type.micros();
        async move {
            if micros % 1000 == 0 {
                TIMER::after_millis(micros / 1000).await
            } else {
                TIMER::after_micros(micros).await
            }
        }
    }
}
