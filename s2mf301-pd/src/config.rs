//! Runtime capabilities of a port.

/// Board and silicon capabilities of a port.
///
/// Optional behaviours that vary between platforms are selected here, rather than
/// at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Run the Try.SNK sub-state-machine when the port attaches as a source.
    pub try_snk: bool,
    /// Treat the first GoodCRC after a reset as provisional.
    ///
    /// A message-pass reported together with that GoodCRC is dropped, unless a request
    /// accompanies it. This matches a quirk of the S2MF301 silicon.
    pub first_goodcrc_quirk: bool,
    /// Retry failed interrupt-status reads, up to [`BULK_READ_RETRIES`] times.
    pub bulk_read_retry: bool,
    /// The board can source VCONN.
    pub vconn_en: bool,
    /// Settle time after committing a source attach, in milliseconds.
    ///
    /// Shorter than tSinkWaitCap, so that the partner's first capabilities are not missed.
    pub source_settle_ms: u64,
    /// How long a CC hiccup lockout holds the lines open, in seconds.
    pub cc_hiccup_delay_s: u64,
}

/// Number of attempts for interrupt-status reads, when retrying is enabled.
pub const BULK_READ_RETRIES: usize = 5;

impl Default for Config {
    fn default() -> Self {
        Self {
            try_snk: false,
            first_goodcrc_quirk: true,
            bulk_read_retry: false,
            vconn_en: false,
            source_settle_ms: 100,
            cc_hiccup_delay_s: 20,
        }
    }
}
