//! Definition of counters, used for message IDs.

/// Counter errors.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The counter wrapped around.
    #[error("counter overrun")]
    Overrun,
}

/// A wrapping counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counter {
    value: u8,
    max_value: u8,
}

/// Kinds of counters.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterType {
    /// The transmit message ID, three bits wide.
    MessageId,
}

impl Counter {
    /// Create a counter at zero.
    pub fn new(counter_type: CounterType) -> Self {
        let max_value = match counter_type {
            CounterType::MessageId => 7,
        };

        Self { value: 0, max_value }
    }

    /// Create a counter with an initial value, wrapped into range.
    pub fn new_from_value(counter_type: CounterType, value: u8) -> Self {
        let mut counter = Self::new(counter_type);
        counter.set(value);
        counter
    }

    /// Set the value, wrapped into range.
    pub fn set(&mut self, value: u8) {
        self.value = value % (self.max_value + 1);
    }

    /// The current value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Advance by one, reporting a wrap-around as overrun.
    pub fn increment(&mut self) -> Result<(), Error> {
        self.set(self.value + 1);

        if self.value == 0 {
            Err(Error::Overrun)
        } else {
            Ok(())
        }
    }

    /// Step back by one, wrapping below zero.
    ///
    /// Used when the transceiver reports that the last transmission failed, so that the
    /// failed ID is reused.
    pub fn rollback(&mut self) {
        self.set(self.value + self.max_value);
    }

    /// Reset to zero.
    pub fn reset(&mut self) {
        self.value = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_wraps() {
        let mut counter = Counter::new_from_value(CounterType::MessageId, 7);
        assert_eq!(counter.increment(), Err(Error::Overrun));
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn rollback_wraps_below_zero() {
        let mut counter = Counter::new(CounterType::MessageId);
        counter.rollback();
        assert_eq!(counter.value(), 7);
        counter.rollback();
        assert_eq!(counter.value(), 6);
    }
}
