/// How long blocking operations wait for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollPolicy {
    /// Readiness checks before giving up with `Error::Timeout`
    pub max_attempts: u32,
    /// Pause between two checks
    pub interval_us: u32,
}

impl Default for PollPolicy {
    /// 100 checks 1 ms apart, well above the 10 ms temperature conversion
    fn default() -> Self {
        PollPolicy {
            max_attempts: 100,
            interval_us: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Current sense resistor in ohms
    pub sense_resistor: f32,
    pub poll: PollPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sense_resistor: 0.05,
            poll: PollPolicy::default(),
        }
    }
}

impl Config {
    pub fn with_sense_resistor(mut self, ohms: f32) -> Self {
        self.sense_resistor = ohms;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}
