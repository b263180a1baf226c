//! Builder pattern for StepperDriver.

use embedded_hal::digital::OutputPin;

use crate::config::units::{Hertz, Microsteps};
use crate::config::{DriverConfig, LinePolarities, PwmDivider, SystemConfig, DEFAULT_SYSTEM_CLOCK_HZ};
use crate::error::{ConfigError, Error, Result};

use super::driver::StepperDriver;
use super::lines::{ControlLine, DriverLines};
use super::peripheral::{PulseCounter, StepPulse};

/// Builder for creating StepperDriver instances.
pub struct StepperDriverBuilder<P, PWM, CNT>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    enable_pin: Option<P>,
    sleep_pin: Option<P>,
    reset_pin: Option<P>,
    dir_pin: Option<P>,
    microstep_pins: Option<[P; 3]>,
    step_pulse: Option<PWM>,
    pulse_counter: Option<CNT>,
    name: Option<heapless::String<32>>,
    step_frequency: Option<Hertz>,
    system_clock_hz: u32,
    microsteps: Microsteps,
    polarity: LinePolarities,
}

impl<P, PWM, CNT> Default for StepperDriverBuilder<P, PWM, CNT>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, PWM, CNT> StepperDriverBuilder<P, PWM, CNT>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            enable_pin: None,
            sleep_pin: None,
            reset_pin: None,
            dir_pin: None,
            microstep_pins: None,
            step_pulse: None,
            pulse_counter: None,
            name: None,
            step_frequency: None,
            system_clock_hz: DEFAULT_SYSTEM_CLOCK_HZ,
            microsteps: Microsteps::FULL,
            polarity: LinePolarities::default(),
        }
    }

    /// Set the ENABLE pin.
    pub fn enable_pin(mut self, pin: P) -> Self {
        self.enable_pin = Some(pin);
        self
    }

    /// Set the SLEEP pin.
    pub fn sleep_pin(mut self, pin: P) -> Self {
        self.sleep_pin = Some(pin);
        self
    }

    /// Set the RESET pin.
    pub fn reset_pin(mut self, pin: P) -> Self {
        self.reset_pin = Some(pin);
        self
    }

    /// Set the DIR pin.
    pub fn dir_pin(mut self, pin: P) -> Self {
        self.dir_pin = Some(pin);
        self
    }

    /// Set the MS1, MS2 and MS3 pins.
    pub fn microstep_pins(mut self, pins: [P; 3]) -> Self {
        self.microstep_pins = Some(pins);
        self
    }

    /// Set the step pulse output.
    pub fn step_pulse(mut self, pulse: PWM) -> Self {
        self.step_pulse = Some(pulse);
        self
    }

    /// Set the edge counter wired to the step output.
    pub fn pulse_counter(mut self, counter: CNT) -> Self {
        self.pulse_counter = Some(counter);
        self
    }

    /// Set the driver name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = heapless::String::try_from(name).ok();
        self
    }

    /// Set the fixed step frequency.
    pub fn step_frequency(mut self, frequency: Hertz) -> Self {
        self.step_frequency = Some(frequency);
        self
    }

    /// Set the system clock feeding the step pulse divider.
    pub fn system_clock(mut self, hz: u32) -> Self {
        self.system_clock_hz = hz;
        self
    }

    /// Set the initial microstep resolution.
    pub fn microsteps(mut self, microsteps: Microsteps) -> Self {
        self.microsteps = microsteps;
        self
    }

    /// Set the polarity of every control line.
    pub fn polarity(mut self, polarity: LinePolarities) -> Self {
        self.polarity = polarity;
        self
    }

    /// Configure from a DriverConfig.
    pub fn from_driver_config(mut self, config: &DriverConfig) -> Self {
        self.name = Some(config.name.clone());
        self.step_frequency = Some(config.step_frequency);
        self.microsteps = config.microsteps;
        self.polarity = config.polarity;
        self
    }

    /// Configure from SystemConfig by driver name.
    pub fn from_config(self, config: &SystemConfig, driver_name: &str) -> Result<Self> {
        let driver_config = config.driver(driver_name).ok_or_else(|| {
            Error::Config(ConfigError::DriverNotFound(
                heapless::String::try_from(driver_name).unwrap_or_default(),
            ))
        })?;

        Ok(self
            .system_clock(config.board.system_clock_hz)
            .from_driver_config(driver_config))
    }

    /// Build the StepperDriver and drive its lines to their safe defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing, the step frequency
    /// cannot be produced from the system clock, or a line cannot be driven.
    pub fn build(self) -> Result<StepperDriver<P, PWM, CNT>> {
        let enable = self
            .enable_pin
            .ok_or(ConfigError::MissingField("enable_pin"))?;
        let sleep = self
            .sleep_pin
            .ok_or(ConfigError::MissingField("sleep_pin"))?;
        let reset = self
            .reset_pin
            .ok_or(ConfigError::MissingField("reset_pin"))?;
        let dir = self.dir_pin.ok_or(ConfigError::MissingField("dir_pin"))?;
        let microstep = self
            .microstep_pins
            .ok_or(ConfigError::MissingField("microstep_pins"))?;
        let pulse = self
            .step_pulse
            .ok_or(ConfigError::MissingField("step_pulse"))?;
        let counter = self
            .pulse_counter
            .ok_or(ConfigError::MissingField("pulse_counter"))?;
        let step_frequency = self
            .step_frequency
            .ok_or(ConfigError::MissingField("step_frequency"))?;
        PwmDivider::for_step_frequency(self.system_clock_hz, step_frequency)?;

        let name = self
            .name
            .unwrap_or_else(|| heapless::String::try_from("stepper").unwrap_or_default());

        let lines = DriverLines {
            enable: ControlLine::new(enable, self.polarity.enable),
            sleep: ControlLine::new(sleep, self.polarity.sleep),
            reset: ControlLine::new(reset, self.polarity.reset),
            direction: ControlLine::new(dir, self.polarity.direction),
            microstep,
        };

        let mut driver = StepperDriver::new(
            name,
            lines,
            pulse,
            counter,
            step_frequency,
            self.microsteps,
        );
        driver.init()?;
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Polarity;
    use crate::sim::{SimCounter, SimDriverPins, SimPin, SimPulse, SimPwm};

    #[test]
    fn test_missing_field() {
        let result = StepperDriverBuilder::<SimPin, SimPulse, SimCounter>::new()
            .step_frequency(Hertz(15))
            .build();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingField("enable_pin")))
        ));
    }

    #[test]
    fn test_from_driver_config() {
        let pins = SimDriverPins::new();
        let pwm = SimPwm::new();
        let mut config = DriverConfig::new("z_lift", Hertz(200));
        config.microsteps = Microsteps::SIXTEENTH;
        config.polarity.enable = Polarity::ActiveHigh;

        let driver = pins
            .builder(&pwm, 3, 2)
            .from_driver_config(&config)
            .build()
            .unwrap();

        assert_eq!(driver.name(), "z_lift");
        assert_eq!(driver.step_frequency(), Hertz(200));
        assert_eq!(driver.microsteps(), Microsteps::SIXTEENTH);
        // Active-high enable released = low
        assert_eq!(pins.enable.level(), Some(false));
        for ms in &pins.microstep {
            assert_eq!(ms.level(), Some(true));
        }
    }

    #[test]
    fn test_from_unknown_config() {
        let pins = SimDriverPins::new();
        let pwm = SimPwm::new();
        let result = pins
            .builder(&pwm, 1, 0)
            .from_config(&SystemConfig::default(), "missing");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::DriverNotFound(_)))
        ));
    }

    #[test]
    fn test_unreachable_frequency_rejected() {
        let pins = SimDriverPins::new();
        let pwm = SimPwm::new();
        for hz in [0, 7, 1908] {
            let result = pins.builder(&pwm, 1, 0).step_frequency(Hertz(hz)).build();
            assert!(matches!(
                result,
                Err(Error::Config(ConfigError::InvalidStepFrequency { requested, min: 8, max: 1907 }))
                    if requested == hz
            ));
        }
        assert!(!pwm.is_pulsing(1));
    }

    #[test]
    fn test_system_clock_moves_reachable_range() {
        let pins = SimDriverPins::new();
        let pwm = SimPwm::new();
        // 12 MHz: 1..=183 Hz
        assert!(pins
            .builder(&pwm, 1, 0)
            .system_clock(12_000_000)
            .step_frequency(Hertz(15))
            .build()
            .is_ok());
        assert!(pins
            .builder(&pwm, 1, 0)
            .system_clock(12_000_000)
            .step_frequency(Hertz(200))
            .build()
            .is_err());
    }
}
