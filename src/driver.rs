// Copyright (c) 2026 The hwpwm developers
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Hardware abstraction used by the configurator.
//!
//! [`Driver`] is the seam between argument handling and the peripheral. The
//! subsystem is acquired through a [`Session`], which configures the sample
//! clock, initializes the driver and guarantees [`Driver::terminate`] runs on
//! every exit path.
//!
//! [`SysfsDriver`] programs the Raspberry Pi's PWM channels through the
//! `/sys/class/pwm` interface.
//!
//! [`Driver`]: trait.Driver.html
//! [`Session`]: struct.Session.html
//! [`Driver::terminate`]: trait.Driver.html#tymethod.terminate
//! [`SysfsDriver`]: struct.SysfsDriver.html

use std::error;
use std::fmt;
use std::path::PathBuf;
use std::result;

use log::debug;

use crate::pwm;
use crate::system;

mod sysfs;

pub use self::sysfs::SysfsDriver;

/// Highest frequency in hertz accepted by `hardware_pwm`.
pub const FREQUENCY_MAX: u32 = 125_000_000;

/// Sample rates in microseconds supported by the sample clock.
pub const SAMPLE_RATES: [u32; 6] = [1, 2, 4, 5, 8, 10];

/// Errors that can occur when configuring or driving the hardware.
#[derive(Debug)]
pub enum Error {
    /// The sample rate isn't one of [`SAMPLE_RATES`].
    ///
    /// [`SAMPLE_RATES`]: constant.SAMPLE_RATES.html
    InvalidSampleRate(u32),
    /// The clock peripheral number isn't 0 (PWM) or 1 (PCM).
    InvalidPeripheral(u8),
    /// A PWM request was issued before the driver was initialized.
    NotInitialized,
    /// The board couldn't be identified.
    UnknownModel,
    /// The PWM chip doesn't exist. The `pwm` or `pwm-2chan` overlay is probably not loaded.
    ChipNotFound(PathBuf),
    /// The GPIO pin isn't wired to a hardware PWM channel.
    NotPwmPin(u8),
    /// The frequency is above [`FREQUENCY_MAX`].
    ///
    /// [`FREQUENCY_MAX`]: constant.FREQUENCY_MAX.html
    InvalidFrequency(u32),
    /// The duty cycle is above 1,000,000 parts per million.
    InvalidDutyCycle(u32),
    /// The PWM peripheral is already used as the sample clock.
    ClockInUse,
    /// Accessing the PWM channel failed.
    Pwm(pwm::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidSampleRate(rate) => write!(
                f,
                "Invalid sample rate: {} µs (expected one of {:?})",
                rate, SAMPLE_RATES
            ),
            Error::InvalidPeripheral(peripheral) => {
                write!(f, "Invalid clock peripheral: {} (expected 0 or 1)", peripheral)
            }
            Error::NotInitialized => write!(f, "Driver not initialized"),
            Error::UnknownModel => write!(f, "{}", system::Error::UnknownModel),
            Error::ChipNotFound(ref path) => {
                write!(f, "PWM chip not found: {}", path.display())
            }
            Error::NotPwmPin(pin) => write!(f, "GPIO {} doesn't support hardware PWM", pin),
            Error::InvalidFrequency(frequency) => write!(
                f,
                "Invalid frequency: {} Hz (expected 0 or 1-{})",
                frequency, FREQUENCY_MAX
            ),
            Error::InvalidDutyCycle(duty_cycle) => write!(
                f,
                "Invalid duty cycle: {} (expected 0-{})",
                duty_cycle,
                pwm::DUTY_CYCLE_MAX
            ),
            Error::ClockInUse => write!(f, "PWM peripheral is in use as the sample clock"),
            Error::Pwm(ref err) => write!(f, "{}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Pwm(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<pwm::Error> for Error {
    fn from(err: pwm::Error) -> Error {
        Error::Pwm(err)
    }
}

impl From<system::Error> for Error {
    fn from(_err: system::Error) -> Error {
        Error::UnknownModel
    }
}

/// Result type returned from methods that can have `driver::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// Peripheral that paces the sample clock.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ClockPeripheral {
    Pwm = 0,
    Pcm = 1,
}

impl TryFrom<u8> for ClockPeripheral {
    type Error = Error;

    fn try_from(value: u8) -> Result<ClockPeripheral> {
        match value {
            0 => Ok(ClockPeripheral::Pwm),
            1 => Ok(ClockPeripheral::Pcm),
            _ => Err(Error::InvalidPeripheral(value)),
        }
    }
}

impl fmt::Display for ClockPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ClockPeripheral::Pwm => write!(f, "PWM"),
            ClockPeripheral::Pcm => write!(f, "PCM"),
        }
    }
}

/// Sample clock configuration, applied before the driver is initialized.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ClockConfig {
    sample_rate_us: u32,
    peripheral: ClockPeripheral,
    source_override: bool,
}

impl ClockConfig {
    /// Constructs a new `ClockConfig`.
    ///
    /// `sample_rate_us` must be one of [`SAMPLE_RATES`].
    ///
    /// [`SAMPLE_RATES`]: constant.SAMPLE_RATES.html
    pub fn new(
        sample_rate_us: u32,
        peripheral: ClockPeripheral,
        source_override: bool,
    ) -> Result<ClockConfig> {
        if !SAMPLE_RATES.contains(&sample_rate_us) {
            return Err(Error::InvalidSampleRate(sample_rate_us));
        }

        Ok(ClockConfig {
            sample_rate_us,
            peripheral,
            source_override,
        })
    }

    pub fn sample_rate_us(&self) -> u32 {
        self.sample_rate_us
    }

    pub fn peripheral(&self) -> ClockPeripheral {
        self.peripheral
    }

    pub fn source_override(&self) -> bool {
        self.source_override
    }
}

impl Default for ClockConfig {
    /// 5 µs paced by the PCM peripheral, which leaves the PWM peripheral free.
    fn default() -> ClockConfig {
        ClockConfig {
            sample_rate_us: 5,
            peripheral: ClockPeripheral::Pcm,
            source_override: false,
        }
    }
}

/// Operations a hardware backend provides to the configurator.
pub trait Driver {
    /// Configures the sample clock. Must be called before `initialize`.
    fn configure_clock(&mut self, clock: ClockConfig) -> Result<()>;

    /// Initializes the hardware subsystem.
    fn initialize(&mut self) -> Result<()>;

    /// Starts hardware PWM on `pin` at `frequency` Hz with `duty_cycle` parts
    /// per million, or stops it when `frequency` is 0.
    fn hardware_pwm(&mut self, pin: u8, frequency: u32, duty_cycle: u32) -> Result<()>;

    /// Releases the hardware subsystem. Configured PWM output keeps running.
    fn terminate(&mut self);
}

/// An initialized hardware subsystem.
///
/// The driver is terminated when `Session` goes out of scope.
#[derive(Debug)]
pub struct Session<'a, D: Driver> {
    driver: &'a mut D,
}

impl<'a, D: Driver> Session<'a, D> {
    /// Configures the sample clock and initializes `driver`.
    ///
    /// If initialization fails, the driver is terminated before the error is returned.
    pub fn open(driver: &'a mut D, clock: ClockConfig) -> Result<Session<'a, D>> {
        driver.configure_clock(clock)?;

        // From here on, Drop takes care of terminate().
        let mut session = Session { driver };
        session.driver.initialize()?;
        debug!("Hardware session opened");

        Ok(session)
    }

    /// Forwards a hardware PWM request to the driver.
    pub fn hardware_pwm(&mut self, pin: u8, frequency: u32, duty_cycle: u32) -> Result<()> {
        self.driver.hardware_pwm(pin, frequency, duty_cycle)
    }
}

impl<'a, D: Driver> Drop for Session<'a, D> {
    fn drop(&mut self) {
        self.driver.terminate();
        debug!("Hardware session closed");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Calls recorded by [`MockDriver`].
    #[derive(Debug, PartialEq, Eq, Clone)]
    pub(crate) enum Call {
        ConfigureClock(ClockConfig),
        Initialize,
        HardwarePwm(u8, u32, u32),
        Terminate,
    }

    /// A `Driver` that records every call and fails on request.
    #[derive(Debug, Default)]
    pub(crate) struct MockDriver {
        pub(crate) calls: Vec<Call>,
        pub(crate) fail_clock: bool,
        pub(crate) fail_initialize: bool,
        pub(crate) fail_pwm: bool,
    }

    impl MockDriver {
        pub(crate) fn pwm_calls(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, Call::HardwarePwm(..)))
                .count()
        }
    }

    impl Driver for MockDriver {
        fn configure_clock(&mut self, clock: ClockConfig) -> Result<()> {
            self.calls.push(Call::ConfigureClock(clock));
            if self.fail_clock {
                return Err(Error::InvalidSampleRate(clock.sample_rate_us()));
            }

            Ok(())
        }

        fn initialize(&mut self) -> Result<()> {
            self.calls.push(Call::Initialize);
            if self.fail_initialize {
                return Err(Error::UnknownModel);
            }

            Ok(())
        }

        fn hardware_pwm(&mut self, pin: u8, frequency: u32, duty_cycle: u32) -> Result<()> {
            self.calls.push(Call::HardwarePwm(pin, frequency, duty_cycle));
            if self.fail_pwm {
                return Err(Error::NotPwmPin(pin));
            }

            Ok(())
        }

        fn terminate(&mut self) {
            self.calls.push(Call::Terminate);
        }
    }

    #[test]
    fn clock_config_validates_sample_rate() {
        assert!(ClockConfig::new(3, ClockPeripheral::Pcm, false).is_err());
        assert!(ClockConfig::new(0, ClockPeripheral::Pcm, false).is_err());

        let clock = ClockConfig::new(10, ClockPeripheral::Pwm, true).unwrap();
        assert_eq!(clock.sample_rate_us(), 10);
        assert_eq!(clock.peripheral(), ClockPeripheral::Pwm);
        assert!(clock.source_override());

        assert_eq!(
            ClockConfig::default(),
            ClockConfig::new(5, ClockPeripheral::Pcm, false).unwrap()
        );
    }

    #[test]
    fn clock_peripheral_from_number() {
        assert_eq!(ClockPeripheral::try_from(0).unwrap(), ClockPeripheral::Pwm);
        assert_eq!(ClockPeripheral::try_from(1).unwrap(), ClockPeripheral::Pcm);
        assert!(matches!(
            ClockPeripheral::try_from(2),
            Err(Error::InvalidPeripheral(2))
        ));
    }

    #[test]
    fn session_terminates_on_drop() {
        let mut driver = MockDriver::default();

        {
            let mut session = Session::open(&mut driver, ClockConfig::default()).unwrap();
            session.hardware_pwm(18, 800, 500_000).unwrap();
        }

        assert_eq!(
            driver.calls,
            vec![
                Call::ConfigureClock(ClockConfig::default()),
                Call::Initialize,
                Call::HardwarePwm(18, 800, 500_000),
                Call::Terminate,
            ]
        );
    }

    #[test]
    fn session_terminates_when_initialize_fails() {
        let mut driver = MockDriver {
            fail_initialize: true,
            ..MockDriver::default()
        };

        assert!(Session::open(&mut driver, ClockConfig::default()).is_err());
        assert_eq!(driver.calls.last(), Some(&Call::Terminate));
    }

    #[test]
    fn clock_failure_skips_initialize() {
        let mut driver = MockDriver {
            fail_clock: true,
            ..MockDriver::default()
        };

        assert!(Session::open(&mut driver, ClockConfig::default()).is_err());
        assert_eq!(
            driver.calls,
            vec![Call::ConfigureClock(ClockConfig::default())]
        );
    }
}
