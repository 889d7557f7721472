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

//! One-shot hardware PWM configuration.
//!
//! [`configure`] acquires the hardware subsystem, validates the three
//! positional arguments (GPIO pin, frequency and duty cycle) and forwards a
//! single request to the driver. Arguments must be plain integers. Anything
//! else is rejected before the driver is asked to change the PWM output.
//!
//! [`configure`]: fn.configure.html

use std::error;
use std::fmt;
use std::result;
use std::str::FromStr;

use log::debug;

use crate::driver::{self, ClockConfig, Driver, Session};

/// Number of addressable GPIO pins.
pub const PIN_COUNT: u8 = 32;

/// Describes the three positional arguments and their valid ranges.
pub const USAGE: &str = "\
Expected 3 arguments: <GPIO> <FREQUENCY> <DUTY_CYCLE>
  GPIO        BCM GPIO number (0-31) wired to a hardware PWM channel
  FREQUENCY   0 (off) or 1-125000000 (125M) Hz
  DUTY_CYCLE  0 (off) to 1000000 (1M) (fully on)";

/// Errors that end a configuration attempt.
#[derive(Debug)]
pub enum Error {
    /// Configuring the sample clock or initializing the driver failed.
    Setup(driver::Error),
    /// Wrong number of positional arguments.
    Usage(usize),
    /// An argument isn't a valid integer.
    InvalidArgument { name: &'static str, value: String },
    /// The GPIO pin number isn't below [`PIN_COUNT`].
    ///
    /// [`PIN_COUNT`]: constant.PIN_COUNT.html
    PinOutOfRange(i64),
    /// The driver rejected the PWM request.
    Pwm(driver::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Setup(ref err) => write!(f, "Hardware initialization failed: {}", err),
            Error::Usage(count) => write!(f, "Bad arguments: got {}\n{}", count, USAGE),
            Error::InvalidArgument { name, ref value } => {
                write!(f, "Invalid {}: {:?} is not a non-negative integer", name, value)
            }
            Error::PinOutOfRange(pin) => {
                write!(f, "GPIO {} out of range (0-{})", pin, PIN_COUNT - 1)
            }
            Error::Pwm(ref err) => write!(f, "PWM failed: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Setup(ref err) | Error::Pwm(ref err) => Some(err),
            _ => None,
        }
    }
}

/// Result type returned from methods that can have `configurator::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// A validated PWM request.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Request {
    /// BCM GPIO number.
    pub pin: u8,
    /// Frequency in hertz. 0 turns PWM off.
    pub frequency: u32,
    /// Duty cycle in parts per million.
    pub duty_cycle: u32,
}

/// A request the driver accepted.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Outcome {
    /// PWM runs at the requested frequency.
    Enabled(Request),
    /// The request had a frequency of 0.
    Disabled(Request),
}

impl Outcome {
    pub fn request(&self) -> Request {
        match *self {
            Outcome::Enabled(request) | Outcome::Disabled(request) => request,
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidArgument {
        name,
        value: value.to_owned(),
    })
}

/// Validates the positional arguments `<GPIO> <FREQUENCY> <DUTY_CYCLE>`.
///
/// Frequency and duty cycle ranges are left to the driver.
pub fn parse_request<S: AsRef<str>>(args: &[S]) -> Result<Request> {
    let [pin, frequency, duty_cycle] = args else {
        return Err(Error::Usage(args.len()));
    };

    let pin: i64 = parse("GPIO", pin.as_ref())?;
    if pin < 0 || pin >= i64::from(PIN_COUNT) {
        return Err(Error::PinOutOfRange(pin));
    }

    Ok(Request {
        pin: pin as u8,
        frequency: parse("frequency", frequency.as_ref())?,
        duty_cycle: parse("duty cycle", duty_cycle.as_ref())?,
    })
}

/// Applies one hardware PWM configuration.
///
/// The hardware subsystem is set up first. Argument errors are reported only
/// once setup succeeded, and never reach the driver's PWM operation. The
/// driver is terminated before `configure` returns, whatever the outcome.
pub fn configure<D: Driver, S: AsRef<str>>(
    driver: &mut D,
    clock: ClockConfig,
    args: &[S],
) -> Result<Outcome> {
    let mut session = Session::open(driver, clock).map_err(Error::Setup)?;

    let request = parse_request(args)?;
    debug!("{:?}", request);

    session
        .hardware_pwm(request.pin, request.frequency, request.duty_cycle)
        .map_err(Error::Pwm)?;

    if request.frequency > 0 {
        Ok(Outcome::Enabled(request))
    } else {
        Ok(Outcome::Disabled(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::driver::tests::{Call, MockDriver};

    fn run(driver: &mut MockDriver, args: &[&str]) -> Result<Outcome> {
        configure(driver, ClockConfig::default(), args)
    }

    #[test]
    fn forwards_valid_request() {
        let mut driver = MockDriver::default();

        let outcome = run(&mut driver, &["18", "800", "500000"]).unwrap();

        assert_eq!(
            outcome,
            Outcome::Enabled(Request {
                pin: 18,
                frequency: 800,
                duty_cycle: 500_000,
            })
        );
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
    fn zero_frequency_is_forwarded_as_disable() {
        for duty_cycle in &["0", "500000", "1000000"] {
            let mut driver = MockDriver::default();

            let outcome = run(&mut driver, &["12", "0", *duty_cycle]).unwrap();

            assert!(matches!(outcome, Outcome::Disabled(_)));
            assert_eq!(outcome.request().pin, 12);
            assert_eq!(driver.pwm_calls(), 1);
        }
    }

    #[test]
    fn pin_out_of_range_never_reaches_driver() {
        for pin in &["32", "40", "255", "-1"] {
            let mut driver = MockDriver::default();

            let err = run(&mut driver, &[*pin, "800", "500000"]).unwrap_err();

            assert!(matches!(err, Error::PinOutOfRange(_)), "{}", pin);
            assert_eq!(driver.pwm_calls(), 0);
            assert_eq!(driver.calls.last(), Some(&Call::Terminate));
        }
    }

    #[test]
    fn wrong_argument_count_is_a_usage_error() {
        let invocations: [&[&str]; 4] = [
            &[],
            &["18"],
            &["18", "800"],
            &["18", "800", "500000", "1"],
        ];

        for args in invocations.iter() {
            let mut driver = MockDriver::default();

            let err = run(&mut driver, args).unwrap_err();

            assert!(matches!(err, Error::Usage(count) if count == args.len()));
            assert!(err.to_string().contains("DUTY_CYCLE"));
            assert_eq!(driver.pwm_calls(), 0);
        }
    }

    #[test]
    fn non_numeric_arguments_are_rejected() {
        let invocations: [[&str; 3]; 4] = [
            ["pwm", "800", "500000"],
            ["18", "fast", "500000"],
            ["18", "800", "half"],
            ["18", "-800", "500000"],
        ];

        for args in invocations.iter() {
            let mut driver = MockDriver::default();

            let err = run(&mut driver, args).unwrap_err();

            assert!(matches!(err, Error::InvalidArgument { .. }), "{:?}", args);
            assert_eq!(driver.pwm_calls(), 0);
        }
    }

    #[test]
    fn setup_failure_stops_before_validation() {
        let mut driver = MockDriver {
            fail_initialize: true,
            ..MockDriver::default()
        };

        let err = run(&mut driver, &["18"]).unwrap_err();

        assert!(matches!(err, Error::Setup(_)));
        assert_eq!(driver.pwm_calls(), 0);
    }

    #[test]
    fn driver_failure_is_reported() {
        let mut driver = MockDriver {
            fail_pwm: true,
            ..MockDriver::default()
        };

        let err = run(&mut driver, &["17", "800", "500000"]).unwrap_err();

        assert!(matches!(err, Error::Pwm(driver::Error::NotPwmPin(17))));
        assert!(err.to_string().starts_with("PWM failed"));
        assert_eq!(driver.calls.last(), Some(&Call::Terminate));
    }

    #[test]
    fn parse_request_accepts_surrounding_whitespace() {
        assert_eq!(
            parse_request(&[" 19", "50 ", "75000"]).unwrap(),
            Request {
                pin: 19,
                frequency: 50,
                duty_cycle: 75_000,
            }
        );
    }
}
