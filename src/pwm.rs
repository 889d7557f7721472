// Copyright (c) 2017-2019 Rene van der Meer
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

//! Interface for the PWM peripheral.
//!
//! The Raspberry Pi's PWM peripheral is controlled through the `/sys/class/pwm`
//! sysfs interface. Each exported channel shows up as a `pwmN` directory below
//! the PWM chip, usually `/sys/class/pwm/pwmchip0`.
//!
//! ## PWM channels
//!
//! The BCM283x and BCM2711 SoCs support two hardware PWM channels. By default, both
//! channels are disabled. To enable only PWM0 on its default pin (BCM GPIO 18, physical
//! pin 12), add `dtoverlay=pwm` to `/boot/config.txt`. If you need both PWM channels,
//! replace `pwm` with `pwm-2chan`, which enables PWM0 on BCM GPIO 18 (physical pin 12),
//! and PWM1 on BCM GPIO 19 (physical pin 35). GPIO 12 and 13 can be selected instead
//! with the overlay's `pin` and `func` parameters, see `/boot/overlays/README`.
//!
//! The Raspberry Pi's analog audio output needs both PWM channels. Using both audio out
//! and PWM at the same time may cause issues.
//!
//! ## Using PWM without superuser privileges (`sudo`)
//!
//! Since kernel 4.14.34, udev can change file permissions when a PWM channel is
//! exported. Append the following snippet to `/etc/udev/rules.d/99-com.rules` to
//! let members of the `gpio` group configure PWM without `sudo`.
//!
//! ```text
//! SUBSYSTEM=="pwm*", PROGRAM="/bin/sh -c '\
//!     chown -R root:gpio /sys/class/pwm && chmod -R 770 /sys/class/pwm;\
//!     chown -R root:gpio /sys/devices/platform/soc/*.pwm/pwm/pwmchip* &&\
//!     chmod -R 770 /sys/devices/platform/soc/*.pwm/pwm/pwmchip*\
//! '"
//! ```
//!
//! ## Troubleshooting
//!
//! If [`Pwm::with_chip`] returns an `io::ErrorKind::NotFound` error, you may have
//! forgotten to enable the selected PWM channel. An `io::ErrorKind::PermissionDenied`
//! error means the udev rules above aren't active, or the current user isn't a member
//! of the `gpio` group.

use std::error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::result;
use std::time::Duration;

use log::debug;

mod sysfs;

#[cfg(test)]
pub(crate) use self::sysfs::tests::fake_chip;

/// Default location of the PWM chip that drives both hardware PWM channels.
pub const DEFAULT_CHIP: &str = "/sys/class/pwm/pwmchip0";

/// Duty cycles are expressed in parts per million of the period.
pub const DUTY_CYCLE_MAX: u32 = 1_000_000;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Errors that can occur when accessing the PWM peripheral.
#[derive(Debug)]
pub enum Error {
    /// IO error.
    Io(io::Error),
    /// A frequency of 0 Hz can't be converted to a period.
    ZeroFrequency,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "IO error: {}", err),
            Error::ZeroFrequency => write!(f, "Frequency must be at least 1 Hz"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::ZeroFrequency => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `pwm::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// PWM channels.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Channel {
    Pwm0 = 0,
    Pwm1 = 1,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Channel::Pwm0 => write!(f, "PWM0"),
            Channel::Pwm1 => write!(f, "PWM1"),
        }
    }
}

/// Output polarities.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Polarity {
    Normal,
    Inverse,
}

/// Converts a frequency and a duty cycle in parts per million to a period and
/// pulse width in nanoseconds.
pub fn period_and_pulse_width(frequency: u32, duty_cycle: u32) -> Result<(u64, u64)> {
    if frequency == 0 {
        return Err(Error::ZeroFrequency);
    }

    let period = NANOS_PER_SEC / u64::from(frequency);
    let pulse_width =
        period * u64::from(duty_cycle.min(DUTY_CYCLE_MAX)) / u64::from(DUTY_CYCLE_MAX);

    Ok((period, pulse_width))
}

fn as_nanos(duration: Duration) -> u64 {
    u64::from(duration.subsec_nanos())
        .saturating_add(duration.as_secs().saturating_mul(NANOS_PER_SEC))
}

/// Provides access to a single hardware PWM channel.
///
/// Before using `Pwm`, make sure the selected PWM channel has been configured
/// and activated. More information can be found [here].
///
/// [here]: index.html
#[derive(Debug)]
pub struct Pwm {
    chip: PathBuf,
    channel: Channel,
    reset_on_drop: bool,
}

impl Pwm {
    /// Constructs a new `Pwm` for `channel` on the PWM chip located at `chip`.
    ///
    /// The channel is exported if necessary, and left disabled.
    pub fn with_chip<P: AsRef<Path>>(chip: P, channel: Channel) -> Result<Pwm> {
        let chip = chip.as_ref().to_path_buf();
        sysfs::export(&chip, channel as u8)?;

        let pwm = Pwm {
            chip,
            channel,
            reset_on_drop: true,
        };

        // Always reset "enable" to 0. The sysfs interface has a bug where a previous
        // export may have left "enable" as 1 after unexporting. On the next export,
        // "enable" is still set to 1, even though the channel isn't enabled.
        let _ = pwm.disable();

        Ok(pwm)
    }

    /// Returns the configured period.
    pub fn period(&self) -> Result<Duration> {
        Ok(Duration::from_nanos(sysfs::period(
            &self.chip,
            self.channel as u8,
        )?))
    }

    /// Sets the period.
    ///
    /// The specified period must be longer than or equal to the pulse width.
    pub fn set_period(&self, period: Duration) -> Result<()> {
        sysfs::set_period(&self.chip, self.channel as u8, as_nanos(period))?;

        Ok(())
    }

    /// Returns the configured pulse width.
    pub fn pulse_width(&self) -> Result<Duration> {
        Ok(Duration::from_nanos(sysfs::pulse_width(
            &self.chip,
            self.channel as u8,
        )?))
    }

    /// Sets the pulse width.
    ///
    /// The pulse width must be shorter than or equal to the period.
    pub fn set_pulse_width(&self, pulse_width: Duration) -> Result<()> {
        sysfs::set_pulse_width(&self.chip, self.channel as u8, as_nanos(pulse_width))?;

        Ok(())
    }

    /// Returns the configured duty cycle in parts per million, based on the
    /// configured period and pulse width.
    pub fn duty_cycle(&self) -> Result<u32> {
        let period = sysfs::period(&self.chip, self.channel as u8)?;
        if period == 0 {
            return Ok(0);
        }

        let pulse_width = sysfs::pulse_width(&self.chip, self.channel as u8)?;
        let duty_cycle = pulse_width.min(period) * u64::from(DUTY_CYCLE_MAX) / period;

        Ok(duty_cycle as u32)
    }

    /// Sets the frequency and duty cycle.
    ///
    /// `frequency` is specified in hertz (Hz) and converted to a period with
    /// nanosecond resolution. `duty_cycle` is specified in parts per million,
    /// from `0` (always low) to `1_000_000` (always high). Larger values are clamped.
    pub fn set_frequency(&self, frequency: u32, duty_cycle: u32) -> Result<()> {
        let (period, pulse_width) = period_and_pulse_width(frequency, duty_cycle)?;

        // Set pulse width to 0 first in case the new period is shorter than the current pulse width
        let _ = sysfs::set_pulse_width(&self.chip, self.channel as u8, 0);

        debug!(
            "{}: period {} ns, pulse width {} ns",
            self.channel, period, pulse_width
        );

        sysfs::set_period(&self.chip, self.channel as u8, period)?;
        sysfs::set_pulse_width(&self.chip, self.channel as u8, pulse_width)?;

        Ok(())
    }

    /// Returns the configured polarity.
    pub fn polarity(&self) -> Result<Polarity> {
        Ok(sysfs::polarity(&self.chip, self.channel as u8)?)
    }

    /// Sets the polarity.
    ///
    /// `polarity` configures the active logic level as either high ([`Normal`]) or low ([`Inverse`]).
    ///
    /// [`Normal`]: enum.Polarity.html
    /// [`Inverse`]: enum.Polarity.html
    pub fn set_polarity(&self, polarity: Polarity) -> Result<()> {
        sysfs::set_polarity(&self.chip, self.channel as u8, polarity)?;

        Ok(())
    }

    /// Checks whether PWM is currently enabled on the selected channel.
    pub fn enabled(&self) -> Result<bool> {
        Ok(sysfs::enabled(&self.chip, self.channel as u8)?)
    }

    /// Enables PWM on the selected channel.
    pub fn enable(&self) -> Result<()> {
        sysfs::set_enabled(&self.chip, self.channel as u8, true)?;

        Ok(())
    }

    /// Disables PWM on the selected channel.
    pub fn disable(&self) -> Result<()> {
        sysfs::set_enabled(&self.chip, self.channel as u8, false)?;

        Ok(())
    }

    /// When enabled, disables and unexports the channel when `Pwm` goes out of scope.
    /// By default, this is set to `true`.
    ///
    /// Set it to `false` to keep the signal running after the process exits.
    pub fn set_reset_on_drop(&mut self, reset_on_drop: bool) {
        self.reset_on_drop = reset_on_drop;
    }
}

impl Drop for Pwm {
    fn drop(&mut self) {
        if !self.reset_on_drop {
            return;
        }

        let _ = sysfs::set_enabled(&self.chip, self.channel as u8, false);
        let _ = sysfs::unexport(&self.chip, self.channel as u8);
    }
}
