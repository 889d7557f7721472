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

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{ClockConfig, ClockPeripheral, Driver, Error, Result, FREQUENCY_MAX};
use crate::pwm::{self, Polarity, Pwm};
use crate::system::DeviceInfo;

/// Drives the Raspberry Pi's hardware PWM channels through `/sys/class/pwm`.
///
/// Channels configured through `SysfsDriver` stay exported and keep running
/// after the driver is terminated.
#[derive(Debug)]
pub struct SysfsDriver {
    chip: PathBuf,
    clock: ClockConfig,
    device_info: Option<DeviceInfo>,
    initialized: bool,
}

impl SysfsDriver {
    /// Constructs a new `SysfsDriver` for the PWM chip located at `chip`.
    ///
    /// The board is identified when the driver is initialized.
    pub fn new<P: AsRef<Path>>(chip: P) -> SysfsDriver {
        SysfsDriver {
            chip: chip.as_ref().to_path_buf(),
            clock: ClockConfig::default(),
            device_info: None,
            initialized: false,
        }
    }

    /// Constructs a new `SysfsDriver` for an already identified board.
    pub fn with_device_info<P: AsRef<Path>>(chip: P, device_info: DeviceInfo) -> SysfsDriver {
        SysfsDriver {
            device_info: Some(device_info),
            ..SysfsDriver::new(chip)
        }
    }
}

impl Driver for SysfsDriver {
    fn configure_clock(&mut self, clock: ClockConfig) -> Result<()> {
        if self.initialized {
            warn!("Ignoring clock configuration after initialization");
            return Ok(());
        }

        debug!(
            "Sample clock: {} µs via {}, source override {}",
            clock.sample_rate_us(),
            clock.peripheral(),
            clock.source_override()
        );
        self.clock = clock;

        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        let device_info = match self.device_info {
            Some(device_info) => device_info,
            None => DeviceInfo::new()?,
        };
        debug!("Detected {} ({})", device_info.model(), device_info.soc());

        if !self.chip.is_dir() {
            return Err(Error::ChipNotFound(self.chip.clone()));
        }

        self.device_info = Some(device_info);
        self.initialized = true;

        Ok(())
    }

    fn hardware_pwm(&mut self, pin: u8, frequency: u32, duty_cycle: u32) -> Result<()> {
        let device_info = match self.device_info {
            Some(device_info) if self.initialized => device_info,
            _ => return Err(Error::NotInitialized),
        };

        let channel = device_info.pwm_channel(pin).ok_or(Error::NotPwmPin(pin))?;

        if frequency > FREQUENCY_MAX {
            return Err(Error::InvalidFrequency(frequency));
        }

        if duty_cycle > pwm::DUTY_CYCLE_MAX {
            return Err(Error::InvalidDutyCycle(duty_cycle));
        }

        if self.clock.peripheral() == ClockPeripheral::Pwm {
            return Err(Error::ClockInUse);
        }

        let mut pwm = Pwm::with_chip(&self.chip, channel)?;
        pwm.set_reset_on_drop(false);

        if frequency == 0 {
            pwm.disable()?;
            info!("{} (GPIO {}) disabled", channel, pin);
            return Ok(());
        }

        pwm.set_frequency(frequency, duty_cycle)?;
        pwm.set_polarity(Polarity::Normal)?;
        pwm.enable()?;

        info!(
            "{} (GPIO {}) enabled at {} Hz, duty cycle {}/{}",
            channel,
            pin,
            frequency,
            duty_cycle,
            pwm::DUTY_CYCLE_MAX
        );

        Ok(())
    }

    fn terminate(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use crate::pwm::fake_chip;
    use crate::system::Model;

    fn read(chip: &Path, channel: u8, name: &str) -> String {
        fs::read_to_string(chip.join(format!("pwm{}", channel)).join(name))
            .unwrap()
            .trim()
            .to_owned()
    }

    fn initialized(chip: &Path) -> SysfsDriver {
        let mut driver =
            SysfsDriver::with_device_info(chip, DeviceInfo::from_model(Model::RaspberryPi4B));
        driver.configure_clock(ClockConfig::default()).unwrap();
        driver.initialize().unwrap();

        driver
    }

    #[test]
    fn enables_channel_for_pin() {
        let chip = fake_chip(&[0, 1]);
        let mut driver = initialized(&chip);

        driver.hardware_pwm(18, 800, 500_000).unwrap();
        driver.terminate();

        assert_eq!(read(&chip, 0, "period"), "1250000");
        assert_eq!(read(&chip, 0, "duty_cycle"), "625000");
        assert_eq!(read(&chip, 0, "polarity"), "normal");
        assert_eq!(read(&chip, 0, "enable"), "1");
        assert_eq!(read(&chip, 1, "enable"), "0");
        assert_eq!(fs::read_to_string(chip.join("unexport")).unwrap(), "");

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn zero_frequency_disables_channel() {
        let chip = fake_chip(&[1]);
        fs::write(chip.join("pwm1").join("enable"), "1\n").unwrap();
        let mut driver = initialized(&chip);

        driver.hardware_pwm(13, 0, 500_000).unwrap();

        assert_eq!(read(&chip, 1, "enable"), "0");

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn failed_disable_is_reported() {
        let chip = fake_chip(&[1]);
        let enable = chip.join("pwm1").join("enable");
        fs::remove_file(&enable).unwrap();
        fs::create_dir(&enable).unwrap();
        let mut driver = initialized(&chip);

        assert!(matches!(
            driver.hardware_pwm(13, 0, 0),
            Err(Error::Pwm(pwm::Error::Io(_)))
        ));
        assert!(matches!(
            driver.hardware_pwm(13, 800, 500_000),
            Err(Error::Pwm(_))
        ));

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn rejects_invalid_requests() {
        let chip = fake_chip(&[0]);
        let mut driver = initialized(&chip);

        assert!(matches!(
            driver.hardware_pwm(17, 800, 500_000),
            Err(Error::NotPwmPin(17))
        ));
        assert!(matches!(
            driver.hardware_pwm(18, FREQUENCY_MAX + 1, 500_000),
            Err(Error::InvalidFrequency(_))
        ));
        assert!(matches!(
            driver.hardware_pwm(18, 800, 1_000_001),
            Err(Error::InvalidDutyCycle(1_000_001))
        ));
        assert_eq!(read(&chip, 0, "period"), "0");

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn pwm_clock_blocks_hardware_pwm() {
        let chip = fake_chip(&[0]);
        let mut driver =
            SysfsDriver::with_device_info(&chip, DeviceInfo::from_model(Model::RaspberryPi3B));
        driver
            .configure_clock(ClockConfig::new(5, ClockPeripheral::Pwm, false).unwrap())
            .unwrap();
        driver.initialize().unwrap();

        assert!(matches!(
            driver.hardware_pwm(18, 800, 500_000),
            Err(Error::ClockInUse)
        ));

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn requires_initialization() {
        let chip = fake_chip(&[0]);
        let mut driver = initialized(&chip);
        driver.terminate();

        assert!(matches!(
            driver.hardware_pwm(18, 800, 500_000),
            Err(Error::NotInitialized)
        ));

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn missing_chip_fails_initialization() {
        let chip = fake_chip(&[]);
        let missing = chip.join("pwmchip9");
        let mut driver =
            SysfsDriver::with_device_info(&missing, DeviceInfo::from_model(Model::RaspberryPi4B));

        assert!(matches!(
            driver.initialize(),
            Err(Error::ChipNotFound(ref path)) if *path == missing
        ));

        fs::remove_dir_all(chip).unwrap();
    }
}
