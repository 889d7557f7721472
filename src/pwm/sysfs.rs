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

use std::ffi::CString;
use std::fs;
use std::fs::File;
use std::io;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::ptr;
use std::result;
use std::thread;
use std::time::Duration;

use libc::{group, passwd};
use log::debug;

use crate::pwm::Polarity;

/// Result type returned from methods that can have `io::Error`s.
pub type Result<T> = result::Result<T, io::Error>;

// Find user ID for specified user
pub fn user_to_uid(name: &str) -> Option<u32> {
    if let Ok(name_cstr) = CString::new(name) {
        let mut buf: [libc::c_char; 4096] = [0; 4096];
        let mut res: *mut passwd = ptr::null_mut();
        let mut pwd = passwd {
            pw_name: ptr::null_mut(),
            pw_passwd: ptr::null_mut(),
            pw_uid: 0,
            pw_gid: 0,
            pw_gecos: ptr::null_mut(),
            pw_dir: ptr::null_mut(),
            pw_shell: ptr::null_mut(),
        };

        unsafe {
            if libc::getpwnam_r(
                name_cstr.as_ptr(),
                &mut pwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut res,
            ) == 0
                && !res.is_null()
            {
                return Some((*res).pw_uid);
            }
        }
    }

    None
}

// Find group ID for specified group
pub fn group_to_gid(name: &str) -> Option<u32> {
    if let Ok(name_cstr) = CString::new(name) {
        let mut buf: [libc::c_char; 4096] = [0; 4096];
        let mut res: *mut group = ptr::null_mut();
        let mut grp = group {
            gr_name: ptr::null_mut(),
            gr_passwd: ptr::null_mut(),
            gr_gid: 0,
            gr_mem: ptr::null_mut(),
        };

        unsafe {
            if libc::getgrnam_r(
                name_cstr.as_ptr(),
                &mut grp,
                buf.as_mut_ptr(),
                buf.len(),
                &mut res,
            ) == 0
                && !res.is_null()
            {
                return Some((*res).gr_gid);
            }
        }
    }

    None
}

fn is_root() -> bool {
    match user_to_uid("root") {
        Some(root_uid) => unsafe { libc::getuid() == root_uid || libc::geteuid() == root_uid },
        None => false,
    }
}

// Check file permissions and group ID
fn check_permissions(path: &Path, gid: u32) -> bool {
    if let Ok(metadata) = fs::metadata(path) {
        if metadata.permissions().mode() != 0o040_770 && metadata.permissions().mode() != 0o100_770
        {
            return false;
        }

        if metadata.gid() == gid {
            return true;
        }
    }

    false
}

fn channel_dir(chip: &Path, channel: u8) -> PathBuf {
    chip.join(format!("pwm{}", channel))
}

fn attribute(chip: &Path, channel: u8, name: &str) -> PathBuf {
    channel_dir(chip, channel).join(name)
}

fn read_u64(path: &Path) -> Result<u64> {
    let value = fs::read_to_string(path)?;

    Ok(value.trim().parse().unwrap_or(0))
}

fn write_value(path: &Path, value: impl std::fmt::Display) -> Result<()> {
    debug!("{} <- {}", path.display(), value);
    File::create(path)?.write_fmt(format_args!("{}", value))
}

pub fn is_exported(chip: &Path, channel: u8) -> bool {
    channel_dir(chip, channel).exists()
}

pub fn export(chip: &Path, channel: u8) -> Result<()> {
    // Only export if the channel isn't already exported
    if is_exported(chip, channel) {
        return Ok(());
    }

    write_value(&chip.join("export"), channel)?;

    // If we're logged in as root or effective root, skip the permission checks
    if is_root() {
        return Ok(());
    }

    // Wait 1s max for udev to move the new channel to the gpio group and set
    // group permissions. Without the proper udev rules, root access is required.
    // See: https://github.com/raspberrypi/linux/issues/1983
    let gid_gpio = group_to_gid("gpio").unwrap_or(0);

    let paths = &[
        channel_dir(chip, channel),
        attribute(chip, channel, "period"),
        attribute(chip, channel, "duty_cycle"),
        attribute(chip, channel, "polarity"),
        attribute(chip, channel, "enable"),
    ];

    let mut counter = 0;
    'counter: while counter < 25 {
        for path in paths {
            if !check_permissions(path, gid_gpio) {
                // This should normally be set within the first ~30ms.
                thread::sleep(Duration::from_millis(40));
                counter += 1;

                continue 'counter;
            }
        }

        break;
    }

    Ok(())
}

pub fn unexport(chip: &Path, channel: u8) -> Result<()> {
    // Only unexport if the channel is actually exported
    if is_exported(chip, channel) {
        write_value(&chip.join("unexport"), channel)?;
    }

    Ok(())
}

pub fn period(chip: &Path, channel: u8) -> Result<u64> {
    read_u64(&attribute(chip, channel, "period"))
}

pub fn set_period(chip: &Path, channel: u8, period: u64) -> Result<()> {
    write_value(&attribute(chip, channel, "period"), period)
}

pub fn pulse_width(chip: &Path, channel: u8) -> Result<u64> {
    // The sysfs PWM interface specifies the duty cycle in nanoseconds, which
    // means it's actually the pulse width.
    read_u64(&attribute(chip, channel, "duty_cycle"))
}

pub fn set_pulse_width(chip: &Path, channel: u8, pulse_width: u64) -> Result<()> {
    write_value(&attribute(chip, channel, "duty_cycle"), pulse_width)
}

pub fn polarity(chip: &Path, channel: u8) -> Result<Polarity> {
    let polarity = fs::read_to_string(attribute(chip, channel, "polarity"))?;

    match polarity.trim() {
        "normal" => Ok(Polarity::Normal),
        _ => Ok(Polarity::Inverse),
    }
}

pub fn set_polarity(chip: &Path, channel: u8, polarity: Polarity) -> Result<()> {
    let polarity = match polarity {
        Polarity::Normal => "normal",
        Polarity::Inverse => "inversed",
    };

    write_value(&attribute(chip, channel, "polarity"), polarity)
}

pub fn enabled(chip: &Path, channel: u8) -> Result<bool> {
    let enabled = fs::read_to_string(attribute(chip, channel, "enable"))?;

    match enabled.trim() {
        "0" => Ok(false),
        _ => Ok(true),
    }
}

pub fn set_enabled(chip: &Path, channel: u8, enabled: bool) -> Result<()> {
    write_value(&attribute(chip, channel, "enable"), enabled as u8).map_err(|e| {
        if e.kind() == io::ErrorKind::InvalidInput {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "Make sure you have set either a period or frequency before enabling PWM",
            )
        } else {
            e
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    /// Builds a throwaway `pwmchip` directory with the given channels already exported.
    pub(crate) fn fake_chip(channels: &[u8]) -> PathBuf {
        let chip = std::env::temp_dir().join(format!(
            "hwpwm-{}-{}",
            std::process::id(),
            NEXT_ID.fetch_add(1, Ordering::SeqCst)
        ));

        fs::create_dir_all(&chip).unwrap();
        fs::write(chip.join("export"), "").unwrap();
        fs::write(chip.join("unexport"), "").unwrap();

        for &channel in channels {
            let dir = channel_dir(&chip, channel);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("period"), "0\n").unwrap();
            fs::write(dir.join("duty_cycle"), "0\n").unwrap();
            fs::write(dir.join("polarity"), "normal\n").unwrap();
            fs::write(dir.join("enable"), "0\n").unwrap();
        }

        chip
    }

    #[test]
    fn reads_back_written_attributes() {
        let chip = fake_chip(&[1]);

        set_period(&chip, 1, 1_250_000).unwrap();
        set_pulse_width(&chip, 1, 625_000).unwrap();
        set_polarity(&chip, 1, Polarity::Inverse).unwrap();
        set_enabled(&chip, 1, true).unwrap();

        assert_eq!(period(&chip, 1).unwrap(), 1_250_000);
        assert_eq!(pulse_width(&chip, 1).unwrap(), 625_000);
        assert_eq!(polarity(&chip, 1).unwrap(), Polarity::Inverse);
        assert!(enabled(&chip, 1).unwrap());
        assert_eq!(
            fs::read_to_string(attribute(&chip, 1, "polarity")).unwrap(),
            "inversed"
        );

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn garbage_period_reads_as_zero() {
        let chip = fake_chip(&[0]);
        fs::write(attribute(&chip, 0, "period"), "n/a\n").unwrap();

        assert_eq!(period(&chip, 0).unwrap(), 0);

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn export_skips_channels_that_exist() {
        let chip = fake_chip(&[0]);

        export(&chip, 0).unwrap();
        assert_eq!(fs::read_to_string(chip.join("export")).unwrap(), "");

        unexport(&chip, 0).unwrap();
        assert_eq!(fs::read_to_string(chip.join("unexport")).unwrap(), "0");

        fs::remove_dir_all(chip).unwrap();
    }

    #[test]
    fn missing_channel_is_an_io_error() {
        let chip = fake_chip(&[]);

        let err = period(&chip, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        fs::remove_dir_all(chip).unwrap();
    }
}
