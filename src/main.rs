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

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use log::{debug, LevelFilter};

use hwpwm::configurator::{self, Outcome};
use hwpwm::driver::{ClockConfig, ClockPeripheral, SysfsDriver};
use hwpwm::pwm;

// -1 as seen by the shell
const EXIT_FAILURE: u8 = 255;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Peripheral {
    Pwm,
    Pcm,
}

impl From<Peripheral> for ClockPeripheral {
    fn from(peripheral: Peripheral) -> ClockPeripheral {
        match peripheral {
            Peripheral::Pwm => ClockPeripheral::Pwm,
            Peripheral::Pcm => ClockPeripheral::Pcm,
        }
    }
}

/// Start or stop hardware PWM on a Raspberry Pi GPIO pin.
#[derive(Parser, Debug)]
#[command(name = "hwpwm", version, long_about = None, after_help = configurator::USAGE)]
struct Args {
    /// PWM chip in sysfs
    #[arg(long, env = "HWPWM_CHIP", default_value = pwm::DEFAULT_CHIP)]
    chip: PathBuf,

    /// Sample clock rate in microseconds (1, 2, 4, 5, 8 or 10)
    #[arg(long, env = "HWPWM_SAMPLE_RATE", default_value_t = 5)]
    sample_rate: u32,

    /// Peripheral pacing the sample clock
    #[arg(long, env = "HWPWM_CLOCK_PERIPHERAL", value_enum, default_value_t = Peripheral::Pcm)]
    clock_peripheral: Peripheral,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// <GPIO> <FREQUENCY> <DUTY_CYCLE>
    #[arg(value_name = "VALUES", num_args = 0.., allow_negative_numbers = true)]
    values: Vec<String>,
}

/// What the process prints, and its exit status.
#[derive(Debug, PartialEq, Eq)]
struct Report {
    status: u8,
    message: String,
    to_stderr: bool,
}

impl From<configurator::Result<Outcome>> for Report {
    fn from(result: configurator::Result<Outcome>) -> Report {
        match result {
            Ok(Outcome::Enabled(request)) => Report {
                status: 0,
                message: format!(
                    "Sending PWM to GPIO {}, Freq = {}, Duty Cycle = {}",
                    request.pin, request.frequency, request.duty_cycle
                ),
                to_stderr: false,
            },
            // The channel was turned off, but 0 Hz is still reported as a bad frequency.
            Ok(outcome @ Outcome::Disabled(_)) => Report {
                status: 0,
                message: format!("Bad pwm frequency (GPIO {} disabled)", outcome.request().pin),
                to_stderr: true,
            },
            Err(err) => Report {
                status: EXIT_FAILURE,
                message: err.to_string(),
                to_stderr: true,
            },
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG takes precedence over -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    debug!("{:?}", args);

    let result = ClockConfig::new(args.sample_rate, args.clock_peripheral.into(), false)
        .map_err(configurator::Error::Setup)
        .and_then(|clock| {
            let mut driver = SysfsDriver::new(&args.chip);
            configurator::configure(&mut driver, clock, args.values.as_slice())
        });

    let report = Report::from(result);
    if report.to_stderr {
        eprintln!("{}", report.message);
    } else {
        println!("{}", report.message);
    }

    ExitCode::from(report.status)
}
