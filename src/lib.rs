//! hwpwm configures one of the Raspberry Pi's hardware PWM channels and
//! leaves it running.
//!
//! The [`configurator`] validates a GPIO pin number, a frequency in hertz and
//! a duty cycle in parts per million, and forwards them to a [`driver`]. The
//! bundled [`SysfsDriver`] programs the PWM peripheral through
//! `/sys/class/pwm`, using the channel access in [`pwm`] and the board
//! identification in [`system`].
//!
//! hwpwm requires Raspberry Pi OS or any similar, recent, Linux distribution,
//! with the `pwm` or `pwm-2chan` device tree overlay enabled.
//!
//! [`SysfsDriver`]: driver/struct.SysfsDriver.html

pub mod configurator;
pub mod driver;
pub mod pwm;
pub mod system;
