//! Settings related to the serial port and the push protocol.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::push_protocol::SEGMENT_SIZE;

// =============================================================================
// Public Interface
// =============================================================================

/// Groups all settings used by `bootpush` and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: String,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,

    /// Path to the binary image to be pushed. It is read again from disk at
    /// each push attempt.
    pub image_path: String,

    /// Time allowed for the target to request the image, counted from the
    /// first byte it sends.
    pub readiness_budget: Duration,
    /// Maximum number of bytes returned by a single read on the link.
    pub max_read: usize,
    /// Maximum number of image bytes written in one go.
    pub segment_size: usize,
    /// Period at which the presence of the serial device is checked while
    /// waiting for it to come back.
    pub poll_interval: Duration,
    /// Timeout of a single blocking read/write on the serial port. Longer
    /// waits are made of several such slices.
    pub io_slice: Duration,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values have defaults that will be used if not explicitly set.
///
/// **Example**
///
/// ```
/// use bootpush::SettingsBuilder;
///
/// let settings = SettingsBuilder::new()
///     .path("/dev/ttyUSB0")
///     .image_path("kernel8.img")
///     .finalize();
/// assert_eq!(settings.baud_rate, 921_600);
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values, `/dev/ttyUSB0` as
    /// the port and `kernel8.img` as the image.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: "/dev/ttyUSB0".into(),
                baud_rate: 921_600,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                image_path: "kernel8.img".into(),
                readiness_budget: Duration::from_secs(10),
                max_read: 4096,
                segment_size: SEGMENT_SIZE,
                poll_interval: Duration::from_secs(1),
                io_slice: Duration::from_millis(50),
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = path.into().into_owned();
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set the path to the binary image
    pub fn image_path<'a>(mut self, image_path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.image_path = image_path.into().into_owned();
        self
    }

    pub fn readiness_budget(mut self, budget: Duration) -> Self {
        self.settings.readiness_budget = budget;
        self
    }

    /// Set the maximum size of a single read, at least 1 byte
    pub fn max_read(mut self, max_read: usize) -> Self {
        self.settings.max_read = max_read.max(1);
        self
    }

    /// Set the maximum size of a written image segment, at least 1 byte
    pub fn segment_size(mut self, segment_size: usize) -> Self {
        self.settings.segment_size = segment_size.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.settings.poll_interval = interval;
        self
    }

    pub fn io_slice(mut self, slice: Duration) -> Self {
        self.settings.io_slice = slice;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: "/dev/ttyUSB0".into(),
            baud_rate: 921_600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            image_path: "kernel8.img".into(),
            readiness_budget: Duration::from_secs(10),
            max_read: 4096,
            segment_size: 512,
            poll_interval: Duration::from_secs(1),
            io_slice: Duration::from_millis(50),
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyACM0").finalize();
    assert_eq!(settings.path, "/dev/ttyACM0");
}

#[test]
fn baud_rate() {
    let baud_rate = 115_200;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn serial_framing() {
    let settings = SettingsBuilder::new()
        .data_bits(DataBits::Seven)
        .flow_control(FlowControl::Hardware)
        .stop_bits(StopBits::Two)
        .parity(Parity::Even)
        .finalize();
    assert_eq!(settings.data_bits, DataBits::Seven);
    assert_eq!(settings.flow_control, FlowControl::Hardware);
    assert_eq!(settings.stop_bits, StopBits::Two);
    assert_eq!(settings.parity, Parity::Even);
}

#[test]
fn image_path() {
    let settings = SettingsBuilder::new()
        .image_path("test_kernel8.img")
        .finalize();
    assert_eq!(settings.image_path, "test_kernel8.img");
}

#[test]
fn sizes_are_never_zero() {
    let settings = SettingsBuilder::new().max_read(0).segment_size(0).finalize();
    assert_eq!(settings.max_read, 1);
    assert_eq!(settings.segment_size, 1);
}

#[test]
fn timings() {
    let settings = SettingsBuilder::new()
        .readiness_budget(Duration::from_secs(3))
        .poll_interval(Duration::from_millis(250))
        .io_slice(Duration::from_millis(10))
        .finalize();
    assert_eq!(settings.readiness_budget, Duration::from_secs(3));
    assert_eq!(settings.poll_interval, Duration::from_millis(250));
    assert_eq!(settings.io_slice, Duration::from_millis(10));
}
