//! Serial port device manipulation.

use std::{
    io::{self, Read, Write},
    time::Instant,
};

use hexplay::HexViewBuilder;
use log::{debug, info, log_enabled, trace, Level::Debug};
use serialport::{available_ports, ClearBuffer, SerialPort, SerialPortType};

use super::{Connector, Link};
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::shutdown::Shutdown;

//==============================================================================
// Public Interface
//==============================================================================

/// A [`Link`] over an open serial port.
///
/// Blocking operations are made of short slices (the port timeout) so that
/// deadlines and shutdown requests are honoured while waiting.
pub struct SerialLink {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    shutdown: Shutdown,
}

impl SerialLink {
    pub fn new(port: Box<dyn SerialPort>, shutdown: Shutdown) -> Self {
        SerialLink {
            name: port.name().unwrap_or_else(|| "serial".into()),
            port: Some(port),
            shutdown,
        }
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        if self.shutdown.is_requested() {
            return Err(io::ErrorKind::Interrupted.into());
        }
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl Link for SerialLink {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read_available(&mut self, max: usize, deadline: Option<Instant>) -> io::Result<Vec<u8>> {
        let mut serial_buf: Vec<u8> = vec![0; max];
        loop {
            match self.port()?.read(serial_buf.as_mut_slice()) {
                Ok(t) => {
                    trace!("{} bytes read from serial port", t);
                    serial_buf.truncate(t);

                    // Dump the received data in a hex table for debugging
                    if log_enabled!(Debug) && t > 0 {
                        let view = HexViewBuilder::new(&serial_buf)
                            .address_offset(0)
                            .row_width(16)
                            .finish();
                        debug!("received:\n{}", view);
                    }
                    return Ok(serial_buf);
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
                        return Err(io::ErrorKind::TimedOut.into());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.port()?.write(buf) {
                Ok(bytes_out) => {
                    trace!("{} bytes written to serial port", bytes_out);
                    return Ok(bytes_out);
                }
                // The output buffer is full, wait for it to drain.
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(port) = self.port.take() {
            if let Err(e) = port.clear(ClearBuffer::All) {
                debug!("error while clearing {}: {}", self.name, e);
            }
            info!("Closed {}", self.name);
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Opens [`SerialLink`]s on the device named in the [`Settings`].
pub struct SerialConnector {
    settings: Settings,
    shutdown: Shutdown,
}

impl SerialConnector {
    pub fn new(settings: Settings, shutdown: Shutdown) -> Self {
        SerialConnector { settings, shutdown }
    }
}

impl Connector for SerialConnector {
    fn open(&mut self) -> Result<Box<dyn Link>> {
        let port = open_and_setup_port(&self.settings)?;
        Ok(Box::new(SerialLink::new(port, self.shutdown.clone())))
    }

    fn is_connected(&self) -> bool {
        check_requested_port(&enumerate_serial_ports(), &self.settings.path)
    }

    fn name(&self) -> &str {
        &self.settings.path
    }
}

//==============================================================================
// Private stuff
//==============================================================================

fn open_and_setup_port(settings: &Settings) -> Result<Box<dyn SerialPort>> {
    use retry::{delay, retry_with_index};

    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(4),
        |index| -> std::result::Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to connect {}", index);
            serialport::new(&settings.path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control)
                .timeout(settings.io_slice)
                .open()
        },
    );
    let port = match result {
        Ok(port) => port,
        Err(retry::Error::Operation {
            error,
            total_delay,
            tries,
        }) => {
            info!(
                "Failed to open the port after {:?} and {} tries: {}",
                total_delay, tries, error,
            );
            return Err(Error::LinkLost(error.into()));
        }
        Err(retry::Error::Internal(message)) => {
            info!("Internal retry error while opening port: {}", message);
            return Err(Error::Unexpected(message));
        }
    };

    let baud_rate = port.baud_rate().map_err(|e| Error::LinkLost(e.into()))?;
    info!("Connected to {} at {} baud", settings.path, baud_rate);
    debug!("data_bits    : {:#?}", port.data_bits());
    debug!("stop_bits    : {:#?}", port.stop_bits());
    debug!("parity       : {:#?}", port.parity());
    debug!("flow control : {:#?}", port.flow_control());

    if baud_rate != settings.baud_rate {
        return Err(Error::Unexpected(format!(
            "failed to set the baud rate to {}, which is probably not a valid \
             one for this device",
            settings.baud_rate
        )));
    }

    Ok(port)
}

fn check_requested_port(ports: &[String], path: &str) -> bool {
    ports.iter().any(|detected_port| detected_port == path)
}

/// Enumerates serial devices on the system
fn enumerate_serial_ports() -> Vec<String> {
    match available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| {
                if let SerialPortType::UsbPort(info) = &p.port_type {
                    trace!(
                        "{}: ({} / {})",
                        p.port_name,
                        info.manufacturer.as_deref().unwrap_or(""),
                        info.product.as_deref().unwrap_or("")
                    );
                }
                p.port_name
            })
            .collect(),
        Err(ref e) => {
            info!("error: {}", e.to_string());
            vec![]
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
