//! Driver for the I2C "RGB cooling hat" (fan + three RGB LEDs).

pub mod device_io;
pub mod protocol;

use std::{
    collections::{HashMap, hash_map::Entry},
    path::PathBuf,
};

use i2cdev::{core::I2CDevice, linux::LinuxI2CDevice};
use log::debug;

use crate::error::BusError;

use self::device_io::BusPort;

/// Linux `/dev/i2c-N` bus using SMBus byte-data writes.
///
/// Device handles are opened lazily per slave address with packet error
/// checking enabled. A handle whose write fails is dropped, so the next
/// attempt reopens the device node.
///
/// # Example
///
/// ```no_run
/// use fanhatd::drivers::cooling_hat::{I2cBus, device_io::BusPort, protocol};
///
/// let mut bus = I2cBus::new(1);
/// bus.write_register(protocol::DEVICE_ADDR, protocol::FAN_SPEED_REG, 0x01)?;
/// # Ok::<(), fanhatd::error::BusError>(())
/// ```
pub struct I2cBus {
    bus: u8,
    devices: HashMap<u8, LinuxI2CDevice>,
}

impl I2cBus {
    pub fn new(bus: u8) -> Self {
        Self {
            bus,
            devices: HashMap::new(),
        }
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/i2c-{}", self.bus))
    }

    fn device(&mut self, addr: u8) -> Result<&mut LinuxI2CDevice, BusError> {
        let path = self.path();
        let bus = self.bus;
        match self.devices.entry(addr) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!("Opening {} for device {addr:#04x}", path.display());
                let open_err = |e: i2cdev::linux::LinuxI2CError| BusError::Open {
                    bus,
                    addr,
                    reason: e.to_string(),
                };
                let mut dev = LinuxI2CDevice::new(&path, u16::from(addr)).map_err(open_err)?;
                dev.set_smbus_pec(true).map_err(open_err)?;
                Ok(entry.insert(dev))
            }
        }
    }
}

impl BusPort for I2cBus {
    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        let result = self.device(addr)?.smbus_write_byte_data(reg, value);
        result.map_err(|e| {
            self.devices.remove(&addr);
            BusError::Write(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_path_follows_number() {
        assert_eq!(I2cBus::new(0).path(), PathBuf::from("/dev/i2c-0"));
        assert_eq!(I2cBus::new(1).path(), PathBuf::from("/dev/i2c-1"));
    }

    #[test]
    fn missing_bus_reports_open_error() {
        let mut bus = I2cBus::new(250);
        let err = bus
            .write_register(protocol::DEVICE_ADDR, protocol::FAN_SPEED_REG, 0x00)
            .unwrap_err();
        match err {
            BusError::Open { bus, addr, .. } => {
                assert_eq!(bus, 250);
                assert_eq!(addr, protocol::DEVICE_ADDR);
            }
            other => panic!("expected open error, got {other:?}"),
        }
        assert!(bus.devices.is_empty());
    }
}
