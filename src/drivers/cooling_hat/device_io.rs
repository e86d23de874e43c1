use crate::error::BusError;

/// Register-level write access to devices on a shared bus.
///
/// The control core treats the bus as opaque: one call, one register, one
/// byte. Implementations decide how the device is reached.
#[cfg_attr(test, mockall::automock)]
pub trait BusPort: Send + 'static {
    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError>;
}
