//! # fanhatd
//!
//! A Linux daemon that drives the fan and RGB LEDs of an I2C "RGB cooling
//! hat" from a temperature reading.
//!
//! ## Architecture
//!
//! A single [`ControlLoop`](control_loop::ControlLoop) samples a
//! [`TemperatureSource`](sensors::TemperatureSource), evaluates one
//! [`ActuationPolicy`](policy::ActuationPolicy) and writes changed output
//! through a [`RetryingWriter`](retry::RetryingWriter) onto a
//! [`BusPort`](drivers::cooling_hat::device_io::BusPort).
//!
//! ## Example
//!
//! ```no_run
//! use fanhatd::{application::Application, config::Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None).await?;
//!     Application::builder()
//!         .with_config(config)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod actuation;
pub mod application;
pub mod cli;
pub mod config;
pub mod control_loop;
pub mod drivers;
pub mod error;
pub mod policy;
pub mod retry;
pub mod sensors;
pub mod temperature_sensors;
