//! Relay output and the ring driver.
//!
//! [`RelayPin`] is the seam to the physical output. The Raspberry Pi GPIO
//! backend lives behind the `rpi` feature; development hosts use
//! [`NoopPin`], which only logs. [`Relay::ring`] is the one actuation
//! operation: pin high, hold for the ring duration, pin low.

use crate::error::Result;
use std::time::Duration;
use tokio::sync::Mutex;

/// A binary output the relay driver can switch.
pub trait RelayPin: Send + Sync {
    /// Drive the output to its active level.
    fn set_high(&mut self) -> Result<()>;
    /// Drive the output to its inactive level.
    fn set_low(&mut self) -> Result<()>;
}

/// The single relay output.
///
/// One actuation lock serializes overlapping rings: two triggers a second
/// apart with a multi-second duration ring back to back instead of racing
/// the pin level.
pub struct Relay {
    pin: Mutex<Box<dyn RelayPin>>,
}

impl Relay {
    /// Wrap a pin as the relay output.
    pub fn new(pin: impl RelayPin + 'static) -> Self {
        Self {
            pin: Mutex::new(Box::new(pin)),
        }
    }

    /// Fire the relay for `duration_secs` seconds.
    ///
    /// A zero duration is the armed-but-inert state: no pin transition,
    /// no start/stop logs. Pin faults are logged and end the ring; the
    /// firing is not retried.
    pub async fn ring(&self, source: &str, duration_secs: u64) {
        if duration_secs == 0 {
            return;
        }

        let mut pin = self.pin.lock().await;

        if let Err(e) = pin.set_high() {
            tracing::error!(trigger = source, error = %e, "cannot drive relay high");
            return;
        }
        tracing::info!(trigger = source, duration_secs, "ring started");

        tokio::time::sleep(Duration::from_secs(duration_secs)).await;

        if let Err(e) = pin.set_low() {
            tracing::error!(trigger = source, error = %e, "cannot drive relay low");
            return;
        }
        tracing::info!(trigger = source, "ring stopped");
    }
}

/// Logging-only pin for hosts without GPIO.
#[derive(Debug, Default)]
pub struct NoopPin;

impl RelayPin for NoopPin {
    fn set_high(&mut self) -> Result<()> {
        tracing::debug!("noop pin high");
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        tracing::debug!("noop pin low");
        Ok(())
    }
}

/// Raspberry Pi GPIO pin via the BCM peripheral interface.
#[cfg(feature = "rpi")]
pub struct GpioPin {
    pin: rppal::gpio::OutputPin,
}

#[cfg(feature = "rpi")]
impl GpioPin {
    /// Open the given BCM pin in output mode, starting low.
    pub fn open(bcm_pin: u8) -> Result<Self> {
        use crate::error::BellError;

        let gpio = rppal::gpio::Gpio::new()
            .map_err(|e| BellError::Relay(format!("cannot open GPIO: {e}")))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| BellError::Relay(format!("cannot claim BCM pin {bcm_pin}: {e}")))?
            .into_output_low();
        Ok(Self { pin })
    }
}

#[cfg(feature = "rpi")]
impl RelayPin for GpioPin {
    fn set_high(&mut self) -> Result<()> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        self.pin.set_low();
        Ok(())
    }
}
