use std::sync::{Arc, Mutex};

use ads131a04::DataReadyLine;
use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin};
use rppal::gpio::{self, Trigger};

type Handler = Arc<Mutex<Box<dyn FnMut() + Send>>>;

#[derive(Debug)]
pub struct GpioError(gpio::Error);

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// DRDY on a Raspberry Pi GPIO, interrupting on the falling edge.
pub struct DataReadyPin {
    pin: gpio::InputPin,
    handler: Option<Handler>,
}

impl DataReadyPin {
    pub fn new(pin: gpio::InputPin) -> Self {
        Self { pin, handler: None }
    }
}

impl ErrorType for DataReadyPin {
    type Error = GpioError;
}

impl InputPin for DataReadyPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}

impl DataReadyLine for DataReadyPin {
    fn attach<F>(&mut self, handler: F) -> Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static,
    {
        self.handler = Some(Arc::new(Mutex::new(Box::new(handler))));
        Ok(())
    }

    fn detach(&mut self) -> Result<(), Self::Error> {
        self.handler = None;
        Ok(())
    }

    fn enable_interrupt(&mut self) -> Result<(), Self::Error> {
        let Some(handler) = self.handler.clone() else {
            return Ok(());
        };

        self.pin
            .set_async_interrupt(Trigger::FallingEdge, move |_| {
                if let Ok(mut handler) = handler.lock() {
                    (*handler)();
                }
            })
            .map_err(GpioError)
    }

    fn disable_interrupt(&mut self) -> Result<(), Self::Error> {
        self.pin.clear_async_interrupt().map_err(GpioError)
    }
}
