use embedded_hal::digital::{Error, ErrorType, InputPin, OutputPin};

/// Open-drain access to the bus line
///
/// The line idles high through the pull-up. The master only ever pulls it low
/// or lets go of it; any device on the bus may hold it low at the same time.
pub trait IoWire {
    type Error: Error;

    /// Is the line high?
    fn is_high(&mut self) -> Result<bool, Self::Error>;

    /// Is the line low?
    fn is_low(&mut self) -> Result<bool, Self::Error>;

    /// Pulls the line low
    fn drive_low(&mut self) -> Result<(), Self::Error>;

    /// Releases the line to the pull-up
    ///
    /// *NOTE* the line stays low while a device keeps pulling it down
    fn release(&mut self) -> Result<(), Self::Error>;
}

/// Single open-drain pin
impl<IO> IoWire for (IO,)
where
    IO: ErrorType + OutputPin + InputPin,
{
    type Error = IO::Error;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn drive_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }
}

/// Separate sense input and open-drain output
impl<E, I, O> IoWire for (I, O)
where
    E: Error,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
{
    type Error = E;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn drive_low(&mut self) -> Result<(), Self::Error> {
        self.1.set_low()
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.1.set_high()
    }
}

/// Wrapper for pins behind an inverting buffer or transistor stage
pub struct Inverted<P>(pub P);

impl<P: ErrorType> ErrorType for Inverted<P> {
    type Error = P::Error;
}

impl<I> InputPin for Inverted<I>
where
    I: InputPin,
{
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }
}

impl<O> OutputPin for Inverted<O>
where
    O: OutputPin,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }
}
