//! Bit-banged `Cable` over `embedded-hal` pins, for driving a scan chain straight from a
//! microcontroller.
use alloc::vec::Vec;
use alloc::vec;
use embedded_hal::{delay::DelayNs, digital::{InputPin, OutputPin, PinState}};

use crate::cable::Cable;
use crate::error::TransportError;

const MAX_FREQ_KHZ: u32 = 500_000;

pub struct Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    half_period: u32,
    delay: Delay,
    clock: Clk,
    tdi: Tdi,
    tdo: Tdo,
    tms: Tms
}

impl<Clk, Tdi, Tdo, Tms, Delay> Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    /// Bit-bang at `freq_khz`.  The half period must come out as at least one nanosecond, so
    /// 1..=500_000 kHz is accepted.
    pub fn new(freq_khz: u32, clock: Clk, tdi: Tdi, tdo: Tdo, tms: Tms, delay: Delay) -> Result<Self, TransportError> {
        if freq_khz == 0 || freq_khz > MAX_FREQ_KHZ {
            return Err(TransportError::InvalidClock(freq_khz));
        }
        let period_ns = 1_000_000 / freq_khz;
        let half_period = period_ns / 2;
        Ok(Gpio { half_period, clock, tdi, tdo, tms, delay })
    }

    // One TCK cycle: drive TDI, raise the clock, sample TDO, finish the period
    fn clock_bit(&mut self, tdi: bool) -> Result<bool, TransportError> {
        self.tdi.set_state(PinState::from(tdi)).map_err(TransportError::cable("drive TDI"))?;
        self.clock.set_high().map_err(TransportError::cable("raise TCK"))?;
        let tdo = self.tdo.is_high().map_err(TransportError::cable("sample TDO"))?;
        self.delay.delay_ns(self.half_period);
        self.clock.set_low().map_err(TransportError::cable("lower TCK"))?;
        self.delay.delay_ns(self.half_period);
        Ok(tdo)
    }
}

impl<Clk, Tdi, Tdo, Tms, Delay> Cable for Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    fn change_mode(&mut self, tms: &[usize], tdo: bool) -> Result<(), TransportError> {
        // clock starts low
        for d in tms {
            let state = match d {
                0 => PinState::Low,
                _ => PinState::High,
            };
            self.tms.set_state(state).map_err(TransportError::cable("drive TMS"))?;
            self.clock_bit(tdo)?;
        }
        Ok(())
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
        let ones = vec![0xff; crate::bits::bytes_for(bits)];
        self.read_write_data(&ones, crate::bits::last_byte_bits(bits), false)
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        self.read_write_data(data, bits, pause_after).map(|_| ())
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        // Constrain `bits` to be between 1 and 8
        let bits = bits.clamp(1, 8) as usize;
        let total = (data.len() - 1) * 8 + bits;

        let mut out_buffer = vec![0; data.len()];
        self.tms.set_low().map_err(TransportError::cable("drive TMS"))?;

        for i in 0..total {
            if i == total - 1 && pause_after {
                // Last bit leaves ShiftxR for Exit1xR
                self.tms.set_high().map_err(TransportError::cable("drive TMS"))?;
            }
            let tdi = data[i / 8] & (1 << (i % 8)) != 0;
            if self.clock_bit(tdi)? {
                out_buffer[i / 8] |= 1 << (i % 8);
            }
        }

        if pause_after {
            // Exit1xR -> PausexR
            self.tms.set_low().map_err(TransportError::cable("drive TMS"))?;
            self.clock_bit(true)?;
        }
        Ok(out_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    impl InputPin for Pin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn gpio(freq_khz: u32) -> Result<Gpio<Pin, Pin, Pin, Pin, NoDelay>, TransportError> {
        Gpio::new(freq_khz, Pin::default(), Pin::default(), Pin::default(), Pin::default(), NoDelay)
    }

    #[test]
    fn clock_out_of_range_is_rejected() {
        assert!(matches!(gpio(0), Err(TransportError::InvalidClock(0))));
        assert!(matches!(gpio(500_001), Err(TransportError::InvalidClock(500_001))));
    }

    #[test]
    fn half_period_follows_frequency() {
        assert_eq!(gpio(1_000).unwrap().half_period, 500);
        assert_eq!(gpio(500_000).unwrap().half_period, 1);
    }

    #[test]
    fn tdo_is_sampled_each_bit() {
        let mut cable = gpio(1_000).unwrap();
        cable.tdo.high = true;
        let out = cable.read_write_data(&[0x0f], 4, true).unwrap();
        assert_eq!(out, vec![0x0f]);
        assert!(!cable.tms.high);
    }
}
