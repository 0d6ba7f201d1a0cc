//! Implement the `Cable` trait for FTDI MPSSE adapters, and the "jtagkey" compatible boards like
//! the Bus Blaster built on them.
use crate::cable::Cable;
use crate::error::TransportError;

use std::time::Duration;

use alloc::vec;
use alloc::vec::Vec;
use libftd2xx::{Ft2232h, Ftdi, FtdiMpsse, MpsseCmdBuilder, MpsseCmdExecutor, FtdiCommon};
use ftdi_mpsse::{ClockTMSOut, ClockTMS};
use libftd2xx::{ClockData, ClockDataOut, ClockBits, ClockBitsOut};

// Commands are batched up to this many bytes before being sent
const MAX_BUFFER: usize = 4096;

pub struct Mpsse<T> {
    ft: T,
    // Commands not yet sent to the adapter
    buffer: Vec<u8>,
}

impl<T: FtdiMpsse + MpsseCmdExecutor> Mpsse<T>
    where <T as MpsseCmdExecutor>::Error: core::fmt::Debug
{
    pub fn new(mut ft: T, clock: u32) -> Result<Self, TransportError>
    {
        ft.initialize_mpsse_default().map_err(TransportError::cable("initialise MPSSE"))?;
        ft.set_clock(clock).map_err(TransportError::cable("set clock"))?;

        let builder = MpsseCmdBuilder::new()
            .disable_3phase_data_clocking()
            .disable_adaptive_data_clocking();
        ft.send(builder.as_slice()).map_err(TransportError::cable("configure clocking"))?;

        Ok(Self {
            ft,
            buffer: vec![],
        })
    }

    fn push(&mut self, builder: MpsseCmdBuilder) -> Result<(), TransportError> {
        let cmds = builder.as_slice();
        if cmds.len() + self.buffer.len() > MAX_BUFFER {
            self.flush()?;
        }
        self.buffer.extend_from_slice(cmds);
        Ok(())
    }

    // Send everything queued so far plus `builder`, and collect `bytes` of response
    fn transfer(&mut self, builder: MpsseCmdBuilder, bytes: usize) -> Result<Vec<u8>, TransportError> {
        self.buffer.extend_from_slice(builder.as_slice());
        let mut recv = vec![0; bytes];
        let result = self.ft.xfer(&self.buffer, &mut recv);
        self.buffer.clear();
        result.map_err(TransportError::cable("transfer MPSSE commands"))?;
        Ok(recv)
    }
}

impl<T: FtdiMpsse + MpsseCmdExecutor> Cable for Mpsse<T>
    where <T as MpsseCmdExecutor>::Error: core::fmt::Debug
{
    fn change_mode(&mut self, tms: &[usize], tdo: bool) -> Result<(), TransportError> {
        let mut count = 0;
        let mut buf = 0;
        let mut builder = MpsseCmdBuilder::new();

        for x in tms {
            if *x != 0 {
                buf |= 1 << count;
            }
            count += 1;

            if count == 7 {
                builder = builder.clock_tms_out(ClockTMSOut::NegEdge, buf, tdo, count);
                count = 0;
                buf = 0;
            }
        }
        if count > 0 {
            builder = builder.clock_tms_out(ClockTMSOut::NegEdge, buf, tdo, count);
        }
        self.push(builder)
    }

    fn read_data(&mut self, mut bits: usize) -> Result<Vec<u8>, TransportError>
    {
        let mut bytes = bits / 8;
        let mut builder = MpsseCmdBuilder::new();
        if bytes > 0 {
            bits -= bytes * 8;
            builder = builder.clock_data(ClockData::LsbPosIn, &vec![0xff; bytes]);
        }

        if bits > 0 {
            builder = builder.clock_bits(ClockBits::LsbPosIn, 0xff, bits as u8);
            bytes += 1;
        }

        let mut buf = self.transfer(builder, bytes)?;
        if bits > 0 {
            let last_idx = buf.len()-1;
            buf[last_idx] >>= 8 - bits;
        }
        Ok(buf)
    }

    fn write_data(&mut self, data: &[u8], mut bits: u8, pause_after: bool) -> Result<(), TransportError>
    {
        let mut builder = MpsseCmdBuilder::new();
        assert!(bits <= 8);
        assert!(bits != 0);

        // We will send the last bit using clock_tms
        bits -= 1;

        if data.len() > 1 {
            builder = builder.clock_data_out(ClockDataOut::LsbNeg, &data[..data.len()-1]);
        }
        let last_byte = data[data.len()-1];
        if bits >= 1 {
            builder = builder.clock_bits_out(ClockBitsOut::LsbNeg, last_byte, bits);
        }
        let last_bit = last_byte & (1 << bits) != 0;
        // Change to pause state
        if pause_after {
            builder = builder.clock_tms_out(ClockTMSOut::NegEdge, 1, last_bit, 2);
        } else {
            builder = builder.clock_tms_out(ClockTMSOut::NegEdge, 0, last_bit, 1);
        }

        self.push(builder)
    }

    fn read_write_data(&mut self, data: &[u8], mut bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        let mut read_bytes = 0;
        let mut builder = MpsseCmdBuilder::new();

        assert!(bits <= 8);
        assert!(bits != 0);

        // We will send the last bit using clock_tms
        bits -= 1;

        let whole = data.len() - 1;
        if whole > 0 {
            builder = builder.clock_data(ClockData::LsbPosIn, &data[..whole]);
            read_bytes += whole;
        }
        let last_byte = data[whole];
        if bits >= 1 {
            builder = builder.clock_bits(ClockBits::LsbPosIn, last_byte, bits);
            read_bytes += 1;
        }
        let last_bit = last_byte & (1 << bits) != 0;

        let tms = if pause_after { 1 } else { 0 };
        builder = builder.clock_tms(ClockTMS::NegTMSPosTDO, tms, last_bit, 1);
        read_bytes += 1;
        if pause_after {
            // Exit1 -> Pause
            builder = builder.clock_tms_out(ClockTMSOut::NegEdge, 0, last_bit, 1);
        }

        let recv = self.transfer(builder, read_bytes)?;

        // clock_bits and clock_tms shift in from the top of the byte
        let mut out = recv[..whole].to_vec();
        let mut idx = whole;
        let mut last = 0;
        if bits >= 1 {
            last = recv[idx] >> (8 - bits);
            idx += 1;
        }
        last |= (recv[idx] >> 7) << bits;
        out.push(last);
        Ok(out)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let result = self.ft.send(&self.buffer);
        self.buffer.clear();
        result.map_err(TransportError::cable("flush MPSSE commands"))
    }
}

// Lower pins
const PIN_TCK: u8 = 1;
const PIN_TDI: u8 = 1 << 1;
//const PIN_TDO: u8 = 1 << 2;
const PIN_TMS: u8 = 1 << 3;
const PIN_N_OE: u8 = 1 << 4;
const LOWER_OUTPUT_PINS: u8 = PIN_TCK | PIN_TDI | PIN_TMS | PIN_N_OE;

// Upper pins
const PIN_N_TRST: u8 = 1;
const PIN_N_SRST: u8 = 1 << 1;
const PIN_N_TRST_OE: u8 = 1 << 2;
const PIN_N_SRST_OE: u8 = 1 << 3;
const UPPER_OUTPUT_PINS: u8 = PIN_N_TRST | PIN_N_SRST | PIN_N_TRST_OE | PIN_N_SRST_OE;

pub struct JtagKey {
    ft: Mpsse<Ft2232h>,
}

impl JtagKey {
    /// Open a JtagKey.  FT2232-based adapters like JtagKey have both an "A" interface and a
    /// "B" interface.  `primary` controls which to use. `clock` controls the speed of TCLK in hertz.
    pub fn new(clock: u32, primary: bool) -> Result<Self, TransportError> {
        let description = if primary {
            "Dual RS232-HS A"
        } else {
            "Dual RS232-HS B"
        };
        let ft = Ftdi::with_description(description).map_err(TransportError::cable("open FTDI device"))?;
        let ft = Ft2232h::try_from(ft).map_err(TransportError::cable("open FT2232H"))?;
        let mut ft = Mpsse::new(ft, clock)?;
        ft.ft.set_latency_timer(Duration::from_millis(0)).map_err(TransportError::cable("set latency timer"))?;
        ft.ft.set_gpio_upper(PIN_N_TRST | PIN_N_SRST, UPPER_OUTPUT_PINS).map_err(TransportError::cable("set upper pins"))?;

        let builder = MpsseCmdBuilder::new()
            .set_gpio_lower(PIN_TMS, LOWER_OUTPUT_PINS);
        ft.ft.send(builder.as_slice()).map_err(TransportError::cable("set lower pins"))?;

        log::debug!("opened jtagkey on '{}' at {} Hz", description, clock);
        Ok(JtagKey {
            ft,
        })
    }

    /// JtagKey adapters implement the optional SRST signal.  This function puts the system in
    /// reset.
    pub fn assert_srst(&mut self) -> Result<(), TransportError> {
        self.ft.ft.set_gpio_upper(PIN_N_TRST, UPPER_OUTPUT_PINS).map_err(TransportError::cable("assert SRST"))
    }

    /// Take the system out of reset.
    pub fn deassert_srst(&mut self) -> Result<(), TransportError> {
        self.ft.ft.set_gpio_upper(PIN_N_TRST | PIN_N_SRST, UPPER_OUTPUT_PINS).map_err(TransportError::cable("deassert SRST"))
    }
}

impl Cable for JtagKey {
    fn change_mode(&mut self, tms: &[usize], tdo: bool) -> Result<(), TransportError> {
        self.ft.change_mode(tms, tdo)
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
        self.ft.read_data(bits)
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        self.ft.write_data(data, bits, pause_after)
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        self.ft.read_write_data(data, bits, pause_after)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.ft.flush()
    }
}
