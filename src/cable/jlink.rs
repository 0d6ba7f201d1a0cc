//! Implement the `Cable` trait for "jlink" compatible hardware adapters
use crate::cable::Cable;
use crate::error::TransportError;

use std::time::Duration;

use alloc::vec;
use alloc::vec::Vec;
use rusb::{DeviceHandle, Direction, GlobalContext};
use rusb::constants::*;

const TIMEOUT: Duration = Duration::from_millis(100);

const CMD_SET_SPEED: u8 = 0x05;
const CMD_GET_STATE: u8 = 0x07;
const CMD_SELECT_IF: u8 = 0xc7;
const CMD_HW_JTAG3: u8 = 0xcd;
const CMD_HW_RESET0: u8 = 0xdc;
const CMD_HW_RESET1: u8 = 0xdd;
const CMD_HW_TRST0: u8 = 0xde;
const CMD_HW_TRST1: u8 = 0xdf;

// Minimum target voltage, in millivolts
const MIN_VREF: u16 = 1500;

pub struct JLink {
    device: DeviceHandle<GlobalContext>,
    // queued bytes to send
    buffer: Vec<u8>,
    // number of bytes we'll receive after sending the above
    recv_bytes: usize,
    read_endpoint: u8,
    write_endpoint: u8,
}

impl JLink {
    pub fn new(clock: u32) -> Result<Self, TransportError> {
        let device = rusb::open_device_with_vid_pid(0x1366, 0x0105).ok_or(rusb::Error::NoDevice)?;
        let descriptor = device.device().active_config_descriptor()?;
        for i in descriptor.interfaces() {
            for d in i.descriptors() {
                if d.class_code() != LIBUSB_CLASS_VENDOR_SPEC ||
                    d.sub_class_code() != LIBUSB_CLASS_VENDOR_SPEC ||
                        d.num_endpoints() < 2 {
                            continue;
                }

                let mut read_endpoint = None;
                let mut write_endpoint = None;
                for e in d.endpoint_descriptors() {
                    match e.direction() {
                        Direction::In => read_endpoint = Some(e.address()),
                        Direction::Out => write_endpoint = Some(e.address()),
                    }
                }

                let (Some(read_endpoint), Some(write_endpoint)) = (read_endpoint, write_endpoint) else {
                    continue;
                };

                // Drain anything left over from a previous session
                let mut buf = [0; 2];
                let _ = device.read_bulk(read_endpoint, &mut buf, Duration::from_millis(10));

                let mut jlink = Self {
                    device,
                    buffer: vec![],
                    recv_bytes: 0,
                    read_endpoint,
                    write_endpoint,
                };

                jlink.get_status()?;
                jlink.set_clock(clock);
                jlink.set_interface(0)?;
                jlink.deassert_trst();
                jlink.deassert_srst();

                log::debug!("opened jlink at {} Hz", clock);
                return Ok(jlink);
            }
        }
        Err(rusb::Error::NoDevice.into())
    }

    fn send_command(&mut self, cmd: u8, data: &[u8]) {
        self.buffer.push(cmd);
        self.buffer.extend_from_slice(data);
    }

    fn transfer(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        // Submit any pending writes
        let wr = self.device.write_bulk(self.write_endpoint, &self.buffer, TIMEOUT);
        let pending = self.buffer.len();
        self.buffer.clear();
        if wr? != pending {
            return Err(TransportError::Cable {
                operation: "write J-Link commands",
                message: "short write".into(),
            });
        }

        let mut recv_bytes = len + self.recv_bytes;
        let mut data = vec![];

        while recv_bytes > 0 {
            let mut buffer = vec![0; recv_bytes];
            let len = self.device.read_bulk(self.read_endpoint, &mut buffer, TIMEOUT)?;
            buffer.truncate(len);
            data.append(&mut buffer);
            recv_bytes -= len;
        }

        // Don't return any of the data from the pending write that we didn't care about
        let data = data.split_off(self.recv_bytes);
        self.recv_bytes = 0;
        Ok(data)
    }

    pub fn get_status(&mut self) -> Result<Vec<u8>, TransportError> {
        self.send_command(CMD_GET_STATE, &[]);
        let data = self.transfer(8)?;

        let vref = u16::from_le_bytes([data[0], data[1]]);
        if vref < MIN_VREF {
            log::error!("jlink target voltage {} mV, possibly unpowered or disconnected", vref);
            return Err(TransportError::Cable {
                operation: "read target voltage",
                message: alloc::format!("vref too low ({} mV)", vref),
            });
        }
        Ok(data)
    }

    pub fn set_clock(&mut self, clock: u32) {
        let khz = ((clock / 1000) as u16).to_le_bytes();
        self.send_command(CMD_SET_SPEED, &khz);
    }

    pub fn set_interface(&mut self, intf: u8) -> Result<(), TransportError> {
        self.send_command(CMD_SELECT_IF, &[intf]);
        self.transfer(4)?;
        Ok(())
    }

    pub fn assert_srst(&mut self) {
        self.send_command(CMD_HW_RESET0, &[]);
    }

    pub fn deassert_srst(&mut self) {
        self.send_command(CMD_HW_RESET1, &[]);
    }

    pub fn assert_trst(&mut self) {
        self.send_command(CMD_HW_TRST0, &[]);
    }

    pub fn deassert_trst(&mut self) {
        self.send_command(CMD_HW_TRST1, &[]);
    }

    fn tap_sequence(&mut self, tms: &[u8], tdi: &[u8], bits: usize) {
        assert_eq!(tms.len(), tdi.len());
        assert!(tms.len() < 390);
        let mut cmdbuf = Vec::with_capacity(2 + tms.len() * 2);
        cmdbuf.extend_from_slice(&(bits as u16).to_le_bytes());
        cmdbuf.extend_from_slice(tms);
        cmdbuf.extend_from_slice(tdi);

        self.send_command(CMD_HW_JTAG3, &cmdbuf);
    }

    fn send_tdi(&mut self, data: &[u8], bits: u8, pause_after: bool) -> usize {
        let mut total_bits = (data.len()-1) * 8 + (bits as usize);

        let mut tms = vec![0; data.len()];
        let mut data = data.to_vec();

        if pause_after {
            // Last data bit moves to Exit1, the extra clock moves on to Pause
            let last = total_bits - 1;
            tms[last / 8] |= 1 << (last % 8);
            if total_bits % 8 == 0 {
                data.push(0xff);
                tms.push(0);
            }
            total_bits += 1;
        }

        let bytes = data.len();
        self.tap_sequence(&tms, &data, total_bits);
        bytes
    }
}

impl Cable for JLink {
    fn change_mode(&mut self, tms: &[usize], tdo: bool) -> Result<(), TransportError> {
        let mut buf = vec![];
        let mut byte = 0u8;
        for (i, x) in tms.iter().enumerate() {
            if *x != 0 {
                byte |= 1 << (i % 8);
            }
            if i % 8 == 7 {
                buf.push(byte);
                byte = 0;
            }
        }

        // Push the last byte for cases when we don't have a multiple of 8
        // transitions.
        if tms.len() % 8 != 0 {
            buf.push(byte);
        }

        let tdi = if tdo {
            vec![0xff; buf.len()]
        } else {
            vec![0; buf.len()]
        };

        self.tap_sequence(&buf, &tdi, tms.len());
        // We don't care about the returned bytes, so read them whenever we do the next read
        self.recv_bytes += tdi.len();
        Ok(())
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
        let buf = vec![0xff; crate::bits::bytes_for(bits)];
        self.read_write_data(&buf, crate::bits::last_byte_bits(bits), false)
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        let bytes = self.send_tdi(data, bits, pause_after);
        // We don't care about the returned bytes, so read them whenever we do the next read
        self.recv_bytes += bytes;
        Ok(())
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        let bytes = self.send_tdi(data, bits, pause_after);
        let mut recv = self.transfer(bytes)?;
        recv.truncate(data.len());
        Ok(recv)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.transfer(0).map(|_| ())
    }
}
