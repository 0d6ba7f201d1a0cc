//! Helpers for packing values into scan buffers.  Buffers are LSB-first: bit 0 of byte 0 is the
//! first bit shifted out on TDI (or the first bit captured from TDO).
use alloc::vec;
use alloc::vec::Vec;

fn get_bit(buf: &[u8], bit: usize) -> bool {
    buf[bit / 8] & (1 << (bit % 8)) != 0
}

fn set_bit(buf: &mut [u8], bit: usize, value: bool) {
    if value {
        buf[bit / 8] |= 1 << (bit % 8);
    } else {
        buf[bit / 8] &= !(1 << (bit % 8));
    }
}

/// Number of bytes needed to hold `bits` bits
pub fn bytes_for(bits: usize) -> usize {
    (bits + 7) / 8
}

/// Store the low `num` bits of `value` into `buf`, starting at bit `first`.  Other bits of `buf`
/// are left alone.
pub fn set_u32(buf: &mut [u8], first: usize, num: usize, value: u32) {
    assert!(num <= 32);
    if first % 8 == 0 && num == 32 {
        buf[first / 8..first / 8 + 4].copy_from_slice(&value.to_le_bytes());
        return;
    }
    for i in 0..num {
        set_bit(buf, first + i, (value >> i) & 1 != 0);
    }
}

/// Read `num` bits of `buf` starting at bit `first` as an unsigned value.
pub fn get_u32(buf: &[u8], first: usize, num: usize) -> u32 {
    assert!(num <= 32);
    if first % 8 == 0 && num == 32 {
        let mut word = [0; 4];
        word.copy_from_slice(&buf[first / 8..first / 8 + 4]);
        return u32::from_le_bytes(word);
    }
    let mut value = 0;
    for i in 0..num {
        if get_bit(buf, first + i) {
            value |= 1 << i;
        }
    }
    value
}

/// Copy `num` bits starting at bit `first` into a new buffer starting at bit 0.
pub fn extract(buf: &[u8], first: usize, num: usize) -> Vec<u8> {
    let mut out = vec![0; bytes_for(num)];
    for i in 0..num {
        set_bit(&mut out, i, get_bit(buf, first + i));
    }
    out
}

/// Number of bits used in the final byte of a `bits`-long field, as the `Cable` trait expects it
/// (8 for a whole byte).
pub fn last_byte_bits(bits: usize) -> u8 {
    match bits % 8 {
        0 => 8,
        n => n as u8,
    }
}
