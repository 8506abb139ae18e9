//! Command APDU decoding and response framing
//!
//! A command buffer is a 5-byte header `[CLA, INS, P1, P2, P3]` followed by
//! the bytes actually received. P3 is `Lc` for commands carrying data and
//! `Le` for GET_BALANCE.

use crate::{types::StatusWord, Error, Result};

/// CLA byte of the wallet application
pub const WALLET_CLA: u8 = 0x80;

/// INS byte of ISO SELECT
pub const INS_SELECT: u8 = 0xA4;

/// Header length
pub const HEADER_LEN: usize = 5;

/// CLA offset
pub const OFFSET_CLA: usize = 0;
/// INS offset
pub const OFFSET_INS: usize = 1;
/// P1 offset
pub const OFFSET_P1: usize = 2;
/// P2 offset
pub const OFFSET_P2: usize = 3;
/// P3 (Lc / Le) offset
pub const OFFSET_P3: usize = 4;

/// Wallet instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    /// Present the PIN
    Verify = 0x20,
    /// Unblock with the recovery code
    ResetPinCounter = 0x2C,
    /// Credit currency and/or volume
    Credit = 0x30,
    /// Debit volume
    Debit = 0x40,
    /// Read balances
    GetBalance = 0x50,
}

impl TryFrom<u8> for Instruction {
    type Error = Error;

    fn try_from(ins: u8) -> Result<Self> {
        match ins {
            0x20 => Ok(Instruction::Verify),
            0x2C => Ok(Instruction::ResetPinCounter),
            0x30 => Ok(Instruction::Credit),
            0x40 => Ok(Instruction::Debit),
            0x50 => Ok(Instruction::GetBalance),
            other => Err(Error::InstructionNotSupported(other)),
        }
    }
}

/// Decoded command header plus received data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    /// Class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// First parameter
    pub p1: u8,
    /// Second parameter
    pub p2: u8,
    /// Declared length (Lc or Le)
    pub p3: u8,
    /// Bytes received after the header
    pub data: &'a [u8],
}

impl<'a> Command<'a> {
    /// Split a raw buffer into header and data
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::WrongLength {
                expected: HEADER_LEN,
                actual: buffer.len(),
            });
        }

        Ok(Self {
            cla: buffer[OFFSET_CLA],
            ins: buffer[OFFSET_INS],
            p1: buffer[OFFSET_P1],
            p2: buffer[OFFSET_P2],
            p3: buffer[OFFSET_P3],
            data: &buffer[HEADER_LEN..],
        })
    }

    /// Interindustry class: CLA bit 8 clear
    pub fn is_interindustry(&self) -> bool {
        self.cla & 0x80 == 0
    }

    /// Declared Lc
    pub fn lc(&self) -> usize {
        self.p3 as usize
    }

    /// Expected response length; `0` encodes 256
    pub fn le(&self) -> usize {
        match self.p3 {
            0 => 256,
            n => n as usize,
        }
    }

    /// Received data, provided it matches the declared Lc
    pub fn payload(&self) -> Result<&'a [u8]> {
        if self.data.len() != self.lc() {
            return Err(Error::WrongLength {
                expected: self.lc(),
                actual: self.data.len(),
            });
        }
        Ok(self.data)
    }

    /// Data field whose declared and received lengths both equal `expected`
    pub fn data_exact(&self, expected: usize) -> Result<&'a [u8]> {
        self.payload()?;
        if self.data.len() != expected {
            return Err(Error::WrongLength {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(self.data)
    }

    /// Data field whose declared and received lengths agree and fall in `min..=max`
    pub fn data_within(&self, min: usize, max: usize) -> Result<&'a [u8]> {
        self.payload()?;
        if !(min..=max).contains(&self.data.len()) {
            return Err(Error::WrongLength {
                expected: min,
                actual: self.data.len(),
            });
        }
        Ok(self.data)
    }
}

/// Response APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data (possibly empty)
    pub data: Vec<u8>,
    /// Trailer status word
    pub status: StatusWord,
}

impl Response {
    /// Successful response with data
    pub fn ok(data: Vec<u8>) -> Self {
        Self {
            data,
            status: StatusWord::OK,
        }
    }

    /// Successful response without data
    pub fn empty() -> Self {
        Self::ok(Vec::new())
    }

    /// Failure response: status word only
    pub fn failure(status: StatusWord) -> Self {
        Self {
            data: Vec::new(),
            status,
        }
    }

    /// Wire form: data followed by SW1 SW2
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 2);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.status.to_bytes());
        out
    }
}

impl From<&Error> for Response {
    fn from(err: &Error) -> Self {
        Response::failure(err.status_word())
    }
}
