use crate::error::GvcpError;
use crate::packet::{
    CommandCode, FLAG_ACK_REQUIRED, FLAG_ALLOW_BROADCAST_ACK, GVCP_MAGIC, HEADER_LEN,
};
use byteorder::{BigEndian, ByteOrder};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// GVCP command packet
/// Format:
/// 0       1       2               4               6               8
/// +-------+-------+---------------+---------------+---------------+
/// | magic | flag  | command       | length        | req_id        |
/// +-------+-------+---------------+---------------+---------------+
/// | payload[length]                                               |
/// +---------------------------------------------------------------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub flag: u8,
    pub code: CommandCode,
    pub payload: Vec<u8>,
}

impl Command {
    pub fn new(flag: u8, code: CommandCode, payload: Vec<u8>) -> Self {
        Command {
            flag,
            code,
            payload,
        }
    }

    pub fn discovery(allow_broadcast_ack: bool) -> Self {
        let mut flag = FLAG_ACK_REQUIRED;
        if allow_broadcast_ack {
            flag |= FLAG_ALLOW_BROADCAST_ACK;
        }
        Command::new(flag, CommandCode::Discovery, Vec::new())
    }

    /// The MAC is split into a 16-bit high half and a 32-bit low half, each
    /// padded to its own 32-bit field.
    pub fn force_ip(
        mac: [u8; 6],
        ip: Ipv4Addr,
        subnet_mask: Ipv4Addr,
        gateway: Ipv4Addr,
        ack_required: bool,
    ) -> Self {
        let flag = if ack_required { FLAG_ACK_REQUIRED } else { 0 };
        let mac_high = BigEndian::read_u16(&mac[0..2]) as u32;
        let mac_low = BigEndian::read_u32(&mac[2..6]);

        #[rustfmt::skip]
        let fields: [u32; 15] = [
            0, mac_high, mac_low,
            0, 0, 0, u32::from(ip),
            0, 0, 0, u32::from(subnet_mask),
            0, 0, 0, u32::from(gateway),
        ];

        let mut payload = vec![0u8; fields.len() * 4];
        BigEndian::write_u32_into(&fields, &mut payload);
        Command::new(flag, CommandCode::ForceIp, payload)
    }

    pub fn read_reg(addresses: &[u32]) -> Self {
        let mut payload = vec![0u8; addresses.len() * 4];
        BigEndian::write_u32_into(addresses, &mut payload);
        Command::new(FLAG_ACK_REQUIRED, CommandCode::ReadReg, payload)
    }

    /// Assignments are written in the given order; the device applies them
    /// in that order too.
    pub fn write_reg(assignments: &[Assignment]) -> Self {
        let mut payload = Vec::with_capacity(assignments.len() * 8);
        for assignment in assignments {
            let mut pair = [0u8; 8];
            BigEndian::write_u32(&mut pair[0..4], assignment.address);
            BigEndian::write_u32(&mut pair[4..8], assignment.value);
            payload.extend_from_slice(&pair);
        }
        Command::new(FLAG_ACK_REQUIRED, CommandCode::WriteReg, payload)
    }

    pub fn ack_required(&self) -> bool {
        self.flag & FLAG_ACK_REQUIRED != 0
    }

    pub fn to_bytes(&self, request_id: u16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.push(GVCP_MAGIC);
        bytes.push(self.flag);

        let mut fields = [0u8; 6];
        BigEndian::write_u16(&mut fields[0..2], self.code.into());
        BigEndian::write_u16(&mut fields[2..4], self.payload.len() as u16);
        BigEndian::write_u16(&mut fields[4..6], request_id);
        bytes.extend_from_slice(&fields);
        bytes.extend_from_slice(&self.payload);

        bytes
    }
}

/// A single register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub address: u32,
    pub value: u32,
}

impl Assignment {
    pub fn new(address: u32, value: u32) -> Self {
        Assignment { address, value }
    }
}

impl FromStr for Assignment {
    type Err = GvcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, value) = s.split_once('=').ok_or_else(|| {
            GvcpError::InvalidAssignment(format!("expected address=value, got '{}'", s))
        })?;

        let address = parse_int(address).map_err(GvcpError::InvalidAssignment)?;
        let value = parse_int(value).map_err(GvcpError::InvalidAssignment)?;
        Ok(Assignment { address, value })
    }
}

/// Parses a u32 written in decimal or with a 0x, 0o or 0b prefix.
pub fn parse_int(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let (digits, radix) = match s.get(0..2) {
        Some("0x") | Some("0X") => (&s[2..], 16),
        Some("0o") | Some("0O") => (&s[2..], 8),
        Some("0b") | Some("0B") => (&s[2..], 2),
        _ => (s, 10),
    };

    u32::from_str_radix(&digits.replace('_', ""), radix)
        .map_err(|e| format!("'{}' is not a valid 32-bit integer: {}", s, e))
}
