use crate::error::GvcpError;
use crate::packet::{CommandCode, HEADER_LEN};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

const DISCOVERY_MAC_OFFSET: usize = 10;
const DISCOVERY_IP_OFFSET: usize = 9 * 4;
// 0xD8 in the discovery acknowledge payload.
const DISCOVERY_SERIAL_OFFSET: usize = 18 * 4 + 3 * 32 + 48;
const DISCOVERY_SERIAL_LEN: usize = 16;

/// GVCP acknowledge packet
/// Format:
/// 2B status | 2B acknowledge | 2B length | 2B ack_id | payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckMessage {
    pub status: u16,
    pub acknowledge: u16,
    pub length: u16,
    pub ack_id: u16,
    pub payload: Vec<u8>,
}

impl AckMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GvcpError> {
        if bytes.len() < HEADER_LEN {
            return Err(GvcpError::Framing(format!(
                "packet too small ({} bytes)",
                bytes.len()
            )));
        }

        Ok(AckMessage {
            status: BigEndian::read_u16(&bytes[0..2]),
            acknowledge: BigEndian::read_u16(&bytes[2..4]),
            length: BigEndian::read_u16(&bytes[4..6]),
            ack_id: BigEndian::read_u16(&bytes[6..8]),
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Parses `bytes` and checks it answers the request `req_id` with
    /// acknowledge type `expected`.
    pub fn verify(bytes: &[u8], expected: CommandCode, req_id: u16) -> Result<Self, GvcpError> {
        let ack = AckMessage::from_bytes(bytes)?;

        if ack.acknowledge != u16::from(expected) {
            let received = match CommandCode::try_from(ack.acknowledge) {
                Ok(code) => format!("{:?}", code),
                Err(raw) => format!("0x{:04x}", raw),
            };
            return Err(GvcpError::Correlation(format!(
                "wrong acknowledge type ({} instead of {:?})",
                received, expected
            )));
        }

        if ack.ack_id != req_id {
            return Err(GvcpError::Correlation(format!(
                "wrong ack_id ({} instead of {})",
                ack.ack_id, req_id
            )));
        }

        if usize::from(ack.length) != ack.payload.len() {
            debug!(
                "Length field says {} bytes, datagram carries {}",
                ack.length,
                ack.payload.len()
            );
        }

        Ok(ack)
    }

    pub fn to_read_reg_values(&self) -> Result<Vec<u32>, GvcpError> {
        if self.payload.len() % 4 != 0 {
            return Err(GvcpError::Framing(format!(
                "wrong payload size ({}) for READREG_ACK",
                self.payload.len()
            )));
        }

        let mut values = vec![0u32; self.payload.len() / 4];
        BigEndian::read_u32_into(&self.payload, &mut values);
        Ok(values)
    }

    /// Returns the register index reported by the device. The leading u16
    /// is reserved.
    pub fn to_write_reg_index(&self) -> Result<u16, GvcpError> {
        if self.payload.len() != 4 {
            return Err(GvcpError::Framing(format!(
                "wrong payload size ({}) for WRITEREG_ACK",
                self.payload.len()
            )));
        }

        Ok(BigEndian::read_u16(&self.payload[2..4]))
    }

    pub fn to_discovery_entry(&self) -> Result<DiscoveryEntry, GvcpError> {
        let data = &self.payload;
        let serial_end = DISCOVERY_SERIAL_OFFSET + DISCOVERY_SERIAL_LEN;
        if data.len() < serial_end {
            return Err(GvcpError::Framing(format!(
                "discovery payload too small ({} bytes, need {})",
                data.len(),
                serial_end
            )));
        }

        let mut mac = [0u8; 6];
        mac.copy_from_slice(&data[DISCOVERY_MAC_OFFSET..DISCOVERY_MAC_OFFSET + 6]);

        let ip = Ipv4Addr::from(BigEndian::read_u32(
            &data[DISCOVERY_IP_OFFSET..DISCOVERY_IP_OFFSET + 4],
        ));

        let raw_serial = &data[DISCOVERY_SERIAL_OFFSET..serial_end];
        let trimmed_len = raw_serial
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let serial = std::str::from_utf8(&raw_serial[..trimmed_len])
            .map_err(|e| GvcpError::Framing(format!("serial number is not UTF-8: {}", e)))?
            .to_string();

        Ok(DiscoveryEntry { serial, ip, mac })
    }
}

/// Device identity announced in a discovery acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEntry {
    pub serial: String,
    pub ip: Ipv4Addr,
    pub mac: [u8; 6],
}

impl fmt::Display for DiscoveryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:16} {:16} {}",
            self.serial,
            self.ip.to_string(),
            format_mac(&self.mac)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRegResult {
    pub status: u16,
    pub values: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRegResult {
    pub status: u16,
    pub index: u16,
}

pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}
