pub mod ack;
pub mod command;

pub use ack::{AckMessage, DiscoveryEntry, ReadRegResult, WriteRegResult};
pub use command::{Assignment, Command};

pub const GVCP_PORT: u16 = 3956;
pub const GVCP_MAGIC: u8 = 0x42;
pub const HEADER_LEN: usize = 8;

pub const FLAG_ACK_REQUIRED: u8 = 0b0000_0001;
pub const FLAG_ALLOW_BROADCAST_ACK: u8 = 0b0001_0000;

pub const STATUS_SUCCESS: u16 = 0x0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CommandCode {
    Discovery = 0x0002,
    DiscoveryAck = 0x0003,
    ForceIp = 0x0004,
    ForceIpAck = 0x0005,
    ReadReg = 0x0080,
    ReadRegAck = 0x0081,
    WriteReg = 0x0082,
    WriteRegAck = 0x0083,
}

impl CommandCode {
    /// Acknowledge code a device answers this command with.
    pub fn ack(self) -> CommandCode {
        match self {
            CommandCode::Discovery | CommandCode::DiscoveryAck => CommandCode::DiscoveryAck,
            CommandCode::ForceIp | CommandCode::ForceIpAck => CommandCode::ForceIpAck,
            CommandCode::ReadReg | CommandCode::ReadRegAck => CommandCode::ReadRegAck,
            CommandCode::WriteReg | CommandCode::WriteRegAck => CommandCode::WriteRegAck,
        }
    }
}

impl From<CommandCode> for u16 {
    fn from(code: CommandCode) -> Self {
        code as u16
    }
}

impl TryFrom<u16> for CommandCode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0002 => Ok(CommandCode::Discovery),
            0x0003 => Ok(CommandCode::DiscoveryAck),
            0x0004 => Ok(CommandCode::ForceIp),
            0x0005 => Ok(CommandCode::ForceIpAck),
            0x0080 => Ok(CommandCode::ReadReg),
            0x0081 => Ok(CommandCode::ReadRegAck),
            0x0082 => Ok(CommandCode::WriteReg),
            0x0083 => Ok(CommandCode::WriteRegAck),
            other => Err(other),
        }
    }
}
