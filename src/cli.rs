use crate::error::GvcpError;
use crate::netconfig::StaticConfig;
use crate::packet::ack::format_mac;
use crate::packet::command::parse_int;
use crate::packet::Assignment;
use clap::{ArgAction, Error, Parser, Subcommand};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "forceip")]
#[command(about = "Discover and configure the network identity of GigE Vision style devices")]
#[command(
    infer_subcommands = true,
    after_help = "After making changes to IP configuration, a device reset may be \
                  required to apply the changes."
)]
pub struct Args {
    /// Log wire-level detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Acknowledge timeout for register commands, in milliseconds
    #[arg(long, global = true, value_name = "MS", default_value_t = 1000)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Broadcast a discovery command and print the devices that answer
    #[command(alias = "discovery")]
    Discover {
        /// Disallow broadcast of the discovery response
        #[arg(short = 'B', action = ArgAction::SetFalse)]
        allow_broadcast_ack: bool,
    },

    /// Send a FORCEIP command to the device with the given MAC address.
    /// Without an ip the device falls back to its stored configuration.
    Forceip {
        /// Require acknowledge for the FORCEIP command
        #[arg(short = 'a')]
        ack_required: bool,

        /// MAC address of the device (format xx:xx:xx:xx:xx:xx)
        mac: MacAddress,

        /// The new IP
        ip: Option<Ipv4Addr>,

        /// The new subnet mask
        subnet_mask: Option<SubnetMask>,

        /// The new default gateway
        gateway: Option<Ipv4Addr>,
    },

    /// Issue a READREG command to a device
    Readreg {
        /// IPv4 address or host name of the device
        device: String,

        #[arg(value_name = "ADDRESS", required = true, value_parser = parse_register)]
        addresses: Vec<u32>,
    },

    /// Issue a WRITEREG command to a device
    Writereg {
        /// IPv4 address or host name of the device
        device: String,

        #[arg(value_name = "ADDRESS=VALUE", required = true)]
        assignments: Vec<Assignment>,
    },

    /// Configure the persistent IP configuration mode of a reachable device
    Persist {
        #[command(subcommand)]
        mode: PersistMode,
    },

    /// Discover a device by serial number, move it onto the given address
    /// and make that address persistent
    Set {
        #[command(subcommand)]
        mode: SetMode,
    },
}

#[derive(Subcommand, Debug)]
pub enum PersistMode {
    /// Set DHCP IP configuration mode
    Dhcp {
        /// IPv4 address or host name of the device
        device: String,
    },
    /// Set static IP configuration mode
    Static {
        /// IPv4 address or host name of the device
        device: String,

        #[command(flatten)]
        config: StaticArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum SetMode {
    /// Set static IP configuration mode
    Static {
        /// Serial number of the device
        serial: String,

        #[command(flatten)]
        config: StaticArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct StaticArgs {
    /// The new static IP
    pub ip: Ipv4Addr,

    /// The new subnet mask
    pub subnet_mask: SubnetMask,

    /// The new default gateway
    pub gateway: Option<Ipv4Addr>,
}

impl StaticArgs {
    pub fn to_config(&self) -> StaticConfig {
        StaticConfig {
            ip: self.ip,
            subnet_mask: self.subnet_mask.addr(),
            gateway: self.gateway,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MacAddress([u8; 6]);

impl FromStr for MacAddress {
    type Err = GvcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if s.contains(':') || s.contains('-') {
            s.split([':', '-']).collect()
        } else if s.len() == 12 && s.is_ascii() {
            (0..12).step_by(2).map(|i| &s[i..i + 2]).collect()
        } else {
            Vec::new()
        };

        if parts.len() != 6 {
            return Err(GvcpError::InvalidMac(
                "MAC address must contain 6 bytes separated by ':'".to_string(),
            ));
        }

        let mut bytes = [0u8; 6];

        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| {
                GvcpError::InvalidMac(format!("Non-hexadecimal value: {}", part))
            })?;
        }

        Ok(MacAddress(bytes))
    }
}

impl MacAddress {
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_mac(&self.0))
    }
}

/// An IPv4 netmask whose one bits are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetMask(Ipv4Addr);

impl SubnetMask {
    pub fn addr(&self) -> Ipv4Addr {
        self.0
    }
}

impl FromStr for SubnetMask {
    type Err = GvcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: Ipv4Addr = s
            .parse()
            .map_err(|e| GvcpError::InvalidSubnetMask(format!("{}: {}", s, e)))?;

        let bits = u32::from(addr);
        if !is_contiguous_mask(bits) {
            return Err(GvcpError::InvalidSubnetMask(format!("{} ({:#034b})", s, bits)));
        }

        Ok(SubnetMask(addr))
    }
}

/// No one bit may follow a zero bit.
pub fn is_contiguous_mask(mask: u32) -> bool {
    mask.leading_ones() + mask.trailing_zeros() == 32
}

fn parse_register(s: &str) -> Result<u32, String> {
    parse_int(s)
}

/// Resolves an IPv4 literal or host name to the device's control endpoint.
pub fn resolve_device(device: &str, port: u16) -> Result<SocketAddr, GvcpError> {
    (device, port)
        .to_socket_addrs()
        .map_err(|e| GvcpError::Resolve(format!("{}: {}", device, e)))?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| GvcpError::Resolve(format!("{}: no IPv4 address", device)))
}

pub fn parse_args() -> Result<Args, Error> {
    Args::try_parse()
}
