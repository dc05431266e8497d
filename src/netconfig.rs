//! Persistent IP configuration built from register writes.

use crate::error::GvcpError;
use crate::network::Transport;
use crate::packet::{Assignment, DiscoveryEntry, WriteRegResult, STATUS_SUCCESS};
use crate::session::Session;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::info;

pub const NETWORK_INTERFACE_CONFIGURATION: u32 = 0x0014;
pub const PERSISTENT_IP_ADDRESS: u32 = 0x064C;
pub const PERSISTENT_SUBNET_MASK: u32 = 0x065C;
pub const PERSISTENT_DEFAULT_GATEWAY: u32 = 0x066C;
pub const CCP_REG_ADDRESS: u32 = 0x0A00;

pub const CCP_CONTROL_ACCESS: u32 = 0x02;

// Bits of the network interface configuration register.
pub const LOCAL_LINK_ADDRESS: u32 = 4;
pub const DHCP: u32 = 2;
pub const PERSISTENT_IP: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticConfig {
    pub ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
}

fn control_access() -> Assignment {
    Assignment::new(CCP_REG_ADDRESS, CCP_CONTROL_ACCESS)
}

/// Claims control access, then selects DHCP mode.
pub fn dhcp_assignments() -> Vec<Assignment> {
    vec![
        control_access(),
        Assignment::new(NETWORK_INTERFACE_CONFIGURATION, LOCAL_LINK_ADDRESS + DHCP),
    ]
}

/// Claims control access, writes the persistent address registers, then
/// selects persistent static mode. Control access has to come first.
pub fn static_assignments(config: &StaticConfig) -> Vec<Assignment> {
    let mut assignments = vec![
        control_access(),
        Assignment::new(PERSISTENT_IP_ADDRESS, u32::from(config.ip)),
        Assignment::new(PERSISTENT_SUBNET_MASK, u32::from(config.subnet_mask)),
    ];
    if let Some(gateway) = config.gateway {
        assignments.push(Assignment::new(
            PERSISTENT_DEFAULT_GATEWAY,
            u32::from(gateway),
        ));
    }
    assignments.push(Assignment::new(
        NETWORK_INTERFACE_CONFIGURATION,
        LOCAL_LINK_ADDRESS + PERSISTENT_IP,
    ));
    assignments
}

pub fn persist_dhcp<T: Transport>(
    session: &mut Session<T>,
    device: SocketAddr,
) -> Result<WriteRegResult, GvcpError> {
    info!("Switching {} to persistent DHCP", device);
    session.write_registers(device, &dhcp_assignments())
}

pub fn persist_static<T: Transport>(
    session: &mut Session<T>,
    device: SocketAddr,
    config: &StaticConfig,
) -> Result<WriteRegResult, GvcpError> {
    info!(
        "Switching {} to persistent static {}/{}",
        device, config.ip, config.subnet_mask
    );
    session.write_registers(device, &static_assignments(config))
}

pub fn find_device<T: Transport>(
    session: &mut Session<T>,
    serial: &str,
) -> Result<DiscoveryEntry, GvcpError> {
    for entry in session.discover(true)? {
        let entry = entry?;
        if entry.serial == serial {
            return Ok(entry);
        }
    }

    Err(GvcpError::NotFound(format!(
        "no devices found with id: {}",
        serial
    )))
}

/// Finds the device by serial number, forces it onto `config.ip` so it is
/// reachable, then makes that address persistent.
pub fn set_static<T: Transport>(
    session: &mut Session<T>,
    serial: &str,
    config: &StaticConfig,
) -> Result<WriteRegResult, GvcpError> {
    let device = find_device(session, serial)?;
    info!("Found {} at {}", device.serial, device.ip);

    let status = session.force_ip(
        device.mac,
        config.ip,
        config.subnet_mask,
        config.gateway.unwrap_or(Ipv4Addr::UNSPECIFIED),
        true,
    )?;
    if status != STATUS_SUCCESS {
        return Err(GvcpError::DeviceStatus(status));
    }

    info!("Sending writereg command");
    let target = session.device_addr(config.ip);
    persist_static(session, target, config)
}
