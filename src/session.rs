use crate::correlator::receive_ack;
use crate::discovery::Discovery;
use crate::error::GvcpError;
use crate::network::{Transport, UdpTransport};
use crate::packet::{
    AckMessage, Assignment, Command, ReadRegResult, WriteRegResult, GVCP_PORT, STATUS_SUCCESS,
};
use crate::sequencer::RequestIdSequencer;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info};

const ACK_TIMEOUT_MS: u64 = 1000;
const FORCE_IP_TIMEOUT_SEC: u64 = 60;
const DISCOVERY_WINDOW_MS: u64 = 1100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Control port on both the host and the devices.
    pub port: u16,
    /// How long register commands wait for their acknowledge.
    pub ack_timeout: Duration,
    /// Devices may reset before answering a FORCEIP, so this one is long.
    pub force_ip_timeout: Duration,
    pub discovery_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: GVCP_PORT,
            ack_timeout: Duration::from_millis(ACK_TIMEOUT_MS),
            force_ip_timeout: Duration::from_secs(FORCE_IP_TIMEOUT_SEC),
            discovery_window: Duration::from_millis(DISCOVERY_WINDOW_MS),
        }
    }
}

/// One control session. Owns its transport, and with it the sockets, until
/// dropped.
pub struct Session<T: Transport = UdpTransport> {
    transport: T,
    sequencer: RequestIdSequencer,
    config: SessionConfig,
}

impl Session<UdpTransport> {
    pub fn new(config: SessionConfig) -> Self {
        Session::with_transport(UdpTransport::new(config.port), config)
    }
}

impl<T: Transport> Session<T> {
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Session {
            transport,
            sequencer: RequestIdSequencer::new(),
            config,
        }
    }

    #[cfg(test)]
    pub fn with_sequencer(mut self, sequencer: RequestIdSequencer) -> Self {
        self.sequencer = sequencer;
        self
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Control endpoint of the device at `ip`.
    pub fn device_addr(&self, ip: Ipv4Addr) -> SocketAddr {
        SocketAddr::from((ip, self.config.port))
    }

    pub fn discover(&mut self, allow_broadcast_ack: bool) -> Result<Discovery<'_, T>, GvcpError> {
        let req_id = self.sequencer.next_id();
        let packet = Command::discovery(allow_broadcast_ack).to_bytes(req_id);

        info!("Sending discovery command (req_id {})", req_id);
        self.transport.send_broadcast(&packet)?;

        Ok(Discovery::new(
            &mut self.transport,
            req_id,
            self.config.discovery_window,
        ))
    }

    /// Sends `command` to `target` and waits for its acknowledge.
    fn request(&mut self, command: &Command, target: SocketAddr) -> Result<AckMessage, GvcpError> {
        let req_id = self.sequencer.next_id();
        debug!(
            "{:?} with {} payload bytes to {} (req_id {})",
            command.code,
            command.payload.len(),
            target,
            req_id
        );
        self.transport.send_to(&command.to_bytes(req_id), target)?;

        receive_ack(
            &mut self.transport,
            command.code.ack(),
            req_id,
            self.config.ack_timeout,
        )
    }

    /// Sends one READREG for all `addresses`. Whether the device accepts more
    /// than one address per command is up to the caller to know.
    pub fn read_registers(
        &mut self,
        target: SocketAddr,
        addresses: &[u32],
    ) -> Result<ReadRegResult, GvcpError> {
        let ack = self.request(&Command::read_reg(addresses), target)?;
        let values = ack.to_read_reg_values()?;

        Ok(ReadRegResult {
            status: ack.status,
            values,
        })
    }

    pub fn write_registers(
        &mut self,
        target: SocketAddr,
        assignments: &[Assignment],
    ) -> Result<WriteRegResult, GvcpError> {
        let ack = self.request(&Command::write_reg(assignments), target)?;
        let index = ack.to_write_reg_index()?;

        Ok(WriteRegResult {
            status: ack.status,
            index,
        })
    }

    /// Broadcasts a FORCEIP. Without `ack_required` this returns success as
    /// soon as the packet is out.
    pub fn force_ip(
        &mut self,
        mac: [u8; 6],
        ip: Ipv4Addr,
        subnet_mask: Ipv4Addr,
        gateway: Ipv4Addr,
        ack_required: bool,
    ) -> Result<u16, GvcpError> {
        let req_id = self.sequencer.next_id();
        let command = Command::force_ip(mac, ip, subnet_mask, gateway, ack_required);

        info!("Sending FORCEIP {}/{} (req_id {})", ip, subnet_mask, req_id);
        self.transport.send_broadcast(&command.to_bytes(req_id))?;

        if !command.ack_required() {
            return Ok(STATUS_SUCCESS);
        }

        let ack = receive_ack(
            &mut self.transport,
            command.code.ack(),
            req_id,
            self.config.force_ip_timeout,
        )?;
        Ok(ack.status)
    }
}
