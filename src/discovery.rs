use crate::error::GvcpError;
use crate::network::Transport;
use crate::packet::{AckMessage, CommandCode, DiscoveryEntry};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Devices answering one discovery broadcast, yielded as their acknowledges
/// arrive. Iteration ends once the collection window closes; starting a new
/// scan means sending a new discovery command.
pub struct Discovery<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    req_id: u16,
    deadline: Instant,
    done: bool,
}

impl<'a, T: Transport + ?Sized> Discovery<'a, T> {
    /// `window` is measured from now, so call this right after the broadcast.
    pub fn new(transport: &'a mut T, req_id: u16, window: Duration) -> Self {
        Discovery {
            transport,
            req_id,
            deadline: Instant::now() + window,
            done: false,
        }
    }
}

impl<T: Transport + ?Sized> Iterator for Discovery<'_, T> {
    type Item = Result<DiscoveryEntry, GvcpError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.done = true;
                break;
            }

            let data = match self.transport.receive(remaining) {
                Ok(data) => data,
                Err(GvcpError::Timeout(_)) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let entry = AckMessage::verify(&data, CommandCode::DiscoveryAck, self.req_id)
                .and_then(|ack| ack.to_discovery_entry());
            match entry {
                Ok(entry) => {
                    debug!("Discovered {} at {}", entry.serial, entry.ip);
                    return Some(Ok(entry));
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Ignoring non discovery packet: {}", e);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockTransport;
    use crate::packet::HEADER_LEN;
    use byteorder::{BigEndian, ByteOrder};

    fn discovery_ack(ack_id: u16, serial: &[u8], last_octet: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN + 248];
        BigEndian::write_u16(&mut bytes[2..4], CommandCode::DiscoveryAck.into());
        BigEndian::write_u16(&mut bytes[4..6], 248);
        BigEndian::write_u16(&mut bytes[6..8], ack_id);

        let payload = &mut bytes[HEADER_LEN..];
        payload[10..16].copy_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, last_octet]);
        payload[36..40].copy_from_slice(&[192, 168, 1, last_octet]);
        payload[216..216 + serial.len()].copy_from_slice(serial);
        bytes
    }

    #[test]
    fn test_collects_all_replies() {
        let mut transport = MockTransport::new();
        transport.inbound.push_back(discovery_ack(5, b"SN1", 10));
        transport.inbound.push_back(discovery_ack(5, b"SN2", 11));

        let entries: Vec<_> = Discovery::new(&mut transport, 5, Duration::from_millis(50))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].serial, "SN1");
        assert_eq!(entries[1].serial, "SN2");
        assert_eq!(entries[1].ip.octets(), [192, 168, 1, 11]);
    }

    #[test]
    fn test_skips_foreign_packets() {
        let mut transport = MockTransport::new();
        transport.inbound.push_back(vec![0xFF; 3]);
        transport.inbound.push_back(discovery_ack(4, b"OLD", 9));
        transport.inbound.push_back(discovery_ack(5, b"SN1", 10));

        let entries: Vec<_> = Discovery::new(&mut transport, 5, Duration::from_millis(50))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].serial, "SN1");
    }

    #[test]
    fn test_window_closes_without_replies() {
        let mut transport = MockTransport::new();
        let started = Instant::now();

        let mut discovery = Discovery::new(&mut transport, 5, Duration::from_millis(30));
        assert!(discovery.next().is_none());
        assert!(discovery.next().is_none());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
