use crate::error::GvcpError;
use crate::network::Transport;
use crate::packet::{AckMessage, CommandCode};
use std::time::{Duration, Instant};
use tracing::warn;

/// Waits for the acknowledge answering request `req_id`. Datagrams that are
/// malformed or answer something else are dropped with a warning.
pub fn receive_ack<T: Transport + ?Sized>(
    transport: &mut T,
    expected: CommandCode,
    req_id: u16,
    timeout: Duration,
) -> Result<AckMessage, GvcpError> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let data = transport.receive(remaining).map_err(|e| match e {
            GvcpError::Timeout(_) => GvcpError::Timeout(format!(
                "failed to receive acknowledge for {:?} with req_id {}",
                expected, req_id
            )),
            other => other,
        })?;

        match AckMessage::verify(&data, expected, req_id) {
            Ok(ack) => return Ok(ack),
            Err(e) if e.is_recoverable() => {
                warn!("Ignoring wrong acknowledge message: {}", e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(GvcpError::Timeout(format!(
        "acknowledge not received for {:?} with req_id {}",
        expected, req_id
    )))
}
