//! The single-outstanding-request correlator.

use crate::error::{Error, Result};
use crate::packet::{Packet, PacketCode};

/// The logical operation a response packet will settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    Handshake,
    Query,
}

/// Holds at most one pending request between the moment its packet is
/// written and the moment a response packet (or transport failure) settles
/// it.
///
/// The protocol permits no pipelining, so occupying an occupied slot is a
/// programming error rather than a recoverable condition. Whichever branch a
/// response takes, the slot is cleared the instant the packet is processed.
#[derive(Debug, Default)]
pub(crate) struct RequestSlot {
    pending: Option<Pending>,
}

impl RequestSlot {
    pub(crate) fn new() -> Self {
        Self { pending: None }
    }

    /// Claims the slot for a request about to be sent.
    pub(crate) fn occupy(&mut self, pending: Pending) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::RequestInFlight);
        }
        self.pending = Some(pending);
        Ok(())
    }

    /// Settles the pending request with a response packet, clearing the slot
    /// unconditionally.
    pub(crate) fn complete(&mut self, packet: Packet) -> Result<String> {
        self.pending = None;

        match packet.code {
            // The auth-ok payload carries nothing meaningful.
            PacketCode::AUTH_OK => Ok("Authenticated".into()),
            PacketCode::AUTH_ERR => Err(Error::Auth(packet.text)),
            PacketCode::MESSAGE | PacketCode::DATA => Ok(packet.text),
            code => Err(Error::Protocol(code)),
        }
    }

    /// Fails whatever is pending, clearing the slot.
    ///
    /// Used on transport error or close. Hands `err` back so the call site
    /// can propagate it in one expression.
    pub(crate) fn fail(&mut self, err: Error) -> Error {
        self.pending = None;
        err
    }
}
