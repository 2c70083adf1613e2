//! [Transport] over UDP, speaking bencoded KRPC messages.

use std::io;
use std::net::{Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::common::{
    AssignKeyRequestArguments, FindSuccessorRequestArguments, Id, Message, MessageType,
    NodeDescriptor, NotifyRequestArguments, RequestSpecific, RequestTypeSpecific,
    ResponseSpecific,
};
use crate::error::TransportError;

use super::{Transport, MTU};

#[derive(Debug)]
/// Sends each request from a fresh ephemeral socket and waits for the matching response.
pub struct UdpTransport {
    requester_id: Id,
    request_timeout: Duration,
    next_tid: AtomicU16,
}

impl UdpTransport {
    /// Create a transport sending requests on behalf of the node `requester_id`.
    pub fn new(requester_id: Id, request_timeout: Duration) -> Self {
        Self {
            requester_id,
            request_timeout,
            next_tid: AtomicU16::new(0),
        }
    }

    // === Private Methods ===

    /// Increments next_tid and returns the previous value.
    fn tid(&self) -> u16 {
        // Every request has its own socket, wrapping around is harmless.
        self.next_tid.fetch_add(1, Ordering::Relaxed)
    }

    fn request(
        &self,
        to: &NodeDescriptor,
        request_type: RequestTypeSpecific,
    ) -> Result<ResponseSpecific, TransportError> {
        let address = to.address();
        let transaction_id = self.tid();

        let message = Message {
            transaction_id,
            message_type: MessageType::Request(RequestSpecific {
                requester_id: self.requester_id,
                request_type,
            }),
        };
        trace!(context = "transport_sending", ?message, ?address);

        let bytes = message
            .to_bytes()
            .map_err(|error| TransportError::InvalidMessage(error.to_string()))?;

        let local: SocketAddr = if address.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(address)?;
        socket
            .send(&bytes)
            .map_err(|error| io_error(address, error))?;

        let deadline = Instant::now() + self.request_timeout;
        let mut buf = [0u8; MTU];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());

            if remaining.is_zero() {
                return Err(TransportError::Timeout(address));
            }

            socket.set_read_timeout(Some(remaining))?;

            let amt = socket
                .recv(&mut buf)
                .map_err(|error| io_error(address, error))?;

            match Message::from_bytes(&buf[..amt]) {
                Ok(message) if message.transaction_id == transaction_id => {
                    trace!(context = "transport_receiving", ?message, ?address);

                    match message.message_type {
                        MessageType::Response(response) => return Ok(response),
                        MessageType::Error(error) => {
                            return Err(TransportError::Remote {
                                code: error.code,
                                description: error.description,
                            })
                        }
                        MessageType::Request(_) => {
                            trace!(context = "transport_validation", "Unexpected request");
                        }
                    }
                }
                Ok(message) => {
                    trace!(
                        context = "transport_validation",
                        transaction_id = message.transaction_id,
                        "Unexpected transaction id"
                    );
                }
                Err(error) => {
                    trace!(
                        context = "transport_error",
                        ?error,
                        message = ?String::from_utf8_lossy(&buf[..amt]),
                        "Received invalid Bencode message."
                    );
                }
            }
        }
    }
}

fn io_error(address: SocketAddr, error: io::Error) -> TransportError {
    match error.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout(address),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            TransportError::Unreachable(address)
        }
        _ => TransportError::Io(error),
    }
}

fn expect_node(response: ResponseSpecific) -> Result<NodeDescriptor, TransportError> {
    response
        .node
        .ok_or_else(|| TransportError::InvalidMessage("Response is missing a node".to_string()))
}

impl Transport for UdpTransport {
    fn find_successor(
        &self,
        to: &NodeDescriptor,
        target: Id,
        hops: u32,
    ) -> Result<NodeDescriptor, TransportError> {
        let response = self.request(
            to,
            RequestTypeSpecific::FindSuccessor(FindSuccessorRequestArguments { target, hops }),
        )?;

        expect_node(response)
    }

    fn get_predecessor(
        &self,
        to: &NodeDescriptor,
    ) -> Result<Option<NodeDescriptor>, TransportError> {
        Ok(self.request(to, RequestTypeSpecific::GetPredecessor)?.node)
    }

    fn notify(
        &self,
        to: &NodeDescriptor,
        candidate: &NodeDescriptor,
    ) -> Result<(), TransportError> {
        self.request(
            to,
            RequestTypeSpecific::Notify(NotifyRequestArguments {
                candidate: candidate.clone(),
            }),
        )?;

        Ok(())
    }

    fn assign_key(&self, to: &NodeDescriptor, key: Id) -> Result<NodeDescriptor, TransportError> {
        let response = self.request(
            to,
            RequestTypeSpecific::AssignKey(AssignKeyRequestArguments { key }),
        )?;

        expect_node(response)
    }

    fn health_check(&self, to: &NodeDescriptor) -> Result<(), TransportError> {
        let response = self.request(to, RequestTypeSpecific::Ping)?;

        if &response.responder_id != to.id() {
            return Err(TransportError::InvalidMessage(format!(
                "Expected {:?} to respond, got {:?}",
                to.id(),
                response.responder_id
            )));
        }

        Ok(())
    }
}
