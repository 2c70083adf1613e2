//! Answering requests from other nodes.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flume::{Receiver, TryRecvError};
use tracing::{debug, trace, warn};

use crate::common::{
    ErrorSpecific, Message, MessageType, NodeDescriptor, RequestSpecific, RequestTypeSpecific,
    ResponseSpecific, PROTOCOL_ERROR_CODE, SERVER_ERROR_CODE,
};
use crate::transport::MTU;
use crate::{ChordNode, Error, Result};

/// How long the server blocks on the socket before checking for shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
/// Receives requests on a [UdpSocket] and answers each of them on its own thread.
pub struct Server {
    socket: UdpSocket,
    node: Arc<ChordNode>,
}

impl Server {
    pub fn new(socket: UdpSocket, node: Arc<ChordNode>) -> Self {
        Self { socket, node }
    }

    /// Returns the address the server is listening to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve requests until every sender of `shutdown` is dropped.
    pub fn run(self, shutdown: Receiver<()>) -> Result<()> {
        self.socket.set_read_timeout(Some(POLL_INTERVAL))?;

        let mut buf = [0u8; MTU];

        loop {
            if let Err(TryRecvError::Disconnected) = shutdown.try_recv() {
                debug!("Server shutting down");
                break;
            }

            let (amt, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(ref error)
                    if matches!(
                        error.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    continue;
                }
                Err(error) => {
                    trace!(context = "socket_error", ?error, "recv_from failed unexpectedly");
                    continue;
                }
            };

            if from.port() == 0 {
                trace!(context = "socket_validation", message = "Request from port 0");
                continue;
            }

            let message = match Message::from_bytes(&buf[..amt]) {
                Ok(message) => message,
                Err(error) => {
                    trace!(
                        context = "socket_error",
                        ?error,
                        ?from,
                        message = ?String::from_utf8_lossy(&buf[..amt]),
                        "Received invalid Bencode message."
                    );

                    if let Some(reply) = Message::invalid_request_error(&buf[..amt], &error) {
                        self.send(from, reply);
                    }
                    continue;
                }
            };

            let MessageType::Request(request) = message.message_type else {
                trace!(context = "socket_validation", ?from, "Ignoring non request message");
                continue;
            };

            trace!(context = "server_receiving", ?request, ?from);

            self.spawn_handler(from, message.transaction_id, request);
        }

        Ok(())
    }

    fn spawn_handler(&self, from: SocketAddr, transaction_id: u16, request: RequestSpecific) {
        let socket = match self.socket.try_clone() {
            Ok(socket) => socket,
            Err(error) => {
                warn!(?error, "Failed to clone server socket");
                return;
            }
        };
        let node = self.node.clone();

        let spawned = thread::Builder::new()
            .name("chord-request".to_string())
            .spawn(move || {
                let message = Message {
                    transaction_id,
                    message_type: handle_request(&node, request),
                };

                send(&socket, from, message);
            });

        if let Err(error) = spawned {
            warn!(?error, "Failed to spawn request handler");
        }
    }

    fn send(&self, to: SocketAddr, message: Message) {
        send(&self.socket, to, message)
    }
}

fn send(socket: &UdpSocket, to: SocketAddr, message: Message) {
    trace!(context = "server_sending", ?message, ?to);

    let sent = message
        .to_bytes()
        .and_then(|bytes| socket.send_to(&bytes, to).map_err(Error::from));

    if let Err(error) = sent {
        debug!(?error, ?to, "Error sending response message");
    }
}

/// Answer a single request on behalf of `node`.
///
/// Ids outside the ring are answered with a protocol error, failed lookups
/// with a server error.
pub fn handle_request(node: &ChordNode, request: RequestSpecific) -> MessageType {
    match request.request_type {
        RequestTypeSpecific::Ping => response(node, None),
        RequestTypeSpecific::FindSuccessor(arguments) => {
            match node.find_successor_hops(arguments.target, arguments.hops) {
                Ok(successor) => response(node, Some(successor)),
                Err(error) => error_response(error),
            }
        }
        RequestTypeSpecific::GetPredecessor => response(node, node.get_predecessor()),
        RequestTypeSpecific::Notify(arguments) => {
            if let Err(error) = node.space().check(*arguments.candidate.id()) {
                return error_response(error);
            }

            node.notify(&arguments.candidate);
            response(node, None)
        }
        RequestTypeSpecific::AssignKey(arguments) => match node.assign_key_local(arguments.key) {
            Ok(owner) => response(node, Some(owner)),
            Err(error) => error_response(error),
        },
    }
}

fn response(node: &ChordNode, descriptor: Option<NodeDescriptor>) -> MessageType {
    MessageType::Response(ResponseSpecific {
        responder_id: *node.id(),
        node: descriptor,
    })
}

fn error_response(error: Error) -> MessageType {
    let code = match error {
        Error::IdOutOfRange { .. } => PROTOCOL_ERROR_CODE,
        _ => SERVER_ERROR_CODE,
    };

    debug!(?error, code, "Answering request with an error");

    MessageType::Error(ErrorSpecific {
        code,
        description: error.to_string(),
    })
}
