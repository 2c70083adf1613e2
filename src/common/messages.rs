//! Serialize and deserialize Chord Krpc messages.

mod internal;

use std::net::SocketAddr;

use crate::common::{Id, NodeDescriptor};
use crate::{Error, Result};

/// The node failed to serve a well formed request, KRPC code 202.
pub const SERVER_ERROR_CODE: i32 = 202;
/// Malformed request, KRPC code 203.
pub const PROTOCOL_ERROR_CODE: i32 = 203;
/// Unknown method, KRPC code 204.
pub const METHOD_UNKNOWN_ERROR_CODE: i32 = 204;

const METHODS: [&str; 5] = [
    "ping",
    "find_successor",
    "get_predecessor",
    "notify",
    "assign_key",
];

#[derive(Debug, PartialEq, Clone)]
pub struct Message {
    pub transaction_id: u16,

    pub message_type: MessageType,
}

#[derive(Debug, PartialEq, Clone)]
pub enum MessageType {
    Request(RequestSpecific),

    Response(ResponseSpecific),

    Error(ErrorSpecific),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ErrorSpecific {
    pub code: i32,
    pub description: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RequestSpecific {
    pub requester_id: Id,
    pub request_type: RequestTypeSpecific,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RequestTypeSpecific {
    Ping,
    FindSuccessor(FindSuccessorRequestArguments),
    GetPredecessor,
    Notify(NotifyRequestArguments),
    AssignKey(AssignKeyRequestArguments),
}

/// Every response carries the responder id and, depending on the request, a node.
///
/// - `find_successor`: the successor of the target.
/// - `get_predecessor`: the predecessor, absent if unknown.
/// - `assign_key`: the new owner of the key.
/// - `notify` and `ping`: nothing.
#[derive(Debug, PartialEq, Clone)]
pub struct ResponseSpecific {
    pub responder_id: Id,
    pub node: Option<NodeDescriptor>,
}

// === FIND_SUCCESSOR ===

#[derive(Debug, PartialEq, Clone)]
pub struct FindSuccessorRequestArguments {
    pub target: Id,
    /// Number of nodes that already forwarded this lookup.
    pub hops: u32,
}

// === NOTIFY ===

#[derive(Debug, PartialEq, Clone)]
pub struct NotifyRequestArguments {
    /// The node claiming to be the predecessor of the recipient.
    pub candidate: NodeDescriptor,
}

// === ASSIGN_KEY ===

#[derive(Debug, PartialEq, Clone)]
pub struct AssignKeyRequestArguments {
    pub key: Id,
}

impl Message {
    fn into_serde_message(self) -> internal::DHTMessage {
        internal::DHTMessage {
            transaction_id: self.transaction_id.to_be_bytes(),
            variant: match self.message_type {
                MessageType::Request(RequestSpecific {
                    requester_id,
                    request_type,
                }) => {
                    let id = requester_id.to_bytes();

                    internal::DHTMessageVariant::Request(match request_type {
                        RequestTypeSpecific::Ping => internal::DHTRequestSpecific::Ping {
                            arguments: internal::DHTRequesterArguments { id },
                        },
                        RequestTypeSpecific::FindSuccessor(args) => {
                            internal::DHTRequestSpecific::FindSuccessor {
                                arguments: internal::DHTFindSuccessorRequestArguments {
                                    id,
                                    target: args.target.to_bytes(),
                                    hops: args.hops,
                                },
                            }
                        }
                        RequestTypeSpecific::GetPredecessor => {
                            internal::DHTRequestSpecific::GetPredecessor {
                                arguments: internal::DHTRequesterArguments { id },
                            }
                        }
                        RequestTypeSpecific::Notify(args) => internal::DHTRequestSpecific::Notify {
                            arguments: internal::DHTNotifyRequestArguments {
                                id,
                                node: node_to_serde(&args.candidate),
                            },
                        },
                        RequestTypeSpecific::AssignKey(args) => {
                            internal::DHTRequestSpecific::AssignKey {
                                arguments: internal::DHTAssignKeyRequestArguments {
                                    id,
                                    key: args.key.to_bytes(),
                                },
                            }
                        }
                    })
                }

                MessageType::Response(res) => {
                    internal::DHTMessageVariant::Response(internal::DHTResponseSpecific {
                        arguments: internal::DHTResponseArguments {
                            id: res.responder_id.to_bytes(),
                            node: res.node.as_ref().map(node_to_serde),
                        },
                    })
                }

                MessageType::Error(err) => {
                    internal::DHTMessageVariant::Error(internal::DHTErrorSpecific {
                        error_info: vec![
                            serde_bencode::value::Value::Int(err.code.into()),
                            serde_bencode::value::Value::Bytes(err.description.into()),
                        ],
                    })
                }
            },
        }
    }

    fn from_serde_message(msg: internal::DHTMessage) -> Result<Message> {
        Ok(Message {
            transaction_id: u16::from_be_bytes(msg.transaction_id),
            message_type: match msg.variant {
                internal::DHTMessageVariant::Request(req_variant) => {
                    MessageType::Request(match req_variant {
                        internal::DHTRequestSpecific::Ping { arguments } => RequestSpecific {
                            requester_id: Id::from_bytes(arguments.id)?,
                            request_type: RequestTypeSpecific::Ping,
                        },
                        internal::DHTRequestSpecific::FindSuccessor { arguments } => {
                            RequestSpecific {
                                requester_id: Id::from_bytes(arguments.id)?,
                                request_type: RequestTypeSpecific::FindSuccessor(
                                    FindSuccessorRequestArguments {
                                        target: Id::from_bytes(arguments.target)?,
                                        hops: arguments.hops,
                                    },
                                ),
                            }
                        }
                        internal::DHTRequestSpecific::GetPredecessor { arguments } => {
                            RequestSpecific {
                                requester_id: Id::from_bytes(arguments.id)?,
                                request_type: RequestTypeSpecific::GetPredecessor,
                            }
                        }
                        internal::DHTRequestSpecific::Notify { arguments } => RequestSpecific {
                            requester_id: Id::from_bytes(arguments.id)?,
                            request_type: RequestTypeSpecific::Notify(NotifyRequestArguments {
                                candidate: node_from_serde(arguments.node)?,
                            }),
                        },
                        internal::DHTRequestSpecific::AssignKey { arguments } => RequestSpecific {
                            requester_id: Id::from_bytes(arguments.id)?,
                            request_type: RequestTypeSpecific::AssignKey(
                                AssignKeyRequestArguments {
                                    key: Id::from_bytes(arguments.key)?,
                                },
                            ),
                        },
                    })
                }

                internal::DHTMessageVariant::Response(internal::DHTResponseSpecific {
                    arguments,
                }) => MessageType::Response(ResponseSpecific {
                    responder_id: Id::from_bytes(arguments.id)?,
                    node: match arguments.node {
                        Some(node) => Some(node_from_serde(node)?),
                        None => None,
                    },
                }),

                internal::DHTMessageVariant::Error(err) => {
                    if err.error_info.len() < 2 {
                        return Err(Error::InvalidMessage(
                            "Error packet should have at least 2 elements".to_string(),
                        ));
                    }
                    MessageType::Error(ErrorSpecific {
                        code: match err.error_info[0] {
                            serde_bencode::value::Value::Int(code) => match code.try_into() {
                                Ok(code) => code,
                                Err(_) => {
                                    return Err(Error::InvalidMessage(
                                        "error parsing error code".to_string(),
                                    ))
                                }
                            },
                            _ => {
                                return Err(Error::InvalidMessage(
                                    "Expected error code as first element".to_string(),
                                ))
                            }
                        },
                        description: match &err.error_info[1] {
                            serde_bencode::value::Value::Bytes(desc) => {
                                match std::str::from_utf8(desc) {
                                    Ok(desc) => desc.to_string(),
                                    Err(_) => {
                                        return Err(Error::InvalidMessage(
                                            "error parsing error description".to_string(),
                                        ))
                                    }
                                }
                            }
                            _ => {
                                return Err(Error::InvalidMessage(
                                    "Expected description as second element".to_string(),
                                ))
                            }
                        },
                    })
                }
            },
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone().into_serde_message().to_bytes()?)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message> {
        Message::from_serde_message(internal::DHTMessage::from_bytes(bytes.as_ref())?)
    }

    /// Error reply to bytes that failed to parse with `error`, if they still look
    /// like a request.
    ///
    /// Unknown methods get [METHOD_UNKNOWN_ERROR_CODE], anything else
    /// [PROTOCOL_ERROR_CODE].
    pub fn invalid_request_error<T: AsRef<[u8]>>(bytes: T, error: &Error) -> Option<Message> {
        let header: internal::DHTMessageHeader = serde_bencode::from_bytes(bytes.as_ref()).ok()?;

        if header.kind != "q" {
            return None;
        }

        let (code, description) = match header.method.as_deref() {
            Some(method) if !METHODS.contains(&method) => (
                METHOD_UNKNOWN_ERROR_CODE,
                format!("Method Unknown: {method}"),
            ),
            _ => (PROTOCOL_ERROR_CODE, format!("Invalid request: {error}")),
        };

        Some(Message {
            transaction_id: u16::from_be_bytes(header.transaction_id),
            message_type: MessageType::Error(ErrorSpecific { code, description }),
        })
    }

    /// Return the node carried by a response, if any.
    pub fn node(&self) -> Option<&NodeDescriptor> {
        match &self.message_type {
            MessageType::Response(response) => response.node.as_ref(),
            _ => None,
        }
    }
}

fn node_to_serde(node: &NodeDescriptor) -> internal::DHTNode {
    internal::DHTNode {
        id: node.id().to_bytes(),
        name: node.name().to_string(),
        address: node.address().to_string(),
    }
}

fn node_from_serde(node: internal::DHTNode) -> Result<NodeDescriptor> {
    let address: SocketAddr = node
        .address
        .parse()
        .map_err(|_| Error::InvalidAddress(node.address.clone()))?;

    Ok(NodeDescriptor::new(Id::from_bytes(node.id)?, node.name, address))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, port: u16) -> NodeDescriptor {
        NodeDescriptor::new(Id(id), "node", SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn test_find_successor_request() {
        let original_msg = Message {
            transaction_id: 258,
            message_type: MessageType::Request(RequestSpecific {
                requester_id: Id(7),
                request_type: RequestTypeSpecific::FindSuccessor(FindSuccessorRequestArguments {
                    target: Id(u64::MAX),
                    hops: 3,
                }),
            }),
        };

        let serde_msg = original_msg.clone().into_serde_message();
        let bytes = serde_msg.to_bytes().unwrap();
        let parsed_serde_msg = internal::DHTMessage::from_bytes(&bytes).unwrap();
        let parsed_msg = Message::from_serde_message(parsed_serde_msg).unwrap();
        assert_eq!(parsed_msg, original_msg);
    }

    #[test]
    fn test_notify_request_keeps_node_details() {
        let candidate = node(99, 4000);

        let original_msg = Message {
            transaction_id: 1,
            message_type: MessageType::Request(RequestSpecific {
                requester_id: Id(99),
                request_type: RequestTypeSpecific::Notify(NotifyRequestArguments {
                    candidate: candidate.clone(),
                }),
            }),
        };

        let parsed_msg = Message::from_bytes(original_msg.to_bytes().unwrap()).unwrap();

        match parsed_msg.message_type {
            MessageType::Request(RequestSpecific {
                request_type: RequestTypeSpecific::Notify(args),
                ..
            }) => {
                assert_eq!(args.candidate, candidate);
                assert_eq!(args.candidate.name(), "node");
                assert_eq!(args.candidate.address(), candidate.address());
            }
            _ => panic!("expected a notify request"),
        }
    }

    #[test]
    fn test_response_without_node() {
        let original_msg = Message {
            transaction_id: 2,
            message_type: MessageType::Response(ResponseSpecific {
                responder_id: Id(3),
                node: None,
            }),
        };

        let bytes = original_msg.to_bytes().unwrap();
        // No "node" key on the wire.
        assert!(!bytes.windows(4).any(|window| window == b"node"));

        let parsed_msg = Message::from_bytes(bytes).unwrap();
        assert_eq!(parsed_msg, original_msg);
        assert_eq!(parsed_msg.node(), None);
    }

    #[test]
    fn test_response_with_node() {
        let original_msg = Message {
            transaction_id: 2,
            message_type: MessageType::Response(ResponseSpecific {
                responder_id: Id(3),
                node: Some(node(5, 6881)),
            }),
        };

        let parsed_msg = Message::from_bytes(original_msg.to_bytes().unwrap()).unwrap();

        assert_eq!(parsed_msg.node().map(|n| n.address().port()), Some(6881));
    }

    #[test]
    fn test_error_message() {
        let original_msg = Message {
            transaction_id: 65535,
            message_type: MessageType::Error(ErrorSpecific {
                code: SERVER_ERROR_CODE,
                description: "Lookup failed".to_string(),
            }),
        };

        let parsed_msg = Message::from_bytes(original_msg.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed_msg, original_msg);
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(Message::from_bytes(b"not bencode").is_err());
    }

    #[test]
    fn test_invalid_request_error() {
        let unknown = b"d1:ad2:id8:\x00\x00\x00\x00\x00\x00\x00\x01e1:q9:get_peers1:t2:\x00\x051:y1:qe";
        let error = Message::from_bytes(unknown).unwrap_err();

        let reply = Message::invalid_request_error(unknown, &error).unwrap();
        assert_eq!(reply.transaction_id, 5);
        assert!(matches!(
            reply.message_type,
            MessageType::Error(ErrorSpecific {
                code: METHOD_UNKNOWN_ERROR_CODE,
                ..
            })
        ));

        // find_successor without a target
        let malformed = b"d1:ad2:id8:\x00\x00\x00\x00\x00\x00\x00\x01e1:q14:find_successor1:t2:\x00\x061:y1:qe";
        let error = Message::from_bytes(malformed).unwrap_err();

        let reply = Message::invalid_request_error(malformed, &error).unwrap();
        assert_eq!(reply.transaction_id, 6);
        assert!(matches!(
            reply.message_type,
            MessageType::Error(ErrorSpecific {
                code: PROTOCOL_ERROR_CODE,
                ..
            })
        ));

        // Not a request, nothing to answer.
        let response = b"d1:t2:\x00\x071:y1:re";
        assert!(Message::invalid_request_error(response, &error).is_none());
        assert!(Message::invalid_request_error(b"garbage", &error).is_none());
    }
}
