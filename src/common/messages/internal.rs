use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTMessage {
    #[serde(rename = "t", with = "serde_bytes")]
    pub transaction_id: [u8; 2],

    #[serde(flatten)]
    pub variant: DHTMessageVariant,
}

impl DHTMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<DHTMessage, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes)?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

/// Just enough of a message to answer it when the rest does not parse.
#[derive(Deserialize, Debug)]
pub struct DHTMessageHeader {
    #[serde(rename = "t", with = "serde_bytes")]
    pub transaction_id: [u8; 2],

    #[serde(rename = "y")]
    pub kind: String,

    #[serde(rename = "q", default)]
    pub method: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "y")]
pub enum DHTMessageVariant {
    #[serde(rename = "q")]
    Request(DHTRequestSpecific),

    #[serde(rename = "r")]
    Response(DHTResponseSpecific),

    #[serde(rename = "e")]
    Error(DHTErrorSpecific),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "q")]
pub enum DHTRequestSpecific {
    #[serde(rename = "ping")]
    Ping {
        #[serde(rename = "a")]
        arguments: DHTRequesterArguments,
    },

    #[serde(rename = "find_successor")]
    FindSuccessor {
        #[serde(rename = "a")]
        arguments: DHTFindSuccessorRequestArguments,
    },

    #[serde(rename = "get_predecessor")]
    GetPredecessor {
        #[serde(rename = "a")]
        arguments: DHTRequesterArguments,
    },

    #[serde(rename = "notify")]
    Notify {
        #[serde(rename = "a")]
        arguments: DHTNotifyRequestArguments,
    },

    #[serde(rename = "assign_key")]
    AssignKey {
        #[serde(rename = "a")]
        arguments: DHTAssignKeyRequestArguments,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTResponseSpecific {
    #[serde(rename = "r")]
    pub arguments: DHTResponseArguments,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTErrorSpecific {
    #[serde(rename = "e")]
    pub error_info: Vec<serde_bencode::value::Value>,
}

// === Nodes ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTNode {
    #[serde(with = "serde_bytes")]
    pub id: [u8; 8],

    #[serde(rename = "n")]
    pub name: String,

    #[serde(rename = "a")]
    pub address: String,
}

// === Requests ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTRequesterArguments {
    #[serde(with = "serde_bytes")]
    pub id: [u8; 8],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTFindSuccessorRequestArguments {
    #[serde(with = "serde_bytes")]
    pub id: [u8; 8],

    #[serde(with = "serde_bytes")]
    pub target: [u8; 8],

    pub hops: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTNotifyRequestArguments {
    #[serde(with = "serde_bytes")]
    pub id: [u8; 8],

    pub node: DHTNode,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTAssignKeyRequestArguments {
    #[serde(with = "serde_bytes")]
    pub id: [u8; 8],

    #[serde(with = "serde_bytes")]
    pub key: [u8; 8],
}

// === Responses ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTResponseArguments {
    #[serde(with = "serde_bytes")]
    pub id: [u8; 8],

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<DHTNode>,
}
