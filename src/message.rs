use crate::id::NodeId;

/// The three message kinds circulating the ring, with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Greetings,
    ElectionStart,
    ElectedLeader,
}

impl Kind {
    pub fn code(self) -> u8 {
        match self {
            Self::Greetings => 0,
            Self::ElectionStart => 1,
            Self::ElectedLeader => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Greetings),
            1 => Some(Self::ElectionStart),
            2 => Some(Self::ElectedLeader),
            _ => None,
        }
    }
}

/// A ring message: the id it speaks for, its kind, and an uninterpreted
/// value carried verbatim across the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: NodeId,
    pub kind: Kind,
    pub value: String,
}

impl Message {
    pub fn new(source: NodeId, kind: Kind, value: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            value: value.into(),
        }
    }

    pub fn greetings(source: NodeId) -> Self {
        Self::new(source, Kind::Greetings, "")
    }

    pub fn election_start(source: NodeId) -> Self {
        Self::new(source, Kind::ElectionStart, "")
    }

    pub fn elected_leader(source: NodeId) -> Self {
        Self::new(source, Kind::ElectedLeader, "")
    }
}
