use crate::protocol::ProtocolError;
use strum::{Display, EnumIter};

/// Message types (high nibble of header byte 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[repr(u8)]
pub enum MsgType {
    // Client → Server
    FullClientRequest = 0b0001,
    AudioOnlyClient = 0b0010,

    // Server → Client
    FullServerResponse = 0b1001,
    AudioOnlyServer = 0b1011,
    FrontEndResultServer = 0b1100,
    Error = 0b1111,
}

impl TryFrom<u8> for MsgType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, <MsgType as TryFrom<u8>>::Error> {
        match value {
            0b0001 => Ok(MsgType::FullClientRequest),
            0b0010 => Ok(MsgType::AudioOnlyClient),
            0b1001 => Ok(MsgType::FullServerResponse),
            0b1011 => Ok(MsgType::AudioOnlyServer),
            0b1100 => Ok(MsgType::FrontEndResultServer),
            0b1111 => Ok(MsgType::Error),
            _ => Err(ProtocolError::InvalidMessageType(value)),
        }
    }
}

impl MsgType {
    /// Frames of these types may carry a sequence number
    pub fn allows_sequence(self) -> bool {
        !matches!(self, MsgType::Error)
    }
}

/// Whether a message is sent by the client or by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Acknowledgement,
}

/// Lifetime an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Connection,
    Session,
}

/// The closed event vocabulary. Anything else on the wire is a malformed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[repr(i32)]
pub enum EventType {
    None = 0,

    // Connection requests
    StartConnection = 1,
    FinishConnection = 2,

    // Connection acknowledgements
    ConnectionStarted = 50,
    ConnectionFailed = 51,
    ConnectionFinished = 52,

    // Session requests
    StartSession = 100,
    CancelSession = 101,
    FinishSession = 102,

    // Session acknowledgements
    SessionStarted = 150,
    SessionCanceled = 151,
    SessionFinished = 152,
    SessionFailed = 153,
    UsageResponse = 154,

    // Session-scoped task requests
    TaskRequest = 200,
    UpdateConfig = 201,

    // Synthesis progress pushed by the server
    TtsSentenceStart = 350,
    TtsSentenceEnd = 351,
    TtsResponse = 352,
    TtsEnded = 359,
}

impl TryFrom<i32> for EventType {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, <EventType as TryFrom<i32>>::Error> {
        match value {
            0 => Ok(EventType::None),
            1 => Ok(EventType::StartConnection),
            2 => Ok(EventType::FinishConnection),
            50 => Ok(EventType::ConnectionStarted),
            51 => Ok(EventType::ConnectionFailed),
            52 => Ok(EventType::ConnectionFinished),
            100 => Ok(EventType::StartSession),
            101 => Ok(EventType::CancelSession),
            102 => Ok(EventType::FinishSession),
            150 => Ok(EventType::SessionStarted),
            151 => Ok(EventType::SessionCanceled),
            152 => Ok(EventType::SessionFinished),
            153 => Ok(EventType::SessionFailed),
            154 => Ok(EventType::UsageResponse),
            200 => Ok(EventType::TaskRequest),
            201 => Ok(EventType::UpdateConfig),
            350 => Ok(EventType::TtsSentenceStart),
            351 => Ok(EventType::TtsSentenceEnd),
            352 => Ok(EventType::TtsResponse),
            359 => Ok(EventType::TtsEnded),
            _ => Err(ProtocolError::UnknownEvent(value)),
        }
    }
}

impl EventType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn direction(self) -> Direction {
        match self {
            EventType::StartConnection
            | EventType::FinishConnection
            | EventType::StartSession
            | EventType::CancelSession
            | EventType::FinishSession
            | EventType::TaskRequest
            | EventType::UpdateConfig => Direction::Request,
            _ => Direction::Acknowledgement,
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            EventType::None
            | EventType::StartConnection
            | EventType::FinishConnection
            | EventType::ConnectionStarted
            | EventType::ConnectionFailed
            | EventType::ConnectionFinished => Scope::Connection,
            _ => Scope::Session,
        }
    }

    /// Connection acks are the only frames that carry a connect id
    pub fn carries_connect_id(self) -> bool {
        matches!(
            self,
            EventType::ConnectionStarted
                | EventType::ConnectionFailed
                | EventType::ConnectionFinished
        )
    }

    /// Events that end the connection or the session with an error
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            EventType::ConnectionFailed | EventType::SessionCanceled | EventType::SessionFailed
        )
    }
}
