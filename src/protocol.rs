use crate::event::{EventType, MsgType, Scope};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use thiserror::Error;

const PROTOCOL_VERSION: u8 = 0b0001;

/// Header size in 4-byte words. The client always sends the minimal header.
const HEADER_WORDS: u8 = 0b0001;

/// Empty JSON object sent with connection frames and finish-session
const EMPTY_OBJECT: &[u8] = b"{}";

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Frame truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unsupported protocol version: {0}")]
    InvalidVersion(u8),

    #[error("Invalid header size: {0} words")]
    InvalidHeaderSize(u8),

    #[error("Invalid message type: {0:#06b}")]
    InvalidMessageType(u8),

    #[error("Invalid message flags: {0:#06b}")]
    InvalidFlags(u8),

    #[error("Invalid serialization method: {0:#06b}")]
    InvalidSerialization(u8),

    #[error("Invalid compression method: {0:#06b}")]
    InvalidCompression(u8),

    #[error("Unknown event code: {0}")]
    UnknownEvent(i32),

    #[error("Invalid string encoding")]
    InvalidString,

    #[error("Event {0} requires a session id")]
    MissingSessionId(EventType),

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    #[error("Payload compression error: {0}")]
    Compression(#[from] std::io::Error),
}

/// Message type specific flags (low nibble of header byte 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgFlags {
    NoSeq = 0b0000,
    PositiveSeq = 0b0001,
    LastNoSeq = 0b0010,
    NegativeSeq = 0b0011,
    WithEvent = 0b0100,
}

impl TryFrom<u8> for MsgFlags {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b0000 => Ok(MsgFlags::NoSeq),
            0b0001 => Ok(MsgFlags::PositiveSeq),
            0b0010 => Ok(MsgFlags::LastNoSeq),
            0b0011 => Ok(MsgFlags::NegativeSeq),
            0b0100 => Ok(MsgFlags::WithEvent),
            _ => Err(ProtocolError::InvalidFlags(value)),
        }
    }
}

impl MsgFlags {
    fn has_sequence(self) -> bool {
        matches!(self, MsgFlags::PositiveSeq | MsgFlags::NegativeSeq)
    }
}

/// Payload serialization (high nibble of header byte 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Serialization {
    Raw = 0b0000,
    Json = 0b0001,
    Thrift = 0b0011,
    Custom = 0b1111,
}

impl TryFrom<u8> for Serialization {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b0000 => Ok(Serialization::Raw),
            0b0001 => Ok(Serialization::Json),
            0b0011 => Ok(Serialization::Thrift),
            0b1111 => Ok(Serialization::Custom),
            _ => Err(ProtocolError::InvalidSerialization(value)),
        }
    }
}

/// Payload compression (low nibble of header byte 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0b0000,
    Gzip = 0b0001,
    Custom = 0b1111,
}

impl TryFrom<u8> for Compression {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b0000 => Ok(Compression::None),
            0b0001 => Ok(Compression::Gzip),
            0b1111 => Ok(Compression::Custom),
            _ => Err(ProtocolError::InvalidCompression(value)),
        }
    }
}

/// One wire message.
///
/// `payload` always holds the plain bytes: gzip payloads are inflated by
/// [`Frame::from_bytes`] and deflated again by [`Frame::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MsgType,
    pub flags: MsgFlags,
    pub serialization: Serialization,
    pub compression: Compression,
    pub sequence: Option<i32>,
    pub error_code: Option<u32>,
    pub event: Option<EventType>,
    pub session_id: Option<String>,
    pub connect_id: Option<String>,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A client control frame carrying an event and a JSON payload
    pub fn client_event(event: EventType, session_id: Option<&str>, payload: Vec<u8>) -> Self {
        Self {
            msg_type: MsgType::FullClientRequest,
            flags: MsgFlags::WithEvent,
            serialization: Serialization::Json,
            compression: Compression::None,
            sequence: None,
            error_code: None,
            event: Some(event),
            session_id: session_id.map(str::to_string),
            connect_id: None,
            payload,
        }
    }

    pub fn start_connection() -> Self {
        Self::client_event(EventType::StartConnection, None, EMPTY_OBJECT.to_vec())
    }

    pub fn finish_connection() -> Self {
        Self::client_event(EventType::FinishConnection, None, EMPTY_OBJECT.to_vec())
    }

    pub fn start_session(session_id: &str, payload: Vec<u8>) -> Self {
        Self::client_event(EventType::StartSession, Some(session_id), payload)
    }

    pub fn task_request(session_id: &str, payload: Vec<u8>) -> Self {
        Self::client_event(EventType::TaskRequest, Some(session_id), payload)
    }

    pub fn finish_session(session_id: &str) -> Self {
        Self::client_event(
            EventType::FinishSession,
            Some(session_id),
            EMPTY_OBJECT.to_vec(),
        )
    }

    /// Server acknowledgement with an event, as the TTS service sends them
    pub fn server_event(event: EventType, session_id: Option<&str>, payload: Vec<u8>) -> Self {
        Self {
            msg_type: MsgType::FullServerResponse,
            connect_id: event.carries_connect_id().then(String::new),
            ..Self::client_event(event, session_id, payload)
        }
    }

    /// Server audio push for a session
    pub fn server_audio(session_id: &str, audio: Vec<u8>) -> Self {
        Self {
            msg_type: MsgType::AudioOnlyServer,
            serialization: Serialization::Raw,
            ..Self::client_event(EventType::TtsResponse, Some(session_id), audio)
        }
    }

    /// Server error frame: an error code and a JSON body, no event
    pub fn server_error(code: u32, payload: Vec<u8>) -> Self {
        Self {
            msg_type: MsgType::Error,
            flags: MsgFlags::NoSeq,
            serialization: Serialization::Json,
            compression: Compression::None,
            sequence: None,
            error_code: Some(code),
            event: None,
            session_id: None,
            connect_id: None,
            payload,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.msg_type == MsgType::AudioOnlyServer
    }

    /// Whether this frame is exactly the given type/event pair
    pub fn matches(&self, msg_type: MsgType, event: EventType) -> bool {
        self.msg_type == msg_type && self.event == Some(event)
    }

    /// Serialize to wire format. See the module tests for the byte layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = Vec::with_capacity(16 + self.payload.len());

        bytes.push((PROTOCOL_VERSION << 4) | HEADER_WORDS);
        bytes.push(((self.msg_type as u8) << 4) | self.flags as u8);
        bytes.push(((self.serialization as u8) << 4) | self.compression as u8);
        bytes.push(0); // reserved

        if self.msg_type.allows_sequence() && self.flags.has_sequence() {
            bytes.extend_from_slice(&self.sequence.unwrap_or_default().to_be_bytes());
        }

        if self.msg_type == MsgType::Error {
            bytes.extend_from_slice(&self.error_code.unwrap_or_default().to_be_bytes());
        }

        if self.flags == MsgFlags::WithEvent {
            let event = self.event.unwrap_or(EventType::None);
            bytes.extend_from_slice(&event.code().to_be_bytes());

            if event.scope() == Scope::Session {
                let session_id = self
                    .session_id
                    .as_deref()
                    .ok_or(ProtocolError::MissingSessionId(event))?;
                put_string(&mut bytes, session_id);
            }

            if event.carries_connect_id() {
                put_string(&mut bytes, self.connect_id.as_deref().unwrap_or_default());
            }
        }

        let payload = match self.compression {
            Compression::Gzip => gzip(&self.payload)?,
            _ => self.payload.clone(),
        };
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);

        Ok(bytes)
    }

    /// Parse one complete wire message
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FrameReader::new(data);

        let header = reader.take(4)?;
        let version = header[0] >> 4;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::InvalidVersion(version));
        }
        let header_words = header[0] & 0x0f;
        if header_words == 0 {
            return Err(ProtocolError::InvalidHeaderSize(header_words));
        }
        let msg_type = MsgType::try_from(header[1] >> 4)?;
        let flags = MsgFlags::try_from(header[1] & 0x0f)?;
        let serialization = Serialization::try_from(header[2] >> 4)?;
        let compression = Compression::try_from(header[2] & 0x0f)?;

        // Skip header extensions beyond the first word
        reader.take(header_words as usize * 4 - 4)?;

        let sequence = if msg_type.allows_sequence() && flags.has_sequence() {
            Some(reader.read_i32()?)
        } else {
            None
        };

        let error_code = if msg_type == MsgType::Error {
            Some(reader.read_u32()?)
        } else {
            None
        };

        let mut event = None;
        let mut session_id = None;
        let mut connect_id = None;
        if flags == MsgFlags::WithEvent {
            let parsed = EventType::try_from(reader.read_i32()?)?;
            if parsed.scope() == Scope::Session {
                session_id = Some(reader.read_string()?);
            }
            if parsed.carries_connect_id() {
                connect_id = Some(reader.read_string()?);
            }
            event = Some(parsed);
        }

        let raw_payload = reader.read_sized()?;
        if reader.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(reader.remaining()));
        }

        let payload = match compression {
            Compression::Gzip => gunzip(raw_payload)?,
            _ => raw_payload.to_vec(),
        };

        Ok(Self {
            msg_type,
            flags,
            serialization,
            compression,
            sequence,
            error_code,
            event,
            session_id,
            connect_id,
            payload,
        })
    }

    /// Payload as UTF-8 text, for logging and error messages
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

fn put_string(bytes: &mut Vec<u8>, value: &str) {
    bytes.extend_from_slice(&(value.len() as u32).to_be_bytes());
    bytes.extend_from_slice(value.as_bytes());
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut decoded = Vec::new();
    GzDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}

/// Bounds-checked cursor over a received message
struct FrameReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FrameReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < needed {
            return Err(ProtocolError::Truncated {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_sized(&mut self) -> Result<&'a [u8], ProtocolError> {
        let size = self.read_u32()? as usize;
        self.take(size)
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.read_sized()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidString)
    }
}
