//! Per-session send/receive coordination.
//!
//! The send path (task request, then finish-session) runs as a spawned task
//! while the caller drains inbound frames. Only the receive path decides
//! when the session is over: the server may keep pushing audio after
//! finish-session has been written.

use crate::audio::AudioAccumulator;
use crate::config::SynthesisParams;
use crate::connection::{server_failure, Connection};
use crate::error::{Result, TtsError};
use crate::event::{EventType, MsgType};
use crate::protocol::Frame;
use crate::request;
use crate::session::{Session, SessionState};

/// What one inbound frame means for the active session
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Audio(Vec<u8>),
    Finished,
    Ignored(Option<EventType>),
}

fn belongs_to(frame: &Frame, session_id: &str) -> bool {
    match frame.session_id.as_deref() {
        Some(id) if !id.is_empty() => id == session_id,
        _ => true,
    }
}

/// Classify a frame received while `session_id` is active
pub fn classify(frame: Frame, session_id: &str) -> Result<Step> {
    match server_failure(&frame) {
        Some(err) if frame.msg_type == MsgType::Error => {
            return Err(TtsError::UnexpectedFrame(format!(
                "error frame during session {}: {}",
                session_id, err
            )));
        }
        Some(err) => return Err(err),
        None => {}
    }
    if !belongs_to(&frame, session_id) {
        return Err(TtsError::UnexpectedFrame(format!(
            "{} {:?} for session {:?} while session {} is active",
            frame.msg_type, frame.event, frame.session_id, session_id
        )));
    }

    match frame.msg_type {
        MsgType::AudioOnlyServer => Ok(Step::Audio(frame.payload)),
        MsgType::FullServerResponse => match frame.event {
            Some(EventType::SessionFinished) => Ok(Step::Finished),
            event => Ok(Step::Ignored(event)),
        },
        other => Err(TtsError::UnexpectedFrame(format!(
            "{} {:?} during session {}: {}",
            other,
            frame.event,
            session_id,
            frame.payload_text()
        ))),
    }
}

/// Submit `text` for an active session and collect its audio until the
/// server reports the session finished.
pub async fn run(
    connection: &mut Connection,
    session: &mut Session,
    text: &str,
    params: &SynthesisParams,
    accumulator: &mut AudioAccumulator,
) -> Result<()> {
    let payload = request::task_request(params, session.uid(), text)?;
    let sender = connection.sender();
    let session_id = session.id().to_string();

    let send_task = tokio::spawn(async move {
        sender
            .send(&Frame::task_request(&session_id, payload))
            .await?;
        sender.send(&Frame::finish_session(&session_id)).await
    });
    session.transition(SessionState::Finishing);

    match drain(connection, session, accumulator).await {
        Ok(()) => match send_task.await {
            Ok(sent) => sent,
            Err(e) => Err(TtsError::SendTask(e.to_string())),
        },
        Err(e) => {
            send_task.abort();
            Err(e)
        }
    }
}

async fn drain(
    connection: &mut Connection,
    session: &mut Session,
    accumulator: &mut AudioAccumulator,
) -> Result<()> {
    loop {
        let frame = connection.recv_frame().await?;
        match classify(frame, session.id())? {
            Step::Audio(chunk) => {
                if !accumulator.received_any() {
                    log::info!("🔊 First audio received");
                }
                session.record_audio(chunk.len());
                accumulator.append(&chunk);
            }
            Step::Finished => return Ok(()),
            Step::Ignored(event) => {
                log::debug!("Session {}: ignoring {:?}", session.id(), event);
            }
        }
    }
}
