use crate::audio::{save_audio, AudioAccumulator};
use crate::config::{ConnectOptions, ConnectionConfig, SynthesisParams};
use crate::connection::{settle, Connection};
use crate::error::{Result, TtsError};
use crate::event::{EventType, MsgType};
use crate::exchange;
use crate::protocol::Frame;
use crate::request;
use crate::transport::Transport;
use std::path::Path;
use strum::Display;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Finishing,
    Finished,
    Errored,
}

/// One segment's synthesis, from start-session to session-finished
#[derive(Debug)]
pub struct Session {
    index: usize,
    id: String,
    uid: String,
    state: SessionState,
    chunks: usize,
    bytes: usize,
}

impl Session {
    /// A session with fresh random identifiers
    pub fn new(index: usize) -> Self {
        Self {
            index,
            id: Uuid::new_v4().to_string(),
            uid: Uuid::new_v4().to_string(),
            state: SessionState::Idle,
            chunks: 0,
            bytes: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: SessionState) {
        log::debug!("Session {} state: {} → {}", self.id, self.state, next);
        self.state = next;
    }

    pub(crate) fn record_audio(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len;
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            index: self.index,
            session_id: self.id.clone(),
            chunks: self.chunks,
            bytes: self.bytes,
        }
    }
}

/// Summary of a completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Position of the segment in the input
    pub index: usize,
    pub session_id: String,
    pub chunks: usize,
    pub bytes: usize,
}

#[derive(Debug)]
pub struct SynthesisOutput {
    /// Audio of all sessions, in segment order
    pub audio: Vec<u8>,
    pub sessions: Vec<SessionReport>,
}

/// Runs one session per text segment over a single connection
pub struct Synthesizer {
    params: SynthesisParams,
}

impl Synthesizer {
    pub fn new(params: SynthesisParams) -> Self {
        Self { params }
    }

    /// Open a WebSocket, synthesize every segment, and finish the connection
    pub async fn run_websocket(
        &self,
        config: &ConnectionConfig,
        segments: &[String],
    ) -> Result<SynthesisOutput> {
        let connection = Connection::open(config).await?;
        self.run_on(connection, segments).await
    }

    /// Same as [`Synthesizer::run_websocket`] over an already opened transport
    pub async fn run(
        &self,
        transport: Transport,
        options: ConnectOptions,
        segments: &[String],
    ) -> Result<SynthesisOutput> {
        let connection = Connection::establish(transport, options).await?;
        self.run_on(connection, segments).await
    }

    /// [`Synthesizer::run_websocket`], then write the audio to `path`.
    /// Nothing is written unless every session succeeded.
    pub async fn run_websocket_to_file(
        &self,
        config: &ConnectionConfig,
        segments: &[String],
        path: &Path,
    ) -> Result<SynthesisOutput> {
        let output = self.run_websocket(config, segments).await?;
        save_audio(path, &output.audio).await?;
        Ok(output)
    }

    /// [`Synthesizer::run`], then write the audio to `path`
    pub async fn run_to_file(
        &self,
        transport: Transport,
        options: ConnectOptions,
        segments: &[String],
        path: &Path,
    ) -> Result<SynthesisOutput> {
        let output = self.run(transport, options, segments).await?;
        save_audio(path, &output.audio).await?;
        Ok(output)
    }

    /// The finish-connection handshake is attempted whatever the sessions return
    async fn run_on(
        &self,
        mut connection: Connection,
        segments: &[String],
    ) -> Result<SynthesisOutput> {
        let work = self.synthesize(&mut connection, segments).await;
        let teardown = connection.disconnect().await;
        settle(work, teardown)
    }

    /// Run the sessions strictly one after another on an open connection
    pub async fn synthesize(
        &self,
        connection: &mut Connection,
        segments: &[String],
    ) -> Result<SynthesisOutput> {
        let mut accumulator = AudioAccumulator::new();
        let mut sessions = Vec::with_capacity(segments.len());

        log::info!("Synthesizing {} segments", segments.len());

        for (index, segment) in segments.iter().enumerate() {
            let text = segment.trim();
            if text.is_empty() {
                log::debug!("Skipping empty segment {}", index);
                continue;
            }

            let mut session = Session::new(index);
            if let Err(e) = self
                .run_session(connection, &mut session, text, &mut accumulator)
                .await
            {
                session.transition(SessionState::Errored);
                log::error!("Session {} (segment {}) failed: {}", session.id(), index, e);
                return Err(e);
            }

            let report = session.report();
            log::info!(
                "Segment {}/{} done: {} chunks, {} bytes",
                index + 1,
                segments.len(),
                report.chunks,
                report.bytes
            );
            sessions.push(report);
        }

        if !accumulator.received_any() {
            return Err(TtsError::NoAudioReceived);
        }

        let chunks = accumulator.chunks();
        let audio = accumulator.into_bytes();
        log::info!("Audio received: {} bytes in {} chunks", audio.len(), chunks);
        Ok(SynthesisOutput { audio, sessions })
    }

    async fn run_session(
        &self,
        connection: &mut Connection,
        session: &mut Session,
        text: &str,
        accumulator: &mut AudioAccumulator,
    ) -> Result<()> {
        let session_id = session.id().to_string();
        let start_failed = |e: TtsError| {
            e.or_wrap(|reason| TtsError::SessionStart {
                session_id: session_id.clone(),
                reason,
            })
        };

        let payload = request::start_session(&self.params, session.uid())?;
        connection
            .send(&Frame::start_session(&session_id, payload))
            .await
            .map_err(start_failed)?;
        session.transition(SessionState::Starting);

        let ack = connection
            .wait_for_event(MsgType::FullServerResponse, EventType::SessionStarted)
            .await
            .map_err(start_failed)?;

        if ack.session_id.as_deref() != Some(session_id.as_str()) {
            return Err(TtsError::SessionStart {
                session_id,
                reason: format!("acknowledgement was for session {:?}", ack.session_id),
            });
        }

        session.transition(SessionState::Active);
        exchange::run(connection, session, text, &self.params, accumulator).await?;
        session.transition(SessionState::Finished);
        Ok(())
    }
}
