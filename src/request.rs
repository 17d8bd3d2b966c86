//! JSON control documents sent as the payload of client frames.
//!
//! Each document is built fresh from the shared [`SynthesisParams`], so
//! nothing set for one event can leak into the next.

use crate::config::SynthesisParams;
use crate::error::Result;
use crate::event::EventType;
use serde::Serialize;

pub const NAMESPACE: &str = "BidirectionalTTS";

#[derive(Debug, Serialize)]
struct RequestDocument<'a> {
    user: User<'a>,
    namespace: &'static str,
    event: i32,
    req_params: ReqParams<'a>,
}

#[derive(Debug, Serialize)]
struct User<'a> {
    uid: &'a str,
}

#[derive(Debug, Serialize)]
struct ReqParams<'a> {
    speaker: &'a str,
    audio_params: AudioParams<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    /// Sent as a JSON-encoded string, not a nested object
    additions: String,
}

#[derive(Debug, Serialize)]
struct AudioParams<'a> {
    format: &'a str,
    sample_rate: u32,
    speech_rate: i32,
    enable_timestamp: bool,
}

#[derive(Debug, Serialize)]
struct Additions<'a> {
    disable_markdown_filter: bool,
    context_texts: Vec<&'a str>,
    silence_duration: u32,
}

fn build(
    params: &SynthesisParams,
    uid: &str,
    event: EventType,
    text: Option<&str>,
) -> Result<Vec<u8>> {
    let additions = Additions {
        disable_markdown_filter: params.disable_markdown_filter,
        context_texts: params
            .prompt
            .as_deref()
            .filter(|p| !p.is_empty())
            .into_iter()
            .collect(),
        silence_duration: params.silence_duration_ms,
    };

    let document = RequestDocument {
        user: User { uid },
        namespace: NAMESPACE,
        event: event.code(),
        req_params: ReqParams {
            speaker: &params.speaker,
            audio_params: AudioParams {
                format: &params.format,
                sample_rate: params.sample_rate,
                speech_rate: params.speech_rate,
                enable_timestamp: params.enable_timestamp,
            },
            text,
            additions: serde_json::to_string(&additions)?,
        },
    };

    Ok(serde_json::to_vec(&document)?)
}

/// Payload for the start-session frame
pub fn start_session(params: &SynthesisParams, uid: &str) -> Result<Vec<u8>> {
    build(params, uid, EventType::StartSession, None)
}

/// Payload for the task-request frame carrying the segment text
pub fn task_request(params: &SynthesisParams, uid: &str, text: &str) -> Result<Vec<u8>> {
    build(params, uid, EventType::TaskRequest, Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn params() -> SynthesisParams {
        SynthesisParams {
            speaker: "S_test".to_string(),
            format: "pcm".to_string(),
            sample_rate: 16000,
            speech_rate: 10,
            prompt: Some("speak slowly".to_string()),
            silence_duration_ms: 600,
            enable_timestamp: true,
            disable_markdown_filter: true,
        }
    }

    #[test]
    fn test_start_session_document() {
        let bytes = start_session(&params(), "user-1").unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(doc["user"]["uid"], "user-1");
        assert_eq!(doc["namespace"], "BidirectionalTTS");
        assert_eq!(doc["event"], 100);
        assert_eq!(doc["req_params"]["speaker"], "S_test");
        assert_eq!(
            doc["req_params"]["audio_params"],
            json!({
                "format": "pcm",
                "sample_rate": 16000,
                "speech_rate": 10,
                "enable_timestamp": true
            })
        );
        assert!(doc["req_params"].get("text").is_none());
    }

    #[test]
    fn test_additions_is_encoded_string() {
        let bytes = task_request(&params(), "user-1", "Hello.").unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(doc["event"], 200);
        assert_eq!(doc["req_params"]["text"], "Hello.");

        let additions = doc["req_params"]["additions"].as_str().unwrap();
        let additions: Value = serde_json::from_str(additions).unwrap();
        assert_eq!(
            additions,
            json!({
                "disable_markdown_filter": true,
                "context_texts": ["speak slowly"],
                "silence_duration": 600
            })
        );
    }

    #[test]
    fn test_empty_prompt_sends_no_context() {
        let mut params = params();
        params.prompt = Some(String::new());
        let bytes = start_session(&params, "u").unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        let additions: Value =
            serde_json::from_str(doc["req_params"]["additions"].as_str().unwrap()).unwrap();
        assert_eq!(additions["context_texts"], json!([]));
    }

    #[test]
    fn test_documents_do_not_share_text() {
        let params = params();
        let first = task_request(&params, "u", "first").unwrap();
        let start = start_session(&params, "u").unwrap();
        let first: Value = serde_json::from_slice(&first).unwrap();
        let start: Value = serde_json::from_slice(&start).unwrap();
        assert_eq!(first["req_params"]["text"], "first");
        assert!(start["req_params"].get("text").is_none());
    }
}
