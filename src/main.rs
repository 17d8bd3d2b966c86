use anyhow::Context;
use bidi_tts::{
    audio::default_output_path,
    config::{
        resource_id, ConnectOptions, ConnectionConfig, SynthesisParams, DEFAULT_ENDPOINT,
        DEFAULT_PROMPT,
    },
    text::{split_segments, TextSource},
    Synthesizer,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bidi-tts", about = "Synthesize a text script over the bidirectional TTS WebSocket")]
struct Args {
    /// APP ID
    #[arg(long, env = "BIDI_TTS_APP_ID")]
    appid: String,

    /// Access token
    #[arg(long, env = "BIDI_TTS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Resource ID (derived from the voice type when empty)
    #[arg(long, default_value = "")]
    resource_id: String,

    /// Text to convert
    #[arg(long)]
    text: Option<String>,

    /// Path to input text file, one segment per line
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Voice type
    #[arg(long)]
    voice_type: String,

    /// Output audio encoding
    #[arg(long, default_value = "mp3")]
    encoding: String,

    #[arg(long, default_value_t = 24000)]
    sample_rate: u32,

    /// Speech rate: -50 (0.5x) to 100 (2x)
    #[arg(long, default_value_t = -15, allow_hyphen_values = true)]
    speed: i32,

    /// Context prompt (tone, pace, emotion). Empty disables it.
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Silence in ms appended after each segment
    #[arg(long, default_value_t = 800)]
    silence_duration: u32,

    /// WebSocket endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Output filename (default: <voice>_output.<encoding>)
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Give up when the server is silent this long. Waits forever when unset.
    #[arg(long)]
    receive_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (for development)
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let params = SynthesisParams {
        speaker: args.voice_type.clone(),
        format: args.encoding.clone(),
        sample_rate: args.sample_rate,
        speech_rate: args.speed,
        prompt: Some(args.prompt.clone()).filter(|p| !p.is_empty()),
        silence_duration_ms: args.silence_duration,
        ..SynthesisParams::new(args.voice_type.clone())
    };
    params.validate().context("invalid synthesis parameters")?;

    let mut connection = ConnectionConfig::new(
        args.appid,
        args.access_token,
        resource_id(&args.voice_type, Some(&args.resource_id)),
    );
    connection.endpoint = args.endpoint;
    connection.options = ConnectOptions {
        receive_timeout: args.receive_timeout_secs.map(Duration::from_secs),
    };
    connection
        .validate()
        .context("invalid connection settings")?;

    let source = TextSource::from_args(args.text, args.input_file)?;
    let text = source.load().await?;
    let segments = split_segments(&text);
    log::info!(
        "📝 Splitting text into {} segments for pacing control",
        segments.len()
    );

    let output_path = args
        .output_file
        .unwrap_or_else(|| default_output_path(&args.voice_type, &args.encoding));

    let synthesizer = Synthesizer::new(params);
    let output = synthesizer
        .run_websocket_to_file(&connection, &segments, &output_path)
        .await
        .with_context(|| format!("synthesis to {} failed", output_path.display()))?;

    println!(
        "✅ {} segments, {} bytes saved to {}",
        output.sessions.len(),
        output.audio.len(),
        output_path.display()
    );
    Ok(())
}
