pub mod audio;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod exchange;
pub mod protocol;
pub mod request;
pub mod session;
pub mod text;
pub mod transport;

pub use connection::{Connection, ConnectionState};
pub use error::{Result, TtsError};
pub use session::{SessionReport, SynthesisOutput, Synthesizer};
