//! Turn pipeline: recognizer loop, reply generation and speech worker.

pub mod chunker;
pub mod error;
pub mod orchestrator;
pub mod speech_station;
pub mod station;
pub mod turn;

pub use chunker::SpeechChunker;
pub use error::{ErrorReporter, LogReporter, StationError};
pub use orchestrator::{LoopParts, OrchestratorConfig, OrchestratorHandle, TurnOrchestrator};
pub use speech_station::{SpeechRequest, SpeechStation, TurnComplete};
pub use station::{Station, StationRunner};
pub use turn::{TurnReport, TurnStage};
