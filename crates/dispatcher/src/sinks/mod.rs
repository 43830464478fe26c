//! Sink implementations
//!
//! Contains TranscriptionSink, CommandSink and the EvaluationLog writer.

mod command;
mod evaluation;
mod transcription;

pub use self::command::{CommandSink, COMMAND_SINK};
pub use self::evaluation::{EvaluationLog, EvaluationRecord, SinkOutcome};
pub use self::transcription::{TranscriptionSink, TRANSCRIPTION_SINK};
