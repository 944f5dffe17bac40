pub mod catalogue;
pub mod config;
pub mod context;
pub mod error;
pub mod generative;
pub mod models;
pub mod ranking;
pub mod speaker;
pub mod transcript;

pub use catalogue::{MockReportStore, ReportStore};
pub use config::ScribeConfig;
pub use context::{build_context_frame, extract_clinical_context};
pub use error::ScribeError;
pub use generative::{
    extract_json_object, GeminiClient, GenerationOptions, GenerativeProvider, ProviderError,
};
pub use ranking::{detect_report_intent, rank_reports, relevance_score, resolve_report_request};
pub use speaker::{classify_speaker, score_utterance, SpeakerScores};
pub use transcript::Transcript;
