pub mod blocks;
pub mod classify;
pub mod config;
pub mod error;
pub mod linker;
pub mod loader;
pub mod locator;
pub mod model;
pub mod record;
pub mod segment;
pub mod service;
pub mod transcript;
pub mod tree;
pub mod turn;

pub use config::{ClaudeRoot, ParseOptions};
pub use error::{CcflowError, Result};
pub use locator::{LocateSource, ResolvedSession, SessionLocator, is_session_id};
pub use model::{
    Block, BlockContent, CompactMetadata, Document, Segment, SegmentKind, SubagentLink,
    SubagentTranscript, TranscriptSource, Turn,
};
pub use service::{
    build_document, build_transcript, discover_subagent_logs, parse_session, parse_session_with,
    session_id_from_path,
};
pub use transcript::{TranscriptMetadata, compute_metadata, render_json};
