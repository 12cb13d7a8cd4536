//! # tiro-agent
//!
//! The language-coaching agents and the flows that drive them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          TiroApp                            │
//! │  VocabularyAgent   ConversationCoach   WritingWorkshop      │
//! │        │                  │               │        │        │
//! │        │                  │        WritingAgent ReflectionAgent
//! │        │                  │               └─ MultiRound ─┘  │
//! │        └──────────────────┴──── Agent (Chat) ──────┘        │
//! └───────────────────────────────┬─────────────────────────────┘
//!                                 │
//!                    ┌────────────┴────────────┐
//!                    │  tiro-llm: LlmProvider   │
//!                    │  HistoryStore, prompts   │
//!                    └─────────────────────────┘
//! ```
//!
//! Every agent keeps its dialogue in its own session of the shared
//! [`HistoryStore`](tiro_llm::HistoryStore), keyed by the agent's name.

pub mod agent;
pub mod app;
pub mod conversation;
pub mod export;
pub mod rounds;
pub mod vocab;
pub mod workshop;
pub mod writing;

pub use agent::{Agent, AgentConfig, AgentStream, Chat};
pub use app::{AppConfig, TiroApp};
pub use conversation::{ConversationAgent, ConversationCoach, ConversationContext};
pub use export::export_transcript;
pub use rounds::{next_round_input, MultiRound, RoundRecord, Transcript, TranscriptStyle, DEFAULT_ROUNDS};
pub use vocab::{parse_word_list, Scorecard, VocabularyAgent, VocabularyPhase, VocabularyState};
pub use workshop::{Difficulty, WritingWorkshop};
pub use writing::{ReflectionAgent, WritingAgent};
