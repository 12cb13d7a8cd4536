//! # Multi-round orchestration
//!
//! A writer drafts, a reflector critiques, and the next draft is asked for
//! with the previous one as context. Always runs exactly `max_rounds` rounds.
//!
//! ```text
//! round 1:  writer(seed)            -> article_1 ; reflector(seed, article_1) -> critique_1
//! round 2:  writer(next(article_1)) -> article_2 ; reflector(seed, article_2) -> critique_2
//! ...
//! ```
//!
//! The critique is not part of the next writer input; only the draft is.

use crate::agent::Chat;
use serde::Serialize;
use tiro_llm::{Error, Result};

pub const DEFAULT_ROUNDS: usize = 3;

/// Writer input for the round after `article`
pub fn next_round_input(seed: &str, article: &str) -> String {
    format!("{seed}\n\nAI draft:\n{article}\n\nPlease refine the article based on the above reflection.")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundRecord {
    /// 1-based
    pub round: usize,
    pub article: String,
    pub critique: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptStyle {
    #[default]
    Plain,
    Markdown,
}

/// Every round of one orchestrator run, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    seed: String,
    records: Vec<RoundRecord>,
}

impl Transcript {
    fn new(seed: &str) -> Self {
        Self {
            seed: seed.to_string(),
            records: Vec::new(),
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    pub fn final_article(&self) -> Option<&str> {
        self.records.last().map(|r| r.article.as_str())
    }

    /// Labeled draft and critique sections, trimmed
    pub fn render(&self, style: TranscriptStyle) -> String {
        let mut out = String::new();
        for record in &self.records {
            let (draft, critique) = (record.article.trim(), record.critique.trim());
            match style {
                TranscriptStyle::Plain => out.push_str(&format!(
                    "[Round {i} draft]\n{draft}\n\n[Round {i} reflection]\n{critique}\n\n",
                    i = record.round
                )),
                TranscriptStyle::Markdown => out.push_str(&format!(
                    "### Round {i} ✍️ Draft\n{draft}\n\n### Round {i} 💬 Reflection\n{critique}\n\n",
                    i = record.round
                )),
            }
        }
        out.trim().to_string()
    }
}

/// Writer/reflector loop over any two [`Chat`] agents.
pub struct MultiRound<'a, W, R> {
    writer: &'a W,
    reflector: &'a R,
    max_rounds: usize,
}

impl<'a, W: Chat, R: Chat> MultiRound<'a, W, R> {
    pub fn new(writer: &'a W, reflector: &'a R) -> Self {
        Self {
            writer,
            reflector,
            max_rounds: DEFAULT_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Run every round. A backend failure aborts the run and is returned as is.
    pub async fn run(&self, seed: &str) -> Result<Transcript> {
        if self.max_rounds == 0 {
            return Err(Error::invalid_argument("max rounds must be positive")
                .with_operation("rounds::run"));
        }

        let mut transcript = Transcript::new(seed);
        let mut input = seed.to_string();

        for round in 1..=self.max_rounds {
            let article = self.writer.stream_collect(vec![input]).await?;
            let critique = self
                .reflector
                .stream_collect(vec![seed.to_string(), article.clone()])
                .await?;
            tracing::info!(
                round,
                max_rounds = self.max_rounds,
                article_chars = article.len(),
                critique_chars = critique.len(),
                "round complete"
            );

            input = next_round_input(seed, &article);
            transcript.records.push(RoundRecord {
                round,
                article,
                critique,
            });
        }
        Ok(transcript)
    }

    pub async fn run_text(&self, seed: &str) -> Result<String> {
        Ok(self.run(seed).await?.render(TranscriptStyle::Plain))
    }

    pub async fn run_markdown(&self, seed: &str) -> Result<String> {
        Ok(self.run(seed).await?.render(TranscriptStyle::Markdown))
    }
}
