//! Difficulty-aware essay workshop built on the writer and reflector agents.
//!
//! `mode1`: Tiro proposes the topic and the learner may submit an essay that
//! is critiqued and answered with model essays. `mode2`: the learner proposes
//! the topic and Tiro writes, critiques and rewrites from scratch. Both return
//! a Markdown report.

use crate::agent::Chat;
use crate::rounds::{MultiRound, TranscriptStyle};
use crate::writing::{ReflectionAgent, WritingAgent};
use std::fmt;
use std::str::FromStr;
use tiro_llm::{Error, Result};

/// `mode1` without a topic
pub const TOPIC_REQUIRED: &str = "⚠️ Please generate a topic first. 请先生成题目";

/// `mode2` without a topic
pub const TOPIC_MISSING: &str = "⚠️ Please enter an essay topic first. 请先输入作文题目";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Difficulty {
    #[default]
    MiddleSchool,
    HighSchool,
    University,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::MiddleSchool => "middle school",
            Difficulty::HighSchool => "high school",
            Difficulty::University => "university",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "middle" | "middle school" | "初中" => Ok(Difficulty::MiddleSchool),
            "high" | "high school" | "高中" => Ok(Difficulty::HighSchool),
            "university" | "大学" => Ok(Difficulty::University),
            other => Err(Error::invalid_argument(format!(
                "unknown difficulty '{other}', expected middle, high or university"
            ))),
        }
    }
}

/// How the writer turns a critique into the next essay
#[derive(Clone, Copy)]
enum Rewrite {
    /// A fresh model essay from topic and critique
    ModelEssay,
    /// A revision of the current essay
    Revision,
}

pub struct WritingWorkshop {
    writer: WritingAgent,
    reflector: ReflectionAgent,
}

impl WritingWorkshop {
    pub fn new(writer: WritingAgent, reflector: ReflectionAgent) -> Self {
        Self { writer, reflector }
    }

    pub fn writer(&self) -> &WritingAgent {
        &self.writer
    }

    pub fn reflector(&self) -> &ReflectionAgent {
        &self.reflector
    }

    /// Topic title only, trimmed
    pub async fn generate_topic(&self, difficulty: Difficulty) -> Result<String> {
        let prompt = format!(
            "Please generate an English essay topic at {difficulty} level. \
             Return only the topic text, nothing else."
        );
        let topic = self.writer.stream_collect(vec![prompt]).await?;
        Ok(topic.trim().to_string())
    }

    /// Critique on score (content 30%, structure 50%, grammar 20%),
    /// strengths, weaknesses and overall advice
    pub async fn reflect_with_difficulty(&self, article: &str, difficulty: Difficulty) -> Result<String> {
        let prompt = format!(
            "Based on {difficulty} standards, review the following essay on 4 dimensions:\n\
             1. Score (content relevance 30%, structural completeness 50%, grammar 20%)\n\
             2. Strengths\n\
             3. Weaknesses\n\
             4. Overall advice\n\n\
             Essay:\n{article}"
        );
        self.reflector.stream_collect(vec![prompt]).await
    }

    pub async fn suggest(&self, topic: &str, difficulty: Difficulty) -> Result<String> {
        let prompt = format!(
            "For the following {difficulty} level English essay topic, give detailed writing \
             advice matched to that level, covering key points, structure, suitable vocabulary \
             and grammar.\n\nTopic: {topic}"
        );
        self.reflector.stream_collect(vec![prompt]).await
    }

    /// Tiro's topic, the learner's essay, then `rounds` of critique and
    /// model essay. Without an essay only a writing suggestion is given.
    pub async fn mode1(
        &self,
        topic: &str,
        essay: &str,
        difficulty: Difficulty,
        rounds: usize,
    ) -> Result<String> {
        if topic.trim().is_empty() {
            return Ok(TOPIC_REQUIRED.to_string());
        }
        check_rounds(rounds, "workshop::mode1")?;

        let mut report = format!("## 📌 Tiro's topic ({difficulty})\n{topic}\n\n");
        if essay.trim().is_empty() {
            report.push_str("### ⚠️ Note: no essay submitted, writing advice only\n");
            let suggestion = self.suggest(topic, difficulty).await?;
            report.push_str(&format!("### 💡 Writing advice ({difficulty})\n{suggestion}\n"));
            return Ok(report);
        }

        report.push_str(&format!("### 📝 Submitted essay\n{essay}\n\n"));
        self.refine(&mut report, topic, essay, difficulty, rounds, Rewrite::ModelEssay)
            .await?;
        tracing::info!(%difficulty, rounds, "mode1 complete");
        Ok(report)
    }

    /// The learner's topic: suggestion, initial essay, then `rounds` of
    /// critique and revision.
    pub async fn mode2(&self, topic: &str, difficulty: Difficulty, rounds: usize) -> Result<String> {
        if topic.trim().is_empty() {
            return Ok(TOPIC_MISSING.to_string());
        }
        check_rounds(rounds, "workshop::mode2")?;

        let mut report = format!("## 📌 Your topic ({difficulty})\n{topic}\n\n");
        let suggestion = self.suggest(topic, difficulty).await?;
        report.push_str(&format!("### 💡 Writing advice ({difficulty})\n{suggestion}\n\n"));

        let initial = format!(
            "Using the following {difficulty} level topic and writing advice, write an initial essay:\n\
             Topic: {topic}\n\
             Advice: {suggestion}"
        );
        let essay = self.writer.stream_collect(vec![initial]).await?;
        report.push_str(&format!("### Initial ✍️ AI essay\n{essay}\n\n"));

        self.refine(&mut report, topic, &essay, difficulty, rounds, Rewrite::Revision)
            .await?;
        tracing::info!(%difficulty, rounds, "mode2 complete");
        Ok(report)
    }

    /// Plain writer/reflector rounds over `seed`
    pub async fn multi_round(&self, seed: &str, rounds: usize, style: TranscriptStyle) -> Result<String> {
        let transcript = MultiRound::new(&self.writer, &self.reflector)
            .with_max_rounds(rounds)
            .run(seed)
            .await?;
        Ok(transcript.render(style))
    }

    async fn refine(
        &self,
        report: &mut String,
        topic: &str,
        essay: &str,
        difficulty: Difficulty,
        rounds: usize,
        rewrite: Rewrite,
    ) -> Result<()> {
        let mut current = essay.to_string();
        for round in 1..=rounds {
            let critique = self.reflect_with_difficulty(&current, difficulty).await?;
            report.push_str(&format!(
                "### Round {round} 💬 Reflection ({difficulty} standard)\n{critique}\n\n"
            ));

            let (prompt, heading) = match rewrite {
                Rewrite::ModelEssay => (
                    format!(
                        "Using the following {difficulty} level topic and reflection, write a model essay:\n\
                         Topic: {topic}\n\
                         Reflection: {critique}\n\
                         It must match {difficulty} level and fit the topic."
                    ),
                    "✍️ AI model essay",
                ),
                Rewrite::Revision => (
                    format!(
                        "Using the following {difficulty} level topic and reflection, improve the essay:\n\
                         Topic: {topic}\n\
                         Current essay: {current}\n\
                         Reflection: {critique}\n\
                         It must match {difficulty} level and address the reflection."
                    ),
                    "✍️ Revised essay",
                ),
            };
            current = self.writer.stream_collect(vec![prompt]).await?;
            report.push_str(&format!("### Round {round} {heading}\n{current}\n\n"));
            tracing::debug!(round, "workshop round complete");
        }
        Ok(())
    }
}

fn check_rounds(rounds: usize, op: &'static str) -> Result<()> {
    if rounds == 0 {
        return Err(Error::invalid_argument("rounds must be positive").with_operation(op));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use std::sync::Arc;
    use tiro_llm::{CompletionRequest, HistoryStore, ScriptedProvider, SystemPrompt};

    fn workshop(provider: &Arc<ScriptedProvider>) -> WritingWorkshop {
        let store = HistoryStore::new();
        let writer = Agent::new(
            WritingAgent::NAME,
            SystemPrompt::new("writer"),
            provider.clone(),
            store.clone(),
        );
        let reflector = Agent::new(
            ReflectionAgent::NAME,
            SystemPrompt::new("reflector"),
            provider.clone(),
            store,
        );
        WritingWorkshop::new(WritingAgent::new(writer), ReflectionAgent::new(reflector))
    }

    fn by_role(req: &CompletionRequest) -> String {
        let n = req.messages.iter().filter(|m| m.is_user()).count();
        match req.system_prompt() {
            Some("writer") => format!("essay {n}"),
            _ => format!("critique {n}"),
        }
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("middle".parse::<Difficulty>().unwrap(), Difficulty::MiddleSchool);
        assert_eq!(" High ".parse::<Difficulty>().unwrap(), Difficulty::HighSchool);
        assert_eq!("university".parse::<Difficulty>().unwrap(), Difficulty::University);
        assert!("kindergarten".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::default().to_string(), "middle school");
    }

    #[tokio::test]
    async fn test_generate_topic_trimmed() {
        let provider = Arc::new(ScriptedProvider::replies(["\n  My Favourite Season \n"]));
        let topic = workshop(&provider).generate_topic(Difficulty::HighSchool).await.unwrap();
        assert_eq!(topic, "My Favourite Season");
        let prompt = provider.last_request().unwrap();
        assert!(prompt.last_user_content().unwrap().contains("high school level"));
    }

    #[tokio::test]
    async fn test_empty_topics_make_no_calls() {
        let provider = Arc::new(ScriptedProvider::echo());
        let ws = workshop(&provider);
        assert_eq!(ws.mode1("  ", "essay", Difficulty::University, 2).await.unwrap(), TOPIC_REQUIRED);
        assert_eq!(ws.mode2("", Difficulty::University, 2).await.unwrap(), TOPIC_MISSING);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_mode1_without_essay_only_suggests() {
        let provider = Arc::new(ScriptedProvider::from_fn(by_role));
        let report = workshop(&provider)
            .mode1("Travel", "", Difficulty::MiddleSchool, 3)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
        assert!(report.starts_with("## 📌 Tiro's topic (middle school)\nTravel\n\n### ⚠️ Note"));
        assert!(report.contains("### 💡 Writing advice (middle school)\ncritique 1\n"));
    }

    #[tokio::test]
    async fn test_mode1_rounds() {
        let provider = Arc::new(ScriptedProvider::from_fn(by_role));
        let report = workshop(&provider)
            .mode1("Travel", "I like trains.", Difficulty::HighSchool, 2)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 4);
        let requests = provider.requests();
        // the second critique reviews the first model essay
        assert!(requests[2].last_user_content().unwrap().ends_with("Essay:\nessay 1"));
        assert!(requests[1].last_user_content().unwrap().contains("Reflection: critique 1"));

        let headings: Vec<_> = report.lines().filter(|l| l.starts_with("### Round")).collect();
        assert_eq!(
            headings,
            [
                "### Round 1 💬 Reflection (high school standard)",
                "### Round 1 ✍️ AI model essay",
                "### Round 2 💬 Reflection (high school standard)",
                "### Round 2 ✍️ AI model essay",
            ]
        );
    }

    #[tokio::test]
    async fn test_mode2_rewrites_current_essay() {
        let provider = Arc::new(ScriptedProvider::from_fn(by_role));
        let report = workshop(&provider)
            .mode2("City life", Difficulty::University, 1)
            .await
            .unwrap();

        // suggestion, initial essay, critique, revision
        assert_eq!(provider.calls(), 4);
        let requests = provider.requests();
        let initial = requests[1].last_user_content().unwrap();
        assert!(initial.contains("Advice: critique 1"));
        let revision = requests[3].last_user_content().unwrap();
        assert!(revision.contains("Current essay: essay 1"));
        assert!(revision.contains("Reflection: critique 2"));

        assert!(report.contains("### Initial ✍️ AI essay\nessay 1\n\n"));
        assert!(report.contains("### Round 1 ✍️ Revised essay\nessay 2\n\n"));
    }

    #[tokio::test]
    async fn test_zero_rounds_rejected() {
        let provider = Arc::new(ScriptedProvider::echo());
        let ws = workshop(&provider);
        assert!(ws.mode2("Topic", Difficulty::HighSchool, 0).await.is_err());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_round_markdown() {
        let provider = Arc::new(ScriptedProvider::from_fn(by_role));
        let md = workshop(&provider)
            .multi_round("Describe autumn", 2, TranscriptStyle::Markdown)
            .await
            .unwrap();
        assert!(md.starts_with("### Round 1 ✍️ Draft\nessay 1"));
        assert!(md.ends_with("critique 4"));
    }
}
