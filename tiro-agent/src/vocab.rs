//! # Vocabulary agent
//!
//! Generates a word list, then runs a situational chat that should use those
//! words, then scores how many of them the learner actually used.
//!
//! ```text
//! NoWords --generate_vocabulary--> WordsReady --start_situation_chat--> InConversation
//!    ^                                  ^                                     |
//!    |                                  +-------evaluate_conversation---------+
//!    +---------------------------- restart (from any phase)
//! ```
//!
//! Without words, chatting is refused with [`WORDS_REQUIRED`] and the backend
//! is never called.

use crate::agent::{Agent, AgentConfig, AgentStream, Chat};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tiro_llm::{Error, HistoryStore, LlmProvider, PromptLibrary, Result};

pub const DEFAULT_WORD_COUNT: usize = 5;

/// Reply to any chat attempted before words exist
pub const WORDS_REQUIRED: &str =
    "--Please generate words first, then practise them in conversation! 请先生成单词，在学会新单词后再进行对话！--";

/// Reply to an evaluation requested outside a situation chat
pub const NOT_IN_CONVERSATION: &str =
    "Please start a situation chat first! 请先开始情景对话！";

pub const RESTARTED: &str =
    "Session reset. Generate new words to start learning. 会话已重置。请重新生成单词开始学习。";

/// Separator between the fields of one generated word line
pub const FIELD_DELIMITER: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyState {
    pub word_count: usize,
    pub current_words: Vec<String>,
    pub words_generated: bool,
    pub in_conversation: bool,
}

impl Default for VocabularyState {
    fn default() -> Self {
        Self {
            word_count: DEFAULT_WORD_COUNT,
            current_words: Vec::new(),
            words_generated: false,
            in_conversation: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabularyPhase {
    NoWords,
    WordsReady,
    InConversation,
}

pub struct VocabularyAgent {
    agent: Agent,
    state: VocabularyState,
    /// Session length when the situation chat opened; only later user
    /// messages count towards the score.
    conversation_start: usize,
}

impl VocabularyAgent {
    pub const NAME: &'static str = "vocab_study";

    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            state: VocabularyState::default(),
            conversation_start: 0,
        }
    }

    pub fn load(
        library: &PromptLibrary,
        provider: Arc<dyn LlmProvider>,
        store: HistoryStore,
        config: AgentConfig,
    ) -> Result<Self> {
        Ok(Self::new(
            Agent::load(Self::NAME, library, provider, store)?.with_config(config),
        ))
    }

    pub fn state(&self) -> &VocabularyState {
        &self.state
    }

    pub fn current_words(&self) -> &[String] {
        &self.state.current_words
    }

    pub fn phase(&self) -> VocabularyPhase {
        if !self.state.words_generated {
            VocabularyPhase::NoWords
        } else if self.state.in_conversation {
            VocabularyPhase::InConversation
        } else {
            VocabularyPhase::WordsReady
        }
    }

    pub fn set_word_count(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::invalid_argument("word count must be positive")
                .with_operation("vocab::set_word_count"));
        }
        self.state.word_count = count;
        tracing::info!(count, "word count set");
        Ok(())
    }

    /// Ask for `count` words (or the stored count) and parse the reply.
    ///
    /// Returns the raw reply for display. Lines that do not follow the
    /// `word - phonetic - ...` format are skipped; if none do, the agent
    /// stays without words.
    pub async fn generate_vocabulary(&mut self, count: Option<usize>) -> Result<String> {
        if let Some(count) = count {
            self.set_word_count(count)?;
        }
        let prompt = vocabulary_prompt(self.state.word_count);
        let reply = self.agent.send(&prompt, None).await?;

        self.state.current_words = parse_word_list(&reply);
        self.state.words_generated = !self.state.current_words.is_empty();
        tracing::info!(
            requested = self.state.word_count,
            parsed = self.state.current_words.len(),
            "vocabulary generated"
        );
        Ok(reply)
    }

    /// Open a role-play scene that uses every current word.
    pub async fn start_situation_chat(&mut self) -> Result<String> {
        if !self.state.words_generated {
            tracing::warn!("situation chat requested before words were generated");
            return Ok(WORDS_REQUIRED.to_string());
        }

        let prompt = situation_prompt(&self.state.current_words);
        let reply = self.agent.send(&prompt, None).await?;
        self.state.in_conversation = true;
        self.conversation_start = self.agent.history(None).len();
        Ok(reply)
    }

    /// Score the learner's messages since the scene opened and leave the
    /// conversation. `None` when no situation chat is running.
    pub fn evaluate_conversation(&mut self) -> Option<Scorecard> {
        if !self.state.in_conversation {
            return None;
        }
        let learner_messages = self
            .agent
            .history(None)
            .user_messages_since(self.conversation_start);
        let scorecard = Scorecard::compute(&self.state.current_words, &learner_messages);

        self.state.in_conversation = false;
        tracing::info!(score = scorecard.score, "conversation evaluated");
        Some(scorecard)
    }

    /// Clear the session and every state field. `session_key` rebinds the
    /// agent to another session first.
    pub fn restart_session(&mut self, session_key: Option<&str>) -> &'static str {
        if let Some(key) = session_key {
            self.agent.set_session_key(key);
        }
        self.agent.history(None).clear();
        self.state = VocabularyState::default();
        self.conversation_start = 0;
        tracing::info!(session = self.agent.session_key(), "vocabulary session reset");
        RESTARTED
    }

    pub fn restart(&mut self) -> &'static str {
        self.restart_session(None)
    }

    /// Tick (` ✓`) each word line in `display` whose word the learner used.
    /// Lines already ticked are left alone.
    pub fn mark_used_words(&self, display: &str, user_message: &str) -> String {
        let message = user_message.to_lowercase();
        display
            .split('\n')
            .map(|line| {
                let trimmed = line.trim();
                let word = word_token(trimmed).unwrap_or(trimmed);
                let is_current = !word.is_empty()
                    && self.state.current_words.iter().any(|w| w == word);
                if is_current && message.contains(&word.to_lowercase()) && !trimmed.contains('✓') {
                    format!("{} ✓", line)
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Chat for VocabularyAgent {
    fn agent(&self) -> &Agent {
        &self.agent
    }

    async fn send(&self, input: &str) -> Result<String> {
        if !self.state.words_generated {
            return Ok(WORDS_REQUIRED.to_string());
        }
        self.agent.send(input, None).await
    }

    fn stream(&self, inputs: Vec<String>) -> AgentStream {
        if !self.state.words_generated {
            return AgentStream::ready(WORDS_REQUIRED);
        }
        self.agent.stream(inputs, None)
    }
}

/// Word usage result of one situation chat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    /// Percentage of words used, 0 to 100
    pub score: f64,
    pub used_words: Vec<String>,
    pub unused_words: Vec<String>,
}

impl Scorecard {
    /// Case-insensitive substring match of each word against the messages
    pub fn compute<S: AsRef<str>>(words: &[String], messages: &[S]) -> Self {
        let text = messages
            .iter()
            .map(|m| m.as_ref())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let (used_words, unused_words): (Vec<String>, Vec<String>) = words
            .iter()
            .cloned()
            .partition(|w| text.contains(&w.to_lowercase()));

        let score = if words.is_empty() {
            0.0
        } else {
            used_words.len() as f64 / words.len() as f64 * 100.0
        };

        Self {
            score,
            used_words,
            unused_words,
        }
    }
}

impl fmt::Display for Scorecard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### Conversation score 对话评分：{:.1}\n", self.score)?;
        writeln!(
            f,
            "✅ Words you used 你使用了以下单词：{}\n",
            self.used_words.join(", ")
        )?;
        if !self.unused_words.is_empty() {
            writeln!(
                f,
                "❌ Words not used yet 你还没有使用这些单词：{}\n",
                self.unused_words.join(", ")
            )?;
        }
        write!(
            f,
            "💡 Tip: try the missing words in your next replies, or restart the practice! \
             建议：尝试在后续对话中使用未掌握的单词，或者重新开始对话练习！"
        )
    }
}

/// First field of a `word - phonetic - ...` line
fn word_token(line: &str) -> Option<&str> {
    if !line.contains(FIELD_DELIMITER) {
        return None;
    }
    line.split(FIELD_DELIMITER)
        .next()
        .map(str::trim)
        .filter(|w| !w.is_empty())
}

/// Words from a generation reply, in order; malformed lines are skipped.
pub fn parse_word_list(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(word_token)
        .map(str::to_string)
        .collect()
}

fn vocabulary_prompt(count: usize) -> String {
    format!(
        "Please generate {count} common English words. For each word give:\n\
         1. spelling\n\
         2. phonetic transcription\n\
         3. part of speech\n\
         4. Chinese meaning\n\
         5. an English example sentence\n\
         6. the Chinese translation of the example\n\n\
         Use exactly this format, one word per line:\n\
         [word1] - [phonetic] - part of speech - meaning - example: sentence - translation\n\
         [word2] - [phonetic] - part of speech - meaning - example: sentence - translation\n\
         ..."
    )
}

fn situation_prompt(words: &[String]) -> String {
    format!(
        "Let's practise a situational dialogue. Design an everyday scene, such as ordering at a \
         restaurant or shopping in a store, that naturally uses these words: {}.\n\n\
         First describe the scene, then open the dialogue with the first line.",
        words.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiro_llm::{ScriptedProvider, SystemPrompt};

    const FIVE_WORDS: &str = "apple - /ˈæpl/ - n. - 苹果 - example: I eat an apple. - 我吃一个苹果。\n\
        river - /ˈrɪvə/ - n. - 河流 - example: The river is wide. - 河很宽。\n\
        borrow - /ˈbɒrəʊ/ - v. - 借 - example: Can I borrow a pen? - 我能借支笔吗？\n\
        quiet - /ˈkwaɪət/ - adj. - 安静的 - example: Be quiet. - 安静。\n\
        early - /ˈɜːli/ - adv. - 早 - example: I get up early. - 我起得早。\n";

    fn vocab_agent(provider: Arc<ScriptedProvider>, store: &HistoryStore) -> VocabularyAgent {
        VocabularyAgent::new(Agent::new(
            VocabularyAgent::NAME,
            SystemPrompt::new("You teach vocabulary."),
            provider,
            store.clone(),
        ))
    }

    #[test]
    fn test_parse_word_list() {
        let reply = "Here are your words:\n\napple - /ˈæpl/ - n.\n  river - /ˈrɪvə/ - n.  \n - orphan field\nno delimiter here";
        assert_eq!(parse_word_list(reply), vec!["apple", "river"]);
        assert_eq!(parse_word_list(FIVE_WORDS).len(), 5);
        assert!(parse_word_list("nothing useful\n\n").is_empty());
    }

    #[tokio::test]
    async fn test_generate_five_words() {
        let provider = Arc::new(ScriptedProvider::replies([FIVE_WORDS]));
        let store = HistoryStore::new();
        let mut agent = vocab_agent(provider.clone(), &store);

        let reply = agent.generate_vocabulary(Some(5)).await.unwrap();
        assert_eq!(reply, FIVE_WORDS);
        assert_eq!(agent.current_words().len(), 5);
        assert!(agent.state().words_generated);
        assert_eq!(agent.phase(), VocabularyPhase::WordsReady);
        assert!(provider.last_request().unwrap().last_user_content().unwrap().contains("generate 5 common"));
    }

    #[tokio::test]
    async fn test_generate_unparseable_reply() {
        let provider = Arc::new(ScriptedProvider::replies(["Sorry, I cannot help with that."]));
        let store = HistoryStore::new();
        let mut agent = vocab_agent(provider, &store);

        agent.generate_vocabulary(None).await.unwrap();
        assert!(!agent.state().words_generated);
        assert!(agent.current_words().is_empty());
        assert_eq!(agent.phase(), VocabularyPhase::NoWords);
    }

    #[tokio::test]
    async fn test_chat_refused_without_words() {
        let provider = Arc::new(ScriptedProvider::echo());
        let store = HistoryStore::new();
        let mut agent = vocab_agent(provider.clone(), &store);

        assert_eq!(agent.start_situation_chat().await.unwrap(), WORDS_REQUIRED);
        assert_eq!(Chat::send(&agent, "hello").await.unwrap(), WORDS_REQUIRED);
        assert_eq!(
            Chat::stream_collect(&agent, vec!["hello".into()]).await.unwrap(),
            WORDS_REQUIRED
        );

        assert_eq!(provider.calls(), 0);
        assert_eq!(agent.state(), &VocabularyState::default());
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_scores_learner_messages() {
        let words = "apple - /ˈæpl/ - n. - 苹果\nriver - /ˈrɪvə/ - n. - 河流\n";
        let provider = Arc::new(ScriptedProvider::replies([
            words,
            "Scene: a picnic by the water. Tiro: What did you eat?",
            "Sounds tasty!",
        ]));
        let store = HistoryStore::new();
        let mut agent = vocab_agent(provider, &store);

        agent.generate_vocabulary(Some(2)).await.unwrap();
        agent.start_situation_chat().await.unwrap();
        assert_eq!(agent.phase(), VocabularyPhase::InConversation);
        Chat::send(&agent, "I ate an apple").await.unwrap();

        let scorecard = agent.evaluate_conversation().unwrap();
        assert_eq!(scorecard.score, 50.0);
        assert_eq!(scorecard.used_words, vec!["apple"]);
        assert_eq!(scorecard.unused_words, vec!["river"]);
        assert!(!agent.state().in_conversation);
        assert_eq!(agent.phase(), VocabularyPhase::WordsReady);

        assert!(agent.evaluate_conversation().is_none());
    }

    #[test]
    fn test_scorecard_compute_and_render() {
        let words = vec!["Apple".to_string(), "river".to_string()];
        let card = Scorecard::compute(&words, &["I ate an APPLE", "by the River"]);
        assert_eq!(card.score, 100.0);
        assert!(card.unused_words.is_empty());

        let rendered = card.to_string();
        assert!(rendered.starts_with("### Conversation score 对话评分：100.0"));
        assert!(!rendered.contains('❌'));

        let empty = Scorecard::compute::<&str>(&[], &[]);
        assert_eq!(empty.score, 0.0);

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["score"], 100.0);
        assert_eq!(json["used_words"][1], "river");
    }

    #[tokio::test]
    async fn test_restart_resets_everything() {
        let provider = Arc::new(ScriptedProvider::replies([FIVE_WORDS, "scene"]));
        let store = HistoryStore::new();
        let mut agent = vocab_agent(provider, &store);

        agent.generate_vocabulary(Some(7)).await.unwrap();
        agent.start_situation_chat().await.unwrap();
        assert_eq!(agent.history().len(), 4);

        assert_eq!(agent.restart(), RESTARTED);
        assert_eq!(agent.state(), &VocabularyState::default());
        assert_eq!(agent.state().word_count, 5);
        assert!(agent.history().is_empty());

        // Idempotent
        agent.restart();
        assert_eq!(agent.phase(), VocabularyPhase::NoWords);
    }

    #[tokio::test]
    async fn test_restart_with_new_session_key() {
        let provider = Arc::new(ScriptedProvider::replies([FIVE_WORDS]));
        let store = HistoryStore::new();
        let mut agent = vocab_agent(provider, &store);
        agent.generate_vocabulary(None).await.unwrap();

        agent.restart_session(Some("learner-7"));
        assert_eq!(agent.agent().session_key(), "learner-7");
        assert_eq!(store.get_history(VocabularyAgent::NAME).len(), 2);
        assert!(agent.history().is_empty());
    }

    #[test]
    fn test_set_word_count_rejects_zero() {
        let store = HistoryStore::new();
        let mut agent = vocab_agent(Arc::new(ScriptedProvider::echo()), &store);
        assert!(agent.set_word_count(0).is_err());
        agent.set_word_count(8).unwrap();
        assert_eq!(agent.state().word_count, 8);
    }

    #[tokio::test]
    async fn test_mark_used_words() {
        let provider = Arc::new(ScriptedProvider::replies([FIVE_WORDS]));
        let store = HistoryStore::new();
        let mut agent = vocab_agent(provider, &store);
        agent.generate_vocabulary(None).await.unwrap();

        let display = "apple - /ˈæpl/ - n.\nriver - /ˈrɪvə/ - n.\n";
        let marked = agent.mark_used_words(display, "The River was quiet");
        assert_eq!(marked, "apple - /ˈæpl/ - n.\nriver - /ˈrɪvə/ - n. ✓\n");

        let again = agent.mark_used_words(&marked, "river again");
        assert_eq!(again, marked);
    }
}
