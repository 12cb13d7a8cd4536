//! Scenario role-play: the conversation agent and the context that gates it
//!
//! A [`ConversationCoach`] owns the context explicitly; nothing here is
//! process-global.

use crate::agent::{Agent, AgentConfig, Chat};
use std::sync::Arc;
use tiro_llm::{Error, HistoryStore, LlmProvider, PromptLibrary, Result};

pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Reply to a conversation turn sent before the scene is set
pub const SCENE_REQUIRED: &str =
    "Please set both <specific scenario> and <specific process> before starting the conversation.";

/// Reply to `set_scenario` with a blank field
pub const SCENE_INCOMPLETE: &str =
    "❗ Please fill in both the scenario and the process. 请填写完整的场景和过程信息。";

pub const SCENE_RESET: &str = "🔄 Scenario reset, please set a new one. 场景已重置，请重新设定。";

/// Appended to the reply that reaches the round limit
pub const SESSION_FEEDBACK: &str = "\n\n✅ **Feedback:**\n\
    **English**: Great job reaching the end of the conversation session.\n\
    **中文**: 太棒了，你完成了本轮对话训练！继续加油！";

pub struct ConversationAgent {
    agent: Agent,
}

impl ConversationAgent {
    pub const NAME: &'static str = "conversation";

    pub fn new(agent: Agent) -> Self {
        Self { agent }
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
}

impl Chat for ConversationAgent {
    fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    pub scenario: Option<String>,
    pub process: Option<String>,
    pub rounds: usize,
    pub max_rounds: usize,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            scenario: None,
            process: None,
            rounds: 0,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl ConversationContext {
    pub fn new(max_rounds: usize) -> Result<Self> {
        let mut ctx = Self::default();
        ctx.set_max_rounds(max_rounds)?;
        Ok(ctx)
    }

    /// Both scenario and process are set
    pub fn is_ready(&self) -> bool {
        self.scenario.is_some() && self.process.is_some()
    }

    /// Clears everything but `max_rounds`
    pub fn reset(&mut self) {
        self.scenario = None;
        self.process = None;
        self.rounds = 0;
    }

    pub fn set_max_rounds(&mut self, max_rounds: usize) -> Result<()> {
        if max_rounds == 0 {
            return Err(Error::invalid_argument("max rounds must be positive")
                .with_operation("conversation::set_max_rounds"));
        }
        self.max_rounds = max_rounds;
        Ok(())
    }

    pub fn limit_reached(&self) -> bool {
        self.rounds >= self.max_rounds
    }
}

/// Drives scenario role-play with a [`ConversationAgent`].
pub struct ConversationCoach {
    agent: ConversationAgent,
    context: ConversationContext,
}

impl ConversationCoach {
    pub fn new(agent: ConversationAgent) -> Self {
        Self::with_context(agent, ConversationContext::default())
    }

    pub fn with_context(agent: ConversationAgent, context: ConversationContext) -> Self {
        Self { agent, context }
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn agent(&self) -> &ConversationAgent {
        &self.agent
    }

    /// Set the scene and return the agent's bilingual overview and opening
    /// line, trimmed.
    ///
    /// A blank scenario or process returns [`SCENE_INCOMPLETE`] and leaves
    /// the context as it was.
    pub async fn set_scenario(
        &mut self,
        scenario: &str,
        process: &str,
        max_rounds: Option<usize>,
    ) -> Result<String> {
        let (scenario, process) = (scenario.trim(), process.trim());
        if scenario.is_empty() || process.is_empty() {
            tracing::warn!("scenario or process missing");
            return Ok(SCENE_INCOMPLETE.to_string());
        }
        if let Some(max_rounds) = max_rounds {
            self.context.set_max_rounds(max_rounds)?;
        }

        self.context.scenario = Some(scenario.to_string());
        self.context.process = Some(process.to_string());
        self.context.rounds = 0;
        tracing::info!(scenario, process, max_rounds = self.context.max_rounds, "scenario set");

        let intro = format!(
            "The user has selected the following practice setting:\n\
             Scenario: {scenario}\n\
             Process: {process}\n\
             Please provide a brief bilingual (English and Chinese) overview of this role-play \
             scene, then begin the first sentence of the conversation as Tiro."
        );
        let overview = self.agent.stream_collect(vec![intro]).await?;
        tracing::debug!(chars = overview.len(), "scene overview received");
        Ok(overview.trim().to_string())
    }

    pub fn reset_scenario(&mut self) -> &'static str {
        self.context.reset();
        tracing::info!("scenario reset");
        SCENE_RESET
    }

    /// One learner turn.
    ///
    /// Refused with [`SCENE_REQUIRED`] until the scene is set. Each answered
    /// turn counts one round, and the reply that reaches the limit carries
    /// [`SESSION_FEEDBACK`]. A failed backend call does not count.
    pub async fn handle_conversation(&mut self, input: &str) -> Result<String> {
        if !self.context.is_ready() {
            return Ok(SCENE_REQUIRED.to_string());
        }

        let mut reply = self.agent.send(input).await?;
        self.context.rounds += 1;
        tracing::info!(
            round = self.context.rounds,
            max_rounds = self.context.max_rounds,
            "conversation turn"
        );

        if self.context.limit_reached() {
            reply.push_str(SESSION_FEEDBACK);
        }
        Ok(reply)
    }
}
