//! Writing and reflection agents
//!
//! Thin wrappers over [`Agent`] under the fixed session keys `writing` and
//! `reflection`. The writer drafts and rewrites essays; the reflector
//! critiques them.

use crate::agent::{Agent, AgentConfig, Chat};
use std::sync::Arc;
use tiro_llm::{HistoryStore, LlmProvider, PromptLibrary, Result};

pub struct WritingAgent {
    agent: Agent,
}

impl WritingAgent {
    pub const NAME: &'static str = "writing";

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

    /// Writing advice or a draft for `input`, in the writing session
    pub async fn generate_response(&self, input: &str) -> Result<String> {
        self.send(input).await
    }
}

impl Chat for WritingAgent {
    fn agent(&self) -> &Agent {
        &self.agent
    }
}

pub struct ReflectionAgent {
    agent: Agent,
}

impl ReflectionAgent {
    pub const NAME: &'static str = "reflection";

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

    /// Review an article and return the critique
    pub async fn provide_feedback(&self, article: &str) -> Result<String> {
        self.send(article).await
    }
}

impl Chat for ReflectionAgent {
    fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiro_llm::ScriptedProvider;

    fn write_prompts(dir: &std::path::Path) {
        std::fs::write(dir.join("writing_prompt.txt"), "You are a writing coach.").unwrap();
        std::fs::write(dir.join("reflection_prompt.txt"), "You are a strict reviewer.").unwrap();
    }

    #[tokio::test]
    async fn test_fixed_session_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path());
        let library = PromptLibrary::new(dir.path());
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::echo());
        let store = HistoryStore::new();

        let writer =
            WritingAgent::load(&library, provider.clone(), store.clone(), AgentConfig::default())
                .unwrap();
        let reflector =
            ReflectionAgent::load(&library, provider, store.clone(), AgentConfig::default())
                .unwrap();

        assert_eq!(writer.generate_response("topic?").await.unwrap(), "echo: topic?");
        assert_eq!(reflector.provide_feedback("my essay").await.unwrap(), "echo: my essay");

        assert_eq!(store.get_history("writing").user_messages(), vec!["topic?"]);
        assert_eq!(store.get_history("reflection").user_messages(), vec!["my essay"]);
        assert_eq!(reflector.agent().prompt().as_str(), "You are a strict reviewer.");
    }
}
