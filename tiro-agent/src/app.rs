//! Application wiring: one explicitly built value owning every agent and
//! the shared history store.

use crate::agent::AgentConfig;
use crate::conversation::{ConversationAgent, ConversationCoach, ConversationContext, DEFAULT_MAX_ROUNDS};
use crate::vocab::VocabularyAgent;
use crate::workshop::WritingWorkshop;
use crate::writing::{ReflectionAgent, WritingAgent};
use std::path::PathBuf;
use std::sync::Arc;
use tiro_llm::{create_provider, HistoryStore, LlmProvider, PromptLibrary, ProviderConfig, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    /// Directory holding `<agent>_prompt.txt` files
    pub prompts_dir: PathBuf,
    pub max_conversation_rounds: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            agent: AgentConfig::default(),
            prompts_dir: PathBuf::from("prompts"),
            max_conversation_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

pub struct TiroApp {
    pub store: HistoryStore,
    pub vocabulary: VocabularyAgent,
    pub coach: ConversationCoach,
    pub workshop: WritingWorkshop,
}

impl TiroApp {
    /// Build the backend from `config.provider`, then every agent
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = create_provider(config.provider.clone())?;
        Self::with_provider(config, provider)
    }

    /// Build every agent over an existing backend. Fails if any prompt
    /// file is missing.
    pub fn with_provider(config: &AppConfig, provider: Arc<dyn LlmProvider>) -> Result<Self> {
        let library = PromptLibrary::new(&config.prompts_dir);
        let store = HistoryStore::new();
        let load_config = || config.agent.clone();

        let vocabulary =
            VocabularyAgent::load(&library, provider.clone(), store.clone(), load_config())?;
        let conversation =
            ConversationAgent::load(&library, provider.clone(), store.clone(), load_config())?;
        let writer = WritingAgent::load(&library, provider.clone(), store.clone(), load_config())?;
        let reflector = ReflectionAgent::load(&library, provider.clone(), store.clone(), load_config())?;

        let context = ConversationContext::new(config.max_conversation_rounds)?;
        tracing::info!(
            provider = provider.name(),
            model = config.agent.model.as_deref().unwrap_or(provider.default_model()),
            prompts = %library.dir().display(),
            "tiro ready"
        );

        Ok(Self {
            store,
            vocabulary,
            coach: ConversationCoach::with_context(conversation, context),
            workshop: WritingWorkshop::new(writer, reflector),
        })
    }
}
