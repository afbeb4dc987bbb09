pub mod advisor;
pub mod llm_factory;
pub mod llm_provider;
pub mod openai_provider;

pub use advisor::{AiAssessment, MigrationAdvisor};
pub use llm_factory::LLMProviderFactory;
pub use llm_provider::*;
pub use openai_provider::{OpenAIChatConfig, OpenAIChatProvider};
