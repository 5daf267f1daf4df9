//! Hybrid LLM analyzer.
//!
//! Builds a deterministic category/chain-aware prompt from a proposal and a
//! subscriber policy, tries a configured list of providers in order, parses
//! their structured output strictly (with one repair round), and degrades to
//! a deterministic fallback verdict when every provider fails.

pub mod hybrid;
pub mod openai;
pub mod parse;
pub mod prompt;
pub mod provider;

pub use hybrid::HybridAnalyzer;
pub use openai::{ChatCompletionsProvider, ProviderConfig};
pub use prompt::{build_prompt, classify, Category, Prompt};
pub use provider::{AnalysisProvider, ProviderError};
