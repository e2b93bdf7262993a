//! External collaborator contracts (§6.4) — out of scope per §1, specified
//! here as traits with fixture implementations for tests and thin
//! `reqwest`-backed stubs for real use.

pub mod llm;
pub mod mail;
pub mod ner;

pub use llm::LlmProvider;
pub use mail::MailProvider;
pub use ner::NerTagger;
