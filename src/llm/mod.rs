//! Text completion against the persona's chat backend
//!
//! - **config**: endpoint, auth and timeout for the completion call
//! - **prompts**: the persona (display name, seeded greeting, optional prompt)
//! - **completion**: the `CompletionGateway` trait and its HTTP implementation
//!
//! # Usage
//!
//! ```rust,ignore
//! use franklin::llm::{CompletionConfig, CompletionGateway, HttpCompletionGateway};
//!
//! let gateway = HttpCompletionGateway::new(CompletionConfig::new("https://example.com/chat"), None)?;
//! let reply = gateway.complete("How do I save money?").await?;
//! ```

pub mod completion;
pub mod config;
pub mod prompts;

pub use completion::{parse_completion_response, CompletionGateway, HttpCompletionGateway};
pub use config::CompletionConfig;
pub use prompts::{Persona, DEFAULT_GREETING, DEFAULT_PERSONA_NAME};
