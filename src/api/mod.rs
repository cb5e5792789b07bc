pub mod elevenlabs;
pub mod gemini;
pub mod pexels;

use crate::scene::Script;
use async_trait::async_trait;
use std::path::Path;

pub use gemini::{GeminiClient, ScriptError};
pub use pexels::{FetchError, FetchOutcome, PexelsClient};

/// Turns a topic into a validated script.
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write_script(&self, topic: &str, duration_secs: u32) -> Result<Script, ScriptError>;
}

/// Downloads one stock clip for a search term.
#[async_trait]
pub trait FootageSource: Send + Sync {
    async fn fetch(&self, keyword: &str, dest: &Path) -> Result<FetchOutcome, FetchError>;
}
