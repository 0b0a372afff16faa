//! Generation collaborator contract.

use anyhow::Result;
use async_trait::async_trait;

use crate::sessions::Turn;

/// Produces the assistant reply for an ordered turn history.
///
/// Implementations may fail; callers are expected to recover (fallback
/// path, fixed apology) rather than surface the error to the user.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, turns: &[Turn]) -> Result<String>;
    fn name(&self) -> &str;
}
