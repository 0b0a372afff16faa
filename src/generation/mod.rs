//! Generation collaborator: trait, OpenAI-compatible backend, fallback path.

pub mod fallback;
pub mod openai;
pub mod prompt;
pub mod traits;

pub use fallback::FallbackPipeline;
pub use openai::OpenAiCompatibleGenerator;
pub use traits::Generator;
