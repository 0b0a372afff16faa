pub mod schema;

#[allow(unused_imports)]
pub use schema::{Config, EvaluationsConfig, GenerationConfig, SessionsConfig, TelegramConfig};
