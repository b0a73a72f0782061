//! Parley runtime: the generation engine that sits behind the chat front end.
//!
//! The engine owns the tokenizer and the token model, serves one request at a
//! time, and reports text, stop cause and exact token counts back to callers.

pub mod engine;
pub mod model;
pub mod scripted;
pub mod tokenizer;

pub use engine::{CancelHandle, Engine, EngineClient, EngineRequest, PendingGeneration};
pub use model::TokenModel;
pub use scripted::ScriptedModel;
pub use tokenizer::ModelTokenizer;
