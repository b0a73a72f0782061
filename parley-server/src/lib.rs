//! Parley: OpenAI-compatible chat front end for a raw text completion engine.
//!
//! Requests are rendered into the exact prompt text with a model profile's
//! chat template, generated by the runtime engine, and assembled into
//! completion responses.

pub mod api;
pub mod assembler;
pub mod chat_template;
pub mod config;
pub mod server;
pub mod special_tokens;
