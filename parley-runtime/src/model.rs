use parley_core::Result;

/// A model that produces one token at a time.
///
/// Implementations are not assumed to be reentrant; the engine drives a
/// single instance from a single task.
pub trait TokenModel: Send {
    /// Pick the next token given the prompt and everything generated so far.
    fn next_token(&mut self, prompt_tokens: &[u32], generated: &[u32]) -> Result<u32>;
}
