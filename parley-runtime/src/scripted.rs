use parley_core::Result;

use crate::model::TokenModel;
use crate::tokenizer::ModelTokenizer;

/// Replays a fixed reply, then emits end-of-sequence forever.
///
/// Used for loopback serving and tests where no real weights are available.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    reply: Vec<u32>,
    eos_token_id: u32,
}

impl ScriptedModel {
    pub fn new(reply: Vec<u32>, eos_token_id: u32) -> Self {
        Self {
            reply,
            eos_token_id,
        }
    }

    /// Script the model to answer `text`, tokenized with the serving tokenizer.
    pub fn from_text(tokenizer: &ModelTokenizer, text: &str) -> Result<Self> {
        let reply = tokenizer.encode(text)?;
        Ok(Self::new(reply, tokenizer.eos_token_id()))
    }
}

impl TokenModel for ScriptedModel {
    fn next_token(&mut self, _prompt_tokens: &[u32], generated: &[u32]) -> Result<u32> {
        Ok(self
            .reply
            .get(generated.len())
            .copied()
            .unwrap_or(self.eos_token_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_then_ends() {
        let mut model = ScriptedModel::new(vec![7, 8], 0);
        let prompt = [1, 2, 3];
        assert_eq!(model.next_token(&prompt, &[]).unwrap(), 7);
        assert_eq!(model.next_token(&prompt, &[7]).unwrap(), 8);
        assert_eq!(model.next_token(&prompt, &[7, 8]).unwrap(), 0);
        assert_eq!(model.next_token(&prompt, &[7, 8, 9]).unwrap(), 0);
    }
}
