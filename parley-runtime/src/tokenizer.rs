use std::path::Path;
use std::str::FromStr;

use parley_core::{token_literal, ParleyError, Result};
use tokenizers::Tokenizer as HfTokenizer;

/// Model tokenizer used for prompt accounting and decoding completions.
pub struct ModelTokenizer {
    inner: HfTokenizer,
    eos_token_id: u32,
}

impl ModelTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner =
            HfTokenizer::from_file(path).map_err(|e| ParleyError::Tokenizer(e.to_string()))?;

        let from_config = path
            .parent()
            .and_then(|dir| read_config(&dir.join("tokenizer_config.json")))
            .and_then(|config| config_eos(&config, &inner));

        let eos_token_id = from_config.unwrap_or_else(|| fallback_eos(&inner));
        Ok(Self {
            inner,
            eos_token_id,
        })
    }

    /// Build from an in-memory `tokenizer.json` document.
    pub fn from_json(json: &str) -> Result<Self> {
        let inner =
            HfTokenizer::from_str(json).map_err(|e| ParleyError::Tokenizer(e.to_string()))?;
        let eos_token_id = fallback_eos(&inner);
        Ok(Self {
            inner,
            eos_token_id,
        })
    }

    pub fn with_eos_token_id(mut self, eos_token_id: u32) -> Self {
        self.eos_token_id = eos_token_id;
        self
    }

    /// Encode text verbatim. Special-token literals already present in the
    /// text are recognised; nothing is added around it.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ParleyError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| ParleyError::Tokenizer(e.to_string()))
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }
}

fn read_config(path: &Path) -> Option<serde_json::Value> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// eos from tokenizer_config.json: an explicit `eos_token_id`, else the id
/// of the `eos_token` literal.
fn config_eos(config: &serde_json::Value, inner: &HfTokenizer) -> Option<u32> {
    if let Some(id) = config.get("eos_token_id").and_then(|v| v.as_u64()) {
        return u32::try_from(id).ok();
    }
    let literal = config.get("eos_token").and_then(token_literal)?;
    inner.token_to_id(&literal)
}

fn fallback_eos(inner: &HfTokenizer) -> u32 {
    inner
        .token_to_id("</s>")
        .or_else(|| inner.token_to_id("<|endoftext|>"))
        .or_else(|| inner.token_to_id("<|im_end|>"))
        .or_else(|| inner.token_to_id("<|eot_id|>"))
        .unwrap_or(2)
}
