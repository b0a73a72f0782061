//! Chat template rendering.
//!
//! A [`TemplateProfile`] is declarative JSON describing one model family: its
//! special tokens and either a marker grammar or a Jinja chat template. Loading
//! a profile into a [`TemplateContext`] resolves every token reference up
//! front, so rendering a request never consults the registry and cannot fail
//! on a missing token.

use minijinja::{Environment, ErrorKind};
use serde::Deserialize;
use tracing::debug;

use parley_core::{ChatRequest, Message, ParleyError, PromptInput, RenderedPrompt, Result, Role};

use crate::special_tokens::{SpecialTokens, BOS, EOS};

const CHATML_PROFILE: &str = include_str!("../profiles/chatml.json");
const LLAMA3_PROFILE: &str = include_str!("../profiles/llama3.json");
const ZEPHYR_PROFILE: &str = include_str!("../profiles/zephyr.json");

pub const BUILTIN_PROFILES: &[&str] = &["chatml", "llama3", "zephyr"];

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateProfile {
    pub name: String,
    pub special_tokens: SpecialTokens,
    /// Inserted between the begin-of-sequence literal and the rest of the prompt.
    #[serde(default = "default_bos_separator")]
    pub bos_separator: String,
    pub grammar: GrammarSpec,
}

fn default_bos_separator() -> String {
    " ".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GrammarSpec {
    /// `role_open` role `role_tag_end` content `role_close`, per message.
    Markers {
        role_open: Vec<Segment>,
        role_tag_end: Vec<Segment>,
        role_close: Vec<Segment>,
    },
    /// Hugging Face style Jinja chat template.
    Jinja { template: String },
}

/// One piece of a marker: a registry token or literal text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Token { token: String },
    Text { text: String },
}

impl TemplateProfile {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ParleyError::InvalidTemplate(e.to_string()))
    }

    pub fn builtin(name: &str) -> Result<Self> {
        let json = match name {
            "chatml" => CHATML_PROFILE,
            "llama3" => LLAMA3_PROFILE,
            "zephyr" => ZEPHYR_PROFILE,
            other => {
                return Err(ParleyError::InvalidTemplate(format!(
                    "unknown built-in profile '{other}' (available: {})",
                    BUILTIN_PROFILES.join(", ")
                )))
            }
        };
        Self::from_json(json)
    }

    /// Replace the grammar with a Jinja template, keeping tokens and separator.
    pub fn with_jinja(mut self, template: impl Into<String>) -> Self {
        self.grammar = GrammarSpec::Jinja {
            template: template.into(),
        };
        self
    }
}

struct Markers {
    role_open: String,
    role_tag_end: String,
    role_close: String,
}

enum Grammar {
    Markers(Markers),
    Jinja(Environment<'static>),
}

/// Resolved, read-only rendering rules for the served model.
pub struct TemplateContext {
    name: String,
    tokens: SpecialTokens,
    bos: String,
    bos_separator: String,
    grammar: Grammar,
}

impl TemplateContext {
    /// Resolve a profile. Fails with `UnknownTokenKind` if the grammar names a
    /// token the profile does not define, or if `bos` is missing.
    pub fn load(profile: TemplateProfile) -> Result<Self> {
        let tokens = profile.special_tokens;
        let bos = tokens.resolve(BOS)?.to_string();

        let grammar = match profile.grammar {
            GrammarSpec::Markers {
                role_open,
                role_tag_end,
                role_close,
            } => Grammar::Markers(Markers {
                role_open: resolve_marker(&tokens, &role_open)?,
                role_tag_end: resolve_marker(&tokens, &role_tag_end)?,
                role_close: resolve_marker(&tokens, &role_close)?,
            }),
            GrammarSpec::Jinja { template } => {
                let mut env = Environment::new();
                env.add_function("raise_exception", raise_exception);
                env.add_template_owned("chat", template)
                    .map_err(|e| ParleyError::InvalidTemplate(format!("parse error: {e}")))?;
                Grammar::Jinja(env)
            }
        };

        debug!(profile = %profile.name, "template context loaded");
        Ok(Self {
            name: profile.name,
            tokens,
            bos,
            bos_separator: profile.bos_separator,
            grammar,
        })
    }

    pub fn chatml_default() -> Result<Self> {
        Self::load(TemplateProfile::builtin("chatml")?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce the exact prompt text for a request.
    pub fn render(&self, request: &ChatRequest) -> Result<RenderedPrompt> {
        let text = match &request.input {
            PromptInput::Raw(prompt) => {
                // Raw prompts always get exactly one space after BOS, whatever
                // the profile's separator.
                if request.add_special && !prompt.starts_with(&self.bos) {
                    format!("{} {prompt}", self.bos)
                } else {
                    prompt.clone()
                }
            }
            PromptInput::Messages(messages) => {
                if messages.is_empty() {
                    return Err(ParleyError::InvalidRequest(
                        "messages must not be empty".into(),
                    ));
                }
                match &self.grammar {
                    Grammar::Markers(markers) => {
                        let mut text = if request.add_special {
                            self.bos_prefix()
                        } else {
                            String::new()
                        };
                        markers.render_into(&mut text, messages);
                        text
                    }
                    Grammar::Jinja(env) => {
                        let body = self.render_jinja(env, messages, request.add_special)?;
                        if request.add_special && !body.starts_with(&self.bos) {
                            let mut text = self.bos_prefix();
                            text.push_str(&body);
                            text
                        } else {
                            body
                        }
                    }
                }
            }
        };

        Ok(RenderedPrompt {
            leading_special_token_included: text.starts_with(&self.bos),
            text,
        })
    }

    fn bos_prefix(&self) -> String {
        format!("{}{}", self.bos, self.bos_separator)
    }

    fn render_jinja(
        &self,
        env: &Environment<'static>,
        messages: &[Message],
        add_special: bool,
    ) -> Result<String> {
        let tmpl = env
            .get_template("chat")
            .map_err(|e| ParleyError::InvalidTemplate(e.to_string()))?;

        let msgs: Vec<minijinja::Value> = messages
            .iter()
            .map(|m| minijinja::context! { role => m.role.as_str(), content => m.content.as_str() })
            .collect();

        tmpl.render(minijinja::context! {
            messages => msgs,
            // Templates that emit `{{ bos_token }}` themselves must honour suppression.
            bos_token => if add_special { self.bos.as_str() } else { "" },
            eos_token => self.tokens.get(EOS).unwrap_or_default(),
            add_generation_prompt => true,
        })
        .map_err(|e| ParleyError::InvalidTemplate(e.to_string()))
    }
}

impl Markers {
    fn render_into(&self, out: &mut String, messages: &[Message]) {
        for message in messages {
            self.open_turn(out, message.role);
            out.push_str(&message.content);
            out.push_str(&self.role_close);
        }
        // Open assistant turn: the model continues from here.
        self.open_turn(out, Role::Assistant);
    }

    fn open_turn(&self, out: &mut String, role: Role) {
        out.push_str(&self.role_open);
        out.push_str(role.as_str());
        out.push_str(&self.role_tag_end);
    }
}

fn resolve_marker(tokens: &SpecialTokens, segments: &[Segment]) -> Result<String> {
    let mut marker = String::new();
    for seg in segments {
        match seg {
            Segment::Token { token } => marker.push_str(tokens.resolve(token)?),
            Segment::Text { text } => marker.push_str(text),
        }
    }
    Ok(marker)
}

/// `raise_exception(msg)` as used by Hugging Face chat templates.
fn raise_exception(msg: String) -> std::result::Result<String, minijinja::Error> {
    Err(minijinja::Error::new(ErrorKind::InvalidOperation, msg))
}

/// Free-function form of [`TemplateContext::render`].
pub fn render(request: &ChatRequest, context: &TemplateContext) -> Result<RenderedPrompt> {
    context.render(request)
}
