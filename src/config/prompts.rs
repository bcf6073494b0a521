//! Prompt templates for Shopwright.
//!
//! Every LLM call site renders one named, versioned template. Templates can be
//! overridden by placing a `prompts.toml` file in the custom prompts directory;
//! tables missing from that file keep their defaults.

use crate::error::{Result, ShopwrightError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Variables every template can use unless the config overrides them.
pub fn default_variables() -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("assistant_name".to_string(), "Jason Bent".to_string());
    vars.insert("shop_name".to_string(), "Bent's Woodworks".to_string());
    vars
}

/// The LLM call sites, each bound to one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Relevance,
    Rewrite,
    Greeting,
    Inappropriate,
    NotRelevant,
    Answer,
    NoContext,
}

impl PromptKind {
    pub const ALL: [PromptKind; 7] = [
        PromptKind::Relevance,
        PromptKind::Rewrite,
        PromptKind::Greeting,
        PromptKind::Inappropriate,
        PromptKind::NotRelevant,
        PromptKind::Answer,
        PromptKind::NoContext,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Relevance => "relevance",
            PromptKind::Rewrite => "rewrite",
            PromptKind::Greeting => "greeting",
            PromptKind::Inappropriate => "inappropriate",
            PromptKind::NotRelevant => "not_relevant",
            PromptKind::Answer => "answer",
            PromptKind::NoContext => "no_context",
        }
    }

    /// Slots the pipeline fills in for this template.
    pub fn slots(&self) -> &'static [&'static str] {
        match self {
            PromptKind::Relevance | PromptKind::Rewrite => &["history", "question"],
            PromptKind::Greeting | PromptKind::Inappropriate => &[],
            PromptKind::NotRelevant | PromptKind::NoContext => &["question"],
            PromptKind::Answer => &["context", "question"],
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single prompt template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptTemplate {
    /// Bumped whenever the wording changes; logged with every call.
    pub version: u32,
    pub system: String,
    pub user: String,
    /// Sampling temperature. None leaves the model default.
    pub temperature: Option<f32>,
    /// Text emitted to the client verbatim before the generated tokens.
    pub preamble: Option<String>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            version: 1,
            system: String::new(),
            user: String::new(),
            temperature: None,
            preamble: None,
        }
    }
}

impl PromptTemplate {
    fn new(system: &str, user: &str) -> Self {
        Self {
            system: system.to_string(),
            user: user.to_string(),
            ..Self::default()
        }
    }

    /// All `{{slot}}` names referenced by this template.
    pub fn slots(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let parts = [Some(&self.system), Some(&self.user), self.preamble.as_ref()];
        for part in parts.into_iter().flatten() {
            for caps in slot_regex().captures_iter(part) {
                let name = caps[1].to_string();
                if !found.contains(&name) {
                    found.push(name);
                }
            }
        }
        found
    }
}

fn slot_regex() -> &'static Regex {
    static SLOT: OnceLock<Regex> = OnceLock::new();
    SLOT.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("slot pattern is valid"))
}

/// A template with every slot filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    pub preamble: Option<String>,
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub relevance: PromptTemplate,
    pub rewrite: PromptTemplate,
    pub greeting: PromptTemplate,
    pub inappropriate: PromptTemplate,
    pub not_relevant: PromptTemplate,
    pub answer: PromptTemplate,
    pub no_context: PromptTemplate,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            relevance: PromptTemplate::new(
                "You are a chat relevance checker.",
                r#"Given this question and chat history, determine if it is:
1. A greeting/send-off (GREETING)
2. Related to woodworking/tools/company (RELEVANT)
3. Inappropriate content (INAPPROPRIATE)
4. Unrelated (NOT_RELEVANT)
Chat History: {{history}}
Current Question: {{question}}
Response (GREETING, RELEVANT, INAPPROPRIATE, or NOT_RELEVANT):"#,
            ),

            rewrite: PromptTemplate::new(
                r#"You are {{shop_name}}'s assistant, so questions will be related to the wood shop.
Rewrite user queries to make them more specific and searchable, taking into account
the chat history if provided. Only return the rewritten query without any explanations."#,
                r#"Original query: {{question}}
Chat history: {{history}}
Rewritten query:"#,
            ),

            greeting: PromptTemplate::new(
                "You are {{assistant_name}}'s woodworking AI assistant.",
                "Generate a friendly greeting as {{assistant_name}}'s woodworking AI assistant.",
            ),

            inappropriate: PromptTemplate {
                temperature: Some(0.0),
                ..PromptTemplate::new(
                    "You are {{assistant_name}}'s woodworking AI assistant.",
                    r#"Please respond with the following message: "I apologize, but I cannot assist with inappropriate content or queries that could cause harm. I'm here to help with woodworking and furniture making questions only.""#,
                )
            },

            not_relevant: PromptTemplate::new(
                "You are {{assistant_name}}'s woodworking AI assistant.",
                r#"The following question is not directly related to woodworking or the assistant's expertise. Provide a direct response that:
1. Politely acknowledges the question
2. Explains that you are specialized in woodworking and {{assistant_name}}'s content
3. Asks them to rephrase their question to relate to woodworking topics
Question: {{question}}"#,
            ),

            answer: PromptTemplate::new(
                r#"You are an AI assistant representing {{assistant_name}}'s woodworking expertise. Your role is to:
1. Analyze woodworking documents and provide clear, natural responses that sound like {{assistant_name}} is explaining the concepts.
2. Convert technical content into conversational, easy-to-understand explanations.
3. Focus on explaining the core concepts and techniques rather than quoting directly from transcripts.
4. Always maintain a friendly, professional tone as if {{assistant_name}} is speaking directly to the user.
5. Organize multi-part responses clearly with natural transitions.
6. Keep responses concise and focused on the specific question asked.
7. If information isn't available in the provided context, clearly state that.
8. Always respond in English, regardless of the input language.
9. Avoid phrases like "in the video" or "the transcript shows"; speak directly about the techniques and concepts.
10. If the context includes a Timestamp Guide, you may link a moment using the exact [MM:SS](url) links it lists.
11. At the end of your answer, include the Related Products section with hyperlinks EXACTLY as provided.

Response Structure and Formatting:
   - Use markdown formatting with clear hierarchical structure
   - Format section headers as: ### **Title Here**
   - Use bullet points (-) for detailed explanations under each section
   - Each bullet point must contain 2-3 sentences minimum with examples
   - Add blank lines between major sections only
   - Do NOT use bold formatting (**) or line breaks within bullet point content
   - Bold formatting should ONLY be used in section headers
   - Keep all content within a bullet point on the same line
   - Any asterisks (*) in the content should be treated as literal characters, not formatting
   - Include the "Related Products" section at the end EXACTLY as provided

Remember:
- You are speaking as {{assistant_name}}'s AI assistant. When mentioning {{assistant_name}}, use the name instead of "I", as in "{{assistant_name}} suggests that you..."
- Keep responses clear, practical, and focused on woodworking expertise
- Do not mention videos or explain the product links; simply include them as provided at the end of your response"#,
                r#"{{context}}

Use the above information to answer the following question:
{{question}}"#,
            ),

            no_context: PromptTemplate {
                preamble: Some(
                    "I couldn't find specific references in {{assistant_name}}'s videos for this one, \
                     so this answer is based on general woodworking knowledge.\n\n"
                        .to_string(),
                ),
                ..PromptTemplate::new(
                    r#"You are {{assistant_name}}'s woodworking AI assistant. No reference material is available for this question.
Answer from general woodworking knowledge in a friendly, practical tone.
Do not cite videos, timestamps, or products, and do not invent sources.
The reader has already been told that specific references are unavailable, so do not repeat that."#,
                    "Question: {{question}}",
                )
            },

            variables: default_variables(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let prompts_path = custom_path.join("prompts.toml");
            if prompts_path.exists() {
                let content = std::fs::read_to_string(&prompts_path)?;
                prompts = toml::from_str(&content)?;
                prompts.variables = default_variables();
            }
        }

        if let Some(vars) = custom_variables {
            for (key, value) in vars {
                prompts.variables.insert(key.clone(), value.clone());
            }
        }

        prompts.validate()?;
        Ok(prompts)
    }

    /// Get the template for a call site.
    pub fn template(&self, kind: PromptKind) -> &PromptTemplate {
        match kind {
            PromptKind::Relevance => &self.relevance,
            PromptKind::Rewrite => &self.rewrite,
            PromptKind::Greeting => &self.greeting,
            PromptKind::Inappropriate => &self.inappropriate,
            PromptKind::NotRelevant => &self.not_relevant,
            PromptKind::Answer => &self.answer,
            PromptKind::NoContext => &self.no_context,
        }
    }

    /// Reject templates that reference slots nothing will fill.
    pub fn validate(&self) -> Result<()> {
        for kind in PromptKind::ALL {
            let template = self.template(kind);
            for slot in template.slots() {
                if !kind.slots().contains(&slot.as_str()) && !self.variables.contains_key(&slot) {
                    return Err(ShopwrightError::Prompt(format!(
                        "template '{}' (v{}) uses unknown slot '{{{{{}}}}}'",
                        kind, template.version, slot
                    )));
                }
            }
        }
        Ok(())
    }

    /// Render a prompt template with the given variables.
    ///
    /// Slots are filled in one pass, so substituted values are never
    /// expanded again. Unknown slots are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        slot_regex()
            .replace_all(template, |caps: &regex::Captures<'_>| {
                vars.get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Render every part of the template for `kind`.
    pub fn render_template(&self, kind: PromptKind, vars: &HashMap<String, String>) -> RenderedPrompt {
        let template = self.template(kind);
        RenderedPrompt {
            system: self.render_with_custom(&template.system, vars),
            user: self.render_with_custom(&template.user, vars),
            temperature: template.temperature,
            preamble: template
                .preamble
                .as_ref()
                .map(|p| self.render_with_custom(p, vars)),
        }
    }
}
