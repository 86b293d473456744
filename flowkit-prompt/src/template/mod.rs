//! A Handlebars-compatible template engine that renders to structured
//! segments.
//!
//! Rendering happens in two phases. [`TemplateEngine::render`] evaluates a
//! template into a flat list of [`Segment`]s: text runs plus structural
//! markers produced by the `role`, `media`, `history` and `section`
//! helpers. [`assemble_messages`] then folds the segments into
//! [`Message`](flowkit_core::Message)s.
//!
//! Supported syntax:
//!
//! | Syntax                                   | Meaning                               |
//! |------------------------------------------|---------------------------------------|
//! | `{{path}}`, `{{{path}}}`                 | variable (never HTML-escaped)         |
//! | `{{! c }}`, `{{!-- c --}}`               | comment                               |
//! | `{{#if x}}..{{else}}..{{/if}}`           | conditional (`#unless` inverts)       |
//! | `{{#each xs}}..{{/each}}`                | iteration with `@index/@first/@last/@key` |
//! | `{{#with x}}..{{/with}}`                 | change context                        |
//! | `{{#ifEquals a b}}`, `{{#unlessEquals a b}}` | equality test                     |
//! | `{{> name ctx}}`                         | registered partial                    |
//! | `{{json x indent=2}}`                    | JSON serialization                    |
//! | `{{role "user"}}`                        | start a new message                   |
//! | `{{media url=u contentType=t}}`          | media part                            |
//! | `{{history}}`                            | position of the conversation history  |
//! | `{{section "output"}}`                   | placeholder part for later content    |

mod assemble;
mod parser;
mod render;

pub use assemble::{assemble_messages, Assembled, HISTORY_PURPOSE};
pub use parser::{parse_template, Call, Expr, Node};

use flowkit_core::Role;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Result;

/// A unit of rendered output.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A run of text.
    Text(String),
    /// Switch to a new message with this role.
    Role(Role),
    /// A media part.
    Media {
        /// Media location.
        url: String,
        /// Declared MIME type.
        content_type: Option<String>,
    },
    /// Insert the conversation history here.
    History,
    /// A named placeholder part, filled in by a later stage.
    Section(String),
}

/// A user-registered helper: positional arguments and hash arguments in,
/// text out.
pub type HelperFn =
    Arc<dyn Fn(&[JsonValue], &JsonMap<String, JsonValue>) -> anyhow::Result<String> + Send + Sync>;

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template.
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let nodes = parse_template(&source)?;
        Ok(Self { source, nodes })
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

impl FromStr for Template {
    type Err = crate::error::PromptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Holds registered partials and helpers and renders templates.
#[derive(Clone, Default)]
pub struct TemplateEngine {
    pub(crate) partials: HashMap<String, Template>,
    pub(crate) helpers: HashMap<String, HelperFn>,
}

impl TemplateEngine {
    /// Create an engine with only the built-in helpers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a partial, parsing it immediately.
    pub fn register_partial(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<&mut Self> {
        let template = Template::parse(source)?;
        self.partials.insert(name.into(), template);
        Ok(self)
    }

    /// Register a helper. A helper with the same name as a built-in
    /// replaces it.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F) -> &mut Self
    where
        F: Fn(&[JsonValue], &JsonMap<String, JsonValue>) -> anyhow::Result<String>
            + Send
            + Sync
            + 'static,
    {
        self.helpers.insert(name.into(), Arc::new(helper));
        self
    }

    /// Whether a partial is registered.
    pub fn has_partial(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    /// Whether a helper is registered.
    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Render a parsed template against `data`.
    pub fn render(&self, template: &Template, data: &JsonValue) -> Result<Vec<Segment>> {
        render::render_nodes(self, template.nodes(), data)
    }

    /// Parse and render a template source.
    pub fn render_str(&self, source: &str, data: &JsonValue) -> Result<Vec<Segment>> {
        let nodes = parse_template(source)?;
        render::render_nodes(self, &nodes, data)
    }

    /// Parse and render, keeping only the text.
    pub fn render_text(&self, source: &str, data: &JsonValue) -> Result<String> {
        Ok(self
            .render_str(source, data)?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(text),
                _ => None,
            })
            .collect())
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut partials: Vec<_> = self.partials.keys().collect();
        partials.sort();
        let mut helpers: Vec<_> = self.helpers.keys().collect();
        helpers.sort();
        f.debug_struct("TemplateEngine")
            .field("partials", &partials)
            .field("helpers", &helpers)
            .finish()
    }
}
