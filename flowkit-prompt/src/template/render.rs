//! Evaluation of parsed templates into segments.

use flowkit_core::Role;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::parser::{Call, Expr, Node};
use super::{Segment, TemplateEngine};
use crate::error::{PromptError, Result};

/// Deepest allowed chain of partials including other partials.
const MAX_PARTIAL_DEPTH: usize = 32;

/// One level of the context stack: the current `this` plus the `@` data
/// variables of the enclosing `#each`.
struct Scope {
    this: JsonValue,
    locals: JsonMap<String, JsonValue>,
}

impl Scope {
    fn new(this: JsonValue) -> Self {
        Self {
            this,
            locals: JsonMap::new(),
        }
    }
}

/// Render `nodes` against `data`.
pub(crate) fn render_nodes(
    engine: &TemplateEngine,
    nodes: &[Node],
    data: &JsonValue,
) -> Result<Vec<Segment>> {
    let mut renderer = Renderer {
        engine,
        out: Vec::new(),
        depth: 0,
    };
    let mut scopes = vec![Scope::new(data.clone())];
    renderer.nodes(nodes, &mut scopes)?;
    Ok(renderer.out)
}

struct Renderer<'e> {
    engine: &'e TemplateEngine,
    out: Vec<Segment>,
    depth: usize,
}

impl<'e> Renderer<'e> {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.out.last_mut() {
            Some(Segment::Text(existing)) => existing.push_str(text),
            _ => self.out.push(Segment::Text(text.to_string())),
        }
    }

    fn nodes(&mut self, nodes: &[Node], scopes: &mut Vec<Scope>) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => self.push_text(text),
                Node::Expression(call) => self.expression(call, scopes)?,
                Node::Block {
                    call,
                    body,
                    inverse,
                } => self.block(call, body, inverse, scopes)?,
                Node::Partial { name, context } => self.partial(name, context.as_ref(), scopes)?,
            }
        }
        Ok(())
    }

    fn expression(&mut self, call: &Call, scopes: &[Scope]) -> Result<()> {
        let engine = self.engine;
        if let Some(helper) = engine.helpers.get(&call.name) {
            let params: Vec<JsonValue> = call.params.iter().map(|p| eval(p, scopes)).collect();
            let hash: JsonMap<String, JsonValue> = call
                .hash
                .iter()
                .map(|(k, v)| (k.clone(), eval(v, scopes)))
                .collect();
            let text = helper(&params, &hash)
                .map_err(|e| PromptError::helper(&call.name, e.to_string()))?;
            self.push_text(&text);
            return Ok(());
        }

        match call.name.as_str() {
            "json" => {
                let value = first_param(call, scopes)?;
                let indent = call
                    .hash_value("indent")
                    .map(|e| eval(e, scopes))
                    .and_then(|v| v.as_u64());
                let text = to_json(&value, indent)?;
                self.push_text(&text);
            }
            "role" => {
                let name = string_param(call, scopes)?;
                let role = name
                    .parse::<Role>()
                    .map_err(|e| PromptError::helper("role", e.to_string()))?;
                self.out.push(Segment::Role(role));
            }
            "media" => {
                let url = match call.hash_value("url").map(|e| eval(e, scopes)) {
                    Some(JsonValue::String(url)) if !url.is_empty() => url,
                    _ => return Err(PromptError::helper("media", "requires a `url` string")),
                };
                let content_type = call
                    .hash_value("contentType")
                    .map(|e| eval(e, scopes))
                    .and_then(|v| v.as_str().map(str::to_string))
                    .filter(|ct| !ct.is_empty());
                self.out.push(Segment::Media { url, content_type });
            }
            "history" => self.out.push(Segment::History),
            "section" => {
                let name = string_param(call, scopes)?;
                self.out.push(Segment::Section(name));
            }
            _ if call.params.is_empty() && call.hash.is_empty() => {
                let value = lookup(&call.name, scopes);
                self.push_text(&display(&value));
            }
            _ => return Err(PromptError::UnknownHelper(call.name.clone())),
        }
        Ok(())
    }

    fn block(
        &mut self,
        call: &Call,
        body: &[Node],
        inverse: &[Node],
        scopes: &mut Vec<Scope>,
    ) -> Result<()> {
        match call.name.as_str() {
            "if" | "unless" => {
                let value = first_param(call, scopes)?;
                let show = truthy(&value) == (call.name == "if");
                self.nodes(if show { body } else { inverse }, scopes)
            }
            "ifEquals" | "unlessEquals" => {
                let (a, b) = match call.params.as_slice() {
                    [a, b] => (eval(a, scopes), eval(b, scopes)),
                    _ => {
                        return Err(PromptError::helper(
                            call.name.clone(),
                            "expects exactly two arguments",
                        ))
                    }
                };
                let show = (a == b) == (call.name == "ifEquals");
                self.nodes(if show { body } else { inverse }, scopes)
            }
            "with" => {
                let value = first_param(call, scopes)?;
                if !truthy(&value) {
                    return self.nodes(inverse, scopes);
                }
                scopes.push(Scope::new(value));
                let result = self.nodes(body, scopes);
                scopes.pop();
                result
            }
            "each" => {
                let value = first_param(call, scopes)?;
                self.each(value, body, inverse, scopes)
            }
            other => Err(PromptError::UnknownHelper(format!("#{other}"))),
        }
    }

    fn each(
        &mut self,
        value: JsonValue,
        body: &[Node],
        inverse: &[Node],
        scopes: &mut Vec<Scope>,
    ) -> Result<()> {
        let items: Vec<(Option<String>, JsonValue)> = match value {
            JsonValue::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
            JsonValue::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            _ => Vec::new(),
        };
        if items.is_empty() {
            return self.nodes(inverse, scopes);
        }

        let last = items.len() - 1;
        for (index, (key, item)) in items.into_iter().enumerate() {
            let mut scope = Scope::new(item);
            scope.locals.insert("index".into(), index.into());
            scope.locals.insert("first".into(), (index == 0).into());
            scope.locals.insert("last".into(), (index == last).into());
            if let Some(key) = key {
                scope.locals.insert("key".into(), key.into());
            }
            scopes.push(scope);
            let result = self.nodes(body, scopes);
            scopes.pop();
            result?;
        }
        Ok(())
    }

    fn partial(&mut self, name: &str, context: Option<&Expr>, scopes: &mut Vec<Scope>) -> Result<()> {
        let engine = self.engine;
        let template = engine
            .partials
            .get(name)
            .ok_or_else(|| PromptError::UnknownPartial(name.to_string()))?;
        if self.depth >= MAX_PARTIAL_DEPTH {
            return Err(PromptError::Render(format!(
                "partials nested deeper than {MAX_PARTIAL_DEPTH} levels at '{name}'"
            )));
        }

        let pushed = match context {
            Some(expr) => {
                let value = eval(expr, scopes);
                scopes.push(Scope::new(value));
                true
            }
            None => false,
        };
        self.depth += 1;
        let result = self.nodes(template.nodes(), scopes);
        self.depth -= 1;
        if pushed {
            scopes.pop();
        }
        result
    }
}

fn first_param(call: &Call, scopes: &[Scope]) -> Result<JsonValue> {
    call.params
        .first()
        .map(|p| eval(p, scopes))
        .ok_or_else(|| PromptError::helper(call.name.clone(), "expects an argument"))
}

fn string_param(call: &Call, scopes: &[Scope]) -> Result<String> {
    match first_param(call, scopes)? {
        JsonValue::String(s) => Ok(s),
        other => Err(PromptError::helper(
            call.name.clone(),
            format!("expects a string argument, got {other}"),
        )),
    }
}

fn eval(expr: &Expr, scopes: &[Scope]) -> JsonValue {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(path) => lookup(path, scopes),
    }
}

/// Resolve a path against the scope stack. Missing values resolve to null.
fn lookup(path: &str, scopes: &[Scope]) -> JsonValue {
    let mut rest = path;
    let mut up = 0;
    loop {
        if let Some(r) = rest.strip_prefix("../") {
            up += 1;
            rest = r;
        } else if rest == ".." {
            up += 1;
            rest = "";
        } else {
            break;
        }
    }
    let visible = &scopes[..scopes.len().saturating_sub(up).max(1)];

    if let Some(data) = rest.strip_prefix('@') {
        let (head, tail) = data.split_once('.').unwrap_or((data, ""));
        if head == "root" {
            return walk(&scopes[0].this, tail);
        }
        return visible
            .iter()
            .rev()
            .find_map(|s| s.locals.get(head))
            .map_or(JsonValue::Null, |v| walk(v, tail));
    }

    let Some(scope) = visible.last() else {
        return JsonValue::Null;
    };
    let rest = match rest {
        "this" | "." => "",
        r => r
            .strip_prefix("this.")
            .or_else(|| r.strip_prefix("./"))
            .unwrap_or(r),
    };
    walk(&scope.this, rest)
}

fn walk(value: &JsonValue, path: &str) -> JsonValue {
    if path.is_empty() {
        return value.clone();
    }
    let mut current = value;
    for segment in path.split('.') {
        let next = match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return JsonValue::Null,
        }
    }
    current.clone()
}

/// Handlebars truthiness: `false`, null, `0`, `""` and `[]` are falsy.
fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(_) => true,
    }
}

fn display(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_json(value: &JsonValue, indent: Option<u64>) -> Result<String> {
    let render_err = |e: &dyn std::fmt::Display| PromptError::helper("json", e.to_string());
    let Some(width) = indent.filter(|w| *w > 0) else {
        return serde_json::to_string(value).map_err(|e| render_err(&e));
    };
    let pad = " ".repeat(usize::try_from(width).unwrap_or(usize::MAX).min(16));
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(pad.as_bytes()));
    value
        .serialize(&mut serializer)
        .map_err(|e| render_err(&e))?;
    String::from_utf8(buf).map_err(|e| render_err(&e))
}
