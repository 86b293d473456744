//! Template source to node tree.
//!
//! Parsing runs in three passes: the source is split into text runs and
//! `{{...}}` tags, whitespace control (`~` markers and standalone block
//! lines) is applied to the text runs, and the flat token list is folded
//! into a tree of [`Node`]s.

use serde_json::Value as JsonValue;
use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{alt, delimited, opt, preceded, repeat, separated_pair};
use winnow::token::{rest, take_till, take_until, take_while};
use winnow::{ModalResult, Parser};

use crate::error::{PromptError, Result};

/// A value inside a tag: a variable path or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A lookup such as `name`, `user.email`, `this`, `@index` or `../title`.
    Path(String),
    /// A string, number, boolean or null literal.
    Literal(JsonValue),
}

/// A helper or variable invocation: `name param... key=value...`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Call {
    /// Helper name or variable path.
    pub name: String,
    /// Positional parameters.
    pub params: Vec<Expr>,
    /// Named (hash) parameters, in source order.
    pub hash: Vec<(String, Expr)>,
}

impl Call {
    /// Look up a hash parameter.
    pub fn hash_value(&self, key: &str) -> Option<&Expr> {
        self.hash.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn is_bare(&self) -> bool {
        self.params.is_empty() && self.hash.is_empty()
    }
}

/// A node of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text.
    Text(String),
    /// `{{name ...}}` or `{{{name ...}}}`.
    Expression(Call),
    /// `{{#name ...}} body {{else}} inverse {{/name}}`.
    Block {
        /// The opening call.
        call: Call,
        /// Nodes rendered when the block applies.
        body: Vec<Node>,
        /// Nodes after `{{else}}`.
        inverse: Vec<Node>,
    },
    /// `{{> name context}}`.
    Partial {
        /// Partial name.
        name: String,
        /// Optional context expression.
        context: Option<Expr>,
    },
}

#[derive(Debug)]
enum Token<'s> {
    Text(&'s str),
    Comment,
    Tag(&'s str),
}

#[derive(Debug)]
enum TagKind {
    Open(Call),
    Close(String),
    Else,
    Partial { name: String, context: Option<Expr> },
    Expression(Call),
    Comment,
}

impl TagKind {
    fn is_standalone_candidate(&self) -> bool {
        matches!(
            self,
            TagKind::Open(_) | TagKind::Close(_) | TagKind::Else | TagKind::Comment
        )
    }
}

enum Item<'s> {
    Text(&'s str),
    Tag {
        kind: TagKind,
        trim_before: bool,
        trim_after: bool,
    },
}

enum Arg {
    Param(Expr),
    Hash(String, Expr),
}

/// Parse a template into its node tree.
pub fn parse_template(source: &str) -> Result<Vec<Node>> {
    let tokens = tokens
        .parse(source)
        .map_err(|e| PromptError::Parse(e.to_string()))?;

    let mut items = Vec::with_capacity(tokens.len());
    for token in tokens {
        items.push(match token {
            Token::Text(text) => Item::Text(text),
            Token::Comment => Item::Tag {
                kind: TagKind::Comment,
                trim_before: false,
                trim_after: false,
            },
            Token::Tag(body) => classify_tag(body)?,
        });
    }

    let texts = apply_whitespace_control(&items);
    build_tree(items, texts)
}

fn tokens<'s>(input: &mut &'s str) -> ModalResult<Vec<Token<'s>>> {
    repeat(0.., alt((comment, raw_tag, tag, text))).parse_next(input)
}

fn comment<'s>(input: &mut &'s str) -> ModalResult<Token<'s>> {
    alt((
        delimited("{{!--", take_until(0.., "--}}"), "--}}"),
        delimited("{{!", take_until(0.., "}}"), "}}"),
    ))
    .map(|_| Token::Comment)
    .parse_next(input)
}

fn raw_tag<'s>(input: &mut &'s str) -> ModalResult<Token<'s>> {
    delimited("{{{", take_until(0.., "}}}"), "}}}")
        .map(Token::Tag)
        .parse_next(input)
}

fn tag<'s>(input: &mut &'s str) -> ModalResult<Token<'s>> {
    delimited("{{", take_until(0.., "}}"), "}}")
        .map(Token::Tag)
        .parse_next(input)
}

fn text<'s>(input: &mut &'s str) -> ModalResult<Token<'s>> {
    alt((
        take_until(1.., "{{"),
        rest.verify(|s: &str| !s.is_empty() && !s.contains("{{")),
    ))
    .map(Token::Text)
    .parse_next(input)
}

fn classify_tag(body: &str) -> Result<Item<'_>> {
    let mut inner = body;
    let trim_before = inner.starts_with('~');
    if trim_before {
        inner = &inner[1..];
    }
    let trim_after = inner.ends_with('~');
    if trim_after {
        inner = &inner[..inner.len() - 1];
    }

    let kind = delimited(multispace0, tag_kind, multispace0)
        .parse(inner)
        .map_err(|e| PromptError::Parse(format!("in tag '{{{{{body}}}}}': {e}")))?;
    let kind = match kind {
        TagKind::Expression(call) if call.name == "else" && call.is_bare() => TagKind::Else,
        other => other,
    };
    Ok(Item::Tag {
        kind,
        trim_before,
        trim_after,
    })
}

fn tag_kind(input: &mut &str) -> ModalResult<TagKind> {
    alt((
        preceded('!', rest).map(|_| TagKind::Comment),
        preceded(('#', multispace0), call).map(TagKind::Open),
        preceded(('/', multispace0), name).map(|n: &str| TagKind::Close(n.to_string())),
        preceded(
            ('>', multispace0),
            (name, opt(preceded(multispace1, expr))),
        )
        .map(|(n, context): (&str, _)| TagKind::Partial {
            name: n.to_string(),
            context,
        }),
        call.map(TagKind::Expression),
    ))
    .parse_next(input)
}

fn call(input: &mut &str) -> ModalResult<Call> {
    let head = name.parse_next(input)?;
    let args: Vec<Arg> = repeat(0.., preceded(multispace1, arg)).parse_next(input)?;

    let mut call = Call {
        name: head.to_string(),
        ..Call::default()
    };
    for arg in args {
        match arg {
            Arg::Param(e) => call.params.push(e),
            Arg::Hash(k, v) => call.hash.push((k, v)),
        }
    }
    Ok(call)
}

fn name<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '@' | '$')
    })
    .parse_next(input)
}

fn arg(input: &mut &str) -> ModalResult<Arg> {
    alt((
        separated_pair(hash_key, '=', expr).map(|(k, v): (&str, Expr)| Arg::Hash(k.to_string(), v)),
        expr.map(Arg::Param),
    ))
    .parse_next(input)
}

fn hash_key<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || matches!(c, '_' | '-')).parse_next(input)
}

fn expr(input: &mut &str) -> ModalResult<Expr> {
    alt((
        quoted.map(|s: &str| Expr::Literal(JsonValue::String(s.to_string()))),
        bare.map(classify_bare),
    ))
    .parse_next(input)
}

fn quoted<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .parse_next(input)
}

fn bare<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| {
        !c.is_whitespace() && !matches!(c, '=' | '"' | '\'' | '(' | ')')
    })
    .parse_next(input)
}

fn classify_bare(token: &str) -> Expr {
    match token {
        "true" => return Expr::Literal(JsonValue::Bool(true)),
        "false" => return Expr::Literal(JsonValue::Bool(false)),
        "null" | "undefined" => return Expr::Literal(JsonValue::Null),
        _ => {}
    }
    let numeric = token
        .strip_prefix('-')
        .unwrap_or(token)
        .starts_with(|c: char| c.is_ascii_digit());
    if numeric {
        if let Ok(n @ JsonValue::Number(_)) = serde_json::from_str::<JsonValue>(token) {
            return Expr::Literal(n);
        }
    }
    Expr::Path(token.to_string())
}

/// Compute the final text of every text item after `~` trimming and
/// standalone-line removal. Returns one entry per item (`None` for tags).
fn apply_whitespace_control<'s>(items: &[Item<'s>]) -> Vec<Option<&'s str>> {
    let mut bounds: Vec<Option<(usize, usize)>> = items
        .iter()
        .map(|item| match item {
            Item::Text(t) => Some((0, t.len())),
            Item::Tag { .. } => None,
        })
        .collect();
    let text_at = |i: usize| match items.get(i) {
        Some(Item::Text(t)) => Some(*t),
        _ => None,
    };

    for (i, item) in items.iter().enumerate() {
        let Item::Tag {
            kind,
            trim_before,
            trim_after,
        } = item
        else {
            continue;
        };

        if *trim_before && i > 0 {
            if let (Some(t), Some((_, end))) = (text_at(i - 1), bounds[i - 1].as_mut()) {
                *end = (*end).min(t.trim_end().len());
            }
        }
        if *trim_after {
            if let (Some(t), Some(Some((start, _)))) = (text_at(i + 1), bounds.get_mut(i + 1)) {
                *start = (*start).max(t.len() - t.trim_start().len());
            }
        }

        if !kind.is_standalone_candidate() {
            continue;
        }
        let before = match i.checked_sub(1) {
            None => Some(None),
            Some(j) => text_at(j)
                .filter(|t| {
                    let tail = t.rsplit_once('\n').map_or(*t, |(_, tail)| tail);
                    (j == 0 || t.contains('\n')) && is_blank(tail)
                })
                .map(|t| Some((j, t.rfind('\n').map_or(0, |p| p + 1)))),
        };
        let after = match items.get(i + 1) {
            None => Some(None),
            Some(_) => text_at(i + 1)
                .filter(|t| {
                    let head = t.split_once('\n').map_or(*t, |(head, _)| head);
                    (i + 2 == items.len() || t.contains('\n')) && is_blank(head)
                })
                .map(|t| Some((i + 1, t.find('\n').map_or(t.len(), |p| p + 1)))),
        };
        if let (Some(before), Some(after)) = (before, after) {
            if let Some((j, keep_to)) = before {
                if let Some((_, end)) = bounds[j].as_mut() {
                    *end = (*end).min(keep_to);
                }
            }
            if let Some((j, skip_to)) = after {
                if let Some((start, _)) = bounds[j].as_mut() {
                    *start = (*start).max(skip_to);
                }
            }
        }
    }

    items
        .iter()
        .zip(bounds)
        .map(|(item, bound)| match (item, bound) {
            (Item::Text(t), Some((start, end))) if start < end => Some(&t[start..end]),
            (Item::Text(_), _) => Some(""),
            _ => None,
        })
        .collect()
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

struct Frame {
    call: Call,
    body: Vec<Node>,
    inverse: Option<Vec<Node>>,
}

impl Frame {
    fn nodes(&mut self) -> &mut Vec<Node> {
        match &mut self.inverse {
            Some(inverse) => inverse,
            None => &mut self.body,
        }
    }
}

fn build_tree(items: Vec<Item<'_>>, texts: Vec<Option<&str>>) -> Result<Vec<Node>> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for (item, text) in items.into_iter().zip(texts) {
        let node = match item {
            Item::Text(_) => match text {
                Some(t) if !t.is_empty() => Node::Text(t.to_string()),
                _ => continue,
            },
            Item::Tag { kind, .. } => match kind {
                TagKind::Comment => continue,
                TagKind::Open(call) => {
                    stack.push(Frame {
                        call,
                        body: Vec::new(),
                        inverse: None,
                    });
                    continue;
                }
                TagKind::Else => {
                    let frame = stack
                        .last_mut()
                        .ok_or_else(|| PromptError::Parse("{{else}} outside of a block".into()))?;
                    if frame.inverse.is_some() {
                        return Err(PromptError::Parse(format!(
                            "duplicate {{{{else}}}} in block '{}'",
                            frame.call.name
                        )));
                    }
                    frame.inverse = Some(Vec::new());
                    continue;
                }
                TagKind::Close(name) => {
                    let frame = stack.pop().ok_or_else(|| {
                        PromptError::Parse(format!("unexpected {{{{/{name}}}}} without an open block"))
                    })?;
                    if frame.call.name != name {
                        return Err(PromptError::Parse(format!(
                            "block '{}' closed by {{{{/{name}}}}}",
                            frame.call.name
                        )));
                    }
                    Node::Block {
                        call: frame.call,
                        body: frame.body,
                        inverse: frame.inverse.unwrap_or_default(),
                    }
                }
                TagKind::Partial { name, context } => Node::Partial { name, context },
                TagKind::Expression(call) => Node::Expression(call),
            },
        };
        match stack.last_mut() {
            Some(frame) => frame.nodes().push(node),
            None => root.push(node),
        }
    }

    if let Some(frame) = stack.last() {
        return Err(PromptError::Parse(format!(
            "unclosed block '{{{{#{}}}}}'",
            frame.call.name
        )));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn var(name: &str) -> Node {
        Node::Expression(Call {
            name: name.to_string(),
            ..Call::default()
        })
    }

    #[test]
    fn test_text_and_variables() {
        let nodes = parse_template("Hello {{ name }}, from {{{team.name}}}!").unwrap();
        assert_eq!(
            nodes,
            vec![text("Hello "), var("name"), text(", from "), var("team.name"), text("!")]
        );
    }

    #[test]
    fn test_helper_arguments() {
        let nodes = parse_template(r#"{{json data indent=2}}{{media url=photo contentType="image/png"}}{{role 'user'}}"#).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Expression(Call {
                    name: "json".into(),
                    params: vec![Expr::Path("data".into())],
                    hash: vec![("indent".into(), Expr::Literal(json!(2)))],
                }),
                Node::Expression(Call {
                    name: "media".into(),
                    params: vec![],
                    hash: vec![
                        ("url".into(), Expr::Path("photo".into())),
                        ("contentType".into(), Expr::Literal(json!("image/png"))),
                    ],
                }),
                Node::Expression(Call {
                    name: "role".into(),
                    params: vec![Expr::Literal(json!("user"))],
                    hash: vec![],
                }),
            ]
        );
    }

    #[rstest]
    #[case("42", Expr::Literal(json!(42)))]
    #[case("-1.5", Expr::Literal(json!(-1.5)))]
    #[case("true", Expr::Literal(json!(true)))]
    #[case("null", Expr::Literal(JsonValue::Null))]
    #[case("@index", Expr::Path("@index".into()))]
    #[case("../title", Expr::Path("../title".into()))]
    fn test_classify_bare(#[case] token: &str, #[case] expected: Expr) {
        assert_eq!(classify_bare(token), expected);
    }

    #[test]
    fn test_blocks_with_else() {
        let nodes = parse_template("{{#if ok}}yes{{else}}no{{/if}}").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Block {
                call: Call {
                    name: "if".into(),
                    params: vec![Expr::Path("ok".into())],
                    hash: vec![],
                },
                body: vec![text("yes")],
                inverse: vec![text("no")],
            }]
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        let nodes = parse_template("a{{! note }}b{{!-- has }} inside --}}c").unwrap();
        assert_eq!(nodes, vec![text("a"), text("b"), text("c")]);
    }

    #[test]
    fn test_partial_with_context() {
        let nodes = parse_template("{{> header user}}").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Partial {
                name: "header".into(),
                context: Some(Expr::Path("user".into())),
            }]
        );
    }

    #[test]
    fn test_standalone_block_lines_are_removed() {
        let source = "List:\n{{#each items}}\n- {{this}}\n{{/each}}\nDone";
        let nodes = parse_template(source).unwrap();
        assert_eq!(
            nodes,
            vec![
                text("List:\n"),
                Node::Block {
                    call: Call {
                        name: "each".into(),
                        params: vec![Expr::Path("items".into())],
                        hash: vec![],
                    },
                    body: vec![text("- "), var("this"), text("\n")],
                    inverse: vec![],
                },
                text("Done"),
            ]
        );
    }

    #[test]
    fn test_tilde_trims_whitespace() {
        let nodes = parse_template("a   {{~name~}}   b").unwrap();
        assert_eq!(nodes, vec![text("a"), var("name"), text("b")]);
    }

    #[rstest]
    #[case("{{#if a}}open")]
    #[case("{{#if a}}x{{/each}}")]
    #[case("{{/if}}")]
    #[case("{{else}}")]
    #[case("Hello {{name")]
    #[case("{{#if a}}x{{else}}y{{else}}z{{/if}}")]
    fn test_malformed_templates(#[case] source: &str) {
        assert!(matches!(parse_template(source), Err(PromptError::Parse(_))));
    }
}
