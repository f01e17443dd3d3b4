//! Template strings with embedded `@{...}` expressions.
//!
//! A template consists of literal text and expressions. An expression is either a literal
//! (`@{true}`, `@{3}`, `@{'text'}`, `@{null}`) or a context reference, whose first path segment
//! names the context id and whose remaining segments navigate into that context’s value
//! (`@{item.tags[0]}`). `\@{` is an escaped, literal `@{`.
//!
//! A template that is exactly one expression evaluates to that expression’s raw value. Anything
//! else evaluates to a string with every expression stringified in place.

use crate::context::ContextData;
use crate::error::{PathError, TemplateError};
use crate::path::Path;
use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an expression refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// A path into the context with the given id.
    Context { id: String, path: Path },
    /// A constant.
    Literal(Value),
}

/// A single `@{...}` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    kind: ExpressionKind,
}

impl Expression {
    /// Parses the body of an expression (the part between `@{` and `}`).
    pub fn parse(body: &str) -> Result<Expression, PathError> {
        let source = body.trim().to_owned();
        let kind = match parse_literal(&source) {
            Some(value) => ExpressionKind::Literal(value),
            None => {
                let path = Path::parse(&source)?;
                match path.split_first_key() {
                    Some((id, rest)) => ExpressionKind::Context {
                        id: id.to_owned(),
                        path: rest,
                    },
                    None => {
                        return Err(PathError::Invalid {
                            path: source,
                            reason: "expression must start with a context id",
                        })
                    }
                }
            }
        };
        Ok(Expression { source, kind })
    }

    /// The trimmed expression body; used as the key for per-binding caches.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &ExpressionKind {
        &self.kind
    }

    /// The id of the referenced context, if this is not a literal.
    pub fn context_id(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Context { id, .. } => Some(id),
            ExpressionKind::Literal(_) => None,
        }
    }

    /// The path inside the referenced context, if this is not a literal.
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            ExpressionKind::Context { path, .. } => Some(path),
            ExpressionKind::Literal(_) => None,
        }
    }

    /// Evaluates against a context chain, nearest scope first. Unknown ids yield None.
    pub fn evaluate(&self, chain: &[ContextData]) -> Option<Value> {
        match &self.kind {
            ExpressionKind::Literal(value) => Some(value.clone()),
            ExpressionKind::Context { id, path } => chain
                .iter()
                .find(|context| &context.id == id)
                .and_then(|context| path.get(&context.value))
                .cloned(),
        }
    }
}

fn parse_literal(source: &str) -> Option<Value> {
    match source {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => (),
    }
    if source.len() >= 2 && source.starts_with('\'') && source.ends_with('\'') {
        let inner = &source[1..source.len() - 1];
        return Some(Value::String(inner.replace("\\'", "'")));
    }
    let first = source.chars().next()?;
    if first.is_ascii_digit() || first == '-' {
        if let Ok(number) = serde_json::from_str::<serde_json::Number>(source) {
            return Some(Value::Number(number));
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text(String),
    Expression(Expression),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Template, TemplateError> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("@{") {
            if rest[..start].ends_with('\\') {
                // escaped: keep `@{` as text
                text.push_str(&rest[..start - 1]);
                text.push_str("@{");
                rest = &rest[start + 2..];
                offset += start + 2;
                continue;
            }

            text.push_str(&rest[..start]);
            let body_start = start + 2;
            let end = find_closing_brace(&rest[body_start..])
                .ok_or(TemplateError::Unterminated(offset + start))?;
            let body = &rest[body_start..body_start + end];
            if body.trim().is_empty() {
                return Err(TemplateError::Empty(offset + start));
            }
            let expression = Expression::parse(body).map_err(|source| TemplateError::Path {
                expression: body.trim().to_owned(),
                source,
            })?;

            if !text.is_empty() {
                parts.push(Part::Text(std::mem::take(&mut text)));
            }
            parts.push(Part::Expression(expression));

            let consumed = body_start + end + 1;
            rest = &rest[consumed..];
            offset += consumed;
        }
        text.push_str(rest);
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }

        Ok(Template {
            source: source.to_owned(),
            parts,
        })
    }

    /// The original template string.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expressions(&self) -> impl Iterator<Item = &Expression> + '_ {
        self.parts.iter().filter_map(|part| match part {
            Part::Expression(expression) => Some(expression),
            Part::Text(_) => None,
        })
    }

    /// The referenced context ids in order of first appearance.
    pub fn context_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for id in self.expressions().filter_map(Expression::context_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// True if the template references at least one context.
    pub fn has_context_references(&self) -> bool {
        self.expressions().any(|e| e.context_id().is_some())
    }

    /// True if the template is exactly one expression with no surrounding text.
    pub fn is_single_expression(&self) -> bool {
        matches!(self.parts.as_slice(), [Part::Expression(_)])
    }

    /// Assembles the template, asking `resolve` for the value of every expression.
    pub fn evaluate_with<F>(&self, mut resolve: F) -> Option<Value>
    where
        F: FnMut(&Expression) -> Option<Value>,
    {
        if let [Part::Expression(expression)] = self.parts.as_slice() {
            return resolve(expression);
        }

        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Expression(expression) => {
                    if let Some(value) = resolve(expression) {
                        out.push_str(&stringify(&value));
                    }
                }
            }
        }
        Some(Value::String(out))
    }

    /// Evaluates against a context chain without any caching.
    pub fn evaluate(&self, chain: &[ContextData]) -> Option<Value> {
        self.evaluate_with(|expression| expression.evaluate(chain))
    }
}

/// Finds the `}` that closes an expression, skipping over single-quoted strings.
fn find_closing_brace(body: &str) -> Option<usize> {
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            '\\' if in_quote => escaped = !escaped,
            '\'' if !escaped => in_quote = !in_quote,
            '}' if !in_quote => return Some(i),
            _ => escaped = false,
        }
        if c != '\\' {
            escaped = false;
        }
    }
    None
}

/// Renders a value for substitution into a string template.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Template, TemplateError> {
        Template::parse(s)
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateError;

    fn try_from(s: String) -> Result<Template, TemplateError> {
        Template::parse(&s)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> String {
        template.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.source)
    }
}
