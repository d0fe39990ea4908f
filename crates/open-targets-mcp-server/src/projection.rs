//! Server-side response filtering.
//!
//! Implements the small projection language accepted by the tools'
//! `jq_filter` argument: identity, field access (with optional `?`),
//! array iteration, indexing and slicing, `map(f)`, array collection,
//! object construction, and pipes. Expressions are re-parsed per call
//! and evaluation is a pure function of `(payload, expression)`.
//!
//! Like jq, an expression maps one input to a stream of outputs. The
//! caller-facing [`project`] collapses the stream: exactly one output
//! is returned as-is, anything else becomes an array.

use serde_json::{Map, Number, Value};

use crate::errors::ProjectionError;

/// Apply `expression` to `payload`.
pub fn project(payload: &Value, expression: &str) -> Result<Value, ProjectionError> {
    let expr = Parser::new(expression).parse()?;
    let mut outputs = eval(&expr, payload)?;
    if outputs.len() == 1 {
        Ok(outputs.remove(0))
    } else {
        Ok(Value::Array(outputs))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    /// `e1 | e2 | ...`
    Pipe(Vec<Expr>),
    /// `.`, `.a.b`, `.[0]`, `.[1:3]`, `.[]`
    Path(Vec<Segment>),
    /// `{id, symbol: .approvedSymbol}`
    Object(Vec<(String, Option<Expr>)>),
    /// `[f]`; `[]` is the empty array literal
    Collect(Option<Box<Expr>>),
    /// `map(f)`
    Map(Box<Expr>),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field { name: String, optional: bool },
    Index(i64),
    Slice { start: Option<i64>, end: Option<i64> },
    Iterate,
}

// ===== parsing =====

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> Result<Expr, ProjectionError> {
        let expr = self.parse_pipe()?;
        self.skip_ws();
        if self.pos < self.src.len() {
            return Err(self.error("trailing characters after expression"));
        }
        Ok(expr)
    }

    fn error(&self, message: &str) -> ProjectionError {
        ProjectionError::Parse(format!("{message} at offset {}", self.pos))
    }

    fn rest(&self) -> &str {
        self.src.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ProjectionError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn parse_pipe(&mut self) -> Result<Expr, ProjectionError> {
        let mut stages = vec![self.parse_term()?];
        while self.eat('|') {
            stages.push(self.parse_term()?);
        }
        if stages.len() == 1 {
            Ok(stages.remove(0))
        } else {
            Ok(Expr::Pipe(stages))
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ProjectionError> {
        self.skip_ws();
        match self.peek() {
            Some('.') => self.parse_path(),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_collect(),
            Some('"') => Ok(Expr::Literal(Value::String(self.parse_string()?))),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                let ident = self.parse_ident();
                match ident.as_str() {
                    "map" => {
                        self.expect('(')?;
                        let inner = self.parse_pipe()?;
                        self.expect(')')?;
                        Ok(Expr::Map(Box::new(inner)))
                    }
                    "null" => Ok(Expr::Literal(Value::Null)),
                    "true" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" => Ok(Expr::Literal(Value::Bool(false))),
                    other => Err(self.error(&format!("unknown function or keyword '{other}'"))),
                }
            }
            Some(c) => Err(self.error(&format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_path(&mut self) -> Result<Expr, ProjectionError> {
        self.expect('.')?;
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(c) if c.is_alphabetic() || c == '_' => {
                    let name = self.parse_ident();
                    let optional = self.peek() == Some('?');
                    if optional {
                        self.pos += 1;
                    }
                    segments.push(Segment::Field { name, optional });
                }
                Some('[') => {
                    self.pos += 1;
                    segments.push(self.parse_bracket()?);
                }
                Some('.') => {
                    // `.a.b`: only continue when a field follows; a lone
                    // trailing dot is malformed.
                    self.pos += 1;
                    if !self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
                        return Err(self.error("expected field name after '.'"));
                    }
                }
                _ => break,
            }
        }
        Ok(Expr::Path(segments))
    }

    /// Parse the inside of `[...]` in a path: `[]`, `[2]`, `[-1]`, `[1:3]`,
    /// `[:3]`, `[1:]`.
    fn parse_bracket(&mut self) -> Result<Segment, ProjectionError> {
        self.skip_ws();
        if self.eat(']') {
            return Ok(Segment::Iterate);
        }
        let start = self.parse_opt_int()?;
        self.skip_ws();
        if self.eat(':') {
            let end = self.parse_opt_int()?;
            self.expect(']')?;
            if start.is_none() && end.is_none() {
                return Err(self.error("slice must have at least one bound"));
            }
            Ok(Segment::Slice { start, end })
        } else {
            let index = start.ok_or_else(|| self.error("expected index, slice, or ']'"))?;
            self.expect(']')?;
            Ok(Segment::Index(index))
        }
    }

    fn parse_opt_int(&mut self) -> Result<Option<i64>, ProjectionError> {
        self.skip_ws();
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = self.src.get(start..self.pos).unwrap_or_default();
        if text.is_empty() || text == "-" {
            self.pos = start;
            return Ok(None);
        }
        text.parse()
            .map(Some)
            .map_err(|_| self.error("integer out of range"))
    }

    fn parse_object(&mut self) -> Result<Expr, ProjectionError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        if !self.eat('}') {
            loop {
                self.skip_ws();
                let key = match self.peek() {
                    Some('"') => self.parse_string()?,
                    Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident(),
                    _ => return Err(self.error("expected object key")),
                };
                let value = if self.eat(':') {
                    Some(self.parse_pipe()?)
                } else {
                    None
                };
                entries.push((key, value));
                if !self.eat(',') {
                    break;
                }
            }
            self.expect('}')?;
        }
        Ok(Expr::Object(entries))
    }

    fn parse_collect(&mut self) -> Result<Expr, ProjectionError> {
        self.expect('[')?;
        if self.eat(']') {
            return Ok(Expr::Collect(None));
        }
        let inner = self.parse_pipe()?;
        self.expect(']')?;
        Ok(Expr::Collect(Some(Box::new(inner))))
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        self.src.get(start..self.pos).unwrap_or_default().to_string()
    }

    fn parse_string(&mut self) -> Result<String, ProjectionError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => {
                        return Err(self.error(&format!("unsupported escape '\\{other}'")));
                    }
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Expr, ProjectionError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-')
        {
            self.pos += 1;
        }
        let text = self.src.get(start..self.pos).unwrap_or_default();
        let number: f64 = text
            .parse()
            .map_err(|_| self.error(&format!("invalid number '{text}'")))?;
        let number = Number::from_f64(number)
            .ok_or_else(|| self.error(&format!("invalid number '{text}'")))?;
        Ok(Expr::Literal(Value::Number(number)))
    }
}

// ===== evaluation =====

fn eval(expr: &Expr, input: &Value) -> Result<Vec<Value>, ProjectionError> {
    match expr {
        Expr::Literal(value) => Ok(vec![value.clone()]),
        Expr::Pipe(stages) => {
            let mut current = vec![input.clone()];
            for stage in stages {
                let mut next = Vec::new();
                for value in &current {
                    next.extend(eval(stage, value)?);
                }
                current = next;
            }
            Ok(current)
        }
        Expr::Path(segments) => {
            let mut current = vec![input.clone()];
            for segment in segments {
                let mut next = Vec::new();
                for value in current {
                    apply_segment(segment, value, &mut next)?;
                }
                current = next;
            }
            Ok(current)
        }
        Expr::Object(entries) => {
            // Field values are streams, so object construction is a
            // cartesian product across the entries, as in jq.
            let mut objects = vec![Map::new()];
            for (key, value_expr) in entries {
                let values = match value_expr {
                    Some(expr) => eval(expr, input)?,
                    None => eval(
                        &Expr::Path(vec![Segment::Field {
                            name: key.clone(),
                            optional: false,
                        }]),
                        input,
                    )?,
                };
                let mut expanded = Vec::with_capacity(objects.len() * values.len());
                for object in &objects {
                    for value in &values {
                        let mut object = object.clone();
                        object.insert(key.clone(), value.clone());
                        expanded.push(object);
                    }
                }
                objects = expanded;
            }
            Ok(objects.into_iter().map(Value::Object).collect())
        }
        Expr::Collect(inner) => match inner {
            None => Ok(vec![Value::Array(Vec::new())]),
            Some(expr) => Ok(vec![Value::Array(eval(expr, input)?)]),
        },
        Expr::Map(inner) => {
            let Value::Array(elements) = input else {
                return Err(ProjectionError::Eval(format!(
                    "cannot map over {}",
                    type_name(input)
                )));
            };
            let mut out = Vec::with_capacity(elements.len());
            for element in elements {
                out.extend(eval(inner, element)?);
            }
            Ok(vec![Value::Array(out)])
        }
    }
}

fn apply_segment(
    segment: &Segment,
    value: Value,
    out: &mut Vec<Value>,
) -> Result<(), ProjectionError> {
    match segment {
        Segment::Field { name, optional } => match value {
            Value::Object(mut map) => out.push(map.remove(name).unwrap_or(Value::Null)),
            Value::Null => out.push(Value::Null),
            _ if *optional => {}
            other => {
                return Err(ProjectionError::Eval(format!(
                    "cannot index {} with \"{name}\"",
                    type_name(&other)
                )));
            }
        },
        Segment::Index(index) => match value {
            Value::Array(mut elements) => {
                let resolved = resolve_index(*index, elements.len());
                match resolved {
                    Some(i) => out.push(elements.swap_remove(i)),
                    None => out.push(Value::Null),
                }
            }
            Value::Null => out.push(Value::Null),
            other => {
                return Err(ProjectionError::Eval(format!(
                    "cannot index {} with number",
                    type_name(&other)
                )));
            }
        },
        Segment::Slice { start, end } => match value {
            Value::Array(elements) => {
                let len = elements.len();
                let lo = resolve_bound(*start, len, 0);
                let hi = resolve_bound(*end, len, len);
                let slice = if lo < hi {
                    elements.into_iter().skip(lo).take(hi - lo).collect()
                } else {
                    Vec::new()
                };
                out.push(Value::Array(slice));
            }
            Value::Null => out.push(Value::Null),
            other => {
                return Err(ProjectionError::Eval(format!(
                    "cannot slice {}",
                    type_name(&other)
                )));
            }
        },
        Segment::Iterate => match value {
            Value::Array(elements) => out.extend(elements),
            Value::Object(map) => out.extend(map.into_values()),
            other => {
                return Err(ProjectionError::Eval(format!(
                    "cannot iterate over {}",
                    type_name(&other)
                )));
            }
        },
    }
    Ok(())
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        index + len as i64
    } else {
        index
    };
    usize::try_from(resolved).ok().filter(|i| *i < len)
}

fn resolve_bound(bound: Option<i64>, len: usize, default: usize) -> usize {
    match bound {
        None => default,
        Some(b) => {
            let resolved = if b < 0 { b + len as i64 } else { b };
            usize::try_from(resolved.max(0)).unwrap_or(0).min(len)
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn field_access_and_object_construction() {
        let payload = json!({"data": {"target": {"id": "ENSG1", "approvedSymbol": "X"}}});
        let result = project(&payload, ".data.target | {id, symbol: .approvedSymbol}").unwrap();
        assert_eq!(result, json!({"id": "ENSG1", "symbol": "X"}));
    }

    #[test]
    fn slice_then_map() {
        let payload = json!({"data": {"search": {"hits": [
            {"id": "ENSG1", "entity": "target", "score": 9.1},
            {"id": "MONDO_1", "entity": "disease", "score": 5.0},
            {"id": "CHEMBL25", "entity": "drug", "score": 3.2},
            {"id": "ENSG2", "entity": "target", "score": 1.0},
        ]}}});
        let result = project(&payload, ".data.search.hits[:3] | map({id, entity})").unwrap();
        assert_eq!(
            result,
            json!([
                {"id": "ENSG1", "entity": "target"},
                {"id": "MONDO_1", "entity": "disease"},
                {"id": "CHEMBL25", "entity": "drug"},
            ])
        );
    }

    #[test]
    fn iteration_produces_an_array_of_outputs() {
        let payload = json!({"rows": [{"id": 1}, {"id": 2}]});
        let result = project(&payload, ".rows[] | .id").unwrap();
        assert_eq!(result, json!([1, 2]));
    }

    #[test]
    fn collect_wraps_a_stream() {
        let payload = json!([1, 2, 3]);
        assert_eq!(project(&payload, "[.[]]").unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn indexing_supports_negative_offsets() {
        let payload = json!({"hits": ["a", "b", "c"]});
        assert_eq!(project(&payload, ".hits[-1]").unwrap(), json!("c"));
        assert_eq!(project(&payload, ".hits[1]").unwrap(), json!("b"));
        assert_eq!(project(&payload, ".hits[9]").unwrap(), Value::Null);
    }

    #[test]
    fn missing_field_yields_null_and_null_propagates() {
        let payload = json!({"data": {}});
        assert_eq!(project(&payload, ".data.target").unwrap(), Value::Null);
        assert_eq!(project(&payload, ".data.target.id").unwrap(), Value::Null);
    }

    #[test]
    fn malformed_expression_is_a_parse_error() {
        let payload = json!({});
        for expr in ["] bad [", ".data | {unclosed", ".a..b", "frobnicate(.)", ""] {
            let result = project(&payload, expr);
            assert!(
                matches!(result, Err(ProjectionError::Parse(_))),
                "expected parse error for {expr:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn type_mismatch_is_an_evaluation_error() {
        let payload = json!({"data": 42});
        let result = project(&payload, ".data.target");
        assert!(matches!(result, Err(ProjectionError::Eval(_))));

        let result = project(&payload, ".data[]");
        assert!(matches!(result, Err(ProjectionError::Eval(_))));
    }

    #[test]
    fn optional_field_access_suppresses_type_errors() {
        let payload = json!({"data": 42});
        assert_eq!(project(&payload, ".data.target?").unwrap(), json!([]));
    }

    #[test]
    fn identical_inputs_yield_identical_outputs() {
        let payload = json!({"a": {"b": [1, 2, {"c": "d"}]}});
        let expr = ".a.b[2] | {c, all: .c}";
        assert_eq!(project(&payload, expr).unwrap(), project(&payload, expr).unwrap());
    }

    #[test]
    fn string_literals_and_keywords() {
        let payload = json!({});
        assert_eq!(
            project(&payload, r#"{kind: "metadata", missing: null, ok: true}"#).unwrap(),
            json!({"kind": "metadata", "missing": null, "ok": true})
        );
    }
}
