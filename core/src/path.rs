//! Navigation paths into JSON values.
//!
//! A path is a sequence of object keys and array indices written as `a.b[2].c`. The empty path
//! (written `""` or `"."`) refers to the value itself.

use crate::error::PathError;
use core::fmt;
use core::str::FromStr;
use serde_json::{Map, Value};

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed navigation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The path that refers to the value itself.
    pub fn root() -> Path {
        Path::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Path {
        Path { segments }
    }

    pub fn parse(path: &str) -> Result<Path, PathError> {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Path::root());
        }
        let invalid = |reason| PathError::Invalid {
            path: path.to_owned(),
            reason,
        };

        let mut segments = Vec::new();
        let mut key = String::new();
        // true right after a `]`, where only `.` or `[` may follow
        let mut after_index = false;
        let mut chars = trimmed.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if key.is_empty() && !after_index {
                        return Err(invalid("empty key"));
                    }
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    if chars.peek().is_none() {
                        return Err(invalid("trailing `.`"));
                    }
                    after_index = false;
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(_) => return Err(invalid("non-numeric index")),
                            None => return Err(invalid("unclosed `[`")),
                        }
                    }
                    if digits.is_empty() {
                        return Err(invalid("empty index"));
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| invalid("index too large"))?;
                    segments.push(Segment::Index(index));
                    after_index = true;
                }
                ']' => return Err(invalid("unexpected `]`")),
                c if c.is_whitespace() => return Err(invalid("whitespace in path")),
                c => {
                    if after_index {
                        return Err(invalid("expected `.` or `[` after an index"));
                    }
                    key.push(c);
                }
            }
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }
        Ok(Path { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Splits off the first key, if the path starts with one.
    pub fn split_first_key(&self) -> Option<(&str, Path)> {
        match self.segments.split_first() {
            Some((Segment::Key(key), rest)) => Some((key, Path::from_segments(rest.to_vec()))),
            _ => None,
        }
    }

    /// Navigates into `value`. Returns None if any step is missing or has the wrong type.
    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |value, segment| match segment {
                Segment::Key(key) => value.as_object()?.get(key),
                Segment::Index(index) => value.as_array()?.get(*index),
            })
    }

    /// Returns a copy of `target` with `new` placed at this path.
    ///
    /// Missing object keys are created along the way, as objects or (when the next step is an
    /// index) arrays. An index equal to the array length appends. `target` is never modified;
    /// on error nothing is returned.
    pub fn set(&self, target: &Value, new: Value) -> Result<Value, PathError> {
        let mut copy = target.clone();
        set_at(&mut copy, &self.segments, new)?;
        Ok(copy)
    }
}

fn set_at(slot: &mut Value, segments: &[Segment], new: Value) -> Result<(), PathError> {
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => {
            *slot = new;
            return Ok(());
        }
    };

    match first {
        Segment::Key(key) => {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            match slot {
                Value::Object(map) => {
                    let child = map
                        .entry(key.clone())
                        .or_insert_with(|| placeholder_for(rest));
                    set_at(child, rest, new)
                }
                other => Err(PathError::TypeMismatch {
                    segment: key.clone(),
                    found: kind_of(other),
                }),
            }
        }
        Segment::Index(index) => {
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            match slot {
                Value::Array(items) => {
                    if *index == items.len() {
                        items.push(placeholder_for(rest));
                    }
                    let len = items.len();
                    match items.get_mut(*index) {
                        Some(child) => set_at(child, rest, new),
                        None => Err(PathError::IndexOutOfBounds { index: *index, len }),
                    }
                }
                other => Err(PathError::TypeMismatch {
                    segment: format!("[{}]", index),
                    found: kind_of(other),
                }),
            }
        }
    }
}

fn placeholder_for(rest: &[Segment]) -> Value {
    match rest.first() {
        Some(Segment::Key(_)) => Value::Object(Map::new()),
        Some(Segment::Index(_)) => Value::Array(Vec::new()),
        None => Value::Null,
    }
}

/// A short name for the JSON type of a value.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Path, PathError> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, ".");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
