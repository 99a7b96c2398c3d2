//! Shader sources and preprocessor directives

use std::fmt;

use indexmap::IndexMap;

/// Value of a `#define`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectiveValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl fmt::Display for DirectiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveValue::Bool(value) => write!(f, "{}", i32::from(*value)),
            DirectiveValue::Int(value) => write!(f, "{value}"),
            // GLSL needs a decimal point to parse a float literal
            DirectiveValue::Float(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for DirectiveValue {
    fn from(value: bool) -> Self {
        DirectiveValue::Bool(value)
    }
}

impl From<i32> for DirectiveValue {
    fn from(value: i32) -> Self {
        DirectiveValue::Int(value)
    }
}

impl From<u32> for DirectiveValue {
    fn from(value: u32) -> Self {
        DirectiveValue::Int(value as i32)
    }
}

impl From<f32> for DirectiveValue {
    fn from(value: f32) -> Self {
        DirectiveValue::Float(value)
    }
}

/// Ordered `#define` map. Setting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    values: IndexMap<String, DirectiveValue>,
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<DirectiveValue>) -> &mut Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<DirectiveValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<DirectiveValue> {
        self.values.get(name).copied()
    }

    pub fn extend(&mut self, other: &Directives) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One `#define NAME VALUE` line per directive, in insertion order.
    pub fn render(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("#define {name} {value}\n"))
            .collect()
    }
}

/// Vertex and fragment text plus the directives prepended to both
#[derive(Debug, Clone, Default)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
    pub directives: Directives,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            directives: Directives::new(),
        }
    }

    pub fn with_directives(mut self, directives: Directives) -> Self {
        self.directives.extend(&directives);
        self
    }

    /// Final stage text: version header, then the defines, then the body.
    pub fn compose(&self, header: &str, body: &str) -> String {
        let mut text = String::with_capacity(header.len() + body.len() + 64);
        text.push_str(header);
        text.push('\n');
        text.push_str(&self.directives.render());
        text.push_str(body);
        text
    }
}

/// Line number reported by a driver compile log.
///
/// Understands `ERROR: 0:12: ...` (Mesa, ANGLE, Apple) and `0(12) : error ...` (NVIDIA).
pub fn error_line(log: &str) -> Option<usize> {
    for line in log.lines() {
        let line = line.trim();
        let rest = line.strip_prefix("ERROR:").unwrap_or(line).trim_start();

        if let Some((_, after)) = rest.split_once(':') {
            let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(number) = digits.parse() {
                return Some(number);
            }
        }
        if let Some((_, after)) = rest.split_once('(') {
            let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(number) = digits.parse() {
                return Some(number);
            }
        }
    }
    None
}

/// Numbered lines of `source` within `radius` of the 1-based `line`, the offending line marked.
pub fn source_window(source: &str, line: Option<usize>, radius: usize) -> String {
    let Some(line) = line else {
        return String::new();
    };
    let first = line.saturating_sub(radius).max(1);
    let last = line + radius;

    source
        .lines()
        .enumerate()
        .map(|(index, text)| (index + 1, text))
        .filter(|(number, _)| (first..=last).contains(number))
        .map(|(number, text)| {
            let marker = if number == line { ">" } else { " " };
            format!("{marker}{number:4} | {text}\n")
        })
        .collect()
}
