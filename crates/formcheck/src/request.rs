//! Submitted request data

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

/// HTTP method of the current request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String"))]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for methods other than GET and POST
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported request method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("get") {
            Ok(Self::Get)
        } else if s.eq_ignore_ascii_case("post") {
            Ok(Self::Post)
        } else {
            Err(UnsupportedMethod(s.to_string()))
        }
    }
}

impl TryFrom<String> for Method {
    type Error = UnsupportedMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A submitted value: a single string, or an ordered sequence for
/// `name[]`-style fields
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    Scalar(String),
    Sequence(Vec<String>),
}

impl FieldValue {
    fn map(&self, f: impl Fn(&str) -> String) -> Self {
        match self {
            Self::Scalar(value) => Self::Scalar(f(value.as_str())),
            Self::Sequence(values) => Self::Sequence(values.iter().map(|v| f(v.as_str())).collect()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        Self::Sequence(values)
    }
}

impl From<&[&str]> for FieldValue {
    fn from(values: &[&str]) -> Self {
        Self::Sequence(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// The current request: its method and the matching payload (query string
/// for GET, body for POST)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Request {
    pub method: Method,
    pub payload: IndexMap<String, FieldValue>,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            payload: IndexMap::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    /// Builder-style insert
    pub fn field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.payload.insert(name.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Copy of the request with backslash escaping removed from every value
    pub fn unescaped(&self) -> Self {
        Self {
            method: self.method,
            payload: self
                .payload
                .iter()
                .map(|(key, value)| (key.clone(), value.map(strip_slashes)))
                .collect(),
        }
    }
}

/// Undo backslash escaping: `\x` becomes `x`, `\\` becomes `\`, `\0` becomes NUL
pub fn strip_slashes(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => output.push('\0'),
            Some(next) => output.push(next),
            None => {}
        }
    }
    output
}
