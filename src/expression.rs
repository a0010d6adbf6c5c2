//! Template expression parser.
//!
//! Every string leaf of a template is an expression of the form
//! `scheme|locator`:
//!
//! | Scheme           | Locator                         |
//! |------------------|---------------------------------|
//! | `src:static`     | literal text                    |
//! | `src:query`      | inbound query parameter name    |
//! | `src:req_header` | inbound header name             |
//! | `src:res_header` | target response header name     |
//! | `src:req_body`   | locator into the inbound body   |
//! | `src:res_body`   | locator into the target body    |
//! | `src:func`       | `name(arg, arg, ...)`           |
//!
//! Function arguments starting with `src:` are nested expressions; any other
//! argument is passed to the plugin as a literal string.

use std::fmt;
use std::str::FromStr;

/// Separator between scheme and locator.
pub const SEPARATOR: char = '|';

/// Prefix shared by all schemes; marks nested expression arguments.
pub const SCHEME_PREFIX: &str = "src:";

/// Optional method suffix on plugin names (`score.Execute(...)`).
const EXECUTE_SUFFIX: &str = ".Execute";

/// Expression scheme tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Static,
    Query,
    RequestHeader,
    ResponseHeader,
    RequestBody,
    ResponseBody,
    Function,
}

impl Scheme {
    /// All schemes, in grammar order.
    pub const ALL: [Scheme; 7] = [
        Scheme::Static,
        Scheme::Query,
        Scheme::RequestHeader,
        Scheme::ResponseHeader,
        Scheme::RequestBody,
        Scheme::ResponseBody,
        Scheme::Function,
    ];

    /// The tag written in templates.
    pub fn tag(self) -> &'static str {
        match self {
            Scheme::Static => "src:static",
            Scheme::Query => "src:query",
            Scheme::RequestHeader => "src:req_header",
            Scheme::ResponseHeader => "src:res_header",
            Scheme::RequestBody => "src:req_body",
            Scheme::ResponseBody => "src:res_body",
            Scheme::Function => "src:func",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A parsed template leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Static(String),
    Query(String),
    RequestHeader(String),
    ResponseHeader(String),
    RequestBody(String),
    ResponseBody(String),
    Call(FunctionCall),
}

/// A plugin call: `name(arg, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Logical plugin name
    pub name: String,
    /// Arguments in call order
    pub args: Vec<Argument>,
}

/// One plugin call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Bare token, passed through as a string
    Literal(String),
    /// Nested expression, resolved before the call
    Expression(Box<Expression>),
    /// Nested expression that failed to parse; resolves to null
    Malformed {
        raw: String,
        error: ExpressionError,
    },
}

impl Expression {
    /// Parse a template leaf.
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let (tag, locator) = input
            .split_once(SEPARATOR)
            .ok_or_else(|| ExpressionError::MissingSeparator(input.to_string()))?;

        let scheme = Scheme::from_tag(tag)
            .ok_or_else(|| ExpressionError::UnknownScheme(tag.to_string()))?;

        let locator = locator.to_string();
        let expr = match scheme {
            Scheme::Static => Expression::Static(locator),
            Scheme::Query => Expression::Query(locator),
            Scheme::RequestHeader => Expression::RequestHeader(locator),
            Scheme::ResponseHeader => Expression::ResponseHeader(locator),
            Scheme::RequestBody => Expression::RequestBody(locator),
            Scheme::ResponseBody => Expression::ResponseBody(locator),
            Scheme::Function => Expression::Call(FunctionCall::parse(&locator)?),
        };

        Ok(expr)
    }

    /// The scheme this expression was written with.
    pub fn scheme(&self) -> Scheme {
        match self {
            Expression::Static(_) => Scheme::Static,
            Expression::Query(_) => Scheme::Query,
            Expression::RequestHeader(_) => Scheme::RequestHeader,
            Expression::ResponseHeader(_) => Scheme::ResponseHeader,
            Expression::RequestBody(_) => Scheme::RequestBody,
            Expression::ResponseBody(_) => Scheme::ResponseBody,
            Expression::Call(_) => Scheme::Function,
        }
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl FunctionCall {
    /// Parse `name(arg, arg, ...)`.
    pub fn parse(locator: &str) -> Result<Self, ExpressionError> {
        let (name, rest) = locator
            .split_once('(')
            .ok_or_else(|| ExpressionError::MalformedCall(locator.to_string()))?;

        let name = name.trim();
        let name = name.strip_suffix(EXECUTE_SUFFIX).unwrap_or(name);
        if name.is_empty() {
            return Err(ExpressionError::MalformedCall(locator.to_string()));
        }

        let args_str = rest.strip_suffix(')').unwrap_or(rest);
        let args = if args_str.trim().is_empty() {
            Vec::new()
        } else {
            split_args(args_str)
                .into_iter()
                .map(|arg| Argument::parse(arg.trim()))
                .collect()
        };

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }
}

impl Argument {
    fn parse(raw: &str) -> Self {
        if !raw.starts_with(SCHEME_PREFIX) {
            return Argument::Literal(raw.to_string());
        }
        match Expression::parse(raw) {
            Ok(expr) => Argument::Expression(Box::new(expr)),
            Err(error) => Argument::Malformed {
                raw: raw.to_string(),
                error,
            },
        }
    }
}

/// Split on top-level commas so nested calls keep their own argument lists.
fn split_args(input: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&input[start..]);

    args
}

/// Expression parse errors. Never fatal: the leaf resolves to null.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("missing '|' separator in expression: {0}")]
    MissingSeparator(String),

    #[error("unknown expression scheme: {0}")]
    UnknownScheme(String),

    #[error("invalid function call format: {0}")]
    MalformedCall(String),
}
