//! Calling context of the function being compiled.
//!
//! This is the data a context extractor hands to the compiler: the raw
//! function source, its parameter names, and the auxiliary functions and
//! module aliases visible from the callee and caller scopes. Auxiliary
//! sources are opaque; they are copied into the generated unit verbatim.

use crate::utils::errors::{AccResult, SyntaxError, SyntaxErrorKind};
use crate::utils::source::{split_top_level, SourceText};
use serde::{Deserialize, Serialize};

/// A module imported under an alias (`import numpy as np`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAlias {
    pub alias: String,
    pub module: String,
}

impl ModuleAlias {
    pub fn new(alias: impl Into<String>, module: impl Into<String>) -> Self {
        Self { alias: alias.into(), module: module.into() }
    }

    /// The import statement binding this alias.
    pub fn import_statement(&self) -> String {
        if self.alias == self.module {
            format!("import {}", self.module)
        } else {
            format!("import {} as {}", self.module, self.alias)
        }
    }
}

/// Everything the compiler knows about the annotated function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionContext {
    /// Function source, including its signature
    pub source: String,
    pub name: String,
    /// Parameters as written in the signature, with defaults but without
    /// annotations (`k=2`, `*rest`)
    pub parameters: Vec<String>,
    /// Functions visible from the function's own module
    pub callee_functions: Vec<String>,
    /// Functions visible from the caller's module
    pub caller_functions: Vec<String>,
    pub callee_modules: Vec<ModuleAlias>,
    pub caller_modules: Vec<ModuleAlias>,
}

impl FunctionContext {
    /// A context over a bare block of source with no signature.
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), ..Self::default() }
    }

    /// Build a context from function source, taking the name and parameters
    /// from its `def` line. Decorator and comment lines before it are skipped.
    pub fn from_function(source: impl Into<String>) -> AccResult<Self> {
        let source = source.into();
        let text = SourceText::new(&source);
        let def_line = find_def(&text).ok_or_else(|| {
            SyntaxError::new(SyntaxErrorKind::MissingStatement, 0, "no function definition found")
        })?;
        let signature = text.text(def_line..text.statement_end(def_line) + 1);
        let (name, parameters) = parse_signature(&signature).ok_or_else(|| {
            SyntaxError::new(SyntaxErrorKind::InvalidArgument, def_line, "malformed function signature")
        })?;
        Ok(Self { source, name, parameters, ..Self::default() })
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_callee_functions(mut self, functions: Vec<String>) -> Self {
        self.callee_functions = functions;
        self
    }

    pub fn with_caller_functions(mut self, functions: Vec<String>) -> Self {
        self.caller_functions = functions;
        self
    }

    pub fn with_callee_modules(mut self, modules: Vec<ModuleAlias>) -> Self {
        self.callee_modules = modules;
        self
    }

    pub fn with_caller_modules(mut self, modules: Vec<ModuleAlias>) -> Self {
        self.caller_modules = modules;
        self
    }

    /// First line of the function body: the line after the (possibly
    /// multi-line) signature, or 0 when the source has no `def`.
    pub fn body_start(&self) -> usize {
        let text = SourceText::new(&self.source);
        find_def(&text).map_or(0, |def| text.statement_end(def) + 1)
    }

    /// Bare parameter names, without stars or defaults.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .map(|p| parameter_name(p))
            .filter(|p| !p.is_empty() && *p != "/")
            .collect()
    }
}

fn find_def(text: &SourceText) -> Option<usize> {
    (0..text.len()).find(|&l| {
        let info = text.info(l);
        let code = info.map_or(false, |i| i.starts_statement());
        let line = text.line(l).unwrap_or("").trim_start();
        code && (line.starts_with("def ") || line.starts_with("async def "))
    })
}

/// Split `def name(a, b: int = 1, *args):` into the name and parameters.
fn parse_signature(signature: &str) -> Option<(String, Vec<String>)> {
    let rest = signature.trim_start();
    let rest = rest.strip_prefix("async ").unwrap_or(rest);
    let rest = rest.strip_prefix("def ")?.trim_start();
    let open = rest.find('(')?;
    let name = rest[..open].trim().to_string();
    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in rest[open..].char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let inner = &rest[open + 1..close?];
    let parameters = split_top_level(inner, ',')
        .into_iter()
        .map(signature_parameter)
        .filter(|p| !p.is_empty())
        .collect();
    Some((name, parameters))
}

/// `b: int = 1` becomes `b=1`; `*args: str` becomes `*args`.
fn signature_parameter(text: &str) -> String {
    let mut parts = split_top_level(text, '=').into_iter();
    let head = parts.next().unwrap_or("");
    let name = head.split(':').next().unwrap_or("").trim();
    let default = parts.collect::<Vec<_>>().join("=");
    let default = default.trim();
    if default.is_empty() {
        name.to_string()
    } else {
        format!("{}={}", name, default)
    }
}

fn parameter_name(parameter: &str) -> &str {
    parameter
        .split('=')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_function() {
        let ctx = FunctionContext::from_function(
            "@jit\ndef scale(ls: list, k: int = 2, *rest, **kw):\n    return ls\n",
        )
        .unwrap();
        assert_eq!(ctx.name, "scale");
        assert_eq!(ctx.parameters, vec!["ls", "k=2", "*rest", "**kw"]);
        assert_eq!(ctx.parameter_names(), vec!["ls", "k", "rest", "kw"]);
        assert_eq!(ctx.body_start(), 2);
    }

    #[test]
    fn test_multiline_signature() {
        let ctx = FunctionContext::from_function("def f(a,\n      b):\n    pass").unwrap();
        assert_eq!(ctx.parameters, vec!["a", "b"]);
        assert_eq!(ctx.body_start(), 2);
    }

    #[test]
    fn test_defaults_survive_and_names_are_bare() {
        let ctx = FunctionContext::from_function(
            "def f(a, /, b={'x': 1}, *, key=lambda v: v == 0):\n    return a",
        )
        .unwrap();
        assert_eq!(ctx.parameters, vec!["a", "/", "b={'x': 1}", "*", "key=lambda v: v == 0"]);
        assert_eq!(ctx.parameter_names(), vec!["a", "b", "key"]);
    }

    #[test]
    fn test_missing_def() {
        assert!(FunctionContext::from_function("x = 1").is_err());
        assert_eq!(FunctionContext::new("x = 1").body_start(), 0);
    }

    #[test]
    fn test_module_alias_import() {
        assert_eq!(ModuleAlias::new("np", "numpy").import_statement(), "import numpy as np");
        assert_eq!(ModuleAlias::new("math", "math").import_statement(), "import math");
    }
}
