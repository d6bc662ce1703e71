//! Annotation tokenizer.
//!
//! Splits the text after the framework keyword into tokens and resolves the
//! leading directive keyword, including the two-word `enter data` /
//! `exit data` spellings, a directive-level argument such as `cache(a)`,
//! and the fused `<compute> loop` form.

use crate::ir::directive::DirectiveKind;
use crate::ir::node::DirectiveArgument;
use crate::utils::errors::{AccResult, SyntaxError, SyntaxErrorKind};
use crate::utils::source::split_top_level;

/// A tokenized annotation, before clause parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub line: usize,
    pub kind: DirectiveKind,
    pub argument: Option<DirectiveArgument>,
    /// A compute keyword immediately followed by `loop`
    pub hybrid: bool,
    /// Remaining clause tokens, in order
    pub tokens: Vec<String>,
}

/// Split annotation text into tokens.
///
/// Whitespace and commas outside parentheses separate tokens, so
/// `reduction(+: a, b)` is a single token while `copy(a), copyin(b)` is two.
pub fn tokenize(text: &str, line: usize) -> AccResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    SyntaxError::new(SyntaxErrorKind::UnbalancedParens, line, "unexpected `)`")
                })?;
                current.push(c);
            }
            c if depth == 0 && (c.is_whitespace() || c == ',') => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if depth > 0 {
        return Err(SyntaxError::new(SyntaxErrorKind::UnbalancedParens, line, "unclosed `(`").into());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Split a token into its keyword and parenthesized argument, if any.
///
/// `collapse(2)` gives `("collapse", Some("2"))`, `seq` gives `("seq", None)`.
pub fn split_keyword(token: &str) -> (&str, Option<&str>) {
    match token.find('(') {
        Some(open) if token.ends_with(')') => (&token[..open], Some(&token[open + 1..token.len() - 1])),
        _ => (token, None),
    }
}

/// Split a comma separated argument list, trimming each item.
pub fn argument_list(args: &str) -> Vec<String> {
    split_top_level(args, ',')
        .into_iter()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokenize an annotation body and resolve its directive.
pub fn parse_pragma(body: &str, line: usize) -> AccResult<Pragma> {
    let tokens = tokenize(body, line)?;
    let mut rest = tokens.into_iter().peekable();
    let first = rest.next().ok_or_else(|| {
        SyntaxError::new(SyntaxErrorKind::MissingDirective, line, "annotation has no directive")
    })?;

    let (keyword, arg) = split_keyword(&first);
    let mut keyword = keyword.to_string();
    let mut arg = arg.map(str::to_string);

    if (keyword == "enter" || keyword == "exit")
        && arg.is_none()
        && rest.next_if(|t| t == "data").is_some()
    {
        keyword = format!("{}_data", keyword);
    }

    let kind = DirectiveKind::from_keyword(&keyword).ok_or_else(|| {
        SyntaxError::new(
            SyntaxErrorKind::UnknownDirective,
            line,
            format!("unknown directive `{}`", keyword),
        )
    })?;

    if arg.is_none() && takes_argument(kind) {
        if let Some(next) = rest.next_if(|t| t.starts_with('(')) {
            let (_, inner) = split_keyword(&next);
            arg = inner.map(str::to_string);
        }
    }
    let argument = directive_argument(kind, arg.as_deref(), line)?;

    let hybrid = kind.is_compute() && rest.next_if(|t| t == "loop").is_some();

    Ok(Pragma {
        line,
        kind,
        argument,
        hybrid,
        tokens: rest.collect(),
    })
}

fn takes_argument(kind: DirectiveKind) -> bool {
    matches!(kind, DirectiveKind::Cache | DirectiveKind::Wait | DirectiveKind::Routine)
}

fn directive_argument(
    kind: DirectiveKind,
    arg: Option<&str>,
    line: usize,
) -> AccResult<Option<DirectiveArgument>> {
    let invalid = |msg: String| SyntaxError::new(SyntaxErrorKind::InvalidArgument, line, msg);
    let Some(arg) = arg else {
        if kind == DirectiveKind::Cache {
            return Err(invalid("`cache` needs a variable list".to_string()).into());
        }
        return Ok(None);
    };
    if !takes_argument(kind) {
        return Err(invalid(format!("`{}` takes no argument", kind)).into());
    }
    let items = argument_list(arg);
    if items.is_empty() {
        return Err(invalid(format!("empty argument to `{}`", kind)).into());
    }
    let argument = match kind {
        DirectiveKind::Cache => DirectiveArgument::Vars(items),
        DirectiveKind::Wait => DirectiveArgument::Queues(items),
        _ if items.len() == 1 => DirectiveArgument::Name(items[0].clone()),
        _ => return Err(invalid("`routine` names a single function".to_string()).into()),
    };
    Ok(Some(argument))
}
