//! Identifier scanning over host-language source fragments.
//!
//! Clause values record which variables a governed loop references, and
//! backends need the same information to decide what a kernel captures.
//! Scanning is lexical: string literals and comments are skipped, keywords
//! and attribute names (`obj.attr`) are dropped.

use std::collections::BTreeSet;
use unicode_xid::UnicodeXID;

/// Reserved words of the host language.
pub const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Builtins that a generated kernel never needs to capture.
pub const BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "dict", "enumerate", "filter", "float", "int", "len", "list",
    "map", "max", "min", "print", "range", "reversed", "round", "set", "sorted", "str", "sum",
    "tuple", "zip",
];

/// Check whether a name is a host-language keyword.
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Check whether a name is a builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Check whether a string is a single valid identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_xid_start() => chars.all(|c| c.is_xid_continue()),
        _ => false,
    }
}

/// All identifiers referenced in `src`, in order of appearance, with
/// repeats. Keywords and attribute names are excluded.
pub fn identifiers(src: &str) -> Vec<String> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let mut after_dot = false;
    while i < chars.len() {
        let c = chars[i];
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '\'' || c == '"' {
            i = skip_string(&chars, i);
            after_dot = false;
            continue;
        }
        if c == '_' || c.is_xid_start() {
            let start = i;
            while i < chars.len() && chars[i].is_xid_continue() {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            // String prefixes such as f"..." or b'...'
            if matches!(chars.get(i), Some('\'') | Some('"')) && is_string_prefix(&word) {
                i = skip_string(&chars, i);
                after_dot = false;
                continue;
            }
            if !after_dot && !is_keyword(&word) {
                out.push(word);
            }
            after_dot = false;
            continue;
        }
        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_xid_continue() || chars[i] == '.') {
                i += 1;
            }
            after_dot = false;
            continue;
        }
        if !c.is_whitespace() {
            after_dot = c == '.';
        }
        i += 1;
    }
    out
}

/// The set of distinct variable names referenced in `src`, excluding builtins.
pub fn referenced_variables(src: &str) -> BTreeSet<String> {
    identifiers(src)
        .into_iter()
        .filter(|name| !is_builtin(name))
        .collect()
}

/// Names bound by simple assignments and `for` targets in `src`.
pub fn assigned_names(src: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for line in src.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("for ") {
            if let Some((target, _)) = rest.split_once(" in ") {
                names.extend(split_targets(target));
            }
            continue;
        }
        if let Some((lhs, rhs)) = trimmed.split_once('=') {
            let augmented = lhs.ends_with(|c: char| "+-*/%&|^<>!:".contains(c));
            if rhs.starts_with('=') || augmented {
                continue;
            }
            names.extend(split_targets(lhs));
        }
    }
    names
}

fn split_targets(targets: &str) -> impl Iterator<Item = String> + '_ {
    targets
        .split(',')
        .map(|t| t.trim().trim_matches(|c| c == '(' || c == ')').trim())
        .filter(|t| is_identifier(t))
        .map(str::to_string)
}

fn is_string_prefix(word: &str) -> bool {
    word.len() <= 2
        && word
            .chars()
            .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'u' | 'f'))
}

fn skip_string(chars: &[char], start: usize) -> usize {
    let q = chars[start];
    let triple = chars.get(start + 1) == Some(&q) && chars.get(start + 2) == Some(&q);
    let mut i = start + if triple { 3 } else { 1 };
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == q {
            if !triple {
                return i + 1;
            }
            if chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                return i + 3;
            }
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_skip_keywords_and_attributes() {
        let ids = identifiers("for x in ls:\n    out.append(x * scale)");
        assert_eq!(ids, vec!["x", "ls", "out", "x", "scale"]);
    }

    #[test]
    fn test_identifiers_skip_strings_and_comments() {
        let ids = identifiers("y = f\"{a}\" + 'b'  # c\nz");
        assert_eq!(ids, vec!["y", "z"]);
    }

    #[test]
    fn test_referenced_variables_drop_builtins() {
        let vars = referenced_variables("for i in range(len(a)):\n    a[i] = i");
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec!["a", "i"]);
    }

    #[test]
    fn test_assigned_names() {
        let names = assigned_names("a = 1\nb, c = 2, 3\nd += 1\nif e == 1:\n    pass\nfor i, j in z:\n    pass");
        let names: Vec<_> = names.into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c", "i", "j"]);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("total"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }
}
