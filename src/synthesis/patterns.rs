//! T-SQL text helpers
//!
//! Identifier quoting and the regex-based extraction used by the
//! synthesizers. Every extractor returns `Option`: callers turn a failed
//! parse into an inline comment rather than an error.

use once_cell::sync::Lazy;
use regex::Regex;

static NOT_NULL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNOT\s+NULL\b").expect("valid NOT NULL regex"));

static NULL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNULL\b").expect("valid NULL regex"));

static DEFAULT_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDEFAULT\b").expect("valid DEFAULT regex"));

static FOR_COLUMN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^FOR\s+(?:\[((?:[^\]]|\]\])+)\]|(\w+))").expect("valid FOR column regex")
});

static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bIDENTITY\b\s*(?:\(\s*-?\d+\s*,\s*-?\d+\s*\))?")
        .expect("valid IDENTITY regex")
});

static NOT_FOR_REPLICATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bNOT\s+FOR\s+REPLICATION\b").expect("valid NOT FOR REPLICATION regex")
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Constraint name patterns, most specific first
static CONSTRAINT_NAME_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bADD\s+CONSTRAINT\s+\[([^\]]+)\]",
        r"(?i)\bADD\s+CONSTRAINT\s+([^\s\[\]\(]+)",
        r"(?i)\bCONSTRAINT\s+\[([^\]]+)\]",
        r"(?i)\bCONSTRAINT\s+([^\s\[\]\(]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid constraint name regex"))
    .collect()
});

/// Bracket-quote an identifier, tolerating names that arrive already quoted
pub fn quote_ident(name: &str) -> String {
    let bare = name.trim();
    let bare = bare
        .strip_prefix('[')
        .and_then(|n| n.strip_suffix(']'))
        .unwrap_or(bare);
    format!("[{}]", bare.replace(']', "]]"))
}

/// `[schema].[name]`
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Escape text for use inside a `'...'` string literal
pub fn sql_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Trim whitespace and trailing statement terminators
pub fn strip_terminator(definition: &str) -> String {
    definition.trim().trim_end_matches(';').trim_end().to_string()
}

pub fn has_not_null(definition: &str) -> bool {
    NOT_NULL_RE.is_match(definition)
}

pub fn has_default(definition: &str) -> bool {
    DEFAULT_KEYWORD_RE.is_match(definition)
}

/// Extract the expression of a DEFAULT constraint, without redundant outer
/// parentheses: `DEFAULT ((0)) FOR [C]` yields `0`.
pub fn extract_default_expression(definition: &str) -> Option<String> {
    let (start, end) = default_expression_span(definition)?;
    let raw = strip_terminator(&definition[start..end]);

    let balanced = balance_parens(&raw);
    let expression = strip_outer_parens(&balanced);
    if expression.is_empty() {
        None
    } else {
        Some(expression)
    }
}

/// Byte range of the expression after `DEFAULT`, ending at its `FOR`
/// clause or at the end of the definition
fn default_expression_span(definition: &str) -> Option<(usize, usize)> {
    let keyword = find_keyword(definition, 0, "DEFAULT")?;
    let start = keyword + "DEFAULT".len();
    let end = find_keyword(definition, start, "FOR").unwrap_or(definition.len());
    Some((start, end))
}

/// First `keyword` at or after `from` that sits outside string literals and
/// bracketed identifiers. A match at parenthesis depth 0 wins; an unbalanced
/// expression falls back to the first match at any depth.
fn find_keyword(text: &str, from: usize, keyword: &str) -> Option<usize> {
    let mut nested = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_bracket = false;
    let mut chars = text.get(from..)?.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        let at = from + offset;
        match ch {
            '\'' if !in_bracket => in_string = !in_string,
            '[' if !in_string && !in_bracket => in_bracket = true,
            ']' if in_bracket => {
                if chars.peek().is_some_and(|&(_, next)| next == ']') {
                    chars.next();
                } else {
                    in_bracket = false;
                }
            }
            '(' if !in_string && !in_bracket => depth += 1,
            ')' if !in_string && !in_bracket => depth = depth.saturating_sub(1),
            _ if !in_string && !in_bracket && keyword_at(text, at, keyword) => {
                if depth == 0 {
                    return Some(at);
                }
                nested.get_or_insert(at);
            }
            _ => {}
        }
    }
    nested
}

/// `keyword` as a whole word at byte `at`, ignoring case
fn keyword_at(text: &str, at: usize, keyword: &str) -> bool {
    let end = at + keyword.len();
    let Some(candidate) = text.get(at..end) else {
        return false;
    };
    candidate.eq_ignore_ascii_case(keyword)
        && !text[..at].chars().next_back().is_some_and(is_word_char)
        && !text[end..].chars().next().is_some_and(is_word_char)
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '@' | '#' | '$')
}

/// Drop closing parentheses that have no opener and append the ones that
/// are missing. Parentheses inside string literals are ignored.
pub fn balance_parens(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len() + 2);
    let mut depth = 0usize;
    let mut in_string = false;

    for ch in expression.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                out.push(ch);
            }
            ')' if !in_string => {
                if depth > 0 {
                    depth -= 1;
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    for _ in 0..depth {
        out.push(')');
    }
    out
}

/// Remove parentheses that wrap the whole expression: `((0))` -> `0`,
/// but `(1) + (2)` is left alone.
pub fn strip_outer_parens(expression: &str) -> String {
    let mut current = expression.trim();
    while current.starts_with('(') && matching_close(current) == Some(current.len() - 1) {
        current = current[1..current.len() - 1].trim();
    }
    current.to_string()
}

/// Byte index of the parenthesis closing the one at index 0
fn matching_close(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Put `DEFAULT (<expr>)` right before the last `NOT NULL`, or at the end
/// of a nullable definition.
pub fn splice_default(definition: &str, expression: &str) -> String {
    let definition = strip_terminator(definition);
    let clause = format!("DEFAULT ({})", expression);

    match NOT_NULL_RE.find_iter(&definition).last() {
        Some(m) => format!(
            "{}{} {}",
            &definition[..m.start()],
            clause,
            &definition[m.start()..]
        ),
        None => format!("{} {}", definition, clause),
    }
}

/// Constraint name from a definition, via the layered patterns
pub fn constraint_name(definition: &str) -> Option<String> {
    CONSTRAINT_NAME_RES.iter().find_map(|re| {
        re.captures(definition)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
    })
}

/// Column named by `... FOR [Column]` in a default constraint. Only the
/// `FOR` that ends the DEFAULT expression counts, so text inside the
/// expression's string literals is never taken for the column.
pub fn default_target_column(definition: &str) -> Option<String> {
    let (_, end) = default_expression_span(definition)?;
    let caps = FOR_COLUMN_RE.captures(&definition[end..])?;
    caps.get(1)
        .map(|m| m.as_str().replace("]]", "]"))
        .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
}

/// Rewrite a column definition into `ALTER COLUMN` form: identity and
/// replication markers removed, nullability moved to the end.
pub fn normalize_alter_column(definition: &str) -> String {
    let body = strip_terminator(definition);
    let body = NOT_FOR_REPLICATION_RE.replace_all(&body, " ");
    let body = IDENTITY_RE.replace_all(&body, " ");

    let (nullability, body) = if NOT_NULL_RE.is_match(&body) {
        (Some("NOT NULL"), NOT_NULL_RE.replace_all(&body, " ").into_owned())
    } else if NULL_RE.is_match(&body) {
        (Some("NULL"), NULL_RE.replace_all(&body, " ").into_owned())
    } else {
        (None, body.into_owned())
    };

    let body = WHITESPACE_RE.replace_all(body.trim(), " ").into_owned();
    match nullability {
        Some(n) => format!("{} {}", body, n),
        None => body,
    }
}

/// Script that drops whatever default constraint currently sits on a
/// column. Needed because inline or auto-generated defaults get
/// unpredictable system names.
pub fn drop_existing_default_sql(schema: &str, table: &str, column: &str) -> String {
    let target = qualified(schema, table);
    format!(
        "DECLARE @ExistingDefault sysname;\n\
         SELECT @ExistingDefault = dc.name\n\
         FROM sys.default_constraints dc\n\
         INNER JOIN sys.columns c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id\n\
         WHERE dc.parent_object_id = OBJECT_ID(N'{target}') AND c.name = N'{column}';\n\
         IF @ExistingDefault IS NOT NULL\n    \
         EXEC(N'ALTER TABLE {target} DROP CONSTRAINT ' + QUOTENAME(@ExistingDefault));",
        target = sql_literal(&target),
        column = sql_literal(column.trim_matches(|c| c == '[' || c == ']')),
    )
}

/// Case-insensitive identifier comparison, ignoring brackets
pub fn same_ident(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.trim().trim_start_matches('[').trim_end_matches(']').to_string();
    strip(a).eq_ignore_ascii_case(&strip(b))
}
