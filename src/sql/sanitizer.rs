//! Rewriting of model output into an executable, bounded SELECT.
//!
//! The model answers with free text. Before anything reaches the database the
//! text goes through a fixed sequence of rewrites:
//!
//! 1. strip code fences and `sql:`/`query:` labels
//! 2. collapse runs of spaces and tabs
//! 3. require a `SELECT` keyword outside comments, and cut the
//!    text to the statement: leading prose and comments go, and so does
//!    anything after a stray closing fence
//! 4. remove pagination syntax foreign to the target dialect
//! 5. add the row cap unless the head SELECT already carries one
//! 6. qualify bare `FROM`/`JOIN` table names with the default schema
//! 7. reject any mutating verb anywhere in the reply, including the parts
//!    cut away in step 3
//! 8. terminate with exactly one `;`
//!
//! The head SELECT is the first one outside parentheses, so a CTE's outer
//! query gets the cap rather than its first definition. Comments and quoted
//! literals are never taken for SQL when locating it, nor when qualifying
//! tables. The verb check is a word match over the whole text, so a string
//! literal such as `'please delete'` is rejected as well. Running the output
//! through the sanitizer again yields the same text.

use crate::error::{AgentError, AgentResult};
use crate::models::DEFAULT_ROW_CAP;
use crate::sql::SqlDialect;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Verbs that never pass, whatever the statement looks like otherwise.
pub const DENIED_VERBS: [&str; 7] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "MERGE",
];

const DENIED_REASON: &str = "Only read-only SELECT statements are allowed.";

/// Words after FROM/JOIN that are never table names.
const NOT_A_TABLE: &[&str] = &[
    "SELECT", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "UNION", "ON", "LATERAL",
];

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex must compile")
}

// Fence with the language tag (if any) on its own line.
static FENCE_OPEN_LINE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^```([A-Za-z0-9_+-]*)[ \t]*\r?\n"));
// Fence followed by the statement on the same line.
static FENCE_OPEN_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)^```(?:(?:tsql|t-sql|sqlite|sql|mssql|postgresql|postgres|pgsql|mysql)\b)?[ \t]*")
});
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s*```[ \t]*$"));
static LABEL_COLON: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^\s*(?:t-?sql|sql|query)[ \t]*:\s*"));
static LABEL_LINE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^\s*(?:t-?sql|sql|query)[ \t]*\r?\n\s*"));
static HORIZONTAL_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"[ \t]+"));
static SELECT_KEYWORD: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\bSELECT\b"));
static STATEMENT_START: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\bSELECT\b|\bWITH\s+(?:RECURSIVE\s+)?[A-Za-z_][A-Za-z0-9_]*\s*(?:\([^)]*\)\s*)?AS\s*\(",
    )
});
// OFFSET is optional: `FETCH FIRST n ROWS ONLY` alone is foreign to both dialects.
static OFFSET_FETCH: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)(?:\bOFFSET\s+\d+\s+ROWS?\s+)?\bFETCH\s+(?:NEXT|FIRST)\s+(?:\d+\s+)?ROWS?\s+ONLY\s*;?",
    )
});
static LIMIT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\bLIMIT\s+\d+(?:\s*,\s*\d+)?(?:\s+OFFSET\s+\d+)?\s*;?")
});
static TOP_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bTOP\s*\(?\s*\d+\s*\)?(?:\s+PERCENT\b)?\s*"));
static SELECT_HEAD: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bSELECT\b\s*(?:(DISTINCT|ALL)\b\s*)?"));
static TABLE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(FROM|JOIN)\s+([A-Za-z_][A-Za-z0-9_]*)(\.)?"));
static DENIED_VERB: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(r"(?i)\b({})\b", DENIED_VERBS.join("|")))
});

/// A statement that went through [`Sanitizer::sanitize`].
///
/// Only the sanitizer constructs this type, so holding one means the text
/// starts with the statement (`SELECT`, `WITH` or an opening parenthesis),
/// carries a row cap outside any comment, contains none of [`DENIED_VERBS`]
/// and ends with a single `;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedQuery(String);

impl SanitizedQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for SanitizedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SanitizedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sanitizer configured for one target.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    dialect: SqlDialect,
    default_schema: Option<String>,
    row_cap: u32,
}

impl Sanitizer {
    /// `default_schema` of `None` (or empty) leaves bare table names alone.
    pub fn new(dialect: SqlDialect, default_schema: Option<String>, row_cap: u32) -> Self {
        let default_schema = default_schema.filter(|s| !s.trim().is_empty());
        Self {
            dialect,
            default_schema,
            row_cap: row_cap.max(1),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    pub fn row_cap(&self) -> u32 {
        self.row_cap
    }

    pub fn sanitize(&self, raw: &str) -> AgentResult<SanitizedQuery> {
        let text = strip_formatting(raw);
        let reply = HORIZONTAL_SPACE.replace_all(text.trim(), " ").into_owned();

        let Some(text) = cut_to_statement(&reply) else {
            return Err(AgentError::not_a_select(
                "the response does not contain a SELECT statement",
            ));
        };

        let text = self.strip_foreign_pagination(text);
        let text = self.apply_row_cap(&text);
        let text = match &self.default_schema {
            Some(schema) => qualify_tables(&text, schema),
            None => text,
        };

        // The parts cut away are checked too.
        if let Some(verb) = DENIED_VERB
            .captures(&text)
            .or_else(|| DENIED_VERB.captures(&reply))
        {
            return Err(AgentError::disallowed_statement(
                verb[1].to_uppercase(),
                DENIED_REASON,
            ));
        }

        Ok(SanitizedQuery(terminate(&text)))
    }

    fn strip_foreign_pagination(&self, text: &str) -> String {
        let text = OFFSET_FETCH.replace_all(text, "");
        let text = LIMIT_CLAUSE.replace_all(&text, "");
        match self.dialect {
            SqlDialect::TSql => text.into_owned(),
            SqlDialect::Limit => TOP_CLAUSE.replace_all(&text, "").into_owned(),
        }
    }

    fn apply_row_cap(&self, text: &str) -> String {
        match self.dialect {
            SqlDialect::TSql => {
                let Some(pos) = head_select(&code_only(text)) else {
                    return text.to_string();
                };
                let (before, rest) = text.split_at(pos);
                let Some(head) = SELECT_HEAD.captures(rest) else {
                    return text.to_string();
                };
                let head_end = head.get(0).map_or(0, |m| m.end());
                if TOP_CLAUSE
                    .find(&rest[head_end..])
                    .is_some_and(|top| top.start() == 0)
                {
                    return text.to_string();
                }
                let capped = match head.get(1) {
                    Some(quantifier) => format!(
                        "SELECT {} TOP {} ",
                        quantifier.as_str().to_uppercase(),
                        self.row_cap
                    ),
                    None => format!("SELECT TOP {} ", self.row_cap),
                };
                format!("{}{}{}", before, capped, &rest[head_end..])
            }
            SqlDialect::Limit => {
                let body = strip_terminators(text);
                format!("{}{}LIMIT {}", body, comment_closer(body), self.row_cap)
            }
        }
    }
}

/// Sanitize for SQL Server with the default row cap of 50.
///
/// ```
/// use sql_agent::sql::sanitize;
///
/// let query = sanitize("select * from Orders", "dbo").unwrap();
/// assert_eq!(query.as_str(), "SELECT TOP 50 * FROM dbo.Orders;");
/// ```
pub fn sanitize(raw: &str, default_schema: &str) -> AgentResult<SanitizedQuery> {
    Sanitizer::new(
        SqlDialect::TSql,
        Some(default_schema.to_string()),
        DEFAULT_ROW_CAP,
    )
    .sanitize(raw)
}

fn strip_formatting(raw: &str) -> String {
    let text = raw.trim();
    let tag_on_own_line = FENCE_OPEN_LINE.captures(text).is_some_and(|caps| {
        let tag = &caps[1];
        !tag.eq_ignore_ascii_case("select") && !tag.eq_ignore_ascii_case("with")
    });
    let text = if tag_on_own_line {
        FENCE_OPEN_LINE.replace(text, "")
    } else {
        FENCE_OPEN_INLINE.replace(text, "")
    };
    let text = FENCE_CLOSE.replace(&text, "");
    let text = LABEL_COLON.replace(&text, "");
    let text: Cow<'_, str> = LABEL_LINE.replace(&text, "");
    text.into_owned()
}

/// Where the statement starts and ends inside the reply, or `None` when no
/// SELECT appears outside comments.
fn cut_to_statement(text: &str) -> Option<&str> {
    // Literals are left visible: an apostrophe in leading prose would
    // otherwise hide the statement.
    let (code, _) = scan(text, false);
    if !SELECT_KEYWORD.is_match(&code) {
        return None;
    }
    let found = STATEMENT_START.find(&code)?.start();
    // Keep the parentheses that open a statement such as `(SELECT ...) UNION ...`.
    let before = &code[..found];
    let opening = &before[before
        .trim_end_matches(|c: char| c == '(' || c.is_whitespace())
        .len()..];
    let start = found - opening.trim_start().len();
    let end = code[start..].find("```").map_or(code.len(), |i| start + i);
    Some(text[start..end].trim())
}

/// Byte offset of the SELECT the row cap belongs to: the first one outside
/// parentheses, or the first one at all when every SELECT is nested.
fn head_select(code: &str) -> Option<usize> {
    let mut first = None;
    for m in SELECT_KEYWORD.find_iter(code) {
        if paren_depth(&code[..m.start()]) <= 0 {
            return Some(m.start());
        }
        first.get_or_insert(m.start());
    }
    first
}

fn paren_depth(code: &str) -> i32 {
    code.bytes().fold(0, |depth, b| match b {
        b'(' => depth + 1,
        b')' => depth - 1,
        _ => depth,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    LineComment,
    BlockComment,
    Quoted(char),
}

/// Blank out comments, and quoted literals when `literals` is set, byte for
/// byte so offsets found in the result are valid in `text`. Also returns the
/// state at the end of text.
fn scan(text: &str, literals: bool) -> (String, Scan) {
    let mut out = String::with_capacity(text.len());
    let mut state = Scan::Code;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let blank = match state {
            Scan::Code => match (c, chars.peek().copied()) {
                ('-', Some('-')) => {
                    state = Scan::LineComment;
                    true
                }
                ('/', Some('*')) => {
                    chars.next();
                    out.push_str("  ");
                    state = Scan::BlockComment;
                    continue;
                }
                ('\'' | '"', _) if literals => {
                    state = Scan::Quoted(c);
                    true
                }
                _ => false,
            },
            Scan::LineComment if c == '\n' => {
                state = Scan::Code;
                false
            }
            Scan::LineComment => true,
            Scan::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = Scan::Code;
                    continue;
                }
                true
            }
            Scan::Quoted(quote) => {
                if c == quote {
                    state = Scan::Code;
                }
                true
            }
        };

        if blank {
            out.extend(std::iter::repeat_n(' ', c.len_utf8()));
        } else {
            out.push(c);
        }
    }
    (out, state)
}

fn code_only(text: &str) -> String {
    scan(text, true).0
}

/// What to put between `text` and a trailing clause so the clause is not
/// swallowed by a comment left open at the end.
fn comment_closer(text: &str) -> &'static str {
    match scan(text, true).1 {
        Scan::LineComment => "\n",
        Scan::BlockComment => " */ ",
        Scan::Code | Scan::Quoted(_) => " ",
    }
}

fn qualify_tables(text: &str, schema: &str) -> String {
    let code = code_only(text);
    TABLE_REFERENCE
        .replace_all(text, |caps: &Captures| {
            let ident = &caps[2];
            let start = caps.get(0).map_or(0, |m| m.start());
            let in_code = code.as_bytes().get(start).is_some_and(|b| *b != b' ');
            if !in_code
                || caps.get(3).is_some()
                || NOT_A_TABLE.iter().any(|k| ident.eq_ignore_ascii_case(k))
            {
                caps[0].to_string()
            } else {
                format!("{} {}.{}", caps[1].to_uppercase(), schema, ident)
            }
        })
        .into_owned()
}

fn strip_terminators(text: &str) -> &str {
    text.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

fn terminate(text: &str) -> String {
    let body = strip_terminators(text);
    match scan(body, true).1 {
        Scan::LineComment => format!("{}\n;", body),
        Scan::BlockComment => format!("{} */;", body),
        Scan::Code | Scan::Quoted(_) => format!("{};", body),
    }
}
