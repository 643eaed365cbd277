//! Black-box fuzzing of the sanitizer.
//!
//! Random, malicious and edge-case model replies must never panic, and any
//! statement that comes out must satisfy the sanitizer's guarantees.

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use regex::Regex;
use sql_agent::sql::{DENIED_VERBS, Sanitizer, SqlDialect};

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Model replies that have gone wrong in interesting ways
fn edge_case_replies() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "üöÄ".repeat(100),
        "```".to_string(),
        "``````".to_string(),
        "```sql\n```".to_string(),
        "sql:".to_string(),
        "SELECT".to_string(),
        "select;".to_string(),
        ";;;SELECT;;;".to_string(),
        "'OR 1=1--".to_string(),
        "SELECT * FROM users WHERE name = ''; DROP TABLE users--".to_string(),
        "SELECT * FROM users -- trailing comment".to_string(),
        "-- select the customers\nSELECT * FROM customers".to_string(),
        "-- top 5 customers\nSELECT name FROM customers".to_string(),
        "/* select everything */ SELECT * FROM users".to_string(),
        "/* unterminated select".to_string(),
        "SELECT name FROM users /* open comment".to_string(),
        "Here's the query: SELECT name FROM users WHERE status = 'open'".to_string(),
        "SELECT * FROM users ORDER BY id FETCH FIRST 10 ROWS ONLY".to_string(),
        "(SELECT id FROM users) UNION (SELECT id FROM admins)".to_string(),
        "SELECT * FROM users LIMIT 10 OFFSET 5".to_string(),
        "SELECT * FROM users LIMIT 5, 10".to_string(),
        "SELECT TOP (10) PERCENT * FROM users".to_string(),
        "WITH t AS (SELECT 1 AS x) SELECT x FROM t".to_string(),
        "SELECT * FROM (SELECT id FROM users) u".to_string(),
        "SELECT\tDISTINCT\t\tname\tFROM\tusers".to_string(),
        "Here is the query:\n```sql\nSELECT 1\n```\nHope this helps!".to_string(),
        "SELECT * FROM users; EXEC xp_cmdshell 'dir'".to_string(),
        "a".repeat(10000),
        format!("SELECT {} FROM t", "a,".repeat(1000)),
        random_string(100),
        random_string(1000),
        format!("SELECT {}", random_string(200)),
    ]
}

fn sanitizers() -> Vec<Sanitizer> {
    vec![
        Sanitizer::new(SqlDialect::TSql, Some("dbo".to_string()), 50),
        Sanitizer::new(SqlDialect::Limit, Some("main".to_string()), 50),
        Sanitizer::new(SqlDialect::Limit, None, 7),
    ]
}

/// The output with comments and quoted literals blanked out.
fn code_view(out: &str) -> String {
    let hidden = Regex::new(r#"(?s)--[^\n]*|/\*.*?(?:\*/|$)|'[^']*(?:'|$)|"[^"]*(?:"|$)"#).unwrap();
    hidden
        .replace_all(out, |caps: &regex::Captures| " ".repeat(caps[0].len()))
        .into_owned()
}

/// Text after the SELECT that owns the row cap: the first one outside
/// parentheses, else the first one.
fn after_head_select(code: &str) -> Option<&str> {
    let select = Regex::new(r"(?i)\bSELECT\b").unwrap();
    let depth = |s: &str| {
        s.bytes().fold(0i32, |d, b| match b {
            b'(' => d + 1,
            b')' => d - 1,
            _ => d,
        })
    };
    let mut first = None;
    for m in select.find_iter(code) {
        if depth(&code[..m.start()]) <= 0 {
            return Some(&code[m.start()..]);
        }
        first.get_or_insert(&code[m.start()..]);
    }
    first
}

fn assert_guarantees(sanitizer: &Sanitizer, raw: &str, out: &str) {
    let denied = Regex::new(&format!(r"(?i)\b({})\b", DENIED_VERBS.join("|"))).unwrap();
    assert!(!denied.is_match(out), "denied verb in {:?} (from {:?})", out, raw);
    assert!(out.ends_with(';'), "missing terminator: {:?}", out);
    assert!(!out.ends_with(";;"), "double terminator: {:?}", out);
    assert!(
        out.to_uppercase().contains("SELECT"),
        "no SELECT in {:?}",
        out
    );

    let code = code_view(out);
    assert!(code.trim_end().ends_with(';'), "terminator in a comment: {:?}", out);

    match sanitizer.dialect() {
        SqlDialect::TSql => {
            let head = after_head_select(&code)
                .unwrap_or_else(|| panic!("no SELECT outside comments in {:?}", out));
            let capped = Regex::new(r"(?i)^SELECT\s*(?:(?:DISTINCT|ALL)\s+)?TOP\s*\(?\s*\d+").unwrap();
            assert!(capped.is_match(head), "head SELECT not capped in {:?}", out);
        }
        SqlDialect::Limit => {
            let limits = Regex::new(r"(?i)\bLIMIT\s+\d+").unwrap();
            assert_eq!(limits.find_iter(out).count(), 1, "limit count in {:?}", out);
            assert_eq!(
                limits.find_iter(&code).count(),
                1,
                "limit hidden in a comment in {:?}",
                out
            );
        }
    }
}

#[test]
fn fuzz_edge_case_replies_never_panic() {
    for sanitizer in sanitizers() {
        for raw in edge_case_replies() {
            if let Ok(q) = sanitizer.sanitize(&raw) {
                assert_guarantees(&sanitizer, &raw, q.as_str());
            }
        }
    }
}

#[test]
fn fuzz_random_select_fragments() {
    let fragments = [
        "SELECT", "select", "DISTINCT", "TOP 3", "*", "id,", "name", "FROM", "from", "JOIN",
        "orders", "o", "dbo.orders", "WHERE", "id", "=", "1", "AND", "LIMIT 4", "OFFSET 2",
        "ORDER BY", "GROUP BY", "(", ")", ";", "--", "'x'", "```", "sql:", "\n", "\t",
        "delete", "updated_at", "inserted", "merge_key",
    ];
    let mut rng = rand::thread_rng();

    for _ in 0..500 {
        let len = rng.gen_range(1..20);
        let raw = (0..len)
            .map(|_| *fragments.choose(&mut rng).unwrap())
            .collect::<Vec<_>>()
            .join(" ");

        for sanitizer in sanitizers() {
            if let Ok(q) = sanitizer.sanitize(&raw) {
                assert_guarantees(&sanitizer, &raw, q.as_str());
            }
        }
    }
}

#[test]
fn fuzz_sanitized_output_is_stable() {
    let sanitizer = Sanitizer::new(SqlDialect::TSql, Some("dbo".to_string()), 50);
    let tables = ["Orders", "Customers", "Products", "dbo.Items"];
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
        let table = tables.choose(&mut rng).unwrap();
        let distinct = if rng.gen_bool(0.5) { "DISTINCT " } else { "" };
        let limit = if rng.gen_bool(0.5) {
            format!(" LIMIT {}", rng.gen_range(1..1000))
        } else {
            String::new()
        };
        let raw = format!("select {}{} from {}{}", distinct, random_string(8), table, limit);

        let once = sanitizer.sanitize(&raw).unwrap();
        let twice = sanitizer.sanitize(once.as_str()).unwrap();
        assert_eq!(once, twice, "unstable for {:?}", raw);
    }
}
