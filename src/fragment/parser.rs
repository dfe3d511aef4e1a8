//! Source fragment parser
//!
//! Grammar, one statement per logical line:
//!
//! ```text
//! NAME = value           # value is a TOML literal or another NAME
//! NAME += value
//! del NAME
//! include("a.conf", optional("b.conf"), one_of("c.conf", compiled("d.confc")),
//!         resource("pkg.name", "e.conf"))
//! ```
//!
//! A statement continues on the next line while brackets are open.

use regex_lite::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

use super::{Expr, Fragment, SpecExpr, Statement};
use crate::error::{IncludeError, Result};

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\s*(\+=|=)\s*(.*)$").expect("assignment regex")
    })
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("name regex"))
}

/// Parse source text into a fragment tied to `path`
pub fn parse(path: &Path, text: &str) -> Result<Fragment> {
    let mut statements = Vec::new();
    for (line, source) in logical_lines(path, text)? {
        let statement =
            parse_statement(&source, line).map_err(|message| parse_error(path, line, message))?;
        statements.push(statement);
    }
    Ok(Fragment::new(path, statements))
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> IncludeError {
    IncludeError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Join physical lines into statements, dropping comments and blank lines
fn logical_lines(path: &Path, text: &str) -> Result<Vec<(usize, String)>> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut start = 0;
    let mut depth = 0i32;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let (code, delta) = scan_line(raw).map_err(|message| parse_error(path, line, message))?;

        if buf.is_empty() {
            if code.trim().is_empty() {
                continue;
            }
            start = line;
        } else {
            buf.push('\n');
        }
        buf.push_str(code);

        depth += delta;
        if depth < 0 {
            return Err(parse_error(path, line, "unbalanced closing bracket"));
        }
        if depth == 0 {
            out.push((start, buf.trim().to_string()));
            buf.clear();
        }
    }

    if !buf.is_empty() {
        return Err(parse_error(path, start, "unclosed bracket"));
    }
    Ok(out)
}

/// Strip a trailing comment and count the bracket balance of one line
fn scan_line(raw: &str) -> std::result::Result<(&str, i32), String> {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '#' => return Ok((&raw[..i], depth)),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }

    if quote.is_some() {
        return Err("unterminated string".to_string());
    }
    Ok((raw, depth))
}

fn parse_statement(source: &str, line: usize) -> std::result::Result<Statement, String> {
    if let Some(rest) = source.strip_prefix("include") {
        if rest.trim_start().starts_with('(') {
            let specs = parse_include(rest)?;
            return Ok(Statement::Include { specs, line });
        }
    }

    // `del = 1` assigns a name called del
    if let Some(name) = source.strip_prefix("del ").map(str::trim) {
        if name_re().is_match(name) {
            return Ok(Statement::Delete {
                name: name.to_string(),
                line,
            });
        }
    }

    let caps = assign_re()
        .captures(source)
        .ok_or_else(|| "expected 'NAME = value', 'del NAME' or 'include(...)'".to_string())?;
    let name = caps[1].to_string();
    let value = parse_expr(&caps[3])?;

    if &caps[2] == "+=" {
        Ok(Statement::Extend { name, value, line })
    } else {
        Ok(Statement::Assign { name, value, line })
    }
}

fn parse_expr(rhs: &str) -> std::result::Result<Expr, String> {
    let rhs = rhs.trim();
    if rhs.is_empty() {
        return Err("missing value".to_string());
    }
    if name_re().is_match(rhs) && !matches!(rhs, "true" | "false" | "inf" | "nan") {
        return Ok(Expr::Name(rhs.to_string()));
    }
    parse_literal(rhs).map(Expr::Literal)
}

/// Parse a TOML literal by wrapping it in a one-key document
fn parse_literal(literal: &str) -> std::result::Result<Value, String> {
    let doc = format!("v = {literal}");
    let mut table: toml::Table = toml::from_str(&doc)
        .map_err(|e| format!("invalid value: {}", e.message().trim()))?;
    let value = table.remove("v").ok_or_else(|| "invalid value".to_string())?;
    if has_non_finite(&value) {
        return Err("non-finite floats are not supported".to_string());
    }
    Ok(toml_to_json(value))
}

fn has_non_finite(value: &toml::Value) -> bool {
    match value {
        toml::Value::Float(f) => !f.is_finite(),
        toml::Value::Array(items) => items.iter().any(has_non_finite),
        toml::Value::Table(table) => table.values().any(has_non_finite),
        _ => false,
    }
}

/// Convert a TOML value to its JSON equivalent
pub(crate) fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Argument of a specification call: a bare string or a nested call
enum Arg {
    Literal(String),
    Call(SpecExpr),
}

impl Arg {
    fn into_spec(self) -> SpecExpr {
        match self {
            Arg::Literal(pattern) => SpecExpr::Entry(pattern),
            Arg::Call(spec) => spec,
        }
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos == self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_alphabetic() || *c == '_' || (*i > 0 && c.is_ascii_digit())))
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn string(&mut self) -> std::result::Result<Option<String>, String> {
        self.skip_ws();
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Ok(None),
        };

        let rest = self.rest();
        let mut escaped = false;
        let mut end = None;
        for (i, c) in rest.char_indices().skip(1) {
            if escaped {
                escaped = false;
            } else if c == '\\' && quote == '"' {
                escaped = true;
            } else if c == quote {
                end = Some(i + c.len_utf8());
                break;
            }
        }
        let end = end.ok_or_else(|| "unterminated string".to_string())?;
        self.pos += end;

        match parse_literal(&rest[..end])? {
            Value::String(s) => Ok(Some(s)),
            _ => Err("expected a string".to_string()),
        }
    }

    fn describe(&self) -> String {
        match self.rest().lines().next() {
            Some(near) if !near.is_empty() => format!("near '{near}'"),
            _ => "at end of statement".to_string(),
        }
    }
}

fn parse_include(rest: &str) -> std::result::Result<Vec<SpecExpr>, String> {
    let mut cursor = Cursor::new(rest);
    if !cursor.eat('(') {
        return Err("expected '(' after include".to_string());
    }
    let args = parse_args(&mut cursor)?;
    if !cursor.at_end() {
        return Err(format!("unexpected input after include(...) {}", cursor.describe()));
    }
    Ok(args.into_iter().map(Arg::into_spec).collect())
}

/// Parse a comma separated argument list; the opening '(' is already consumed
fn parse_args(cursor: &mut Cursor<'_>) -> std::result::Result<Vec<Arg>, String> {
    let mut args = Vec::new();
    loop {
        if cursor.eat(')') {
            return Ok(args);
        }
        args.push(parse_arg(cursor)?);
        if cursor.eat(',') {
            continue;
        }
        if cursor.eat(')') {
            return Ok(args);
        }
        return Err(format!("expected ',' or ')' {}", cursor.describe()));
    }
}

fn parse_arg(cursor: &mut Cursor<'_>) -> std::result::Result<Arg, String> {
    if let Some(s) = cursor.string()? {
        return Ok(Arg::Literal(s));
    }

    let func = cursor
        .ident()
        .ok_or_else(|| format!("expected a path or a specification {}", cursor.describe()))?;
    if !cursor.eat('(') {
        return Err(format!("expected '(' after {func}"));
    }
    let mut args = parse_args(cursor)?;

    let spec = match (func, args.len()) {
        ("entry", 1) | ("compiled", 1) => match args.pop() {
            Some(Arg::Literal(pattern)) if func == "entry" => SpecExpr::Entry(pattern),
            Some(Arg::Literal(pattern)) => SpecExpr::Compiled(pattern),
            _ => return Err(format!("{func}() expects a string")),
        },
        ("optional", 0) => SpecExpr::Optional(None),
        ("optional", 1) => {
            let inner = args.pop().map(Arg::into_spec).map(Box::new);
            SpecExpr::Optional(inner)
        }
        ("one_of", _) => SpecExpr::OneOf(args.into_iter().map(Arg::into_spec).collect()),
        ("resource", 2) => match (args.remove(0), args.remove(0)) {
            (Arg::Literal(package), Arg::Literal(filename)) => {
                SpecExpr::Resource { package, filename }
            }
            _ => return Err("resource() expects two strings".to_string()),
        },
        ("entry" | "compiled" | "optional" | "resource", n) => {
            return Err(format!("{func}() does not take {n} argument(s)"));
        }
        (other, _) => return Err(format!("unknown specification '{other}'")),
    };
    Ok(Arg::Call(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_str(text: &str) -> Result<Fragment> {
        parse(Path::new("test.conf"), text)
    }

    #[test]
    fn test_assignments() {
        let fragment = parse_str(
            r#"
# Base settings
DEBUG = true
SITE_ID = 1
SECRET_KEY = 'a2j43z$c+s#v@9'   # hash inside a string is not a comment
ALLOWED_HOSTS = []
"#,
        )
        .unwrap();

        let statements = fragment.statements();
        assert_eq!(statements.len(), 4);
        assert_eq!(
            statements[0],
            Statement::Assign {
                name: "DEBUG".to_string(),
                value: Expr::Literal(json!(true)),
                line: 3,
            }
        );
        assert_eq!(
            statements[2],
            Statement::Assign {
                name: "SECRET_KEY".to_string(),
                value: Expr::Literal(json!("a2j43z$c+s#v@9")),
                line: 5,
            }
        );
    }

    #[test]
    fn test_name_reference_and_extend() {
        let fragment = parse_str("MANAGERS = ADMINS\nAPPS += ['x']\ndel OLD\n").unwrap();
        let statements = fragment.statements();

        assert_eq!(
            statements[0],
            Statement::Assign {
                name: "MANAGERS".to_string(),
                value: Expr::Name("ADMINS".to_string()),
                line: 1,
            }
        );
        assert_eq!(
            statements[1],
            Statement::Extend {
                name: "APPS".to_string(),
                value: Expr::Literal(json!(["x"])),
                line: 2,
            }
        );
        assert_eq!(
            statements[2],
            Statement::Delete {
                name: "OLD".to_string(),
                line: 3,
            }
        );
    }

    #[test]
    fn test_multiline_array_and_inline_table() {
        let fragment = parse_str(
            "APPS = [\n    'admin',  # the admin\n    'auth',\n]\nDB = { engine = 'sqlite', name = 'db.sqlite3' }\n",
        )
        .unwrap();
        let statements = fragment.statements();

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            Statement::Assign {
                name: "APPS".to_string(),
                value: Expr::Literal(json!(["admin", "auth"])),
                line: 1,
            }
        );
        assert_eq!(
            statements[1],
            Statement::Assign {
                name: "DB".to_string(),
                value: Expr::Literal(json!({"engine": "sqlite", "name": "db.sqlite3"})),
                line: 5,
            }
        );
    }

    #[test]
    fn test_include_with_nested_specs() {
        let fragment = parse_str(
            r#"include(
    "components/base.conf",
    'components/*.conf',
    optional("local.conf"),
    optional(),
    one_of("a.conf", compiled("b.confc")),
    optional(resource("app.defaults", "db.conf")),
)"#,
        )
        .unwrap();

        assert_eq!(
            fragment.statements(),
            &[Statement::Include {
                specs: vec![
                    SpecExpr::Entry("components/base.conf".to_string()),
                    SpecExpr::Entry("components/*.conf".to_string()),
                    SpecExpr::Optional(Some(Box::new(SpecExpr::Entry("local.conf".to_string())))),
                    SpecExpr::Optional(None),
                    SpecExpr::OneOf(vec![
                        SpecExpr::Entry("a.conf".to_string()),
                        SpecExpr::Compiled("b.confc".to_string()),
                    ]),
                    SpecExpr::Optional(Some(Box::new(SpecExpr::Resource {
                        package: "app.defaults".to_string(),
                        filename: "db.conf".to_string(),
                    }))),
                ],
                line: 1,
            }]
        );
    }

    #[test]
    fn test_name_starting_with_include_is_assignment() {
        let fragment = parse_str("include_dirs = ['a']\n").unwrap();
        assert!(matches!(
            &fragment.statements()[0],
            Statement::Assign { name, .. } if name == "include_dirs"
        ));
    }

    #[test]
    fn test_one_of_without_arguments_parses() {
        // Rejected later, when the specification is built
        let fragment = parse_str("include(one_of())").unwrap();
        assert_eq!(
            fragment.statements(),
            &[Statement::Include {
                specs: vec![SpecExpr::OneOf(vec![])],
                line: 1,
            }]
        );
    }

    #[test]
    fn test_syntax_errors_report_line() {
        let err = parse_str("A = 1\nthis is not valid\n").unwrap_err();
        match err {
            IncludeError::Parse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("expected"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_literal() {
        let err = parse_str("A = 'unterminated\n").unwrap_err();
        assert!(matches!(err, IncludeError::Parse { line: 1, .. }));

        let err = parse_str("A = 1 2\n").unwrap_err();
        assert!(err.to_string().contains("invalid value"));
    }

    #[test]
    fn test_unclosed_bracket() {
        let err = parse_str("\nA = [1,\n2\n").unwrap_err();
        assert!(matches!(err, IncludeError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_unknown_specification() {
        let err = parse_str("include(maybe('x.conf'))").unwrap_err();
        assert!(err.to_string().contains("unknown specification 'maybe'"));
    }

    #[test]
    fn test_wrong_arity() {
        let err = parse_str("include(resource('pkg'))").unwrap_err();
        assert!(err.to_string().contains("resource() does not take 1 argument(s)"));
    }

    #[test]
    fn test_del_as_a_name() {
        let fragment = parse_str("del = 1
del += 1
del del
").unwrap();
        let statements = fragment.statements();

        assert_eq!(
            statements[0],
            Statement::Assign {
                name: "del".to_string(),
                value: Expr::Literal(json!(1)),
                line: 1,
            }
        );
        assert!(matches!(statements[1], Statement::Extend { ref name, .. } if name == "del"));
        assert!(matches!(statements[2], Statement::Delete { ref name, .. } if name == "del"));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        for text in ["X = nan\n", "X = inf\n", "X = -inf\n", "X = [1.0, nan]\n", "X = { a = inf }\n"] {
            let err = parse_str(text).unwrap_err();
            assert!(
                err.to_string().contains("non-finite floats are not supported"),
                "{text}: {err}"
            );
        }
        assert!(parse_str("X = 1.5\n").is_ok());
    }
}
