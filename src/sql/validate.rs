//! Cleaning and read-only validation of generated SQL.

use super::{SqlRejection, ValidatedSql};
use crate::error::{FinqueryError, Result};
use regex::Regex;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "replace", "truncate", "attach",
    "detach", "pragma", "vacuum", "reindex", "grant", "revoke",
];

/// Words that end a table reference instead of naming its alias.
const CLAUSE_KEYWORDS: &[&str] = &[
    "where", "join", "inner", "left", "right", "full", "cross", "natural", "outer", "on", "using",
    "group", "order", "limit", "offset", "union", "intersect", "except", "having", "window",
];

const ERROR_MARKER: &str = "-- error";

/// One lexical unit of a query. Comments and whitespace are dropped.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare identifier, keyword or number.
    Word(String),
    /// Quoted identifier with the quotes removed.
    Quoted(String),
    /// String literal. Its content never matters to validation.
    Literal,
    Punct(char),
}

impl Token {
    fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn name(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Quoted(w) => Some(w),
            _ => None,
        }
    }
}

/// A table named after FROM or JOIN.
struct TableRef {
    schema: Option<String>,
    table: String,
}

/// Strip markdown fences, surrounding whitespace and one trailing `;`.
pub fn clean_sql(raw: &str) -> String {
    let mut text = raw.trim();

    // Opening fence line, possibly with a language tag
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(idx) if rest[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
                &rest[idx + 1..]
            }
            _ => text,
        };
    }

    let cleaned = text
        .replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "");
    let cleaned = cleaned.trim();
    let cleaned = cleaned.strip_suffix(';').unwrap_or(cleaned);
    cleaned.trim().to_string()
}

/// Read-only allowlist for queries against a fixed set of tables.
pub struct SqlValidator {
    tables: Vec<String>,
    lexer: Regex,
}

impl SqlValidator {
    /// Create a validator that accepts queries over `tables`.
    pub fn new(tables: &[String]) -> Result<Self> {
        if tables.is_empty() {
            return Err(FinqueryError::Config(
                "No tables configured for structured queries".to_string(),
            ));
        }
        for table in tables {
            super::check_identifier(table)?;
        }

        let pattern = concat!(
            r"(?s)(?P<space>\s+)",
            r#"|(?P<comment>--[^\n]*|/\*.*?(?:\*/|$))"#,
            r"|(?P<literal>'(?:[^']|'')*'?)",
            r#"|(?P<dquoted>"(?:[^"]|"")*"?)"#,
            r"|(?P<bquoted>`[^`]*`?|\[[^\]]*\]?)",
            r"|(?P<word>[\p{L}\p{N}_$]+)",
            r"|(?P<punct>.)",
        );
        let lexer = Regex::new(pattern)
            .map_err(|e| FinqueryError::Config(format!("Invalid SQL lexer pattern: {}", e)))?;

        Ok(Self {
            tables: tables.to_vec(),
            lexer,
        })
    }

    /// Tables this validator accepts.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Clean `raw` and check it against the allowlist.
    ///
    /// Keywords, `;` and table names are only looked for outside string
    /// literals, quoted identifiers and comments. Every table read after
    /// FROM or JOIN must be an allowed table or a CTE of the same query.
    pub fn validate(&self, raw: &str) -> std::result::Result<ValidatedSql, SqlRejection> {
        let sql = clean_sql(raw);

        if sql.is_empty() {
            return Err(SqlRejection::Empty);
        }
        if sql.to_lowercase().contains(ERROR_MARKER) {
            return Err(SqlRejection::GenerationFailed);
        }

        let tokens = self.tokenize(&sql);

        let verb = tokens
            .iter()
            .find(|t| **t != Token::Punct('('))
            .and_then(|t| match t {
                Token::Word(w) => Some(w.to_lowercase()),
                _ => None,
            })
            .unwrap_or_default();
        if verb != "select" && verb != "with" {
            let shown: String = sql.split_whitespace().next().unwrap_or("").chars().take(20).collect();
            return Err(SqlRejection::DisallowedVerb(shown));
        }

        if tokens.contains(&Token::Punct(';')) {
            return Err(SqlRejection::MultipleStatements);
        }

        if let Some(keyword) = forbidden_keyword(&tokens) {
            return Err(SqlRejection::ForbiddenKeyword(keyword));
        }

        if !tokens.iter().any(|t| t.is_word("from")) {
            return Err(SqlRejection::MissingFrom);
        }

        let ctes = cte_names(&tokens);
        let mut reads_allowed_table = false;
        for table_ref in table_refs(&tokens) {
            let table = table_ref.table.to_lowercase();
            let schema_ok = table_ref
                .schema
                .as_deref()
                .map_or(true, |s| s.eq_ignore_ascii_case("main"));

            if schema_ok && self.tables.iter().any(|t| t.eq_ignore_ascii_case(&table)) {
                reads_allowed_table = true;
            } else if !(table_ref.schema.is_none() && ctes.contains(&table)) {
                let shown = match table_ref.schema {
                    Some(schema) => format!("{}.{}", schema, table_ref.table),
                    None => table_ref.table,
                };
                return Err(SqlRejection::UnlistedTable(shown));
            }
        }

        if !reads_allowed_table {
            return Err(SqlRejection::UnknownTable(self.tables.join(", ")));
        }

        Ok(ValidatedSql(sql))
    }

    fn tokenize(&self, sql: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for caps in self.lexer.captures_iter(sql) {
            if caps.name("literal").is_some() {
                tokens.push(Token::Literal);
            } else if let Some(m) = caps.name("dquoted") {
                let inner = m.as_str().trim_start_matches('"').trim_end_matches('"');
                tokens.push(Token::Quoted(inner.replace("\"\"", "\"")));
            } else if let Some(m) = caps.name("bquoted") {
                let inner = m.as_str().trim_matches(|c| c == '`' || c == '[' || c == ']');
                tokens.push(Token::Quoted(inner.to_string()));
            } else if let Some(m) = caps.name("word") {
                tokens.push(Token::Word(m.as_str().to_string()));
            } else if let Some(c) = caps.name("punct").and_then(|m| m.as_str().chars().next()) {
                tokens.push(Token::Punct(c));
            }
        }
        tokens
    }
}

/// First write or DDL keyword, ignoring the `replace()` string function.
fn forbidden_keyword(tokens: &[Token]) -> Option<String> {
    tokens.iter().enumerate().find_map(|(i, token)| {
        let Token::Word(word) = token else {
            return None;
        };
        let word = word.to_lowercase();
        if !FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
            return None;
        }
        let is_call = tokens.get(i + 1) == Some(&Token::Punct('('));
        if word == "replace" && is_call {
            return None;
        }
        Some(word)
    })
}

/// Names defined by every `WITH [RECURSIVE] name [(columns)] AS [NOT] [MATERIALIZED] (...)` list.
fn cte_names(tokens: &[Token]) -> Vec<String> {
    let mut names = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if !token.is_word("with") {
            continue;
        }

        let mut j = i + 1;
        if tokens.get(j).is_some_and(|t| t.is_word("recursive")) {
            j += 1;
        }
        loop {
            let Some(name) = tokens.get(j).and_then(|t| t.name()) else {
                break;
            };
            j += 1;
            if tokens.get(j) == Some(&Token::Punct('(')) {
                j = skip_parens(tokens, j);
            }
            if !tokens.get(j).is_some_and(|t| t.is_word("as")) {
                break;
            }
            j += 1;
            if tokens.get(j).is_some_and(|t| t.is_word("not")) {
                j += 1;
            }
            if tokens.get(j).is_some_and(|t| t.is_word("materialized")) {
                j += 1;
            }
            if tokens.get(j) != Some(&Token::Punct('(')) {
                break;
            }
            names.push(name.to_lowercase());
            j = skip_parens(tokens, j);

            if tokens.get(j) == Some(&Token::Punct(',')) {
                j += 1;
            } else {
                break;
            }
        }
    }

    names
}

/// Every table named after FROM or JOIN, including comma-separated lists.
/// Subqueries are skipped here; their own FROM clauses are visited in turn.
fn table_refs(tokens: &[Token]) -> Vec<TableRef> {
    let mut refs = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if !(token.is_word("from") || token.is_word("join")) {
            continue;
        }
        // IS [NOT] DISTINCT FROM compares values
        if i > 0 && tokens[i - 1].is_word("distinct") {
            continue;
        }

        let mut j = i + 1;
        loop {
            match tokens.get(j) {
                Some(Token::Punct('(')) => j = skip_parens(tokens, j),
                Some(t) => {
                    let Some(first) = t.name().map(str::to_string) else {
                        break;
                    };
                    j += 1;
                    let qualified = tokens.get(j) == Some(&Token::Punct('.'));
                    let second = tokens.get(j + 1).and_then(|t| t.name()).map(str::to_string);
                    match (qualified, second) {
                        (true, Some(table)) => {
                            refs.push(TableRef {
                                schema: Some(first),
                                table,
                            });
                            j += 2;
                        }
                        _ => refs.push(TableRef {
                            schema: None,
                            table: first,
                        }),
                    }
                    // Table-valued function arguments
                    if tokens.get(j) == Some(&Token::Punct('(')) {
                        j = skip_parens(tokens, j);
                    }
                }
                None => break,
            }

            // Optional alias
            if tokens.get(j).is_some_and(|t| t.is_word("as")) {
                j += 2;
            } else if let Some(t) = tokens.get(j) {
                let is_alias = match t {
                    Token::Quoted(_) => true,
                    Token::Word(w) => !CLAUSE_KEYWORDS.iter().any(|k| w.eq_ignore_ascii_case(k)),
                    _ => false,
                };
                if is_alias {
                    j += 1;
                }
            }

            if tokens.get(j) == Some(&Token::Punct(',')) {
                j += 1;
            } else {
                break;
            }
        }
    }

    refs
}

/// Index just past the parenthesis group opening at `open`.
fn skip_parens(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[open..].iter().enumerate() {
        match token {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return open + offset + 1;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Validate a single query against `tables`.
pub fn validate_sql(raw: &str, tables: &[String]) -> Result<ValidatedSql> {
    Ok(SqlValidator::new(tables)?.validate(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SqlValidator {
        SqlValidator::new(&["properties".to_string(), "financials".to_string()]).unwrap()
    }

    #[test]
    fn test_clean_strips_fences_and_semicolon() {
        assert_eq!(
            clean_sql("```sql\nSELECT * FROM properties;\n```"),
            "SELECT * FROM properties"
        );
        assert_eq!(clean_sql("```sqlite\nSELECT 1 FROM t\n```"), "SELECT 1 FROM t");
        assert_eq!(clean_sql("  SELECT a FROM t;  "), "SELECT a FROM t");
        assert_eq!(clean_sql("```sql SELECT a FROM t```"), "SELECT a FROM t");
    }

    #[test]
    fn test_accepts_select_and_with() {
        let v = validator();
        let sql = v
            .validate("SELECT f.revenue FROM financials f WHERE f.year = 2023;")
            .unwrap();
        assert_eq!(sql.as_str(), "SELECT f.revenue FROM financials f WHERE f.year = 2023");

        assert!(v
            .validate("WITH top AS (SELECT * FROM properties) SELECT * FROM top")
            .is_ok());
        assert!(v.validate("select created_at from properties").is_ok());
    }

    #[test]
    fn test_rejects_writes() {
        let v = validator();
        assert!(matches!(
            v.validate("DELETE FROM properties"),
            Err(SqlRejection::DisallowedVerb(_))
        ));
        assert!(matches!(
            v.validate("WITH x AS (DELETE FROM properties RETURNING *) SELECT * FROM x"),
            Err(SqlRejection::ForbiddenKeyword(k)) if k == "delete"
        ));
        assert_eq!(
            v.validate("SELECT * FROM properties; DROP TABLE properties"),
            Err(SqlRejection::MultipleStatements)
        );
    }

    #[test]
    fn test_rejects_missing_from_and_unknown_tables() {
        let v = validator();
        assert_eq!(v.validate("SELECT 1"), Err(SqlRejection::MissingFrom));
        assert_eq!(
            v.validate("SELECT * FROM sqlite_master"),
            Err(SqlRejection::UnlistedTable("sqlite_master".to_string()))
        );
        assert_eq!(
            v.validate("SELECT * FROM my_properties_backup"),
            Err(SqlRejection::UnlistedTable("my_properties_backup".to_string()))
        );
        assert!(matches!(
            v.validate("WITH t AS (SELECT 1 AS x) SELECT x FROM t"),
            Err(SqlRejection::UnknownTable(_))
        ));
    }

    #[test]
    fn test_allowed_name_in_literal_does_not_unlock_other_tables() {
        let v = validator();
        assert_eq!(
            v.validate("SELECT pw FROM secrets WHERE 'properties' <> ''"),
            Err(SqlRejection::UnlistedTable("secrets".to_string()))
        );
        assert_eq!(
            v.validate("SELECT name FROM sqlite_master WHERE name = 'properties' OR 1=1"),
            Err(SqlRejection::UnlistedTable("sqlite_master".to_string()))
        );
        assert_eq!(
            v.validate("SELECT * FROM secrets -- FROM properties"),
            Err(SqlRejection::UnlistedTable("secrets".to_string()))
        );
    }

    #[test]
    fn test_every_table_read_must_be_allowed() {
        let v = validator();
        assert_eq!(
            v.validate("SELECT p.property_name FROM properties p JOIN secrets s ON s.id = p.id"),
            Err(SqlRejection::UnlistedTable("secrets".to_string()))
        );
        assert_eq!(
            v.validate("SELECT * FROM properties, secrets"),
            Err(SqlRejection::UnlistedTable("secrets".to_string()))
        );
        assert_eq!(
            v.validate("SELECT * FROM properties WHERE id IN (SELECT id FROM \"secrets\")"),
            Err(SqlRejection::UnlistedTable("secrets".to_string()))
        );
        assert_eq!(
            v.validate("SELECT * FROM properties UNION SELECT * FROM temp.scratch"),
            Err(SqlRejection::UnlistedTable("temp.scratch".to_string()))
        );
        assert_eq!(
            v.validate("SELECT * FROM json_each('[1]'), properties"),
            Err(SqlRejection::UnlistedTable("json_each".to_string()))
        );
        assert_eq!(
            v.validate("WITH properties AS (SELECT * FROM secrets) SELECT * FROM properties"),
            Err(SqlRejection::UnlistedTable("secrets".to_string()))
        );
        assert_eq!(
            v.validate("SELECT pw FROM secrets WINDOW secrets AS (ORDER BY pw)"),
            Err(SqlRejection::UnlistedTable("secrets".to_string()))
        );
    }

    #[test]
    fn test_accepts_joins_subqueries_and_ctes() {
        let v = validator();
        for sql in [
            "SELECT p.property_name, f.revenue FROM properties AS p \
             INNER JOIN financials AS f ON f.property_id = p.property_id WHERE f.year = 2023",
            "SELECT * FROM properties p, financials f WHERE p.property_id = f.property_id",
            "SELECT * FROM (SELECT property_id FROM properties) sub",
            "SELECT \"revenue\" FROM \"financials\" ORDER BY year DESC LIMIT 5",
            "SELECT * FROM main.financials",
            "WITH recent(pid, rev) AS (SELECT property_id, revenue FROM financials WHERE year = 2023), \
             big AS MATERIALIZED (SELECT pid FROM recent WHERE rev > 1000000) \
             SELECT p.property_name FROM big JOIN properties p ON p.property_id = big.pid",
            "SELECT * FROM financials WHERE revenue IS NOT DISTINCT FROM net_income",
        ] {
            assert!(v.validate(sql).is_ok(), "rejected: {}", sql);
        }
    }

    #[test]
    fn test_keywords_and_semicolons_in_literals_are_ignored() {
        let v = validator();
        assert!(v
            .validate("SELECT REPLACE(property_address, 'St', 'Street') FROM properties")
            .is_ok());
        assert!(v
            .validate("SELECT * FROM properties WHERE property_name = 'Create Park'")
            .is_ok());
        assert!(v
            .validate("SELECT * FROM properties WHERE property_name LIKE '%a;b%'")
            .is_ok());
        assert!(v
            .validate("SELECT * FROM properties WHERE property_name = 'O''Hare; DROP TABLE x'")
            .is_ok());
        assert!(v
            .validate("SELECT \"delete\" FROM properties /* update; */")
            .is_ok());

        assert_eq!(
            v.validate("WITH x AS (SELECT 1) REPLACE INTO properties SELECT * FROM x"),
            Err(SqlRejection::ForbiddenKeyword("replace".to_string()))
        );
    }

    #[test]
    fn test_rejects_error_marker_and_empty() {
        let v = validator();
        assert_eq!(v.validate("```sql\n```"), Err(SqlRejection::Empty));
        assert_eq!(
            v.validate("-- ERROR: cannot answer from this schema"),
            Err(SqlRejection::GenerationFailed)
        );
    }

    #[test]
    fn test_validate_sql_wraps_rejection() {
        let err = validate_sql("UPDATE properties SET x = 1", &["properties".to_string()]).unwrap_err();
        assert!(matches!(err, FinqueryError::SqlRejected(_)));
    }
}
