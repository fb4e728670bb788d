use fallible_iterator::FallibleIterator;

use super::{Error, Options, Remainder, StatementSplitter, Statements, TokenType};
use crate::lexer::{Pos, Scanner};

fn split_with(sql: &str, options: &Options) -> Result<Vec<String>, Error> {
    let stmts: Vec<Vec<u8>> = Statements::new(sql.as_bytes(), options)?.collect()?;
    Ok(stmts
        .into_iter()
        .map(|stmt| String::from_utf8(stmt).unwrap())
        .collect())
}

fn split(sql: &str) -> Vec<String> {
    split_with(sql, &Options::new()).unwrap()
}

#[test]
fn two_statements() {
    assert_eq!(
        split("statement one; statement two;"),
        vec!["statement one;", " statement two;"]
    );
}

#[test]
fn empty_input() {
    assert!(split("").is_empty());
    assert!(split(" \n\t").is_empty());
    assert!(split("-- only a comment").is_empty());
}

#[test]
fn empty_statements() {
    assert_eq!(split(";;"), vec![";", ";"]);
}

#[test]
fn delimiter_inside_dollar_quote() {
    assert_eq!(split("$$ a; b; $$;"), vec!["$$ a; b; $$;"]);
}

#[test]
fn tagged_dollar_quote() {
    let sql = "CREATE FUNCTION f() RETURNS void AS $body$ BEGIN; END; $body$ LANGUAGE plpgsql;\nSELECT 1;";
    assert_eq!(
        split(sql),
        vec![
            "CREATE FUNCTION f() RETURNS void AS $body$ BEGIN; END; $body$ LANGUAGE plpgsql;",
            "\nSELECT 1;"
        ]
    );
}

#[test]
fn nested_dollar_quotes() {
    let sql = "DO $outer$ BEGIN EXECUTE $inner$ text; $inner$; END $outer$; SELECT 1;";
    assert_eq!(
        split(sql),
        vec![
            "DO $outer$ BEGIN EXECUTE $inner$ text; $inner$; END $outer$;",
            " SELECT 1;"
        ]
    );
}

#[test]
fn outer_tag_closes_inner_tags() {
    let sql = "$outer$ $inner$ x; $outer$; SELECT 1;";
    assert_eq!(split(sql), vec!["$outer$ $inner$ x; $outer$;", " SELECT 1;"]);
}

#[test]
fn dollar_quote_depth() {
    let mut s = Scanner::new(&b"$a$ $b$ ;"[..], StatementSplitter::new(";").unwrap());
    let (token, tt) = s.scan().unwrap().unwrap();
    assert_eq!((token, tt), (&b"$a$"[..], TokenType::Text));
    assert_eq!(s.splitter().depth(), 1);
    assert_eq!(s.scan().unwrap().unwrap().0, b" ");
    assert_eq!(s.scan().unwrap().unwrap().0, b"$b$");
    assert_eq!(s.splitter().depth(), 2);
    assert_eq!(s.scan().unwrap().unwrap(), (&b" ;"[..], TokenType::Text));
    assert!(matches!(s.scan(), Err(Error::UnterminatedDollarQuote(Some(_)))));
}

#[test]
fn positional_parameters_are_not_tags() {
    assert_eq!(
        split("SELECT $1, $2; SELECT 3;"),
        vec!["SELECT $1, $2;", " SELECT 3;"]
    );
}

#[test]
fn dollar_inside_identifier() {
    assert_eq!(split("SELECT a$b$ ; SELECT 2;"), vec!["SELECT a$b$ ;", " SELECT 2;"]);
}

#[test]
fn line_comments_are_skipped() {
    assert_eq!(split("-- comment with ; inside\nSELECT 1;"), vec!["SELECT 1;"]);
    assert_eq!(split("// comment with ; inside\nSELECT 1;"), vec!["SELECT 1;"]);
    assert_eq!(
        split("SELECT 1; -- trailing\nSELECT 2; -- no newline"),
        vec!["SELECT 1;", " SELECT 2;"]
    );
}

#[test]
fn comment_marker_inside_dollar_quote() {
    let sql = "CREATE FUNCTION f() RETURNS int AS $$\n-- keep; me\nSELECT 1; $$ LANGUAGE sql;";
    assert_eq!(split(sql), vec![sql]);
}

#[test]
fn block_comments_nest() {
    assert_eq!(
        split("/* outer /* inner; */ still; */SELECT 1; /**/SELECT 2;"),
        vec!["SELECT 1;", " SELECT 2;"]
    );
}

#[test]
fn comment_between_tokens_separates_them() {
    assert_eq!(split("SELECT a/* c */FROM t;"), vec!["SELECT a FROM t;"]);
    assert_eq!(split("SELECT a-- c\nFROM t;"), vec!["SELECT a\nFROM t;"]);
    assert_eq!(split("SELECT a/* c *//* d */FROM t;"), vec!["SELECT a FROM t;"]);
    // whitespace on either side already separates
    assert_eq!(split("SELECT a /* c */FROM t;"), vec!["SELECT a FROM t;"]);
    assert_eq!(split("SELECT a/* c */ FROM t;"), vec!["SELECT a FROM t;"]);
    // nothing before the delimiter
    assert_eq!(split("SELECT 1/* c */;SELECT 2-- c\n;"), vec!["SELECT 1;", "SELECT 2;"]);
}

#[test]
fn comment_between_tokens_resplit() {
    let first = split("SELECT 1/-- c\n/2; SELECT 3;");
    assert_eq!(first, vec!["SELECT 1/\n/2;", " SELECT 3;"]);
    assert_eq!(split(&first.concat()), first);

    let first = split("SELECT x/**/$$ a; $$;");
    assert_eq!(first, vec!["SELECT x $$ a; $$;"]);
    assert_eq!(split(&first.concat()), first);

    let first = split("SELECT a-/* c */-b; SELECT 2;");
    assert_eq!(first, vec!["SELECT a- -b;", " SELECT 2;"]);
    assert_eq!(split(&first.concat()), first);
}

#[test]
fn minus_and_slash_operators() {
    assert_eq!(split("SELECT 4 - 2 / 1;SELECT -1"), vec!["SELECT 4 - 2 / 1;", "SELECT -1"]);
}

#[test]
fn single_quoted_literals() {
    assert_eq!(
        split("SELECT 'a;b' ; SELECT 'it''s; ok';"),
        vec!["SELECT 'a;b' ;", " SELECT 'it''s; ok';"]
    );
    assert_eq!(split("SELECT '';SELECT ''''"), vec!["SELECT '';", "SELECT ''''"]);
    assert_eq!(
        split("SELECT '-- not; /* a comment'; SELECT 2;"),
        vec!["SELECT '-- not; /* a comment';", " SELECT 2;"]
    );
}

#[test]
fn quoted_identifiers() {
    assert_eq!(
        split(r#"SELECT "a;b" FROM "t--x"; SELECT 2;"#),
        vec![r#"SELECT "a;b" FROM "t--x";"#, " SELECT 2;"]
    );
}

#[test]
fn escape_strings() {
    assert_eq!(
        split(r"SELECT E'it\'s; here'; SELECT 2;"),
        vec![r"SELECT E'it\'s; here';", " SELECT 2;"]
    );
    // backslash is not special in standard strings
    assert_eq!(split(r"SELECT 'C:\'; SELECT 2;"), vec![r"SELECT 'C:\';", " SELECT 2;"]);
    assert_eq!(
        split(r"SELECT name'x\'; SELECT 2;"),
        vec![r"SELECT name'x\';", " SELECT 2;"]
    );
}

#[test]
fn multi_byte_delimiter() {
    let options = Options::new().delimiter("GO");
    let sql = "CREATE TABLE t (a int)\nGO\nINSERT INTO t VALUES (1)\nGO\n";
    assert_eq!(
        split_with(sql, &options).unwrap(),
        vec!["CREATE TABLE t (a int)\nGO", "\nINSERT INTO t VALUES (1)\nGO"]
    );
}

#[test]
fn empty_delimiter() {
    let options = Options::new().delimiter("");
    assert!(matches!(split_with("SELECT 1;", &options), Err(Error::EmptyDelimiter)));
}

#[test]
fn remainder_policies() {
    let sql = "SELECT 1; SELECT 2";
    assert_eq!(split(sql), vec!["SELECT 1;", " SELECT 2"]);
    let options = Options::new().remainder(Remainder::Discard);
    assert_eq!(split_with(sql, &options).unwrap(), vec!["SELECT 1;"]);
    let options = Options::new().remainder(Remainder::Reject);
    assert!(matches!(
        split_with(sql, &options),
        Err(Error::UnterminatedStatement(Some(Pos { line: 1, column: 19 })))
    ));
    assert_eq!(split_with("SELECT 1;\n\n", &options).unwrap(), vec!["SELECT 1;"]);
}

#[test]
fn unterminated_constructs() {
    assert!(matches!(
        split_with("SELECT 1;\nSELECT 'x", &Options::new()),
        Err(Error::UnterminatedLiteral(Some(Pos { line: 2, column: 10 })))
    ));
    assert!(matches!(
        split_with("SELECT \"x", &Options::new()),
        Err(Error::UnterminatedLiteral(_))
    ));
    assert!(matches!(
        split_with("$$ abc;", &Options::new()),
        Err(Error::UnterminatedDollarQuote(_))
    ));
    assert!(matches!(
        split_with("SELECT 1; /* abc /* */", &Options::new()),
        Err(Error::UnterminatedBlockComment(_))
    ));
    assert!(matches!(
        split_with(r"SELECT E'abc\", &Options::new()),
        Err(Error::UnterminatedLiteral(_))
    ));
}

#[test]
fn oversized_input() {
    let options = Options::new().max_size(16);
    let err = split_with("SELECT 'aaaaaaaaaaaaaaaaaaaaaaaaa';", &options).unwrap_err();
    assert!(matches!(err, Error::Oversized(16, Some(_))));
    assert_eq!(
        split_with("SELECT 1; SELECT", &options).unwrap(),
        vec!["SELECT 1;", " SELECT"]
    );
    // comments count
    assert!(matches!(
        split_with("-- 0123456789abcdef\n", &options),
        Err(Error::Oversized(16, _))
    ));
}

#[test]
fn unbounded_input() {
    let sql = format!("SELECT '{}';", "x".repeat(64));
    let options = Options::new().max_size(0).capacity(8);
    assert_eq!(split_with(&sql, &options).unwrap(), vec![sql]);
}

#[test]
fn substitution() {
    let options = Options::new().substitute("{schema}", "tenant_1");
    assert_eq!(
        split_with("CREATE SCHEMA {schema}; SET search_path TO {schema};", &options).unwrap(),
        vec!["CREATE SCHEMA tenant_1;", " SET search_path TO tenant_1;"]
    );
}

#[test]
fn resplit_is_idempotent() {
    let sql = "-- header\nCREATE TABLE t (s text DEFAULT 'a;b');\n/* c */CREATE FUNCTION f() RETURNS int AS $f$ SELECT 1; $f$ LANGUAGE sql;\nINSERT INTO t VALUES ($$x;y$$);";
    let first = split(sql);
    assert_eq!(first.len(), 3);
    let second = split(&first.concat());
    assert_eq!(first, second);
}

#[test]
fn byte_accounting() {
    let sql = "CREATE TABLE t (s text DEFAULT 'a;b');\nCREATE FUNCTION f() RETURNS int AS $f$ SELECT 1; $f$ LANGUAGE sql;\nSELECT 2";
    assert_eq!(split(sql).concat(), sql);
    let commented = "SELECT 1; -- note\nSELECT 2;/* x */";
    assert_eq!(
        split(commented).concat(),
        commented.replace("-- note\n", "").replace("/* x */", "")
    );
}

#[test]
fn utf8_passes_through() {
    assert_eq!(
        split("SELECT 'é;ü' AS $ñ$;$ñ$; SELECT '日本';"),
        vec!["SELECT 'é;ü' AS $ñ$;$ñ$;", " SELECT '日本';"]
    );
}

#[test]
fn line_and_column() {
    let mut stmts = Statements::new(&b"SELECT 1;\nSELECT\n2;"[..], &Options::new()).unwrap();
    assert_eq!(stmts.next().unwrap(), Some(b"SELECT 1;".to_vec()));
    assert_eq!((stmts.line(), stmts.column()), (1, 10));
    assert_eq!(stmts.next().unwrap(), Some(b"\nSELECT\n2;".to_vec()));
    assert_eq!((stmts.line(), stmts.column()), (3, 3));
    assert_eq!(stmts.next().unwrap(), None);
    assert_eq!(stmts.next().unwrap(), None);
}
