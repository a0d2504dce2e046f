//! Line grammar of the playground language.
//!
//! ```text
//! static counter := 0
//! obj := {}
//! obj.name := "first ""quoted"" word"
//! obj[1] := 2.5
//! print obj.name
//! func greet {
//!     call helper
//!     return
//! }
//! ```

use crate::debugger::property::name::{path, PropertyPath};
use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just, none_of};
use chumsky::{extra, text, IterParser, Parser};

type Err<'a> = extra::Err<Rich<'a, char>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    NewObject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Path(PropertyPath),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign {
        target: PropertyPath,
        value: Expr,
        is_static: bool,
    },
    Print(Expr),
    Call(String),
    Return,
    FuncBegin(String),
    BlockBegin,
    BlockEnd,
}

fn literal<'a>() -> impl Parser<'a, &'a str, Literal, Err<'a>> + Clone {
    let float = just('-')
        .or_not()
        .then(text::int(10))
        .then(just('.'))
        .then(text::digits(10))
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map(Literal::Float)
                .map_err(|e| Rich::custom(span, e))
        })
        .labelled("float");
    let int = just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<i64>()
                .map(Literal::Int)
                .map_err(|e| Rich::custom(span, e))
        })
        .labelled("integer");
    let string = just("\"\"")
        .to('"')
        .or(none_of("\""))
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .map(Literal::Str)
        .labelled("string");
    let object = just("{}").to(Literal::NewObject);

    choice((float, int, string, object))
}

fn expr<'a>() -> impl Parser<'a, &'a str, Expr, Err<'a>> + Clone {
    literal().map(Expr::Literal).or(path().map(Expr::Path))
}

fn statement<'a>() -> impl Parser<'a, &'a str, Statement, Err<'a>> {
    let ws = any::<_, Err>()
        .filter(|c: &char| c.is_whitespace())
        .repeated()
        .at_least(1);
    let ident = text::ascii::ident().map(str::to_string);
    let assign = path()
        .then_ignore(just(":=").padded())
        .then(expr())
        .labelled("assignment");

    // every alternative must consume the whole line, so `returned := 1`
    // is an assignment and not a `return` followed by garbage
    choice((
        just("static")
            .then(ws.clone())
            .ignore_then(assign.clone())
            .then_ignore(end())
            .map(|(target, value)| Statement::Assign {
                target,
                value,
                is_static: true,
            }),
        just("func")
            .then(ws.clone())
            .ignore_then(ident.clone())
            .then_ignore(just('{').padded())
            .then_ignore(end())
            .map(Statement::FuncBegin),
        just("call")
            .then(ws.clone())
            .ignore_then(ident)
            .then_ignore(end())
            .map(Statement::Call),
        just("print")
            .then(ws)
            .ignore_then(expr())
            .then_ignore(end())
            .map(Statement::Print),
        just("return").then(end()).to(Statement::Return),
        just('{').then(end()).to(Statement::BlockBegin),
        just('}').then(end()).to(Statement::BlockEnd),
        assign.then_ignore(end()).map(|(target, value)| Statement::Assign {
            target,
            value,
            is_static: false,
        }),
    ))
}

/// Parse one source line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Statement>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(';') {
        return Ok(None);
    }
    statement()
        .parse(trimmed)
        .into_result()
        .map(Some)
        .map_err(|errs| {
            errs.into_iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::debugger::property::name::Segment;
    use crate::host::Key;

    fn var(name: &str) -> PropertyPath {
        PropertyPath {
            root: name.to_string(),
            segments: vec![],
        }
    }

    #[test]
    fn test_statements() {
        struct TestCase {
            line: &'static str,
            statement: Option<Statement>,
        }
        let cases = vec![
            TestCase {
                line: "   ; comment",
                statement: None,
            },
            TestCase {
                line: "",
                statement: None,
            },
            TestCase {
                line: "x := -12",
                statement: Some(Statement::Assign {
                    target: var("x"),
                    value: Expr::Literal(Literal::Int(-12)),
                    is_static: false,
                }),
            },
            TestCase {
                line: "static total:=0.5",
                statement: Some(Statement::Assign {
                    target: var("total"),
                    value: Expr::Literal(Literal::Float(0.5)),
                    is_static: true,
                }),
            },
            TestCase {
                line: "o[\"k\"] := \"say \"\"hi\"\"\"",
                statement: Some(Statement::Assign {
                    target: PropertyPath {
                        root: "o".to_string(),
                        segments: vec![Segment::Field(Key::from("k"))],
                    },
                    value: Expr::Literal(Literal::Str("say \"hi\"".to_string())),
                    is_static: false,
                }),
            },
            TestCase {
                line: "o.base := proto",
                statement: Some(Statement::Assign {
                    target: PropertyPath {
                        root: "o".to_string(),
                        segments: vec![Segment::Base],
                    },
                    value: Expr::Path(var("proto")),
                    is_static: false,
                }),
            },
            TestCase {
                line: "obj := {}",
                statement: Some(Statement::Assign {
                    target: var("obj"),
                    value: Expr::Literal(Literal::NewObject),
                    is_static: false,
                }),
            },
            TestCase {
                line: "  print x",
                statement: Some(Statement::Print(Expr::Path(var("x")))),
            },
            TestCase {
                line: "print := 3",
                statement: Some(Statement::Assign {
                    target: var("print"),
                    value: Expr::Literal(Literal::Int(3)),
                    is_static: false,
                }),
            },
            TestCase {
                line: "func greet {",
                statement: Some(Statement::FuncBegin("greet".to_string())),
            },
            TestCase {
                line: "call greet",
                statement: Some(Statement::Call("greet".to_string())),
            },
            TestCase {
                line: "returned := x",
                statement: Some(Statement::Assign {
                    target: var("returned"),
                    value: Expr::Path(var("x")),
                    is_static: false,
                }),
            },
            TestCase {
                line: "return",
                statement: Some(Statement::Return),
            },
            TestCase {
                line: "{",
                statement: Some(Statement::BlockBegin),
            },
            TestCase {
                line: "}",
                statement: Some(Statement::BlockEnd),
            },
        ];

        for case in cases {
            assert_eq!(parse_line(case.line).unwrap(), case.statement, "{}", case.line);
        }
    }

    #[test]
    fn test_syntax_errors() {
        for line in ["x :=", "call", "func {", "x = 1", "print", "} else {"] {
            assert!(parse_line(line).is_err(), "{line}");
        }
    }
}
