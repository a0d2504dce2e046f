//! Fully qualified property names: `var`, `var.field`, `var["key"]`, `var[-3]`,
//! `var.<base>`, in any combination.
use crate::debugger::Error;
use crate::host::{Context, Key, ObjectRef, Value, VariableStore, Variable};
use chumsky::prelude::*;
use chumsky::Parser;
use std::fmt;

type Err<'a> = extra::Err<Rich<'a, char>>;

/// Pseudo field name of an object's base link.
pub const BASE_NAME: &str = "<base>";

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(Key),
    Base,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPath {
    pub root: String,
    pub segments: Vec<Segment>,
}

fn name_char(c: &char) -> bool {
    !c.is_whitespace() && !matches!(c, '.' | '[' | ']' | '"' | '<' | '>' | ':')
}

/// Unquoted identifier, a part of the path that needs no brackets.
pub fn is_plain_field(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && name != "base"
}

/// Render a field key as a path segment, the inverse of the segment grammar.
pub fn key_segment(key: &Key) -> String {
    match key {
        Key::Int(i) => format!("[{i}]"),
        Key::Str(s) if is_plain_field(s) => format!(".{s}"),
        Key::Str(s) => format!("[\"{}\"]", s.replace('"', "\"\"")),
    }
}

/// Path grammar without an end of input check, for embedding in other grammars.
pub fn path<'a>() -> impl Parser<'a, &'a str, PropertyPath, Err<'a>> + Clone {
    let op = |c| just(c).padded();
    let ident = any::<_, Err>()
        .filter(name_char)
        .repeated()
        .at_least(1)
        .collect::<String>();

    let dotted = just('.').ignore_then(choice((
        just(BASE_NAME).to(Segment::Base),
        ident.clone().map(|name| {
            if name == "base" {
                Segment::Base
            } else {
                Segment::Field(Key::Str(name))
            }
        }),
    )));

    let quoted = just("\"\"")
        .to('"')
        .or(none_of("\""))
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .map(Key::Str)
        .labelled("quoted key");
    let int = just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<i64>()
                .map(Key::Int)
                .map_err(|e| Rich::custom(span, e))
        })
        .labelled("integer key");
    let indexed = choice((quoted, int))
        .delimited_by(op('['), op(']'))
        .map(Segment::Field);

    ident
        .then(choice((dotted, indexed)).repeated().collect::<Vec<_>>())
        .map(|(root, segments)| PropertyPath { root, segments })
}

pub fn parser<'a>() -> impl Parser<'a, &'a str, PropertyPath, Err<'a>> {
    path().then_ignore(end())
}

impl PropertyPath {
    pub fn parse(input: &str) -> Result<Self, Error> {
        parser()
            .parse(input.trim())
            .into_result()
            .map_err(|_| Error::UnknownProperty(input.to_string()))
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            match segment {
                Segment::Field(key) => f.write_str(&key_segment(key))?,
                Segment::Base => write!(f, ".{BASE_NAME}")?,
            }
        }
        Ok(())
    }
}

/// A resolved, live property location.
#[derive(Debug, Clone)]
pub enum Binding {
    Variable(Variable),
    Field { object: ObjectRef, key: Key },
    Base { object: ObjectRef },
}

fn step(value: &Value, segment: &Segment, fullname: &str) -> Result<Value, Error> {
    let unknown = || Error::UnknownProperty(fullname.to_string());
    let object = value.as_object().ok_or_else(unknown)?;
    let object = object.borrow();
    match segment {
        Segment::Field(key) => object.fields.get(key).cloned().ok_or_else(unknown),
        Segment::Base => object.base.clone().map(Value::Object).ok_or_else(unknown),
    }
}

/// Resolve a path to a binding. Only the top level name is looked up in the
/// variable store; every following segment must already exist, except the
/// last one which may name a field that is about to be created.
pub fn resolve<H: VariableStore + ?Sized>(
    host: &H,
    path: &PropertyPath,
    fullname: &str,
    context: Context,
    depth: usize,
) -> Result<Binding, Error> {
    let unknown = || Error::UnknownProperty(fullname.to_string());
    let var = host
        .find_variable(&path.root, context, depth)
        .ok_or_else(unknown)?;

    let Some((last, parents)) = path.segments.split_last() else {
        return Ok(Binding::Variable(var));
    };

    let mut current = var.value;
    for segment in parents {
        current = step(&current, segment, fullname)?;
    }
    let object = current.as_object().ok_or_else(unknown)?.clone();
    Ok(match last {
        Segment::Field(key) => Binding::Field {
            object,
            key: key.clone(),
        },
        Segment::Base => Binding::Base { object },
    })
}

impl Binding {
    pub fn value(&self, fullname: &str) -> Result<Value, Error> {
        match self {
            Binding::Variable(var) => Ok(var.value.clone()),
            Binding::Field { object, key } => object
                .borrow()
                .fields
                .get(key)
                .cloned()
                .ok_or_else(|| Error::UnknownProperty(fullname.to_string())),
            Binding::Base { object } => Ok(object
                .borrow()
                .base
                .clone()
                .map(Value::Object)
                .unwrap_or_default()),
        }
    }

    /// Store `value`. Returns `false` when the location can not hold it.
    pub fn assign<H: VariableStore + ?Sized>(
        &self,
        host: &mut H,
        context: Context,
        depth: usize,
        value: Value,
    ) -> bool {
        match self {
            Binding::Variable(var) => host.assign_variable(&var.name, context, depth, value),
            Binding::Field { object, key } => {
                object.borrow_mut().fields.insert(key.clone(), value);
                true
            }
            Binding::Base { object } => match value {
                Value::Object(base) => {
                    object.borrow_mut().base = Some(base);
                    true
                }
                Value::Missing => {
                    object.borrow_mut().base = None;
                    true
                }
                _ => false,
            },
        }
    }
}
