//! Command line tokenizer: `name -x value -y "quoted value" -i txid -- base64`.

use crate::debugger::Error;
use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just, none_of};
use chumsky::{extra, IterParser, Parser};
use smallvec::SmallVec;
use std::str::FromStr;

type Err<'a> = extra::Err<Rich<'a, char>>;

/// Flag under which the data following `--` is stored.
pub const DATA_FLAG: char = '-';
const TRANSACTION_FLAG: char = 'i';
const MAX_ARGS: usize = 16;

/// Flag/value pairs of one command, transaction id kept separately.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommandArgs {
    pub transaction_id: String,
    pairs: SmallVec<[(char, String); 8]>,
}

fn quoted<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    none_of("\"\\")
        .or(just('\\').ignore_then(any()))
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .labelled("quoted value")
}

fn bare<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    any()
        .filter(|c: &char| !c.is_whitespace() && *c != '"')
        .then(any().filter(|c: &char| !c.is_whitespace()).repeated())
        .to_slice()
        .map(str::to_string)
        .labelled("value")
}

fn pair<'a>() -> impl Parser<'a, &'a str, (char, String), Err<'a>> + Clone {
    just('-')
        .ignore_then(any().filter(|c: &char| c.is_ascii_alphabetic()))
        .labelled("flag")
        .then_ignore(
            any()
                .filter(|c: &char| c.is_whitespace())
                .repeated()
                .at_least(1),
        )
        .then(choice((quoted(), bare())))
}

fn data<'a>() -> impl Parser<'a, &'a str, (char, String), Err<'a>> + Clone {
    just("--")
        .ignore_then(any().repeated().to_slice())
        .map(|rest: &str| (DATA_FLAG, rest.trim().to_string()))
}

fn args_parser<'a>() -> impl Parser<'a, &'a str, Vec<(char, String)>, Err<'a>> {
    choice((data(), pair()))
        .padded()
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Split a raw command line into its name and argument text.
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    }
}

/// Scan for `-i <id>` without a full parse, used to address error responses
/// for malformed commands.
pub fn scan_transaction_id(args: &str) -> String {
    let mut tokens = args.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "--" {
            break;
        }
        if token == "-i" {
            return tokens.next().unwrap_or_default().to_string();
        }
    }
    String::new()
}

impl CommandArgs {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let parsed = args_parser()
            .parse(input)
            .into_result()
            .map_err(|_| Error::InvalidOptions)?;
        if parsed.len() > MAX_ARGS {
            return Err(Error::InvalidOptions);
        }

        let mut args = CommandArgs::default();
        for (flag, value) in parsed {
            if flag == TRANSACTION_FLAG {
                args.transaction_id = value;
            } else {
                args.pairs.push((flag, value));
            }
        }
        Ok(args)
    }

    pub fn get(&self, flag: char) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, flag: char) -> Result<&str, Error> {
        self.get(flag).ok_or(Error::InvalidOptions)
    }

    /// Base64 payload after `--`.
    pub fn data(&self) -> Option<&str> {
        self.get(DATA_FLAG)
    }

    /// Parse a numeric flag, a malformed number is an invalid option.
    pub fn number<T: FromStr>(&self, flag: char) -> Result<Option<T>, Error> {
        self.get(flag)
            .map(|v| v.parse::<T>().map_err(|_| Error::InvalidOptions))
            .transpose()
    }

    /// Fail on any flag not listed in `allowed`.
    pub fn expect_flags(&self, allowed: &str) -> Result<(), Error> {
        if self.pairs.iter().all(|(f, _)| allowed.contains(*f)) {
            Ok(())
        } else {
            Err(Error::InvalidOptions)
        }
    }
}
