//! Text protocol parser
//!
//! Turns one statement block of the line-oriented protocol into a
//! [`Request`]. Block statements (`CREATE TABLE`, `SELECT`,
//! `CREATE INDEX`) span several lines and end with `END`; everything else
//! is a single line.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map, map_res, opt, recognize, rest},
    multi::separated_list1,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

use super::ast::*;
use crate::catalog::{FieldDescriptor, FieldType};
use crate::error::{Error, Result};

/// Keywords that open a multi-line block
const BLOCK_STARTS: [&str; 3] = ["CREATE TABLE", "SELECT", "CREATE INDEX"];

/// Parse a complete statement
pub fn parse_statement(input: &str) -> Result<Request> {
    let mut lines = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let first = lines
        .next()
        .ok_or_else(|| Error::Parse("empty statement".to_string()))?;

    if first.starts_with("CREATE TABLE") {
        parse_create_table(first, lines)
    } else if first.starts_with("CREATE INDEX") {
        parse_create_index(first, lines)
    } else if first.starts_with("SELECT") {
        parse_select(first, lines)
    } else if first.starts_with("INSERT") {
        let (table, values) = line(first, insert_line)?;
        Ok(Request::Insert(Insert { table, values }))
    } else if first.starts_with("SHOW") {
        let name = line(first, preceded(pair_space("SHOW"), identifier))?;
        Ok(Request::ShowTable(name.to_string()))
    } else if first.starts_with("DELETE") {
        Ok(Request::Delete)
    } else if first.starts_with("DROP") {
        Ok(Request::Drop)
    } else if first == "QUIT" {
        Ok(Request::Quit)
    } else {
        Err(Error::Parse(format!("unknown command: {}", first)))
    }
}

fn parse_create_table<'a>(
    first: &'a str,
    lines: impl Iterator<Item = &'a str>,
) -> Result<Request> {
    let name = line(
        first,
        preceded(tuple((tag("CREATE"), space1, tag("TABLE"), space1)), identifier),
    )?;

    let mut fields = Vec::new();
    for text in body(lines)? {
        let (field, type_name, length) = line(text, add_line)?;
        let field_type: FieldType = type_name.parse()?;
        fields.push(FieldDescriptor::new(field, field_type, length.unwrap_or(0)));
    }

    Ok(Request::CreateTable(CreateTable {
        name: name.to_string(),
        fields,
    }))
}

fn parse_create_index<'a>(
    first: &'a str,
    lines: impl Iterator<Item = &'a str>,
) -> Result<Request> {
    let (name, columns) = line(
        first,
        tuple((
            delimited(
                tuple((tag("CREATE"), space1, tag("INDEX"), space1)),
                identifier,
                space1,
            ),
            preceded(pair_space("USING"), name_list),
        )),
    )?;

    let mut source_table = None;
    for text in body(lines)? {
        if source_table.is_some() {
            return Err(Error::Parse(format!("unexpected line: {}", text)));
        }
        source_table = Some(line(text, preceded(pair_space("FROM"), identifier))?);
    }
    let source_table =
        source_table.ok_or_else(|| Error::Parse("CREATE INDEX needs FROM".to_string()))?;

    Ok(Request::CreateIndex(CreateIndex {
        name: name.to_string(),
        columns: columns.into_iter().map(str::to_string).collect(),
        source_table: source_table.to_string(),
    }))
}

fn parse_select<'a>(first: &'a str, lines: impl Iterator<Item = &'a str>) -> Result<Request> {
    let fields = line(first, preceded(pair_space("SELECT"), field_list))?;
    let mut select = Select {
        fields: fields.into_iter().map(str::to_string).collect(),
        ..Select::default()
    };

    for text in body(lines)? {
        if text.starts_with("FROM") {
            let tables = line(text, preceded(pair_space("FROM"), name_list))?;
            select
                .tables
                .extend(tables.into_iter().map(str::to_string));
        } else {
            select.conditions.push(line(text, condition_line)?);
        }
    }

    if select.tables.is_empty() {
        return Err(Error::Parse("SELECT needs FROM".to_string()));
    }
    Ok(Request::Select(select))
}

/// Lines between the header and `END`
fn body<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Vec<&'a str>> {
    let mut out = Vec::new();
    for text in lines {
        if text == "END" {
            return Ok(out);
        }
        out.push(text);
    }
    Err(Error::Parse("missing END".to_string()))
}

/// Run a parser over a whole line
fn line<'a, O, P>(text: &'a str, parser: P) -> Result<O>
where
    P: FnMut(&'a str) -> IResult<&'a str, O>,
{
    all_consuming(parser)(text)
        .map(|(_, out)| out)
        .map_err(|_| Error::Parse(format!("cannot parse: {}", text)))
}

fn pair_space<'a>(keyword: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(keyword), space1)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.')(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(space0, char(','), space0)(input)
}

fn name_list(input: &str) -> IResult<&str, Vec<&str>> {
    terminated(separated_list1(comma, identifier), space0)(input)
}

fn field_list(input: &str) -> IResult<&str, Vec<&str>> {
    terminated(
        separated_list1(comma, alt((tag("*"), identifier))),
        space0,
    )(input)
}

/// `ADD <name> <type> [<length>]`
fn add_line(input: &str) -> IResult<&str, (&str, &str, Option<usize>)> {
    tuple((
        preceded(pair_space("ADD"), identifier),
        preceded(space1, take_while1(|c: char| c.is_ascii_alphabetic())),
        opt(preceded(space1, map_res(digit1, str::parse::<usize>))),
    ))(input)
}

/// `INSERT INTO <table> v1,v2,...`
fn insert_line(input: &str) -> IResult<&str, (String, Vec<String>)> {
    map(
        tuple((
            preceded(
                tuple((tag("INSERT"), space1, tag("INTO"), space1)),
                identifier,
            ),
            preceded(space1, rest),
        )),
        |(table, values): (&str, &str)| {
            (
                table.to_string(),
                values.split(',').map(|v| v.trim().to_string()).collect(),
            )
        },
    )(input)
}

/// A quoted constant (quotes kept) or a bare word
fn term(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('"'), take_while(|c: char| c != '"'), char('"'))),
        take_while1(|c: char| !c.is_whitespace()),
    ))(input)
}

/// `WHERE|AND|OR <lhs> <op> <rhs>`
fn condition_line(input: &str) -> IResult<&str, ConditionSpec> {
    map(
        tuple((
            terminated(
                alt((
                    map(tag("WHERE"), |_| Conjunction::And),
                    map(tag("AND"), |_| Conjunction::And),
                    map(tag("OR"), |_| Conjunction::Or),
                )),
                space1,
            ),
            terminated(term, space1),
            terminated(take_while1(|c: char| !c.is_whitespace()), space1),
            term,
        )),
        |(conjunction, lhs, op, rhs)| ConditionSpec::new(conjunction, lhs, op, rhs),
    )(input)
}

/// Groups input lines into complete statements
#[derive(Debug, Default)]
pub struct StatementBuffer {
    pending: Vec<String>,
}

impl StatementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns a statement once it is complete
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if self.pending.is_empty() {
            if trimmed.is_empty() {
                return None;
            }
            if BLOCK_STARTS.iter().any(|start| trimmed.starts_with(start)) {
                self.pending.push(trimmed.to_string());
                return None;
            }
            return Some(trimmed.to_string());
        }

        self.pending.push(trimmed.to_string());
        if trimmed == "END" {
            let statement = self.pending.join("\n");
            self.pending.clear();
            return Some(statement);
        }
        None
    }

    /// True while a block statement is waiting for `END`
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
