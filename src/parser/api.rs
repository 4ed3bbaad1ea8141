use std::fmt::Write;
use std::rc::Rc;

use pest::error::{Error, ErrorVariant};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use super::ast::*;

#[derive(Parser)]
#[grammar = "parser/script_grammar.pest"] // relative to src
pub struct ScriptParser;

const INDENT: usize = 2;

impl ScriptParser {
    pub fn parse_to_script(source: &str) -> Result<Script, Error<Rule>> {
        let pairs = ScriptParser::parse(Rule::script, source)?;
        let mut body = vec![];
        for pair in pairs {
            // `script` wraps the statement list.
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::EOI {
                    continue;
                }
                body.push(build_statement(inner)?);
            }
        }
        Ok(Script { body })
    }
}

/// Outline of the pest pairs for `source`, one rule per line with its byte range.
/// Leaf rules also show the text they matched.
pub fn parse_to_token_tree(source: &str) -> Result<String, Error<Rule>> {
    let mut out = String::new();
    for pair in ScriptParser::parse(Rule::script, source)? {
        write_pair(&mut out, pair, 0);
    }
    Ok(out.trim_end().to_string())
}

fn write_pair(out: &mut String, pair: Pair<Rule>, depth: usize) {
    let span = pair.as_span();
    let _ = write!(
        out,
        "{:indent$}{:?} {}..{}",
        "",
        pair.as_rule(),
        span.start(),
        span.end(),
        indent = depth * INDENT
    );
    let mut children = pair.clone().into_inner().peekable();
    if children.peek().is_none() {
        let _ = write!(out, " {:?}", span.as_str());
    }
    out.push('\n');
    for child in children {
        write_pair(out, child, depth + 1);
    }
}

fn build_statement(pair: Pair<Rule>) -> Result<Statement, Error<Rule>> {
    match pair.as_rule() {
        Rule::define_statement => {
            let mut inner = pair.clone().into_inner();
            let path = match inner.next() {
                Some(p) => p.as_str().to_string(),
                None => return Err(custom_error("expected namespace", &pair)),
            };
            let value = match inner.next() {
                Some(lit) => Some(build_literal(lit)?),
                None => None,
            };
            Ok(Statement::Define { path, value })
        }
        Rule::require_statement => {
            let mut requires = vec![];
            let mut body = vec![];
            for child in pair.into_inner() {
                match child.as_rule() {
                    Rule::requirement_list => {
                        requires = child.into_inner().map(|r| r.as_str().to_string()).collect();
                    }
                    Rule::block => {
                        body = build_block(child.into_inner())?;
                    }
                    _ => return Err(get_unexpected_error(&child)),
                }
            }
            Ok(Statement::Require {
                requires,
                body: Rc::new(body),
            })
        }
        Rule::log_statement => {
            let message = match pair.clone().into_inner().next() {
                Some(s) => unescape(string_inner(s)),
                None => return Err(get_unexpected_error(&pair)),
            };
            Ok(Statement::Log(message))
        }
        _ => Err(get_unexpected_error(&pair)),
    }
}

fn build_block(pairs: Pairs<Rule>) -> Result<Vec<Statement>, Error<Rule>> {
    pairs.map(build_statement).collect()
}

fn build_literal(pair: Pair<Rule>) -> Result<Literal, Error<Rule>> {
    match pair.as_rule() {
        Rule::string_literal => Ok(Literal::Str(unescape(string_inner(pair)))),
        Rule::number_literal => pair
            .as_str()
            .parse::<f64>()
            .map(Literal::Number)
            .map_err(|e| custom_error(&format!("invalid number: {}", e), &pair)),
        Rule::boolean_literal => Ok(Literal::Bool(pair.as_str() == "true")),
        Rule::null_literal => Ok(Literal::Null),
        _ => Err(get_unexpected_error(&pair)),
    }
}

fn string_inner<'i>(pair: Pair<'i, Rule>) -> &'i str {
    pair.into_inner().next().map(|p| p.as_str()).unwrap_or("")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn get_unexpected_error(pair: &Pair<Rule>) -> Error<Rule> {
    custom_error(&format!("Unexpected rule {:?}", pair.as_rule()), pair)
}

fn custom_error(message: &str, pair: &Pair<Rule>) -> Error<Rule> {
    Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.to_string(),
        },
        pair.as_span(),
    )
}
