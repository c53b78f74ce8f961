//! Parser for match queries and rule patterns, built on the grammar in `pattern.pest`.
//!
//! ```text
//! match $x isa person, has age <10; ($x, $y) isa sublocate; select $x;
//! match $y isa country; {$y has name 'Poland';} or {$y has name 'England';};
//! ```

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::datatype::{Comparator, Literal, Predicate};
use crate::error::{ResolventError, Result};
use crate::pattern::{MatchQuery, Pattern, VarPattern};

#[derive(Parser)]
#[grammar = "pattern.pest"]
pub struct PatternParser;

/// Parses a complete `match ...; [select ...;]` query.
pub fn parse_query(text: &str) -> Result<MatchQuery> {
    let query = PatternParser::parse(Rule::query, text)?
        .next()
        .ok_or_else(|| parse_error("empty query"))?;
    let mut pattern = None;
    let mut select = Vec::new();
    for pair in query.into_inner() {
        match pair.as_rule() {
            Rule::patterns => pattern = Some(Pattern::Conjunction(build_patterns(pair)?)),
            Rule::select => {
                select = pair
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::variable)
                    .map(|p| p.as_str().to_owned())
                    .collect();
            }
            _ => (),
        }
    }
    let pattern = pattern.ok_or_else(|| parse_error("match without patterns"))?;
    Ok(MatchQuery::new(pattern, select))
}

/// Parses a semicolon-terminated list of patterns, as written in rule bodies and heads.
pub fn parse_patterns(text: &str) -> Result<Pattern> {
    let list = PatternParser::parse(Rule::pattern_list, text)?
        .next()
        .ok_or_else(|| parse_error("empty pattern list"))?;
    for pair in list.into_inner() {
        if pair.as_rule() == Rule::patterns {
            return Ok(Pattern::Conjunction(build_patterns(pair)?));
        }
    }
    Err(parse_error("no patterns found"))
}

fn parse_error(message: &str) -> ResolventError {
    ResolventError::Parse {
        message: message.to_owned(),
        line: None,
        col: None,
    }
}

fn build_patterns(pair: Pair<Rule>) -> Result<Vec<Pattern>> {
    pair.into_inner().map(build_pattern).collect()
}

fn build_pattern(pair: Pair<Rule>) -> Result<Pattern> {
    match pair.as_rule() {
        Rule::var_pattern => Ok(Pattern::Var(build_var_pattern(pair)?)),
        Rule::block => Ok(Pattern::Conjunction(build_patterns(pair)?)),
        Rule::disjunction => {
            let branches = pair
                .into_inner()
                .filter(|p| p.as_rule() == Rule::block)
                .map(|p| build_patterns(p).map(Pattern::Conjunction))
                .collect::<Result<Vec<_>>>()?;
            Ok(Pattern::Disjunction(branches))
        }
        other => Err(parse_error(&format!("unexpected {:?}", other))),
    }
}

fn build_var_pattern(pair: Pair<Rule>) -> Result<VarPattern> {
    let mut fragment = VarPattern::anonymous();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::variable => fragment = VarPattern::named(part.as_str()),
            Rule::castings => {
                for casting in part.into_inner() {
                    let mut role = None;
                    let mut player = "";
                    for piece in casting.into_inner() {
                        match piece.as_rule() {
                            Rule::label => role = Some(piece.as_str()),
                            Rule::variable => player = piece.as_str(),
                            _ => (),
                        }
                    }
                    fragment = fragment.with_casting(role, player);
                }
            }
            Rule::isa => {
                if let Some(label) = labels(part).next() {
                    fragment = fragment.with_isa(&label);
                }
            }
            Rule::has => {
                let mut attribute = String::new();
                for piece in part.into_inner() {
                    match piece.as_rule() {
                        Rule::label => attribute = piece.as_str().to_owned(),
                        Rule::variable => fragment = fragment.with_has_var(&attribute, piece.as_str()),
                        Rule::predicate => {
                            fragment = fragment.with_has_value(&attribute, build_predicate(piece)?)
                        }
                        _ => (),
                    }
                }
            }
            Rule::value => {
                for piece in part.into_inner() {
                    if piece.as_rule() == Rule::predicate {
                        fragment = fragment.with_predicate(build_predicate(piece)?);
                    }
                }
            }
            Rule::id => {
                for piece in part.into_inner() {
                    if piece.as_rule() == Rule::string {
                        fragment = fragment.with_predicate(Predicate::Id(unquote(piece)));
                    }
                }
            }
            _ => (),
        }
    }
    Ok(fragment)
}

fn labels(pair: Pair<Rule>) -> impl Iterator<Item = String> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::label)
        .map(|p| p.as_str().to_owned())
}

fn build_predicate(pair: Pair<Rule>) -> Result<Predicate> {
    let mut comparator = Comparator::Eq;
    for piece in pair.into_inner() {
        match piece.as_rule() {
            Rule::comparator => {
                comparator = match piece.as_str() {
                    "!=" => Comparator::Neq,
                    "<=" => Comparator::Lte,
                    ">=" => Comparator::Gte,
                    "<" => Comparator::Lt,
                    ">" => Comparator::Gt,
                    _ => Comparator::Eq,
                }
            }
            Rule::string => return Ok(Predicate::Value(comparator, Literal::Str(unquote(piece)))),
            Rule::number => return Ok(Predicate::Value(comparator, Literal::parse(piece.as_str()))),
            Rule::contains => {
                for inner in piece.into_inner() {
                    if inner.as_rule() == Rule::string {
                        return Ok(Predicate::Value(Comparator::Contains, Literal::Str(unquote(inner))));
                    }
                }
            }
            Rule::regex => {
                let raw = piece
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().replace("\\/", "/"))
                    .unwrap_or_default();
                return Ok(Predicate::Value(Comparator::Regex, Literal::Str(raw)));
            }
            _ => (),
        }
    }
    Err(parse_error("predicate without a value"))
}

fn unquote(string: Pair<Rule>) -> String {
    let raw = string.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
