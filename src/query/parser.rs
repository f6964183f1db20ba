//! Filter expression parser
//!
//! Parses tag filter strings into [`FilterExpr`] trees.
//!
//! # Grammar
//!
//! ```text
//! expr   := term ( OR term )*
//! term   := factor ( AND factor )*
//! factor := '(' expr ')' | tag
//! tag    := ident ':' ident
//! ident  := [A-Za-z0-9_] [A-Za-z0-9_.-]*
//! ```
//!
//! `AND` and `OR` are case-insensitive and left-associative; `AND` binds
//! tighter than `OR`. Whitespace between tokens is skipped. Empty or
//! whitespace-only input means "no filter" and parses to `None`.
//!
//! # Examples
//!
//! ```text
//! env:prod
//! env:prod AND service:api
//! env:prod OR env:dev AND host:h1      (OR of prod and the AND pair)
//! (env:prod OR env:dev) AND host:h1
//! ```

use crate::query::ast::FilterExpr;
use crate::query::error::{QueryError, QueryResult};
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::{cut, recognize, verify};
use nom::error::{context, VerboseError, VerboseErrorKind};
use nom::sequence::{pair, preceded};
use nom::IResult;

type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// Parse a filter expression string
///
/// Returns `Ok(None)` for empty or whitespace-only input.
pub fn parse_filter(input: &str) -> QueryResult<Option<FilterExpr>> {
    if input.trim().is_empty() {
        return Ok(None);
    }

    match expr(input) {
        Ok((rest, filter)) => {
            if rest.trim().is_empty() {
                Ok(Some(filter))
            } else {
                Err(QueryError::Parse(format!(
                    "unexpected input after expression: '{}'",
                    rest.trim()
                )))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(QueryError::Parse(describe(input, &e)))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(QueryError::Parse("unexpected end of input".to_string()))
        }
    }
}

/// Render the innermost context of a nom error with its input offset
fn describe(input: &str, err: &VerboseError<&str>) -> String {
    for (rest, kind) in &err.errors {
        if let VerboseErrorKind::Context(message) = kind {
            return format!("{} at offset {}", message, input.len() - rest.len());
        }
    }
    "invalid filter expression".to_string()
}

fn expr(input: &str) -> PResult<'_, FilterExpr> {
    let (mut input, mut left) = term(input)?;
    while let Ok((rest, _)) = keyword(input, "OR") {
        let (rest, right) = cut(term)(rest)?;
        left = FilterExpr::or(left, right);
        input = rest;
    }
    Ok((input, left))
}

fn term(input: &str) -> PResult<'_, FilterExpr> {
    let (mut input, mut left) = factor(input)?;
    while let Ok((rest, _)) = keyword(input, "AND") {
        let (rest, right) = cut(factor)(rest)?;
        left = FilterExpr::and(left, right);
        input = rest;
    }
    Ok((input, left))
}

fn factor(input: &str) -> PResult<'_, FilterExpr> {
    preceded(multispace0, alt((paren, tag_pair)))(input)
}

fn paren(input: &str) -> PResult<'_, FilterExpr> {
    let (input, _) = char('(')(input)?;
    let (input, inner) = cut(expr)(input)?;
    let (input, _) = context("expected ')'", cut(preceded(multispace0, char(')'))))(input)?;
    Ok((input, inner))
}

fn tag_pair(input: &str) -> PResult<'_, FilterExpr> {
    let (input, key) = context("expected tag key", identifier)(input)?;
    let (input, _) = context("expected ':'", cut(preceded(multispace0, char(':'))))(input)?;
    let (input, value) =
        context("expected tag value", cut(preceded(multispace0, identifier)))(input)?;
    Ok((input, FilterExpr::tag(key, value)))
}

/// An identifier that is not one of the reserved operator words
fn identifier(input: &str) -> PResult<'_, &str> {
    verify(word, |ident: &&str| {
        !ident.eq_ignore_ascii_case("and") && !ident.eq_ignore_ascii_case("or")
    })(input)
}

fn word(input: &str) -> PResult<'_, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_char)))(input)
}

fn keyword<'a>(input: &'a str, kw: &str) -> PResult<'a, &'a str> {
    verify(preceded(multispace0, word), |w: &&str| {
        w.eq_ignore_ascii_case(kw)
    })(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c == '.' || c == '-'
}
