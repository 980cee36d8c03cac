// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! nom grammar for the `¿`-delimited introspection format
//!
//! ```text
//! record   := TAG "[" node "]" ws "¿=" ws node
//! node     := tag info? children?
//! info     := "¿[" pair ("/" pair)* "¿]"
//! children := "¿(" node ("¿," node)* "¿)"
//! ```
//!
//! This layer only recovers the shape; node tags are interpreted by the
//! proof-state builder in the parent module.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_till1, take_until},
    character::complete::{char, multispace0},
    combinator::opt,
    multi::separated_list1,
    sequence::{delimited, preceded, tuple},
    IResult,
};

/// Node as written on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    pub tag: String,
    pub info: Vec<(String, String)>,
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn info(&self, key: &str) -> Option<&str> {
        self.info
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Object,
    Property,
}

/// One `TAG[head] ¿= tail` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub head: RawNode,
    pub tail: RawNode,
}

fn node_tag(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == '¿' || c == '[' || c == ']' || c.is_whitespace())(input)
}

fn info_pair(input: &str) -> IResult<&str, (String, String)> {
    let (input, key) = take_till1(|c: char| c == ':' || c == '/' || c == '¿')(input)?;
    let (input, _) = char(':')(input)?;
    // pp_type is printed last and may contain any character
    let (input, value) = if key == "pp_type" {
        take_until("¿]")(input)?
    } else {
        take_till(|c: char| c == '/' || c == '¿')(input)?
    };
    Ok((input, (key.to_string(), value.to_string())))
}

fn info(input: &str) -> IResult<&str, Vec<(String, String)>> {
    delimited(
        tag("¿["),
        separated_list1(char('/'), info_pair),
        tag("¿]"),
    )(input)
}

fn children(input: &str) -> IResult<&str, Vec<RawNode>> {
    let (input, _) = tag("¿(")(input)?;
    let (input, nodes) = separated_list1(tuple((tag("¿,"), multispace0)), node)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = tag("¿)")(input)?;
    Ok((input, nodes))
}

/// A node with its info and children
pub fn node(input: &str) -> IResult<&str, RawNode> {
    let (input, _) = multispace0(input)?;
    let (input, tag) = node_tag(input)?;
    let (input, info) = opt(info)(input)?;
    let (input, children) = opt(children)(input)?;
    Ok((
        input,
        RawNode {
            tag: tag.to_string(),
            info: info.unwrap_or_default(),
            children: children.unwrap_or_default(),
        },
    ))
}

/// A complete `OBJECT[...] ¿= ...` or `PROPERTY[...] ¿= ...` record
pub fn record(input: &str) -> IResult<&str, RawRecord> {
    let (input, _) = multispace0(input)?;
    let (input, kind) = alt((tag("OBJECT"), tag("PROPERTY")))(input)?;
    let kind = if kind == "OBJECT" {
        RecordKind::Object
    } else {
        RecordKind::Property
    };
    let (input, head) = delimited(char('['), node, char(']'))(input)?;
    let (input, tail) = preceded(tuple((multispace0, tag("¿="), multispace0)), node)(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, RawRecord { kind, head, tail }))
}

/// Parse a whole record, rejecting trailing garbage
pub fn parse_record(line: &str) -> Option<RawRecord> {
    match record(line) {
        Ok((rest, r)) if rest.trim().is_empty() => Some(r),
        _ => None,
    }
}

/// Split on `¿¿¿` occurring outside any `¿(`/`¿)` nesting
pub fn split_top_level(text: &str) -> Vec<&str> {
    const SEP: &str = "¿¿¿";
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with(SEP) && depth == 0 {
            parts.push(&text[start..i]);
            i += SEP.len();
            start = i;
            continue;
        }
        if rest.starts_with("¿(") {
            depth += 1;
        } else if rest.starts_with("¿)") {
            depth = depth.saturating_sub(1);
        }
        // Advance by one character, not one byte
        i += rest.chars().next().map_or(1, char::len_utf8);
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_with_info_and_children() {
        let (rest, n) = node(
            "PROP_EQUALS¿(LOCAL_CONSTANT¿[name:x/identifier:0.x¿]¿(CONSTANT¿[name:ℝ¿]¿)¿, \
             NUMBER¿[value:0¿]¿)",
        )
        .unwrap();
        assert!(rest.is_empty());
        assert_eq!(n.tag, "PROP_EQUALS");
        assert_eq!(n.children.len(), 2);
        assert_eq!(n.children[0].info("identifier"), Some("0.x"));
        assert_eq!(n.children[0].children[0].info("name"), Some("ℝ"));
        assert_eq!(n.children[1].info("value"), Some("0"));
    }

    #[test]
    fn test_pp_type_runs_to_closing_bracket() {
        let (_, n) = node("LOCAL_CONSTANT¿[name:H/identifier:0.h/pp_type:a/b ∈ A ∩ B¿]").unwrap();
        assert_eq!(n.info("pp_type"), Some("a/b ∈ A ∩ B"));
        assert_eq!(n.info("name"), Some("H"));
    }

    #[test]
    fn test_record() {
        let r = parse_record(
            "PROPERTY[LOCAL_CONSTANT¿[name:H/identifier:0.h/pp_type:P¿]] ¿= \
             PROP_NOT¿(LOCAL_CONSTANT¿[name:P/identifier:0.p¿]¿(PROP¿)¿)",
        )
        .unwrap();
        assert_eq!(r.kind, RecordKind::Property);
        assert_eq!(r.head.info("name"), Some("H"));
        assert_eq!(r.tail.tag, "PROP_NOT");
    }

    #[test]
    fn test_malformed_records_are_rejected() {
        assert!(parse_record("OBJECT[LOCAL_CONSTANT¿[name:x¿]] ¿= PROP_AND¿(").is_none());
        assert!(parse_record("THING[x] ¿= y").is_none());
        assert!(parse_record("").is_none());
    }

    #[test]
    fn test_split_only_at_depth_zero() {
        let parts = split_top_level("A¿(B¿¿¿C¿)¿¿¿D");
        assert_eq!(parts, vec!["A¿(B¿¿¿C¿)", "D"]);
        assert_eq!(split_top_level("single"), vec!["single"]);
    }
}
