// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rendering of math objects
//!
//! Every node kind has a shape template: a sequence of child positions,
//! nested positions, literal glyphs and macros. Macros are resolved per
//! output format through [`symbol`]. Parentheses come from a fixed
//! precedence table so the output is unambiguous.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{MathObject, NodeKind};

/// Output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Utf8,
    Html,
    Text,
    /// Prover source syntax
    Lean,
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Format::Utf8),
            "html" => Ok(Format::Html),
            "text" => Ok(Format::Text),
            "lean" | "lean-source" => Ok(Format::Lean),
            _ => Err(anyhow::anyhow!(
                "Invalid display format: {}. Must be one of utf8, html, text, lean",
                s
            )),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Format::Utf8 => "utf8",
            Format::Html => "html",
            Format::Text => "text",
            Format::Lean => "lean",
        };
        f.write_str(s)
    }
}

/// One item of a shape template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Child at this position
    Child(usize),
    /// Grandchild reached through these positions
    Nested(&'static [usize]),
    /// Literal text
    Glyph(&'static str),
    /// Format-dependent symbol, see [`symbol`]
    Macro(&'static str),
    /// All children joined by the glyph
    Children(&'static str),
    /// The node's name
    Name,
    /// The node's value
    Value,
}

use Shape::*;

/// Shape template of `node` in `format`
pub fn shape(node: NodeKind, format: Format) -> &'static [Shape] {
    match (node, format) {
        (NodeKind::Application, Format::Lean) => &[Child(0), Glyph(" "), Child(1)],
        (NodeKind::Lambda, Format::Lean) => {
            &[Glyph("λ "), Child(1), Glyph(" : "), Child(0), Glyph(", "), Child(2)]
        }
        (NodeKind::SetFamily, Format::Lean) => &[Child(0), Glyph(" → "), Child(1)],
        (NodeKind::Sequence, Format::Lean) => &[Child(0), Glyph(" → "), Child(1)],

        (NodeKind::And, _) => &[Child(0), Macro("and"), Child(1)],
        (NodeKind::Or, _) => &[Child(0), Macro("or"), Child(1)],
        (NodeKind::Not, _) => &[Macro("not"), Child(0)],
        (NodeKind::Implies, _) => &[Child(0), Macro("implies"), Child(1)],
        (NodeKind::Iff, _) => &[Child(0), Macro("iff"), Child(1)],
        (NodeKind::False, _) => &[Macro("false")],
        (NodeKind::True, _) => &[Macro("true")],
        (NodeKind::Forall, _) => &[
            Macro("forall"),
            Child(1),
            Macro("type_sep"),
            Child(0),
            Glyph(", "),
            Child(2),
        ],
        (NodeKind::Exists, _) => &[
            Macro("exists"),
            Child(1),
            Macro("type_sep"),
            Child(0),
            Glyph(", "),
            Child(2),
        ],
        (NodeKind::ExistsUnique, _) => &[
            Macro("exists_unique"),
            Child(1),
            Macro("type_sep"),
            Child(0),
            Glyph(", "),
            Child(2),
        ],
        (NodeKind::Equals, _) => &[Child(0), Glyph(" = "), Child(1)],
        (NodeKind::NotEquals, _) => &[Child(0), Macro("neq"), Child(1)],
        (NodeKind::Less, _) => &[Child(0), Glyph(" < "), Child(1)],
        (NodeKind::LessOrEqual, _) => &[Child(0), Macro("le"), Child(1)],
        (NodeKind::Greater, _) => &[Child(0), Glyph(" > "), Child(1)],
        (NodeKind::GreaterOrEqual, _) => &[Child(0), Macro("ge"), Child(1)],
        (NodeKind::Belongs, _) => &[Child(0), Macro("in"), Child(1)],
        (NodeKind::Included, _) => &[Child(0), Macro("subset"), Child(1)],
        (NodeKind::Union, _) => &[Child(0), Macro("union"), Child(1)],
        (NodeKind::Inter, _) => &[Child(0), Macro("inter"), Child(1)],
        (NodeKind::Complement, _) => &[Macro("complement_pre"), Child(0), Macro("complement_post")],
        (NodeKind::SetDifference, _) => &[Child(0), Macro("setminus"), Child(1)],
        (NodeKind::Image, _) => &[Child(0), Macro("image_open"), Child(1), Macro("image_close")],
        (NodeKind::InverseImage, _) => {
            &[Child(0), Macro("preimage_open"), Child(1), Macro("image_close")]
        }
        (NodeKind::SetExtension, _) => &[Glyph("{"), Children(", "), Glyph("}")],
        (NodeKind::EmptySet, _) => &[Macro("empty")],
        (NodeKind::Sum, _) => &[Child(0), Glyph(" + "), Child(1)],
        (NodeKind::Difference, _) => &[Child(0), Glyph(" - "), Child(1)],
        (NodeKind::Mult, _) => &[Child(0), Macro("mult"), Child(1)],
        (NodeKind::Div, _) => &[Child(0), Glyph(" / "), Child(1)],
        (NodeKind::Power, _) => &[Child(0), Glyph("^"), Child(1)],
        (NodeKind::Minus, _) => &[Glyph("-"), Child(0)],
        (NodeKind::Number, _) => &[Value],
        (NodeKind::Set, _) => &[Macro("set_open"), Child(0), Macro("set_close")],
        (NodeKind::Function, _) => &[Child(0), Macro("to"), Child(1)],
        (NodeKind::Sequence, _) => &[Macro("sequence"), Child(1), Macro("indexed_by"), Child(0)],
        (NodeKind::SetFamily, _) => &[Macro("family"), Nested(&[1, 0]), Macro("indexed_by"), Child(0)],
        (NodeKind::Type, _) => &[Macro("type")],
        (NodeKind::Prop, _) => &[Macro("prop")],
        (NodeKind::Lambda, _) => &[Child(1), Macro("maps_to"), Child(2)],
        (NodeKind::Application, _) => &[Child(0), Glyph("("), Child(1), Glyph(")")],
        (NodeKind::GenericParentheses, _) => &[Glyph("("), Child(0), Glyph(")")],
        (NodeKind::BoundVar, _)
        | (NodeKind::LocalConstant, _)
        | (NodeKind::Constant, _)
        | (NodeKind::Metavar, _)
        | (NodeKind::RawLeanCode, _) => &[Name],
        (NodeKind::NoMathType, _) => &[Glyph("?")],
    }
}

/// Resolve a macro for a format; HTML shares the UTF-8 glyphs
pub fn symbol(name: &str, format: Format) -> &'static str {
    let (utf8, text, lean) = match name {
        "and" => (" ∧ ", " and ", " ∧ "),
        "or" => (" ∨ ", " or ", " ∨ "),
        "not" => ("¬", "not ", "¬"),
        "implies" => (" ⇒ ", " implies ", " → "),
        "iff" => (" ⇔ ", " iff ", " ↔ "),
        "false" => ("False", "false", "false"),
        "true" => ("True", "true", "true"),
        "forall" => ("∀ ", "for all ", "∀ "),
        "exists" => ("∃ ", "there exists ", "∃ "),
        "exists_unique" => ("∃! ", "there exists a unique ", "∃! "),
        "type_sep" => (" ∈ ", " in ", " : "),
        "neq" => (" ≠ ", " != ", " ≠ "),
        "le" => (" ≤ ", " <= ", " ≤ "),
        "ge" => (" ≥ ", " >= ", " ≥ "),
        "in" => (" ∈ ", " belongs to ", " ∈ "),
        "subset" => (" ⊂ ", " is included in ", " ⊆ "),
        "union" => (" ∪ ", " union ", " ∪ "),
        "inter" => (" ∩ ", " inter ", " ∩ "),
        "complement_pre" => ("", "complement of ", ""),
        "complement_post" => ("ᶜ", "", "ᶜ"),
        "setminus" => (" \\ ", " minus ", " \\ "),
        "image_open" => ("(", "(", " '' "),
        "preimage_open" => ("⁻¹(", " inverse image of (", " ⁻¹' "),
        "image_close" => (")", ")", ""),
        "empty" => ("∅", "empty set", "∅"),
        "mult" => (" × ", " * ", " * "),
        "set_open" => ("𝒫(", "subsets of ", "set "),
        "set_close" => (")", "", ""),
        "to" => (" → ", " -> ", " → "),
        "maps_to" => (" ↦ ", " maps to ", " ↦ "),
        "sequence" => ("sequence in ", "sequence in ", ""),
        "family" => ("family of subsets of ", "family of subsets of ", ""),
        "indexed_by" => (" indexed by ", " indexed by ", " → "),
        "type" => ("a set", "a set", "Type"),
        "prop" => ("a proposition", "a proposition", "Prop"),
        _ => ("", "", ""),
    };
    match format {
        Format::Utf8 | Format::Html => utf8,
        Format::Text => text,
        Format::Lean => lean,
    }
}

/// Binding strength, higher binds tighter
pub fn precedence(node: NodeKind) -> u8 {
    use NodeKind::*;
    match node {
        Forall | Exists | ExistsUnique | Lambda => 5,
        Iff => 10,
        Function | Sequence | SetFamily => 15,
        Implies => 20,
        Or => 30,
        And => 40,
        Not => 50,
        Equals | NotEquals | Less | LessOrEqual | Greater | GreaterOrEqual | Belongs
        | Included => 60,
        Union | SetDifference => 70,
        Inter => 75,
        Sum | Difference => 80,
        Mult | Div => 90,
        Minus => 95,
        Power => 100,
        Complement => 105,
        Image | InverseImage | Set => 110,
        Application => 120,
        _ => 200,
    }
}

fn is_associative(node: NodeKind) -> bool {
    matches!(
        node,
        NodeKind::And | NodeKind::Or | NodeKind::Sum | NodeKind::Mult | NodeKind::Union | NodeKind::Inter
    )
}

/// Whether child `index` of `parent` must be parenthesised
pub fn needs_parentheses(parent: &MathObject, index: usize, format: Format) -> bool {
    let Some(child) = parent.children.get(index) else {
        return false;
    };
    let (p, c) = (precedence(parent.node), precedence(child.node));
    if c >= 200 {
        return false;
    }
    match parent.node {
        // Bodies and types of binders extend as far as possible
        NodeKind::Forall | NodeKind::Exists | NodeKind::ExistsUnique => false,
        NodeKind::Lambda => format == Format::Lean && index == 0 && c <= p,
        NodeKind::GenericParentheses | NodeKind::SetExtension => false,
        NodeKind::Application => index == 0 || format == Format::Lean,
        NodeKind::Image | NodeKind::InverseImage => index == 0 || format == Format::Lean,
        NodeKind::Set => format == Format::Lean,
        NodeKind::SetFamily | NodeKind::Sequence if format != Format::Lean => false,
        _ if c < p => true,
        _ if c > p => false,
        // Same strength
        NodeKind::Implies | NodeKind::Power | NodeKind::Function => index == 0,
        NodeKind::Difference | NodeKind::Div => index > 0,
        NodeKind::Not | NodeKind::Minus | NodeKind::Complement => false,
        node => !(is_associative(node) && child.node == node),
    }
}

/// Render `obj`; `depth` bounds the nesting shown before eliding with `…`
pub fn render(obj: &MathObject, format: Format, depth: Option<usize>) -> String {
    let mut r = Renderer {
        format,
        out: String::new(),
    };
    r.write(obj, depth);
    r.out
}

struct Renderer {
    format: Format,
    out: String,
}

impl Renderer {
    fn push(&mut self, s: &str) {
        if self.format == Format::Html {
            for ch in s.chars() {
                match ch {
                    '&' => self.out.push_str("&amp;"),
                    '<' => self.out.push_str("&lt;"),
                    '>' => self.out.push_str("&gt;"),
                    '"' => self.out.push_str("&quot;"),
                    c => self.out.push(c),
                }
            }
        } else {
            self.out.push_str(s);
        }
    }

    fn write(&mut self, obj: &MathObject, depth: Option<usize>) {
        if depth == Some(0) && !obj.children.is_empty() {
            self.push("…");
            return;
        }
        let next = depth.map(|d| d.saturating_sub(1));
        for item in shape(obj.node, self.format) {
            match *item {
                Child(i) => self.write_child(obj, i, next),
                Nested(path) => {
                    let mut target = Some(obj);
                    for i in path {
                        target = target.and_then(|o| o.children.get(*i));
                    }
                    match target {
                        Some(t) if t.children.is_empty() => self.write(t, next),
                        Some(t) => {
                            self.push("(");
                            self.write(t, next);
                            self.push(")");
                        }
                        None => self.push("?"),
                    }
                }
                Glyph(g) => self.push(g),
                Macro(m) => {
                    let s = symbol(m, self.format);
                    self.push(s);
                }
                Children(sep) => {
                    for i in 0..obj.children.len() {
                        if i > 0 {
                            self.push(sep);
                        }
                        self.write_child(obj, i, next);
                    }
                }
                Name => {
                    let name = obj
                        .name()
                        .filter(|n| !n.is_empty())
                        .or_else(|| obj.identifier())
                        .unwrap_or("?")
                        .to_string();
                    self.push(&name);
                }
                Value => {
                    let value = obj.value().unwrap_or("?").to_string();
                    self.push(&value);
                }
            }
        }
    }

    fn write_child(&mut self, parent: &MathObject, index: usize, depth: Option<usize>) {
        let Some(child) = parent.children.get(index) else {
            self.push("?");
            return;
        };
        if needs_parentheses(parent, index, self.format) {
            self.push("(");
            self.write(child, depth);
            self.push(")");
        } else {
            self.write(child, depth);
        }
    }
}
