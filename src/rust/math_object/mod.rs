// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Math objects: the typed expression trees the prover's introspection
//! dumps are decoded into.
//!
//! A [`MathObject`] is a node kind drawn from the closed [`NodeKind`] enum,
//! an [`Info`] record, ordered children and a math type. Objects are
//! immutable once the parser has named their bound variables; equality is
//! structural modulo α-equivalence.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

pub mod display;
pub mod naming;
pub mod pattern;

pub use display::{render, Format};
pub use pattern::{Assignment, Pattern};

/// Closed set of node kinds understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    // Logic
    And,
    Or,
    Not,
    Implies,
    Iff,
    False,
    True,
    Forall,
    Exists,
    ExistsUnique,

    // Equality and order
    Equals,
    NotEquals,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,

    // Sets
    Belongs,
    Included,
    Union,
    Inter,
    Complement,
    SetDifference,
    Image,
    InverseImage,
    SetExtension,
    EmptySet,

    // Numbers
    Sum,
    Difference,
    Mult,
    Div,
    Power,
    Minus,
    Number,

    // Types
    Set,
    Function,
    Sequence,
    SetFamily,
    Type,
    Prop,

    // Binders and variables
    Lambda,
    BoundVar,
    LocalConstant,
    Constant,
    Application,

    // Markers
    Metavar,
    GenericParentheses,
    RawLeanCode,
    NoMathType,
}

impl NodeKind {
    pub const ALL: &'static [NodeKind] = &[
        NodeKind::And,
        NodeKind::Or,
        NodeKind::Not,
        NodeKind::Implies,
        NodeKind::Iff,
        NodeKind::False,
        NodeKind::True,
        NodeKind::Forall,
        NodeKind::Exists,
        NodeKind::ExistsUnique,
        NodeKind::Equals,
        NodeKind::NotEquals,
        NodeKind::Less,
        NodeKind::LessOrEqual,
        NodeKind::Greater,
        NodeKind::GreaterOrEqual,
        NodeKind::Belongs,
        NodeKind::Included,
        NodeKind::Union,
        NodeKind::Inter,
        NodeKind::Complement,
        NodeKind::SetDifference,
        NodeKind::Image,
        NodeKind::InverseImage,
        NodeKind::SetExtension,
        NodeKind::EmptySet,
        NodeKind::Sum,
        NodeKind::Difference,
        NodeKind::Mult,
        NodeKind::Div,
        NodeKind::Power,
        NodeKind::Minus,
        NodeKind::Number,
        NodeKind::Set,
        NodeKind::Function,
        NodeKind::Sequence,
        NodeKind::SetFamily,
        NodeKind::Type,
        NodeKind::Prop,
        NodeKind::Lambda,
        NodeKind::BoundVar,
        NodeKind::LocalConstant,
        NodeKind::Constant,
        NodeKind::Application,
        NodeKind::Metavar,
        NodeKind::GenericParentheses,
        NodeKind::RawLeanCode,
        NodeKind::NoMathType,
    ];

    /// Tag used in the introspection format
    pub fn tag(self) -> &'static str {
        match self {
            NodeKind::And => "PROP_AND",
            NodeKind::Or => "PROP_OR",
            NodeKind::Not => "PROP_NOT",
            NodeKind::Implies => "PROP_IMPLIES",
            NodeKind::Iff => "PROP_IFF",
            NodeKind::False => "PROP_FALSE",
            NodeKind::True => "PROP_TRUE",
            NodeKind::Forall => "QUANT_∀",
            NodeKind::Exists => "QUANT_∃",
            NodeKind::ExistsUnique => "QUANT_∃!",
            NodeKind::Equals => "PROP_EQUALS",
            NodeKind::NotEquals => "PROP_EQUALS_NOT",
            NodeKind::Less => "PROP_<",
            NodeKind::LessOrEqual => "PROP_≤",
            NodeKind::Greater => "PROP_>",
            NodeKind::GreaterOrEqual => "PROP_≥",
            NodeKind::Belongs => "PROP_BELONGS",
            NodeKind::Included => "PROP_INCLUDED",
            NodeKind::Union => "SET_UNION",
            NodeKind::Inter => "SET_INTER",
            NodeKind::Complement => "SET_COMPLEMENT",
            NodeKind::SetDifference => "SET_DIFF",
            NodeKind::Image => "SET_IMAGE",
            NodeKind::InverseImage => "SET_INVERSE",
            NodeKind::SetExtension => "SET_EXTENSION",
            NodeKind::EmptySet => "SET_EMPTY",
            NodeKind::Sum => "SUM",
            NodeKind::Difference => "DIFFERENCE",
            NodeKind::Mult => "MULT",
            NodeKind::Div => "DIV",
            NodeKind::Power => "POWER",
            NodeKind::Minus => "MINUS",
            NodeKind::Number => "NUMBER",
            NodeKind::Set => "SET",
            NodeKind::Function => "FUNCTION",
            NodeKind::Sequence => "SEQUENCE",
            NodeKind::SetFamily => "SET_FAMILY",
            NodeKind::Type => "TYPE",
            NodeKind::Prop => "PROP",
            NodeKind::Lambda => "LAMBDA",
            NodeKind::BoundVar => "BOUND_VAR",
            NodeKind::LocalConstant => "LOCAL_CONSTANT",
            NodeKind::Constant => "CONSTANT",
            NodeKind::Application => "APPLICATION",
            NodeKind::Metavar => "METAVAR",
            NodeKind::GenericParentheses => "GENERIC_PARENTHESES",
            NodeKind::RawLeanCode => "RAW_LEAN_CODE",
            NodeKind::NoMathType => "NO_MATH_TYPE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<NodeKind> {
        NodeKind::ALL.iter().copied().find(|k| k.tag() == tag)
    }

    /// Fixed number of children, `None` for variadic kinds
    pub fn arity(self) -> Option<usize> {
        use NodeKind::*;
        match self {
            False | True | EmptySet | Number | Type | Prop | BoundVar | Constant | Metavar
            | RawLeanCode | NoMathType => Some(0),
            Not | Complement | Minus | Set | GenericParentheses => Some(1),
            And | Or | Implies | Iff | Equals | NotEquals | Less | LessOrEqual | Greater
            | GreaterOrEqual | Belongs | Included | Union | Inter | SetDifference | Image
            | InverseImage | Sum | Difference | Mult | Div | Power | Function | Sequence
            | SetFamily | Application => Some(2),
            Forall | Exists | ExistsUnique | Lambda => Some(3),
            // A local constant reference may carry its type as a child on the wire
            SetExtension | LocalConstant => None,
        }
    }

    pub fn is_binder(self) -> bool {
        matches!(
            self,
            NodeKind::Forall | NodeKind::Exists | NodeKind::ExistsUnique | NodeKind::Lambda
        )
    }

    pub fn is_quantifier(self) -> bool {
        matches!(self, NodeKind::Forall | NodeKind::Exists | NodeKind::ExistsUnique)
    }

    /// Propositional by construction (tag starts with `PROP` or `QUANT`)
    pub fn is_prop_kind(self) -> bool {
        let tag = self.tag();
        (tag.starts_with("PROP_") || tag.starts_with("QUANT_")) && self != NodeKind::Prop
    }

    /// Sorts and type constructors
    pub fn is_type_kind(self) -> bool {
        matches!(
            self,
            NodeKind::Set
                | NodeKind::Function
                | NodeKind::Sequence
                | NodeKind::SetFamily
                | NodeKind::Type
                | NodeKind::Prop
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        NodeKind::from_tag(&tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown node tag {tag}")))
    }
}

/// Recognized info keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_var_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binder_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_type: Option<String>,
}

impl Info {
    pub const EMPTY: Info = Info {
        name: None,
        value: None,
        identifier: None,
        bound_var_number: None,
        binder_info: None,
        pp_type: None,
    };

    pub fn named(name: impl Into<String>) -> Self {
        Info {
            name: Some(name.into()),
            ..Info::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Info::EMPTY
    }

    /// Store `value` under `key`; returns false for unrecognized keys
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let value = value.to_string();
        match key {
            "name" => self.name = Some(value),
            "value" => self.value = Some(value),
            "identifier" => self.identifier = Some(value),
            "bound_var_number" => match value.parse() {
                Ok(n) => self.bound_var_number = Some(n),
                Err(_) => return false,
            },
            "binder_info" => self.binder_info = Some(value),
            "pp_type" => self.pp_type = Some(value),
            _ => return false,
        }
        true
    }

    /// `(key, value)` pairs in wire order, `pp_type` last
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(v) = &self.name {
            out.push(("name", v.clone()));
        }
        if let Some(v) = &self.value {
            out.push(("value", v.clone()));
        }
        if let Some(v) = &self.identifier {
            out.push(("identifier", v.clone()));
        }
        if let Some(v) = self.bound_var_number {
            out.push(("bound_var_number", v.to_string()));
        }
        if let Some(v) = &self.binder_info {
            out.push(("binder_info", v.clone()));
        }
        if let Some(v) = &self.pp_type {
            out.push(("pp_type", v.clone()));
        }
        out
    }
}

/// Sentinel returned by [`MathObject::math_type`] for untyped nodes
pub static NO_MATH_TYPE: MathObject = MathObject {
    node: NodeKind::NoMathType,
    info: Info::EMPTY,
    children: Vec::new(),
    math_type: None,
};

/// A node of a mathematical expression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathObject {
    pub node: NodeKind,
    #[serde(default, skip_serializing_if = "Info::is_empty")]
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MathObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub math_type: Option<Box<MathObject>>,
}

impl MathObject {
    pub fn new(
        node: NodeKind,
        info: Info,
        children: Vec<MathObject>,
        math_type: Option<MathObject>,
    ) -> Self {
        MathObject {
            node,
            info,
            children,
            math_type: math_type.map(Box::new),
        }
    }

    pub fn leaf(node: NodeKind) -> Self {
        MathObject::new(node, Info::default(), vec![], None)
    }

    pub fn prop() -> Self {
        MathObject::leaf(NodeKind::Prop)
    }

    pub fn type_sort() -> Self {
        MathObject::leaf(NodeKind::Type)
    }

    /// A global constant such as `ℝ` or `nat.succ`
    pub fn constant(name: impl Into<String>) -> Self {
        MathObject::new(NodeKind::Constant, Info::named(name), vec![], None)
    }

    pub fn typed_constant(name: impl Into<String>, math_type: MathObject) -> Self {
        MathObject::new(NodeKind::Constant, Info::named(name), vec![], Some(math_type))
    }

    pub fn number(value: impl Into<String>, math_type: Option<MathObject>) -> Self {
        let info = Info {
            value: Some(value.into()),
            ..Info::default()
        };
        MathObject::new(NodeKind::Number, info, vec![], math_type)
    }

    pub fn local_constant(
        name: impl Into<String>,
        identifier: impl Into<String>,
        math_type: MathObject,
    ) -> Self {
        let info = Info {
            name: Some(name.into()),
            identifier: Some(identifier.into()),
            ..Info::default()
        };
        MathObject::new(NodeKind::LocalConstant, info, vec![], Some(math_type))
    }

    pub fn bound_var(name: impl Into<String>, number: u32, math_type: MathObject) -> Self {
        let info = Info {
            name: Some(name.into()),
            bound_var_number: Some(number),
            ..Info::default()
        };
        MathObject::new(NodeKind::BoundVar, info, vec![], Some(math_type))
    }

    pub fn unary(node: NodeKind, a: MathObject) -> Self {
        let math_type = Self::default_type_for(node);
        MathObject::new(node, Info::default(), vec![a], math_type)
    }

    pub fn binary(node: NodeKind, a: MathObject, b: MathObject) -> Self {
        let math_type = match Self::default_type_for(node) {
            Some(t) => Some(t),
            // Arithmetic keeps the type of its operands
            None if matches!(
                node,
                NodeKind::Sum | NodeKind::Difference | NodeKind::Mult | NodeKind::Div | NodeKind::Power
            ) =>
            {
                a.math_type.as_deref().cloned()
            }
            None => None,
        };
        MathObject::new(node, Info::default(), vec![a, b], math_type)
    }

    /// Binder over `var` (a bound variable carrying its type)
    pub fn binder(node: NodeKind, var: MathObject, body: MathObject) -> Self {
        debug_assert!(node.is_binder());
        let var_type = var.math_type().clone();
        let math_type = Self::default_type_for(node);
        MathObject::new(node, Info::default(), vec![var_type, var, body], math_type)
    }

    pub fn application(function: MathObject, argument: MathObject) -> Self {
        let math_type = match function.math_type().node {
            NodeKind::Function => function.math_type().children.get(1).cloned(),
            NodeKind::Sequence => function.math_type().children.get(1).cloned(),
            _ => None,
        };
        MathObject::new(
            NodeKind::Application,
            Info::default(),
            vec![function, argument],
            math_type,
        )
    }

    pub fn set_of(element_type: MathObject) -> Self {
        MathObject::new(
            NodeKind::Set,
            Info::default(),
            vec![element_type],
            Some(MathObject::type_sort()),
        )
    }

    pub fn function_type(domain: MathObject, codomain: MathObject) -> Self {
        MathObject::new(
            NodeKind::Function,
            Info::default(),
            vec![domain, codomain],
            Some(MathObject::type_sort()),
        )
    }

    fn default_type_for(node: NodeKind) -> Option<MathObject> {
        if node.is_prop_kind() {
            Some(MathObject::prop())
        } else {
            None
        }
    }

    pub fn math_type(&self) -> &MathObject {
        self.math_type.as_deref().unwrap_or(&NO_MATH_TYPE)
    }

    pub fn has_math_type(&self) -> bool {
        self.math_type.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.info.name.as_deref()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.info.identifier.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.info.value.as_deref()
    }

    pub fn bound_var_number(&self) -> Option<u32> {
        self.info.bound_var_number
    }

    pub fn is(&self, node: NodeKind) -> bool {
        self.node == node
    }

    pub fn is_prop(&self) -> bool {
        self.math_type().node == NodeKind::Prop || self.node.is_prop_kind()
    }

    pub fn is_bound_var(&self) -> bool {
        self.node == NodeKind::BoundVar
    }

    pub fn is_no_math_type(&self) -> bool {
        self.node == NodeKind::NoMathType
    }

    pub fn child(&self, i: usize) -> Option<&MathObject> {
        self.children.get(i)
    }

    /// For binders: the bound variable
    pub fn bound_variable(&self) -> Option<&MathObject> {
        if self.node.is_binder() {
            self.children.get(1)
        } else {
            None
        }
    }

    /// For binders: the body
    pub fn body(&self) -> Option<&MathObject> {
        if self.node.is_binder() {
            self.children.get(2)
        } else {
            None
        }
    }

    /// Pre-order traversal (children only, not math types)
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a MathObject)) {
        f(self);
        for c in &self.children {
            c.walk(f);
        }
    }

    /// Names of local constants occurring in the tree
    pub fn local_constant_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.walk(&mut |o| {
            if o.node == NodeKind::LocalConstant {
                if let Some(n) = o.name() {
                    names.insert(n.to_string());
                }
            }
        });
        names
    }

    /// Names already given to bound variables of the tree
    pub fn bound_var_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.walk(&mut |o| {
            if o.node == NodeKind::BoundVar {
                if let Some(n) = o.name() {
                    names.insert(n.to_string());
                }
            }
        });
        names
    }

    /// Set the display name of every occurrence of bound variable `number`
    pub fn rename_bound_var(&mut self, number: u32, name: &str) {
        if self.node == NodeKind::BoundVar && self.bound_var_number() == Some(number) {
            self.info.name = Some(name.to_string());
        }
        for c in &mut self.children {
            c.rename_bound_var(number, name);
        }
    }

    /// α-equivalence
    pub fn alpha_eq(&self, other: &MathObject) -> bool {
        self.alpha_eq_with(other, &mut Vec::new())
    }

    fn alpha_eq_with(&self, other: &MathObject, pairs: &mut Vec<(u32, u32)>) -> bool {
        if self.node != other.node {
            return false;
        }
        let leaf_eq = match self.node {
            NodeKind::BoundVar => match (self.bound_var_number(), other.bound_var_number()) {
                (Some(l), Some(r)) => match pairs.iter().rev().find(|(a, b)| *a == l || *b == r) {
                    Some((a, b)) => *a == l && *b == r,
                    None => l == r,
                },
                _ => self.name() == other.name(),
            },
            NodeKind::LocalConstant => match (self.identifier(), other.identifier()) {
                (Some(l), Some(r)) => l == r,
                _ => self.name() == other.name(),
            },
            NodeKind::Constant | NodeKind::RawLeanCode => self.name() == other.name(),
            NodeKind::Metavar => {
                self.identifier() == other.identifier() && self.name() == other.name()
            }
            NodeKind::Number => self.value() == other.value(),
            _ => true,
        };
        if !leaf_eq || self.children.len() != other.children.len() {
            return false;
        }

        let pushed = match (
            self.bound_variable().and_then(|v| v.bound_var_number()),
            other.bound_variable().and_then(|v| v.bound_var_number()),
        ) {
            (Some(l), Some(r)) => {
                pairs.push((l, r));
                true
            }
            _ => false,
        };
        let eq = self
            .children
            .iter()
            .zip(&other.children)
            .all(|(a, b)| a.alpha_eq_with(b, pairs));
        if pushed {
            pairs.pop();
        }
        eq
    }

    /// True when `sub` occurs in the tree (up to α-equivalence)
    pub fn contains(&self, sub: &MathObject) -> bool {
        self.alpha_eq(sub) || self.children.iter().any(|c| c.contains(sub))
    }

    /// Replace every occurrence of `old` by `new`
    pub fn substitute(&self, old: &MathObject, new: &MathObject) -> MathObject {
        if self.alpha_eq(old) {
            return new.clone();
        }
        MathObject {
            node: self.node,
            info: self.info.clone(),
            children: self.children.iter().map(|c| c.substitute(old, new)).collect(),
            math_type: self.math_type.clone(),
        }
    }

    /// Instantiate a binder's body with `value` for its bound variable
    pub fn instantiate_body(&self, value: &MathObject) -> Option<MathObject> {
        let var = self.bound_variable()?;
        Some(self.body()?.substitute(var, value))
    }

    /// Identifier used on the wire for a bound variable
    fn wire_identifier(&self) -> String {
        match (self.identifier(), self.bound_var_number()) {
            (Some(id), _) => id.to_string(),
            (None, Some(n)) => format!("_bound.{n}"),
            (None, None) => format!("_bound.{}", self.name().unwrap_or("_")),
        }
    }

    /// Serialise to the introspection tree format understood by the parser
    pub fn to_introspection(&self) -> String {
        let mut out = String::new();
        self.write_introspection(&mut out, true);
        out
    }

    fn write_introspection(&self, out: &mut String, with_type: bool) {
        let mut info = self.info.clone();
        let tag = match self.node {
            NodeKind::BoundVar => {
                info = Info {
                    name: info.name.clone(),
                    identifier: Some(self.wire_identifier()),
                    binder_info: info.binder_info.clone(),
                    ..Info::default()
                };
                NodeKind::LocalConstant.tag()
            }
            // Raw code keeps its original tag
            NodeKind::RawLeanCode if self.name().is_some() => {
                let tag = self.name().unwrap_or_default().to_string();
                out.push_str(&tag);
                self.write_children(out);
                return;
            }
            other => other.tag(),
        };
        out.push_str(tag);
        let pairs = info.pairs();
        if !pairs.is_empty() {
            out.push_str("¿[");
            let joined: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}:{v}")).collect();
            out.push_str(&joined.join("/"));
            out.push_str("¿]");
        }
        let local = matches!(self.node, NodeKind::LocalConstant);
        if local && with_type && self.has_math_type() {
            out.push_str("¿(");
            self.math_type().write_introspection(out, true);
            out.push_str("¿)");
        } else {
            self.write_children(out);
        }
    }

    fn write_children(&self, out: &mut String) {
        if self.children.is_empty() {
            return;
        }
        out.push_str("¿(");
        for (i, c) in self.children.iter().enumerate() {
            if i > 0 {
                out.push_str("¿, ");
            }
            // Binder variables are declared, their type is child 0
            let declared = self.node.is_binder() && i == 1;
            c.write_introspection(out, !declared);
        }
        out.push_str("¿)");
    }
}

impl PartialEq for MathObject {
    fn eq(&self, other: &Self) -> bool {
        self.alpha_eq(other)
    }
}

impl Eq for MathObject {}

impl fmt::Display for MathObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, Format::Utf8, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real() -> MathObject {
        MathObject::typed_constant("ℝ", MathObject::type_sort())
    }

    fn forall_x_eq(number: u32, name: &str) -> MathObject {
        let x = MathObject::bound_var(name, number, real());
        let body = MathObject::binary(NodeKind::Equals, x.clone(), x.clone());
        MathObject::binder(NodeKind::Forall, x, body)
    }

    #[test]
    fn test_tags_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_tag(kind.tag()), Some(*kind));
        }
        assert_eq!(NodeKind::from_tag("PROP_WHATEVER"), None);
    }

    #[test]
    fn test_arity_table() {
        assert_eq!(NodeKind::Implies.arity(), Some(2));
        assert_eq!(NodeKind::Forall.arity(), Some(3));
        assert_eq!(NodeKind::Not.arity(), Some(1));
        assert_eq!(NodeKind::SetExtension.arity(), None);
    }

    #[test]
    fn test_propositions() {
        assert!(forall_x_eq(0, "x").is_prop());
        assert!(NodeKind::Exists.is_prop_kind());
        assert!(!NodeKind::Prop.is_prop_kind());
        assert!(!real().is_prop());
        let p = MathObject::local_constant("P", "0.p", MathObject::prop());
        assert!(p.is_prop());
    }

    #[test]
    fn test_alpha_equivalence() {
        let a = forall_x_eq(0, "x");
        let b = forall_x_eq(7, "y");
        assert_eq!(a, b);

        // ∀x, x = x  vs  ∀x, ∀y, x = y
        let x = MathObject::bound_var("x", 1, real());
        let y = MathObject::bound_var("y", 2, real());
        let inner = MathObject::binder(
            NodeKind::Forall,
            y.clone(),
            MathObject::binary(NodeKind::Equals, x.clone(), y.clone()),
        );
        let c = MathObject::binder(NodeKind::Forall, x, inner);
        assert_ne!(a, c);
    }

    #[test]
    fn test_local_constants_compare_by_identifier() {
        let a = MathObject::local_constant("x", "0.1", real());
        let b = MathObject::local_constant("renamed", "0.1", real());
        let c = MathObject::local_constant("x", "0.2", real());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_substitution_and_instantiation() {
        let a = MathObject::local_constant("a", "0.a", real());
        let b = MathObject::local_constant("b", "0.b", real());
        let p = MathObject::constant("P");
        let pa = MathObject::application(p.clone(), a.clone());
        let pb = pa.substitute(&a, &b);
        assert_eq!(pb, MathObject::application(p, b.clone()));
        assert!(pb.contains(&b));
        assert!(!pb.contains(&a));

        let inst = forall_x_eq(3, "x").instantiate_body(&a).unwrap();
        assert_eq!(inst, MathObject::binary(NodeKind::Equals, a.clone(), a));
    }

    #[test]
    fn test_rename_bound_var() {
        let mut f = forall_x_eq(4, "x");
        f.rename_bound_var(4, "t");
        assert_eq!(f.bound_var_names().into_iter().collect::<Vec<_>>(), vec!["t"]);
    }

    #[test]
    fn test_introspection_serialisation_shape() {
        let x = MathObject::local_constant("x", "0.x", real());
        let s = MathObject::binary(NodeKind::Equals, x.clone(), x).to_introspection();
        assert_eq!(
            s,
            "PROP_EQUALS¿(LOCAL_CONSTANT¿[name:x/identifier:0.x¿]¿(CONSTANT¿[name:ℝ¿]¿)¿, \
             LOCAL_CONSTANT¿[name:x/identifier:0.x¿]¿(CONSTANT¿[name:ℝ¿]¿)¿)"
        );
    }

    #[test]
    fn test_info_set_rejects_unknown_keys() {
        let mut info = Info::default();
        assert!(info.set("name", "H"));
        assert!(info.set("bound_var_number", "3"));
        assert!(!info.set("bound_var_number", "three"));
        assert!(!info.set("colour", "red"));
        assert_eq!(info.name.as_deref(), Some("H"));
        assert_eq!(info.bound_var_number, Some(3));
    }
}
