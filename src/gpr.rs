//! Gene-product association rules.
//!
//! A rule such as `b0001 and (b0002 or b0003)` parses into an [`Association`] tree
//! whose leaves are gene product ids of the owning [`Model`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::{CanonicalId, ElementKind};
use crate::error::XrefError;
use crate::model::{GeneProduct, Model};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Association {
    Leaf(String),
    And(Vec<Association>),
    Or(Vec<Association>),
}

impl Association {
    /// Conjunction of `children`, with nested conjunctions spliced in.
    pub fn and(children: Vec<Association>) -> Association {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Association::And(nested) => flat.extend(nested),
                other => flat.push(other),
            }
        }
        single_or(flat, Association::And)
    }

    /// Disjunction of `children`, with nested disjunctions spliced in.
    pub fn or(children: Vec<Association>) -> Association {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Association::Or(nested) => flat.extend(nested),
                other => flat.push(other),
            }
        }
        single_or(flat, Association::Or)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Association::Leaf(_))
    }

    pub fn children(&self) -> &[Association] {
        match self {
            Association::Leaf(_) => &[],
            Association::And(children) | Association::Or(children) => children,
        }
    }

    /// Leaf ids in depth-first order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Association::Leaf(id) => out.push(id),
            Association::And(children) | Association::Or(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    pub fn rename_leaf(&mut self, old_id: &str, new_id: &str) {
        match self {
            Association::Leaf(id) if id == old_id => *id = new_id.to_string(),
            Association::Leaf(_) => {}
            Association::And(children) | Association::Or(children) => {
                for child in children {
                    child.rename_leaf(old_id, new_id);
                }
            }
        }
    }

    fn try_map_leaves<F>(self, f: &mut F) -> Result<Association, XrefError>
    where
        F: FnMut(String) -> Result<String, XrefError>,
    {
        Ok(match self {
            Association::Leaf(id) => Association::Leaf(f(id)?),
            Association::And(children) => Association::And(
                children
                    .into_iter()
                    .map(|child| child.try_map_leaves(f))
                    .collect::<Result<_, _>>()?,
            ),
            Association::Or(children) => Association::Or(
                children
                    .into_iter()
                    .map(|child| child.try_map_leaves(f))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn single_or(
    mut children: Vec<Association>,
    wrap: fn(Vec<Association>) -> Association,
) -> Association {
    if children.len() == 1 {
        children.remove(0)
    } else {
        wrap(children)
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (children, op) = match self {
            Association::Leaf(id) => return f.write_str(id),
            Association::And(children) => (children, " and "),
            Association::Or(children) => (children, " or "),
        };
        for (index, child) in children.iter().enumerate() {
            if index > 0 {
                f.write_str(op)?;
            }
            if child.is_leaf() {
                write!(f, "{child}")?;
            } else {
                write!(f, "({child})")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Open,
    Close,
    And,
    Or,
}

fn tokenize(rule: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = rule.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | '|' => {
                chars.next();
                if chars.peek() == Some(&ch) {
                    chars.next();
                }
                tokens.push(if ch == '&' { Token::And } else { Token::Or });
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '&' | '|') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let token = match word.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
        }
    }
    tokens
}

struct Parser<'a> {
    rule: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> XrefError {
        XrefError::GprParse {
            rule: self.rule.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<Association, XrefError> {
        let mut children = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.bump();
            children.push(self.and_expr()?);
        }
        Ok(Association::or(children))
    }

    fn and_expr(&mut self) -> Result<Association, XrefError> {
        let mut children = vec![self.atom()?];
        while self.peek() == Some(&Token::And) {
            self.bump();
            children.push(self.atom()?);
        }
        Ok(Association::and(children))
    }

    fn atom(&mut self) -> Result<Association, XrefError> {
        match self.bump() {
            Some(Token::Ident(id)) => Ok(Association::Leaf(id)),
            Some(Token::Open) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    Some(Token::Ident(id)) => Err(self.error(format!("adjacent identifiers near '{id}'"))),
                    None => Err(self.error("unbalanced parentheses: missing ')'")),
                    Some(_) => Err(self.error("unexpected token inside parentheses")),
                }
            }
            Some(Token::And | Token::Or) | None => Err(self.error("dangling operator")),
            Some(Token::Close) => Err(self.error("unbalanced parentheses: unexpected ')'")),
        }
    }
}

pub fn parse(rule: &str) -> Result<Association, XrefError> {
    let tokens = tokenize(rule);
    let mut parser = Parser {
        rule,
        tokens,
        pos: 0,
    };
    if parser.tokens.is_empty() {
        return Err(parser.error("empty rule"));
    }

    let association = parser.or_expr()?;
    match parser.bump() {
        None => Ok(association),
        Some(Token::Ident(id)) => Err(parser.error(format!("adjacent identifiers near '{id}'"))),
        Some(Token::Close) => Err(parser.error("unbalanced parentheses: unexpected ')'")),
        Some(_) => Err(parser.error("unexpected token")),
    }
}

/// Maps a rule token onto a gene product of `model`, creating or renaming it as
/// needed, and returns the canonical gene product id.
pub fn leaf_to_gene_product(token: &str, model: &mut Model) -> Result<String, XrefError> {
    let raw = token.trim();
    let id = gene_product_id(raw)?;

    let legacy = if raw.starts_with("G_") {
        raw.to_string()
    } else {
        format!("G_{raw}")
    };

    if model.gene_products.contains_key(&id) {
        return Ok(id);
    }
    if legacy != id && model.gene_products.contains_key(&legacy) {
        model.rename_gene_product(&legacy, &id);
        return Ok(id);
    }

    trace!(gene_product = %id, "creating gene product");
    model.add_gene_product(GeneProduct::new(&id));
    Ok(id)
}

fn gene_product_id(raw: &str) -> Result<String, XrefError> {
    let sanitized = raw.replace('.', "__SBML_DOT__").replace('-', "__");
    Ok(CanonicalId::parse(&sanitized, ElementKind::GeneProduct)?.encode())
}

/// Maps every leaf onto a gene product. All leaves are checked before `model` is
/// touched, so a bad token leaves the model unchanged.
pub fn canonicalize(association: Association, model: &mut Model) -> Result<Association, XrefError> {
    for leaf in association.leaves() {
        gene_product_id(leaf.trim())?;
    }
    association.try_map_leaves(&mut |token| leaf_to_gene_product(&token, model))
}

/// Structural comparison. Any two leaves compare equal regardless of their ids.
pub fn equivalent(a: &Association, b: &Association) -> bool {
    match (a, b) {
        (Association::Leaf(_), Association::Leaf(_)) => true,
        (Association::And(left), Association::And(right))
        | (Association::Or(left), Association::Or(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(left, right)| equivalent(left, right))
        }
        _ => false,
    }
}

pub fn merge(existing: Association, incoming: Association) -> Association {
    if equivalent(&existing, &incoming) {
        return existing;
    }
    match existing {
        Association::And(_) => prune_duplicate_leaves(vec![existing, incoming]),
        Association::Leaf(_) => {
            let mut children = match incoming {
                Association::Or(children) => children,
                other => vec![other],
            };
            children.push(existing);
            Association::Or(children)
        }
        Association::Or(mut children) => {
            match incoming {
                Association::Or(more) => children.extend(more),
                other => children.push(other),
            }
            Association::Or(children)
        }
    }
}

/// Builds an `Or` over `children`, dropping leaves already seen one level down.
/// Leaves of the first child are recorded but never pruned.
fn prune_duplicate_leaves(children: Vec<Association>) -> Association {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(children.len());

    for (index, child) in children.into_iter().enumerate() {
        if index == 0 {
            record_direct_leaves(&child, &mut seen);
            kept.push(child);
            continue;
        }
        match child {
            Association::Leaf(id) => {
                if seen.insert(id.clone()) {
                    kept.push(Association::Leaf(id));
                } else {
                    debug!(gene_product = %id, "dropping duplicate leaf");
                }
            }
            Association::And(grandchildren) => {
                let grandchildren = retain_unseen(grandchildren, &mut seen);
                if !grandchildren.is_empty() {
                    kept.push(Association::And(grandchildren));
                }
            }
            Association::Or(grandchildren) => {
                let grandchildren = retain_unseen(grandchildren, &mut seen);
                if !grandchildren.is_empty() {
                    kept.push(Association::Or(grandchildren));
                }
            }
        }
    }
    Association::Or(kept)
}

fn record_direct_leaves(node: &Association, seen: &mut HashSet<String>) {
    match node {
        Association::Leaf(id) => {
            seen.insert(id.clone());
        }
        Association::And(children) | Association::Or(children) => {
            for child in children {
                if let Association::Leaf(id) = child {
                    seen.insert(id.clone());
                }
            }
        }
    }
}

fn retain_unseen(children: Vec<Association>, seen: &mut HashSet<String>) -> Vec<Association> {
    children
        .into_iter()
        .filter(|child| match child {
            Association::Leaf(id) => seen.insert(id.clone()),
            _ => true,
        })
        .collect()
}

/// Parses `rule`, maps its leaves onto gene products and attaches the result to the
/// reaction, merging with any association already present.
pub fn set_gene_product_association(
    model: &mut Model,
    reaction_id: &str,
    rule: &str,
) -> Result<(), XrefError> {
    if !model.reactions.contains_key(reaction_id) {
        return Err(XrefError::ReactionNotFound(reaction_id.to_string()));
    }
    let parsed = parse(rule)?;
    let incoming = canonicalize(parsed, model).map_err(|err| match err {
        XrefError::InvalidIdentifier(token) => XrefError::GprParse {
            rule: rule.to_string(),
            message: format!("invalid gene identifier '{token}'"),
        },
        other => other,
    })?;

    let reaction = model
        .reactions
        .get_mut(reaction_id)
        .ok_or_else(|| XrefError::ReactionNotFound(reaction_id.to_string()))?;
    let association = match reaction.gene_product_association.take() {
        Some(existing) => merge(existing, incoming),
        None => incoming,
    };
    debug!(reaction = %reaction_id, association = %association, "attached gene product association");
    reaction.gene_product_association = Some(association);
    Ok(())
}
