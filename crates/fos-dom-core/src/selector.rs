//! Selector matching
//!
//! The tree only needs a boolean "does this element match" predicate for
//! `matches`, `closest` and `querySelector`. `SelectorMatcher` is that
//! boundary; `SimpleSelectorMatcher` is the built-in implementation covering
//! type, universal, id, class and attribute selectors, compounds of those,
//! descendant and child combinators, and comma-separated lists.

use crate::{DomException, DomResult, DomTree, NodeId};

/// Element-matches-selector predicate
pub trait SelectorMatcher {
    /// Reject selector strings the matcher cannot parse
    fn validate(&self, _selectors: &str) -> DomResult<()> {
        Ok(())
    }

    /// Whether `element` matches any selector in `selectors`
    fn matches(&self, tree: &DomTree, element: NodeId, selectors: &str) -> DomResult<bool>;
}

/// Built-in matcher over `SelectorList`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSelectorMatcher;

impl SelectorMatcher for SimpleSelectorMatcher {
    fn validate(&self, selectors: &str) -> DomResult<()> {
        SelectorList::parse(selectors).map(|_| ())
    }

    fn matches(&self, tree: &DomTree, element: NodeId, selectors: &str) -> DomResult<bool> {
        Ok(SelectorList::parse(selectors)?.matches(tree, element))
    }
}

/// Attribute selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[a=v]`
    Equals,
    /// `[a~=v]`
    Includes,
    /// `[a|=v]`
    DashMatch,
    /// `[a^=v]`
    Prefix,
    /// `[a$=v]`
    Suffix,
    /// `[a*=v]`
    Substring,
}

/// Simple selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Universal,
    Tag(String),
    Id(String),
    Class(String),
    Attribute {
        name: String,
        value: Option<(AttrOperator, String)>,
    },
}

impl SimpleSelector {
    fn matches(&self, tree: &DomTree, element: NodeId) -> bool {
        match self {
            SimpleSelector::Universal => true,
            SimpleSelector::Tag(tag) => tree.local_name(element) == Some(tag.as_str()),
            SimpleSelector::Id(id) => tree.get_attribute(element, "id") == Some(id.as_str()),
            SimpleSelector::Class(class) => tree
                .get_attribute(element, "class")
                .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class)),
            SimpleSelector::Attribute { name, value } => {
                let Some(actual) = tree.get_attribute(element, name) else {
                    return false;
                };
                match value {
                    None => true,
                    Some((op, expected)) => match op {
                        AttrOperator::Equals => actual == expected,
                        AttrOperator::Includes => {
                            actual.split_ascii_whitespace().any(|token| token == expected)
                        }
                        AttrOperator::DashMatch => {
                            actual == expected
                                || actual
                                    .strip_prefix(expected.as_str())
                                    .is_some_and(|rest| rest.starts_with('-'))
                        }
                        AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(expected.as_str()),
                        AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(expected.as_str()),
                        AttrOperator::Substring => !expected.is_empty() && actual.contains(expected.as_str()),
                    },
                }
            }
        }
    }
}

/// Combinator between two compound selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// Sequence of simple selectors that must all match one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundSelector(pub Vec<SimpleSelector>);

impl CompoundSelector {
    fn matches(&self, tree: &DomTree, element: NodeId) -> bool {
        self.0.iter().all(|simple| simple.matches(tree, element))
    }
}

/// Compound selectors joined by combinators, matched right to left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    compounds: Vec<CompoundSelector>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

impl ComplexSelector {
    fn matches(&self, tree: &DomTree, element: NodeId) -> bool {
        match self.compounds.len() {
            0 => false,
            len => self.matches_from(tree, element, len - 1),
        }
    }

    fn matches_from(&self, tree: &DomTree, element: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(tree, element) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => tree
                .parent_element(element)
                .is_some_and(|parent| self.matches_from(tree, parent, index - 1)),
            Combinator::Descendant => tree
                .ancestors(element)
                .filter(|a| tree.get(*a).is_some_and(|n| n.is_element()))
                .any(|ancestor| self.matches_from(tree, ancestor, index - 1)),
        }
    }
}

/// Comma-separated selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(pub Vec<ComplexSelector>);

impl SelectorList {
    /// Parse a selector list
    pub fn parse(input: &str) -> DomResult<Self> {
        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
        };
        let mut list = Vec::new();
        loop {
            list.push(parser.complex()?);
            parser.skip_whitespace();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(_) => return Err(DomException::Syntax),
            }
        }
        Ok(Self(list))
    }

    pub fn matches(&self, tree: &DomTree, element: NodeId) -> bool {
        self.0.iter().any(|complex| complex.matches(tree, element))
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn complex(&mut self) -> DomResult<ComplexSelector> {
        self.skip_whitespace();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_space => Combinator::Descendant,
                Some(_) => return Err(DomException::Syntax),
            };
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }

        Ok(ComplexSelector { compounds, combinators })
    }

    fn compound(&mut self) -> DomResult<CompoundSelector> {
        let mut parts = Vec::new();

        if self.peek() == Some('*') {
            self.pos += 1;
            parts.push(SimpleSelector::Universal);
        } else if self.peek().is_some_and(is_ident_char) {
            parts.push(SimpleSelector::Tag(self.ident()?));
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    parts.push(SimpleSelector::Id(self.ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    parts.push(SimpleSelector::Class(self.ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    parts.push(self.attribute()?);
                }
                _ => break,
            }
        }

        if parts.is_empty() {
            return Err(DomException::Syntax);
        }
        Ok(CompoundSelector(parts))
    }

    fn attribute(&mut self) -> DomResult<SimpleSelector> {
        self.skip_whitespace();
        let name = self.ident()?;
        self.skip_whitespace();

        let operator = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(SimpleSelector::Attribute { name, value: None });
            }
            Some('=') => {
                self.pos += 1;
                AttrOperator::Equals
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(DomException::Syntax);
                }
                self.pos += 1;
                match c {
                    '~' => AttrOperator::Includes,
                    '|' => AttrOperator::DashMatch,
                    '^' => AttrOperator::Prefix,
                    '$' => AttrOperator::Suffix,
                    _ => AttrOperator::Substring,
                }
            }
            _ => return Err(DomException::Syntax),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => self.quoted(quote)?,
            _ => self.ident()?,
        };
        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(DomException::Syntax);
        }
        self.pos += 1;

        Ok(SimpleSelector::Attribute {
            name,
            value: Some((operator, value)),
        })
    }

    fn ident(&mut self) -> DomResult<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start || self.chars[start].is_ascii_digit() {
            return Err(DomException::Syntax);
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self, quote: char) -> DomResult<String> {
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(DomException::Syntax)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}
