//! DOMTokenList (classList)
//!
//! Live view over an element's `class` attribute. The token set is parsed
//! from the attribute on every call and written back after every change.

use crate::{DomException, DomResult, DomTree, NodeId};

/// Live ordered token set backed by the `class` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomTokenList {
    element: NodeId,
}

/// Ordered set parse of a token string
fn parse_tokens(value: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = Vec::new();
    for token in value.split_ascii_whitespace() {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

fn validate_token(token: &str) -> DomResult<()> {
    if token.is_empty() {
        return Err(DomException::Syntax);
    }
    if token.chars().any(|c| c.is_ascii_whitespace()) {
        return Err(DomException::InvalidCharacter);
    }
    Ok(())
}

impl DomTokenList {
    pub fn new(element: NodeId) -> Self {
        Self { element }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    fn tokens(&self, tree: &DomTree) -> Vec<String> {
        parse_tokens(tree.get_attribute(self.element, "class").unwrap_or_default())
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Write the set back, leaving a missing attribute missing when the set is empty
    fn update(&self, tree: &mut DomTree, tokens: &[String]) -> DomResult<()> {
        if !tree.has_attribute(self.element, "class") && tokens.is_empty() {
            return Ok(());
        }
        tree.set_attribute(self.element, "class", &tokens.join(" "))
    }

    /// Number of tokens
    pub fn length(&self, tree: &DomTree) -> u32 {
        parse_tokens(tree.get_attribute(self.element, "class").unwrap_or_default()).len() as u32
    }

    /// Token at index
    pub fn item(&self, tree: &DomTree, index: u32) -> Option<String> {
        self.tokens(tree).into_iter().nth(index as usize)
    }

    pub fn contains(&self, tree: &DomTree, token: &str) -> bool {
        parse_tokens(tree.get_attribute(self.element, "class").unwrap_or_default()).contains(&token)
    }

    /// Add tokens, validating all of them first
    pub fn add(&self, tree: &mut DomTree, tokens: &[&str]) -> DomResult<()> {
        for token in tokens {
            validate_token(token)?;
        }
        let mut set = self.tokens(tree);
        for token in tokens {
            if !set.iter().any(|t| t == token) {
                set.push(token.to_string());
            }
        }
        self.update(tree, &set)
    }

    /// Remove tokens, validating all of them first
    pub fn remove(&self, tree: &mut DomTree, tokens: &[&str]) -> DomResult<()> {
        for token in tokens {
            validate_token(token)?;
        }
        let mut set = self.tokens(tree);
        set.retain(|t| !tokens.contains(&t.as_str()));
        self.update(tree, &set)
    }

    /// Toggle a token, returning whether it is present afterwards
    pub fn toggle(&self, tree: &mut DomTree, token: &str, force: Option<bool>) -> DomResult<bool> {
        validate_token(token)?;
        let mut set = self.tokens(tree);

        if set.iter().any(|t| t == token) {
            if force == Some(true) {
                return Ok(true);
            }
            set.retain(|t| t != token);
            self.update(tree, &set)?;
            return Ok(false);
        }

        if force == Some(false) {
            return Ok(false);
        }
        set.push(token.to_string());
        self.update(tree, &set)?;
        Ok(true)
    }

    /// Replace `token` with `new_token`, returning whether `token` was present
    pub fn replace(&self, tree: &mut DomTree, token: &str, new_token: &str) -> DomResult<bool> {
        validate_token(token)?;
        validate_token(new_token)?;

        let mut set = self.tokens(tree);
        let Some(position) = set.iter().position(|t| t == token) else {
            return Ok(false);
        };

        if set.iter().any(|t| t == new_token) {
            set.remove(position);
        } else {
            set[position] = new_token.to_string();
        }
        self.update(tree, &set)?;
        Ok(true)
    }

    /// `class` defines no supported tokens
    pub fn supports(&self, _token: &str) -> DomResult<bool> {
        Err(DomException::Type)
    }

    /// Serialized attribute value
    pub fn value(&self, tree: &DomTree) -> String {
        tree.get_attribute(self.element, "class")
            .unwrap_or_default()
            .to_string()
    }

    pub fn set_value(&self, tree: &mut DomTree, value: &str) -> DomResult<()> {
        tree.set_attribute(self.element, "class", value)
    }

    /// Snapshot of the current tokens
    pub fn iter(&self, tree: &DomTree) -> impl Iterator<Item = String> + use<> {
        self.tokens(tree).into_iter()
    }
}

impl DomTree {
    /// `Element.classList`
    pub fn class_list(&self, element: NodeId) -> DomTokenList {
        DomTokenList::new(element)
    }
}
