use std::fmt;

use super::lexer::{Token, TokenClass};

/// A parsed node: the token that produced it plus its ordered children.
///
/// The number and kind of children is fixed by the token's class; see
/// [`crate::interpreter::parser`]. Nodes are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    token: Token,
    children: Vec<Node>,
}

impl Node {
    pub(crate) fn new(token: Token, children: Vec<Node>) -> Self {
        Self { token, children }
    }

    pub(crate) fn leaf(token: Token) -> Self {
        Self::new(token, Vec::new())
    }

    /// Token that started this node.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Class of the starting token.
    pub fn class(&self) -> TokenClass {
        self.token.class
    }

    /// Text of the starting token.
    pub fn text(&self) -> &str {
        &self.token.text
    }

    /// Ordered children.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child at `index`, if present.
    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    /// Whether this node was started by the given keyword.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.token.is_keyword(word)
    }

    /// Tokens of the subtree in prefix order.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a Token>) {
        out.push(&self.token);
        for child in &self.children {
            child.collect_tokens(out);
        }
    }
}

/// Prints the canonical, single-space-separated source form.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token.text)?;
        for child in &self.children {
            write!(f, " {child}")?;
        }
        Ok(())
    }
}
