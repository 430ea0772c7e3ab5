use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::ParseError;

/// Lexical class of a token. The parser decides node shape from this alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenClass {
    /// `#` to end of line.
    Comment,
    /// `ON`, `DO`, `IF`, `THEN`.
    Keyword,
    /// `AND`, `OR`.
    LogicalOp,
    /// `<`, `>`.
    ComparisonOp,
    /// `+ - * /`.
    ArithmeticOp,
    /// `!`.
    UnaryOp,
    /// `@`.
    Call,
    /// `,`.
    ListSeparator,
    /// `;`.
    SequenceSeparator,
    /// Numeric literal.
    Literal,
    /// Lower-case-leading, optionally dotted name.
    Identifier,
    /// Recognised but never emitted.
    Whitespace,
}

/// A single lexed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Matched text.
    pub text: String,
    /// Lexical class.
    pub class: TokenClass,
}

impl Token {
    /// Build a token from its parts.
    pub fn new(text: impl Into<String>, class: TokenClass) -> Self {
        Self {
            text: text.into(),
            class,
        }
    }

    /// Whether this token is the given keyword.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.class == TokenClass::Keyword && self.text == word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One entry of the lexer's pattern table.
#[derive(Debug, Clone)]
pub struct TokenRule {
    class: TokenClass,
    pattern: Regex,
}

impl TokenRule {
    /// Compile a rule; the pattern is anchored at the lexing position.
    pub fn new(class: TokenClass, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            class,
            pattern: Regex::new(&format!("^(?:{pattern})"))?,
        })
    }

    /// Class produced by this rule.
    pub fn class(&self) -> TokenClass {
        self.class
    }

    fn match_len(&self, rest: &str) -> Option<usize> {
        self.pattern.find(rest).map(|m| m.end())
    }
}

const DEFAULT_PATTERNS: &[(TokenClass, &str)] = &[
    (TokenClass::Comment, r"#.*"),
    (TokenClass::Keyword, r"ON|DO|IF|THEN"),
    (TokenClass::LogicalOp, r"AND|OR"),
    (TokenClass::ComparisonOp, r"[<>]"),
    (TokenClass::ArithmeticOp, r"[+\-*/]"),
    (TokenClass::UnaryOp, r"!"),
    (TokenClass::Call, r"@"),
    (TokenClass::ListSeparator, r","),
    (TokenClass::SequenceSeparator, r";"),
    (TokenClass::Literal, r"-?[0-9]+(?:\.[0-9]+)?"),
    (
        TokenClass::Identifier,
        r"[a-z][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*",
    ),
    (TokenClass::Whitespace, r"\s+"),
];

static DEFAULT_RULES: LazyLock<Vec<TokenRule>> = LazyLock::new(|| {
    DEFAULT_PATTERNS
        .iter()
        .map(|(class, pattern)| {
            TokenRule::new(*class, pattern).expect("built-in token pattern must compile")
        })
        .collect()
});

/// Longest-match tokenizer over a table of [`TokenRule`]s.
#[derive(Debug, Clone)]
pub struct Lexer {
    rules: Vec<TokenRule>,
}

impl Default for Lexer {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl Lexer {
    /// Lexer for the standard processor grammar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lexer over a custom rule table.
    pub fn with_rules(rules: Vec<TokenRule>) -> Self {
        Self { rules }
    }

    /// Split `text` into tokens, dropping whitespace.
    ///
    /// At every position all rules are tried; exactly one token class may
    /// achieve the longest match, otherwise the line is rejected.
    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut position = 0;

        while position < text.len() {
            let rest = &text[position..];
            let matches: Vec<(TokenClass, usize)> = self
                .rules
                .iter()
                .filter_map(|rule| rule.match_len(rest).map(|len| (rule.class, len)))
                .collect();

            let Some(longest) = matches.iter().map(|(_, len)| *len).max() else {
                return Err(ParseError::NoMatch {
                    position,
                    rest: rest.to_string(),
                });
            };
            if longest == 0 {
                return Err(ParseError::EmptyMatch { position });
            }

            let mut classes: Vec<TokenClass> = Vec::new();
            for (class, len) in &matches {
                if *len == longest && !classes.contains(class) {
                    classes.push(*class);
                }
            }
            let matched = &rest[..longest];
            if classes.len() != 1 {
                tracing::debug!(position, text = matched, ?classes, "ambiguous token");
                return Err(ParseError::Ambiguous {
                    position,
                    text: matched.to_string(),
                    classes,
                });
            }

            match classes[0] {
                TokenClass::Whitespace => {}
                TokenClass::Comment => tokens.push(Token::new(matched.trim(), TokenClass::Comment)),
                class => tokens.push(Token::new(matched, class)),
            }
            position += longest;
        }

        Ok(tokens)
    }
}

/// Tokenize with the standard grammar.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new().tokenize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(text: &str) -> Vec<TokenClass> {
        tokenize(text)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.class)
            .collect()
    }

    #[test]
    fn lexes_edge_statement() {
        let tokens = tokenize("ON < srfHeight 250 DO @ gear.assign true").expect("tokenize");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["ON", "<", "srfHeight", "250", "DO", "@", "gear.assign", "true"]
        );
        assert_eq!(tokens[0].class, TokenClass::Keyword);
        assert_eq!(tokens[1].class, TokenClass::ComparisonOp);
        assert_eq!(tokens[2].class, TokenClass::Identifier);
        assert_eq!(tokens[3].class, TokenClass::Literal);
        assert_eq!(tokens[5].class, TokenClass::Call);
    }

    #[test]
    fn negative_literal_beats_minus() {
        assert_eq!(classes("-5"), vec![TokenClass::Literal]);
        assert_eq!(
            classes("- 5 2.5"),
            vec![TokenClass::ArithmeticOp, TokenClass::Literal, TokenClass::Literal]
        );
    }

    #[test]
    fn comment_consumes_rest_of_line() {
        let tokens = tokenize("  #  extend gear ; later  ").expect("tokenize");
        assert_eq!(tokens, vec![Token::new("#  extend gear ; later", TokenClass::Comment)]);
    }

    #[test]
    fn rejects_unknown_characters() {
        let err = tokenize("ON = a b").unwrap_err();
        assert!(matches!(err, ParseError::NoMatch { position: 3, .. }));
        assert!(tokenize("Gear").is_err());
    }

    #[test]
    fn rejects_ties_between_classes() {
        let rules = vec![
            TokenRule::new(TokenClass::Keyword, "ON").unwrap(),
            TokenRule::new(TokenClass::Identifier, "[A-Za-z]+").unwrap(),
            TokenRule::new(TokenClass::Whitespace, r"\s+").unwrap(),
        ];
        let lexer = Lexer::with_rules(rules);
        assert!(lexer.tokenize("ONX").is_ok());
        let err = lexer.tokenize("ON").unwrap_err();
        assert!(matches!(err, ParseError::Ambiguous { ref classes, .. } if classes.len() == 2));
    }

    #[test]
    fn same_class_ties_are_not_ambiguous() {
        let rules = vec![
            TokenRule::new(TokenClass::Identifier, "[a-z]+").unwrap(),
            TokenRule::new(TokenClass::Identifier, "[a-c]+").unwrap(),
        ];
        let tokens = Lexer::with_rules(rules).tokenize("abc").expect("tokenize");
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn rejects_zero_length_match() {
        let rules = vec![TokenRule::new(TokenClass::Whitespace, r"\s*").unwrap()];
        let err = Lexer::with_rules(rules).tokenize("x").unwrap_err();
        assert_eq!(err, ParseError::EmptyMatch { position: 0 });
    }
}
