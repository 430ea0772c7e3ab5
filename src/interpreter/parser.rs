//! Structural prefix parser.
//!
//! There is no precedence table. Every operator is written before its
//! operands, and the class of the token that starts a node fixes how many
//! children it takes and which classes those children may have:
//!
//! ```text
//! ON    cond DO-node          IF   cond THEN-node
//! DO    (call | ;)            THEN (call | ;)
//! op    operand operand       !    operand
//! @     identifier argument   ,    item item
//! ;     action action         ident | literal | comment  (leaves)
//! ```
//!
//! Nesting is capped at [`MAX_DEPTH`] so a pathological line is rejected
//! instead of exhausting the stack.

use super::ParseError;
use super::ast::Node;
use super::lexer::{Token, TokenClass, tokenize};

/// Deepest node nesting the parser accepts.
pub const MAX_DEPTH: usize = 256;

/// Parse a token sequence into a statement tree.
pub fn parse(tokens: Vec<Token>) -> Result<Node, ParseError> {
    let mut parser = Parser::new(tokens);
    let root = parser.parse_node("a statement")?;
    if let Some(extra) = parser.next() {
        return Err(ParseError::Trailing(extra.text));
    }

    let accepted = root.class() == TokenClass::Comment
        || root.is_keyword("ON")
        || root.is_keyword("IF");
    if !accepted {
        return Err(ParseError::BadRoot(root.text().to_string()));
    }
    Ok(root)
}

/// Tokenize and parse a single program line.
pub fn compile(text: &str) -> Result<Node, ParseError> {
    parse(tokenize(text)?)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned()?;
        self.index += 1;
        Some(token)
    }

    fn parse_node(&mut self, expected: &str) -> Result<Node, ParseError> {
        let token = self.next().ok_or_else(|| ParseError::UnexpectedEnd {
            expected: expected.to_string(),
        })?;

        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let node = self.parse_shape(token);
        self.depth -= 1;
        node
    }

    fn parse_shape(&mut self, token: Token) -> Result<Node, ParseError> {
        match token.class {
            TokenClass::Keyword => match token.text.as_str() {
                "ON" => self.parse_trigger(token, "DO"),
                "IF" => self.parse_trigger(token, "THEN"),
                _ => {
                    let body = self.parse_node("an action")?;
                    require(&token, "action", &body, is_action_body)?;
                    Ok(Node::new(token, vec![body]))
                }
            },
            TokenClass::LogicalOp | TokenClass::ComparisonOp | TokenClass::ArithmeticOp => {
                let left = self.parse_node("a left operand")?;
                require(&token, "left operand", &left, is_operand)?;
                let right = self.parse_node("a right operand")?;
                require(&token, "right operand", &right, is_operand)?;
                Ok(Node::new(token, vec![left, right]))
            }
            TokenClass::UnaryOp => {
                let operand = self.parse_node("an operand")?;
                require(&token, "operand", &operand, is_operand)?;
                Ok(Node::new(token, vec![operand]))
            }
            TokenClass::Call => {
                let target = self.parse_node("a call target")?;
                require(&token, "call target", &target, |class| {
                    class == TokenClass::Identifier
                })?;
                let argument = self.parse_node("a call argument")?;
                require(&token, "argument", &argument, is_argument)?;
                Ok(Node::new(token, vec![target, argument]))
            }
            TokenClass::ListSeparator => {
                let left = self.parse_node("a list item")?;
                require(&token, "list item", &left, is_list_item)?;
                let right = self.parse_node("a list item")?;
                require(&token, "list item", &right, is_list_item)?;
                Ok(Node::new(token, vec![left, right]))
            }
            TokenClass::SequenceSeparator => {
                let first = self.parse_node("an action")?;
                require(&token, "action", &first, is_sequence_item)?;
                let second = self.parse_node("an action")?;
                require(&token, "action", &second, is_sequence_item)?;
                Ok(Node::new(token, vec![first, second]))
            }
            TokenClass::Literal
            | TokenClass::Identifier
            | TokenClass::Comment
            | TokenClass::Whitespace => Ok(Node::leaf(token)),
        }
    }

    fn parse_trigger(&mut self, token: Token, pairing: &str) -> Result<Node, ParseError> {
        let condition = self.parse_node("a condition")?;
        require(&token, "condition", &condition, |class| {
            class != TokenClass::Keyword
        })?;
        let action = self.parse_node(pairing)?;
        if !action.is_keyword(pairing) {
            return Err(misplaced(&token, pairing, &action));
        }
        Ok(Node::new(token, vec![condition, action]))
    }
}

fn require(
    parent: &Token,
    role: &str,
    child: &Node,
    accepts: impl Fn(TokenClass) -> bool,
) -> Result<(), ParseError> {
    if child.class() == TokenClass::Comment || !accepts(child.class()) {
        return Err(misplaced(parent, role, child));
    }
    Ok(())
}

fn misplaced(parent: &Token, role: &str, child: &Node) -> ParseError {
    ParseError::Misplaced {
        parent: parent.text.clone(),
        role: role.to_string(),
        found: child.text().to_string(),
    }
}

fn is_action_body(class: TokenClass) -> bool {
    matches!(class, TokenClass::SequenceSeparator | TokenClass::Call)
}

fn is_operand(class: TokenClass) -> bool {
    !matches!(
        class,
        TokenClass::Keyword
            | TokenClass::Call
            | TokenClass::ListSeparator
            | TokenClass::SequenceSeparator
    )
}

fn is_argument(class: TokenClass) -> bool {
    !matches!(class, TokenClass::Keyword | TokenClass::SequenceSeparator)
}

fn is_list_item(class: TokenClass) -> bool {
    !matches!(
        class,
        TokenClass::Keyword | TokenClass::Call | TokenClass::SequenceSeparator
    )
}

fn is_sequence_item(class: TokenClass) -> bool {
    matches!(
        class,
        TokenClass::Identifier | TokenClass::Call | TokenClass::SequenceSeparator
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edge_trigger_with_comparison() {
        let root = compile("ON < srfHeight 250 DO @ gear.assign true").expect("parse");
        assert!(root.is_keyword("ON"));
        let condition = root.child(0).unwrap();
        assert_eq!(condition.class(), TokenClass::ComparisonOp);
        assert_eq!(condition.child(0).unwrap().text(), "srfHeight");
        assert_eq!(condition.child(0).unwrap().class(), TokenClass::Identifier);
        assert_eq!(condition.child(1).unwrap().text(), "250");
        assert_eq!(condition.child(1).unwrap().class(), TokenClass::Literal);

        let action = root.child(1).unwrap();
        assert!(action.is_keyword("DO"));
        let call = action.child(0).unwrap();
        assert_eq!(call.class(), TokenClass::Call);
        assert_eq!(call.child(0).unwrap().text(), "gear.assign");
    }

    #[test]
    fn parses_level_trigger_with_sequence() {
        let root = compile(
            "IF AND > srfSpeed 5 ! gear THEN ; @ throttle.increment 25 @ brakes.assign true",
        )
        .expect("parse");
        assert!(root.is_keyword("IF"));
        let body = root.child(1).unwrap().child(0).unwrap();
        assert_eq!(body.class(), TokenClass::SequenceSeparator);
        assert_eq!(body.children().len(), 2);
    }

    #[test]
    fn canonical_display_normalizes_spacing() {
        let root = compile("ON   <srfHeight    250 DO @gear.assign true").expect("parse");
        assert_eq!(root.to_string(), "ON < srfHeight 250 DO @ gear.assign true");
    }

    #[test]
    fn comment_is_a_whole_statement() {
        let root = compile("# land the thing").expect("parse");
        assert_eq!(root.class(), TokenClass::Comment);
        assert!(root.children().is_empty());
    }

    #[test]
    fn rejects_trailing_comment() {
        let err = compile("ON gear DO @ gear.assign true # note").unwrap_err();
        assert_eq!(err, ParseError::Trailing("# note".to_string()));
    }

    #[test]
    fn rejects_mismatched_pairing_keyword() {
        assert!(matches!(
            compile("ON gear THEN @ gear.assign true"),
            Err(ParseError::Misplaced { .. })
        ));
        assert!(matches!(
            compile("IF gear DO @ gear.assign true"),
            Err(ParseError::Misplaced { .. })
        ));
    }

    #[test]
    fn rejects_non_trigger_root() {
        assert_eq!(
            compile("< a b"),
            Err(ParseError::BadRoot("<".to_string()))
        );
        assert!(matches!(
            compile("DO @ gear.assign true"),
            Err(ParseError::BadRoot(_))
        ));
    }

    #[test]
    fn rejects_calls_inside_expressions() {
        assert!(compile("ON < @ a.assign 1 2 DO @ b.assign 1").is_err());
        assert!(compile("ON + , a b 1 DO @ b.assign 1").is_err());
    }

    #[test]
    fn call_target_must_be_identifier() {
        assert!(matches!(
            compile("ON gear DO @ 5 true"),
            Err(ParseError::Misplaced { .. })
        ));
    }

    #[test]
    fn action_body_must_be_call_or_sequence() {
        assert!(compile("ON gear DO gear").is_err());
        assert!(compile("ON gear DO ; gear @ a.assign 1").is_ok());
        assert!(compile("ON gear DO ; 5 @ a.assign 1").is_err());
    }

    #[test]
    fn list_arguments_nest() {
        let root = compile("ON gear DO @ orient.assign , a , 90 90").expect("parse");
        let call = root.child(1).unwrap().child(0).unwrap();
        let argument = call.child(1).unwrap();
        assert_eq!(argument.class(), TokenClass::ListSeparator);
        assert_eq!(argument.child(1).unwrap().class(), TokenClass::ListSeparator);
    }

    #[test]
    fn reports_missing_operands() {
        assert!(matches!(
            compile("ON < a"),
            Err(ParseError::UnexpectedEnd { .. })
        ));
        assert!(matches!(compile(""), Err(ParseError::UnexpectedEnd { .. })));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let line = format!("ON {}true DO @ gear.assign true", "! ".repeat(20_000));
        assert_eq!(
            compile(&line),
            Err(ParseError::TooDeep { limit: MAX_DEPTH })
        );

        let shallow = format!("ON {}true DO @ gear.assign true", "! ".repeat(MAX_DEPTH - 2));
        assert!(compile(&shallow).is_ok());
    }
}
