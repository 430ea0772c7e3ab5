//! Compiled instructions and the word-budgeted program store

use serde::{Deserialize, Serialize};

use crate::interpreter::{
    EvalContext, Lexer, Node, Outcome, ParseError, Token, TokenClass, execute, parse,
};

use super::error::ProgramError;

/// A compiled program line.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    code: String,
    root: Node,
    words: usize,
    edge_memory: bool,
    skip: bool,
}

impl Instruction {
    /// Compile a line of source text with the standard grammar.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_with(&Lexer::new(), text)
    }

    /// Compile a line of source text with a custom token table.
    pub fn parse_with(lexer: &Lexer, text: &str) -> Result<Self, ParseError> {
        Self::from_tokens(lexer.tokenize(text)?)
    }

    /// Build an instruction from already-lexed tokens.
    pub fn from_tokens(tokens: Vec<Token>) -> Result<Self, ParseError> {
        let words = word_cost(&tokens);
        let root = parse(tokens)?;
        Ok(Self {
            code: root.to_string(),
            root,
            words,
            edge_memory: false,
            skip: false,
        })
    }

    /// Canonical source text.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Statement tree.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Instruction memory occupied, in words.
    pub fn words(&self) -> usize {
        self.words
    }

    /// Condition value seen on the previous tick (edge triggers).
    pub fn edge_memory(&self) -> bool {
        self.edge_memory
    }

    /// Whether a runtime error has disabled this instruction for good.
    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub(crate) fn restore_state(&mut self, edge_memory: bool, skip: bool) {
        self.edge_memory = edge_memory;
        self.skip = skip;
    }

    /// Run one tick. A failure that escapes evaluation sets the skip flag.
    pub fn step<C>(&mut self, ctx: &mut C) -> Outcome
    where
        C: EvalContext + ?Sized,
    {
        if self.skip {
            return Outcome::Idle;
        }
        match execute(&self.root, &mut self.edge_memory, ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(instruction = %self.code, error = %err, "disabling instruction");
                self.skip = true;
                Outcome::Idle
            }
        }
    }

    /// Persistable state of this instruction.
    pub fn record(&self) -> InstructionRecord {
        InstructionRecord {
            code: self.code.clone(),
            edge_memory: self.edge_memory,
            skip: self.skip,
        }
    }
}

/// Instruction memory a token sequence occupies: every token but comments.
pub fn word_cost(tokens: &[Token]) -> usize {
    tokens
        .iter()
        .filter(|token| token.class != TokenClass::Comment)
        .count()
}

/// Persisted form of one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// Canonical source text.
    pub code: String,
    /// Previous condition value.
    #[serde(rename = "edgeMemory")]
    pub edge_memory: bool,
    /// Permanent disable flag.
    pub skip: bool,
}

/// Persisted program: instructions in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramRecord(pub Vec<InstructionRecord>);

/// Ordered instructions plus the remaining word budget.
///
/// `remaining_words + sum(words of instructions) == total_words` at all times.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    total_words: usize,
    remaining_words: usize,
}

impl Program {
    /// Empty program with `total_words` of instruction memory.
    pub fn new(total_words: usize) -> Self {
        Self {
            instructions: Vec::new(),
            total_words,
            remaining_words: total_words,
        }
    }

    /// Append an instruction if it fits; nothing changes otherwise.
    pub fn push(&mut self, instruction: Instruction) -> Result<(), ProgramError> {
        if instruction.words > self.remaining_words {
            return Err(ProgramError::OverBudget {
                cost: instruction.words,
                remaining: self.remaining_words,
            });
        }
        self.remaining_words -= instruction.words;
        self.instructions.push(instruction);
        Ok(())
    }

    /// Remove every instruction and credit its cost back.
    pub fn clear(&mut self) {
        for instruction in self.instructions.drain(..) {
            self.remaining_words += instruction.words;
        }
    }

    /// Instructions in execution order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut [Instruction] {
        &mut self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Total instruction memory.
    pub fn total_words(&self) -> usize {
        self.total_words
    }

    /// Words still free.
    pub fn remaining_words(&self) -> usize {
        self.remaining_words
    }

    /// Persistable form of the whole program.
    pub fn record(&self) -> ProgramRecord {
        ProgramRecord(self.instructions.iter().map(Instruction::record).collect())
    }
}
