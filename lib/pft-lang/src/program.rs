//! A compiled format: the source text plus its flattened node chain.

use crate::expression::Sequence;
use crate::{lexer::Lexer, parser, Result};

/// Compile once, evaluate many times.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    chain: Sequence,
}

impl Program {
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        let chain = parser::parse(&tokens)?;
        Ok(Self {
            source: source.to_owned(),
            chain,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chain(&self) -> &Sequence {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles() {
        let program = Program::compile("v24, if p(v70) then ' / ', v70 fi").unwrap();
        assert!(!program.chain().is_empty());
    }

    #[test]
    fn syntax_errors_carry_position() {
        let err = Program::compile("v24, endsel").unwrap_err();
        assert!(matches!(err, crate::Error::Parse(_)), "{err:?}");
    }
}
