/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into a syntax tree.
pub mod parser;

/// The resolver binds every identifier use to its declaration.
pub mod resolver;

/// The type checker walks the resolved tree bottom-up, tagging every
/// expression with its type.
pub mod type_checker;

/// The code generator lowers a fully checked tree to an instruction image
/// for the target machine.
pub mod codegen;

/// The phase-gated driver tying the stages together.
pub mod pipeline;

pub mod ast;
pub mod token;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
