pub mod eval;
pub mod lex;
pub mod registry;
pub mod value;

pub use eval::{Completion, Interpreter, StatementError};
pub use lex::Lexer;
pub use registry::{Category, EncodedToken, EncodingConfig, Registry, RegistryError};
pub use value::{Value, ValueType};
