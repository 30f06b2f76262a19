mod ast;
mod engine;
mod error;
mod interface;
mod operator;
mod parser;
mod template;

// Public exports.
pub use engine::UrilateEngine;
pub use error::{ParseError, ParseErrorKind, UrilateError, UrilateResult};
pub use interface::{Context, Value};
pub use template::Template;
