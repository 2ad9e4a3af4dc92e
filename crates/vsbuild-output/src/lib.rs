#![forbid(unsafe_code)]
//! Styled console output and error/warning highlighting of build tool output.

pub mod classify;
pub mod highlight;
pub mod style;

pub use classify::{classify, LineClass, PatternError, RegexRuleSet};
pub use highlight::ErrorHighlightingOutput;
pub use style::{with_style, DefaultStyledTextOutput, Style, StyledTextOutput};
