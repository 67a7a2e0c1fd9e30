//! Word wrapping and aligned multi-line text.

pub mod render;
pub mod wrap;

pub use render::{layout_lines, render_text, LaidOutLine, TextAlign};
pub use wrap::word_wrap;
