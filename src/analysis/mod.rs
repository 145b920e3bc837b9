pub mod segmenter;
pub mod tokenizer;

pub use tokenizer::{ScriptStreams, split};
