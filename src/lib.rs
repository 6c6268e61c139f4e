mod settings;
mod stub;
mod tokenizer;

pub use settings::{Command, Settings};
pub use stub::IdentityTransformer;
pub use tokenizer::{CardTokenizer, TokenizerError, VaultTokenizer};
