use clap::{Parser, Subcommand};

/// Tokenize or detokenize card numbers read from stdin, one per line.
#[derive(Parser, Debug)]
#[command(name = "tokenizer")]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    #[command(subcommand)]
    pub command: Command,

    /// Use the identity stub instead of vault.
    #[arg(long, env = "TOKENIZER_STUB", default_value_t = false)]
    pub stub: bool,

    /// Vault transformation applied to every value.
    #[arg(long, env = "TOKENIZER_TRANSFORMATION", default_value = "card-number")]
    pub transformation: String,

    /// Vault transform role.
    #[arg(long, env = "TOKENIZER_ROLE", default_value = "pan")]
    pub role: String,

    /// Emit structured JSON logs.
    #[arg(long, env = "JSON_LOG", default_value_t = false)]
    pub json_log: bool,

    /// Per-run deadline in seconds.
    #[arg(long, env = "TOKENIZER_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Card numbers to tokens.
    Encode,
    /// Tokens to card numbers.
    Decode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::try_parse_from(["tokenizer", "encode"]).unwrap();
        assert_eq!(settings.command, Command::Encode);
        assert_eq!(settings.role, "pan");
        assert_eq!(settings.transformation, "card-number");
        assert_eq!(settings.timeout_secs, 30);
    }

    #[test]
    fn test_flags() {
        let settings = Settings::try_parse_from([
            "tokenizer",
            "--stub",
            "--role",
            "cards",
            "--timeout-secs",
            "5",
            "decode",
        ])
        .unwrap();
        assert_eq!(settings.command, Command::Decode);
        assert!(settings.stub);
        assert_eq!(settings.role, "cards");
        assert_eq!(settings.timeout_secs, 5);
    }

    #[test]
    fn test_command_is_required() {
        assert!(Settings::try_parse_from(["tokenizer"]).is_err());
    }
}
