use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::tokens::TokenAccounting;

#[derive(Debug, Parser)]
#[command(name = "gptbot")]
#[command(about = "A command line tool for interacting with OpenAI's chat models.", long_about = None)]
pub struct Args {
    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,

    /// Enable streaming mode - emit the response as it comes in.
    #[arg(long)]
    pub stream: bool,

    /// Include performance statistics after the response.
    #[arg(long = "stats")]
    pub include_statistics: bool,

    /// OpenAI API key. Falls back to the OPENAI_API_KEY environment variable.
    #[arg(long)]
    pub api_key: Option<String>,

    /// OpenAI organization. Falls back to the OPENAI_ORGANIZATION environment variable.
    #[arg(long)]
    pub org: Option<String>,

    /// File to include with the user prompt. Repeatable.
    /// Prefix a binary file with '!' to send it base64-encoded; use 'stdin' to read standard input.
    #[arg(short, long = "input-files", value_name = "PATH")]
    pub input_files: Vec<String>,

    /// File to use as the system prompt instead of the built-in one.
    #[arg(short, long, value_name = "PATH")]
    pub system_prompt_file: Option<PathBuf>,

    /// Write the response to this file instead of the console. Existing contents are replaced.
    #[arg(short, long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,

    /// Sampling temperature, between 0 and 1.
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, allow_negative_numbers = true)]
    pub temperature: f64,

    /// Token limit for prompt plus response, between 1 and 4096.
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS as i64, allow_negative_numbers = true)]
    pub max_tokens: i64,

    /// Chat model identifier.
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// How prompt tokens are counted against --max-tokens.
    #[arg(long, value_enum, default_value_t = TokenAccounting::Strict)]
    pub token_accounting: TokenAccounting,

    /// The prompt. May be omitted when input files are given.
    pub prompt: Option<String>,
}
