use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::cli::Args;
use crate::error::{GptBotError, Result};
use crate::tokens::TokenAccounting;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: usize = 4096;
pub const MAX_TOKENS_LIMIT: usize = 4096;
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const ORGANIZATION_VAR: &str = "OPENAI_ORGANIZATION";
const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
const CONNECT_TIMEOUT_VAR: &str = "OPENAI_CONNECT_TIMEOUT_SECS";

const STDIN_PATH: &str = "stdin";
const BINARY_PREFIX: char = '!';

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are ConsoleGPT, a large language model trained by OpenAI.
Your name is ConsoleGPT and you are a helpful assistant. You are here to help
people. Your favorite activity is to help people.

When answering questions, ensure that your response actually answers the question,
and that it is clear and direct, containing no irrelevant information.

For users' help requests:
    Prioritize accuracy and adherence to user-provided instructions.
    Aim for concise, factual responses that directly address the question or task.
    Avoid hallucination and irrelevant content.
    Correct factual inaccuracies.
    Prioritize accuracy over speed.
    Use a casual and friendly tone where applicable.
    Be respectful and Remain on-topic at all times.
    This is a single-turn interaction.";

/// Everything one invocation needs, resolved and validated up front.
#[derive(Debug, Clone)]
pub struct Config {
    pub streaming: bool,
    pub include_statistics: bool,
    pub system_prompt: String,
    pub user_prompts: Vec<String>,
    /// `None` writes to the console.
    pub output_file: Option<PathBuf>,
    pub temperature: f64,
    pub max_tokens: usize,
    pub model: String,
    pub api_key: String,
    pub api_org: Option<String>,
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub token_accounting: TokenAccounting,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        Self::from_args_with(args, |key| env::var(key).ok(), io::stdin().lock())
    }

    fn from_args_with(
        args: &Args,
        mut get_var: impl FnMut(&str) -> Option<String>,
        mut stdin: impl Read,
    ) -> Result<Self> {
        let api_key = resolve_credential(API_KEY_VAR, args.api_key.as_deref(), get_var(API_KEY_VAR))?;
        let api_org = resolve_optional(args.org.as_deref(), get_var(ORGANIZATION_VAR));
        validate(args)?;

        let user_prompts = load_user_prompts(&args.input_files, args.prompt.as_deref(), &mut stdin)?;
        let system_prompt = match &args.system_prompt_file {
            Some(path) => fs::read_to_string(path)
                .map_err(|err| GptBotError::file_unreadable(path, Some(err.into())))?,
            None => DEFAULT_SYSTEM_PROMPT.to_string(),
        };

        Ok(Self {
            streaming: args.stream,
            include_statistics: args.include_statistics,
            system_prompt,
            user_prompts,
            output_file: args.output_file.clone(),
            temperature: args.temperature,
            max_tokens: args.max_tokens as usize,
            model: args.model.clone(),
            api_key,
            api_org,
            base_url: get_var(BASE_URL_VAR)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            connect_timeout_secs: parse_connect_timeout_secs(get_var(CONNECT_TIMEOUT_VAR).as_deref()),
            token_accounting: args.token_accounting,
        })
    }
}

/// Flag value first, then the environment; an empty value counts as missing.
pub fn resolve_credential(
    env_key: &str,
    flag_value: Option<&str>,
    env_value: Option<String>,
) -> Result<String> {
    resolve_optional(flag_value, env_value).ok_or_else(|| {
        GptBotError::validation(format!(
            "{env_key} environment variable not set and no flag given. Exiting..."
        ))
    })
}

fn resolve_optional(flag_value: Option<&str>, env_value: Option<String>) -> Option<String> {
    flag_value
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| env_value.filter(|value| !value.is_empty()))
}

fn validate(args: &Args) -> Result<()> {
    if args.input_files.is_empty() && args.prompt.is_none() {
        return Err(GptBotError::validation(
            "Either standard input (stdin) or an input file and/or a prompt must be specified",
        ));
    }

    for raw in &args.input_files {
        if let InputSource::Path(path) = InputFile::parse(raw).source
            && !path.exists()
        {
            return Err(GptBotError::validation(format!(
                "Input file {} does not exist",
                path.display()
            )));
        }
    }

    if let Some(path) = &args.system_prompt_file
        && !path.exists()
    {
        return Err(GptBotError::validation(format!(
            "Prompt file {} does not exist",
            path.display()
        )));
    }

    if args.max_tokens < 1 || args.max_tokens > MAX_TOKENS_LIMIT as i64 {
        return Err(GptBotError::validation(format!(
            "Max tokens ({}) must be between 1 and {MAX_TOKENS_LIMIT}",
            args.max_tokens
        )));
    }

    if !(0.0..=1.0).contains(&args.temperature) {
        return Err(GptBotError::validation(format!(
            "Temperature ({}) must be between 0 and 1",
            args.temperature
        )));
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InputFile {
    source: InputSource,
    binary: bool,
}

impl InputFile {
    fn parse(raw: &str) -> Self {
        let (binary, path) = match raw.strip_prefix(BINARY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let source = if path == STDIN_PATH {
            InputSource::Stdin
        } else {
            InputSource::Path(PathBuf::from(path))
        };
        Self { source, binary }
    }

    fn read(&self, stdin: &mut impl Read) -> Result<String> {
        let (bytes, label) = match &self.source {
            InputSource::Stdin => {
                let mut bytes = Vec::new();
                stdin
                    .read_to_end(&mut bytes)
                    .map_err(|err| GptBotError::file_with("Unreadable standard input", err))?;
                (bytes, Path::new(STDIN_PATH))
            }
            InputSource::Path(path) => {
                let bytes = fs::read(path)
                    .map_err(|err| GptBotError::file_unreadable(path, Some(err.into())))?;
                (bytes, path.as_path())
            }
        };

        if self.binary {
            return Ok(STANDARD.encode(bytes));
        }
        String::from_utf8(bytes).map_err(|err| GptBotError::file_unreadable(label, Some(err.into())))
    }
}

fn load_user_prompts(
    input_files: &[String],
    prompt: Option<&str>,
    stdin: &mut impl Read,
) -> Result<Vec<String>> {
    let mut prompts = Vec::with_capacity(input_files.len() + 1);
    for raw in input_files {
        prompts.push(InputFile::parse(raw).read(stdin)?);
    }
    if let Some(prompt) = prompt {
        prompts.push(prompt.to_string());
    }
    Ok(prompts)
}

fn parse_connect_timeout_secs(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
}
