use std::error::Error as StdError;
use std::io::ErrorKind;

use crate::error::GptBotError;

/// True when any error in the source chain is an io error of `kind`
/// or describes itself with `phrase`.
fn chain_mentions(err: &(dyn StdError + 'static), kind: ErrorKind, phrase: &str) -> bool {
    std::iter::successors(Some(err), |&current| current.source()).any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io_err| io_err.kind() == kind)
            || cause.to_string().to_ascii_lowercase().contains(phrase)
    })
}

fn is_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    chain_mentions(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    chain_mentions(err, ErrorKind::TimedOut, "timed out")
}

/// Turns a transport failure into an API error that says what to check.
pub(crate) fn chat_api_request_error(
    err: reqwest::Error,
    api_url: &str,
    connect_timeout_secs: u64,
) -> GptBotError {
    if err.is_timeout() || is_timeout(&err) {
        let message = format!(
            "Chat completion request timed out while calling '{}' (connect timeout {}s). \
             Increase OPENAI_CONNECT_TIMEOUT_SECS or check network connectivity.",
            api_url, connect_timeout_secs
        );
        return GptBotError::api_with(message, err);
    }

    if err.is_connect() {
        if is_connection_refused(&err) {
            return GptBotError::api_with(
                format!("Connection refused by chat API at '{api_url}'. Check OPENAI_BASE_URL."),
                err,
            );
        }

        return GptBotError::api_with(
            format!(
                "Failed to connect to chat API at '{api_url}'. \
                 Check OPENAI_BASE_URL and network connectivity."
            ),
            err,
        );
    }

    GptBotError::api_with(format!("Failed to call chat API at '{}'", api_url), err)
}
