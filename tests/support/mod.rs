#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::Command;
use std::thread::{self, JoinHandle};

/// A chat API stand-in that answers exactly one request.
pub struct FakeApi {
    pub base_url: String,
    server: JoinHandle<String>,
}

impl FakeApi {
    pub fn respond(status: &str, content_type: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept should succeed");
            let request = read_request(&mut stream);
            stream
                .write_all(response.as_bytes())
                .expect("response should be written");
            request
        });

        Self {
            base_url: format!("http://{addr}/v1"),
            server,
        }
    }

    pub fn completion(content: &str, prompt_tokens: usize, completion_tokens: usize) -> Self {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": {
                "prompt_tokens": prompt_tokens,
                "completion_tokens": completion_tokens,
            },
        });
        Self::respond("200 OK", "application/json", &body.to_string())
    }

    /// Streams each piece as a delta, then a finish chunk and `[DONE]`.
    pub fn streamed(pieces: &[&str]) -> Self {
        let mut body = String::new();
        for piece in pieces {
            let event = serde_json::json!({
                "choices": [{ "delta": { "content": piece }, "finish_reason": null }],
            });
            body.push_str(&format!("data: {event}\n\n"));
        }
        let finish = serde_json::json!({
            "choices": [{ "delta": {}, "finish_reason": "stop" }],
        });
        body.push_str(&format!("data: {finish}\n\n"));
        body.push_str("data: [DONE]\n\n");
        Self::respond("200 OK", "text/event-stream", &body)
    }

    /// The raw request the client sent, with header names as received.
    pub fn request(self) -> String {
        self.server.join().expect("server thread should finish")
    }
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let read = stream.read(&mut chunk).expect("request should be readable");
        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);
        if let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// A base URL nothing listens on.
pub fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("address should be available");
    drop(listener);
    format!("http://{addr}/v1")
}

/// The gptbot binary with a clean, test-controlled environment.
pub fn gptbot(base_url: &str, workdir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gptbot"));
    cmd.current_dir(workdir)
        .env("OPENAI_API_KEY", "sk-test")
        .env("OPENAI_BASE_URL", base_url)
        .env("OPENAI_CONNECT_TIMEOUT_SECS", "5")
        .env_remove("OPENAI_ORGANIZATION")
        .env_remove("RUST_LOG")
        .env_remove("LOG_OUTPUT")
        .env_remove("LOG_FORMAT")
        .env_remove("LOG_FILE_PATH");
    cmd
}
