//! Ollama `/api/generate` client with NDJSON token streaming.

use crate::defaults;
use crate::error::{Result, VaaniError};
use crate::llm::generator::{Generator, TokenStream};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines, Read};
use std::time::Duration;

/// Connection settings for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL, e.g. `http://localhost:11434`
    pub endpoint: String,
    pub model: String,
    /// Upper bound for one whole generation, connect to last token.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::OLLAMA_URL.to_string(),
            model: defaults::LLM_MODEL.to_string(),
            timeout: Duration::from_secs(defaults::LLM_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// One decoded NDJSON line.
#[derive(Debug, PartialEq, Eq)]
enum ChunkLine {
    Token(String),
    /// `"done": true`, possibly with a last piece of text.
    Done(Option<String>),
    Skip,
}

fn parse_line(line: &str) -> Result<ChunkLine> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChunkLine::Skip);
    }

    let chunk: GenerateChunk =
        serde_json::from_str(line).map_err(|e| VaaniError::Generation {
            message: format!("Malformed stream chunk: {}", e),
        })?;

    if let Some(error) = chunk.error {
        return Err(VaaniError::Generation { message: error });
    }
    if chunk.done {
        let last = (!chunk.response.is_empty()).then_some(chunk.response);
        return Ok(ChunkLine::Done(last));
    }
    if chunk.response.is_empty() {
        Ok(ChunkLine::Skip)
    } else {
        Ok(ChunkLine::Token(chunk.response))
    }
}

/// Iterator over tokens read line-by-line from a streaming body.
///
/// A body that ends without a `done` line was cut off, and yields one
/// trailing error.
struct NdjsonTokens<R: Read> {
    lines: Lines<BufReader<R>>,
    finished: bool,
}

impl<R: Read> NdjsonTokens<R> {
    fn new(body: R) -> Self {
        Self {
            lines: BufReader::new(body).lines(),
            finished: false,
        }
    }
}

impl<R: Read> Iterator for NdjsonTokens<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(VaaniError::Generation {
                        message: format!("Stream read failed: {}", e),
                    }));
                }
                None => {
                    self.finished = true;
                    return Some(Err(VaaniError::Generation {
                        message: "stream ended before done".to_string(),
                    }));
                }
            };

            match parse_line(&line) {
                Ok(ChunkLine::Token(token)) => return Some(Ok(token)),
                Ok(ChunkLine::Skip) => continue,
                Ok(ChunkLine::Done(last)) => {
                    self.finished = true;
                    return last.map(Ok);
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Streaming generator backed by a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::blocking::Client,
    config: OllamaConfig,
}

impl OllamaGenerator {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VaaniError::GeneratorRequest {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

impl Generator for OllamaGenerator {
    fn stream(&self, prompt: &str) -> Result<TokenStream> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: true,
        };

        let response = self
            .client
            .post(self.api_url("/generate"))
            .json(&request)
            .send()
            .map_err(|e| VaaniError::GeneratorRequest {
                message: format!("Request to {} failed: {}", self.config.endpoint, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VaaniError::GeneratorRequest {
                message: format!("Ollama returned {}: {}", status, body.trim()),
            });
        }

        Ok(Box::new(NdjsonTokens::new(response)))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokens(body: &str) -> Vec<Result<String>> {
        NdjsonTokens::new(Cursor::new(body.to_string())).collect()
    }

    #[test]
    fn parses_streamed_tokens_until_done() {
        let body = concat!(
            r#"{"model":"m","response":"नमस्ते","done":false}"#,
            "\n",
            r#"{"model":"m","response":" दुनिया","done":false}"#,
            "\n",
            r#"{"model":"m","response":"","done":true,"eval_count":2}"#,
            "\n",
            r#"{"model":"m","response":"ignored","done":false}"#,
            "\n",
        );
        let out: Vec<String> = tokens(body).into_iter().map(|t| t.unwrap()).collect();
        assert_eq!(out, vec!["नमस्ते", " दुनिया"]);
    }

    #[test]
    fn final_chunk_text_is_kept() {
        let body = r#"{"response":"अंत","done":true}"#;
        let out: Vec<String> = tokens(body).into_iter().map(|t| t.unwrap()).collect();
        assert_eq!(out, vec!["अंत"]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let body = "\n\n{\"response\":\"a\",\"done\":false}\n\n{\"done\":true}\n";
        let out: Vec<String> = tokens(body).into_iter().map(|t| t.unwrap()).collect();
        assert_eq!(out, vec!["a"]);
    }

    #[test]
    fn body_cut_off_before_done_is_generation_error() {
        let body = concat!(
            r#"{"response":"आधा ","done":false}"#,
            "\n",
            r#"{"response":"जवाब","done":false}"#,
            "\n",
        );
        let out = tokens(body);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_deref().ok(), Some("आधा "));
        assert_eq!(out[1].as_deref().ok(), Some("जवाब"));
        match &out[2] {
            Err(VaaniError::Generation { message }) => assert!(message.contains("before done")),
            other => panic!("expected generation error, got {:?}", other),
        }
    }

    #[test]
    fn empty_body_is_generation_error() {
        assert!(matches!(
            tokens("").as_slice(),
            [Err(VaaniError::Generation { .. })]
        ));
    }

    #[test]
    fn server_error_line_ends_stream_with_error() {
        let body = concat!(
            r#"{"response":"एक","done":false}"#,
            "\n",
            r#"{"error":"model 'x' not found"}"#,
            "\n",
            r#"{"response":"दो","done":false}"#,
        );
        let out = tokens(body);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        match &out[1] {
            Err(VaaniError::Generation { message }) => assert!(message.contains("not found")),
            other => panic!("expected generation error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_line_is_generation_error() {
        let out = tokens("not json\n");
        assert!(matches!(
            out.as_slice(),
            [Err(VaaniError::Generation { .. })]
        ));
    }

    #[test]
    fn request_serializes_with_stream_flag() {
        let json = serde_json::to_value(GenerateRequest {
            model: "hindi-smart:latest",
            prompt: "नमस्ते",
            stream: true,
        })
        .unwrap();
        assert_eq!(json["model"], "hindi-smart:latest");
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn api_url_tolerates_trailing_slash() {
        let generator = OllamaGenerator::new(OllamaConfig {
            endpoint: "http://localhost:11434/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            generator.api_url("/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn unreachable_server_is_request_error() {
        let generator = OllamaGenerator::new(OllamaConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            generator.stream("x"),
            Err(VaaniError::GeneratorRequest { .. })
        ));
    }
}
