//! Ollama HTTP client
//!
//! Blocking client for the three endpoints the chatbot needs:
//! `/api/generate` for replies, `/api/embeddings` for memory vectors and
//! `/api/tags` for `doctor`. The `Generator` and `Embedder` traits are the
//! seam the rest of the crate depends on, so memory and chat can run against
//! fakes in tests.

pub mod types;

use eyre::{Context, Result};
use std::time::Duration;

use crate::config::OllamaConfig;
use types::{
    EmbeddingRequest, EmbeddingResponse, GenerateOptions, GenerateRequest, GenerateResponse, TagsResponse,
};

/// Produces a reply for a fully assembled prompt
pub trait Generator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Turns text into an embedding vector
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

impl<T: Generator + ?Sized> Generator for &T {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}

impl<T: Embedder + ?Sized> Embedder for &T {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }
}

/// Client for a local Ollama server
pub struct OllamaClient {
    agent: ureq::Agent,
    base_url: String,
    generation_model: String,
    embedding_model: String,
    options: Option<GenerateOptions>,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            generation_model: config.generation_model.clone(),
            embedding_model: config.embedding_model.clone(),
            options: GenerateOptions::from_parts(config.temperature, config.num_predict),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = self.url(path);
        log::debug!("POST {} ({} bytes)", url, body.len());

        let mut response = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(body.as_bytes())
            .context(format!("Failed to call Ollama at {}", url))?;

        response
            .body_mut()
            .read_to_string()
            .context("Failed to read Ollama response")
    }

    /// Names of the models installed on the server
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = self.url("/api/tags");
        let mut response = self
            .agent
            .get(&url)
            .call()
            .context(format!("Failed to reach Ollama at {}", url))?;

        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read Ollama response")?;
        let tags: TagsResponse = serde_json::from_str(&body).context("Failed to parse model list")?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

impl Generator for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
            options: self.options.clone(),
        };
        let body = serde_json::to_string(&request).context("Failed to serialize request")?;

        let response_body = self.post_json("/api/generate", &body)?;
        let response: GenerateResponse =
            serde_json::from_str(&response_body).context("Failed to parse Ollama generate response")?;

        Ok(response.response.unwrap_or_default().trim().to_string())
    }
}

impl Embedder for OllamaClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };
        let body = serde_json::to_string(&request).context("Failed to serialize request")?;

        let response_body = self.post_json("/api/embeddings", &body)?;
        parse_embedding(&response_body)
    }
}

fn parse_embedding(body: &str) -> Result<Vec<f32>> {
    let response: EmbeddingResponse =
        serde_json::from_str(body).context("Failed to parse Ollama embedding response")?;

    let embedding = response
        .embedding
        .ok_or_else(|| eyre::eyre!("No 'embedding' key in Ollama response: {}", body))?;

    if embedding.is_empty() {
        eyre::bail!("Ollama returned an empty embedding");
    }
    Ok(embedding)
}

/// Whether `wanted` is among `installed`, treating a bare name as `:latest`
pub fn has_model(installed: &[String], wanted: &str) -> bool {
    installed.iter().any(|name| {
        name == wanted || (!wanted.contains(':') && name.strip_suffix(":latest") == Some(wanted))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve one HTTP response, returning the raw request line and body
    fn serve_once(status: &str, body: &'static str) -> (String, JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':')
                    && name.eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap();
                }
            }

            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            reader.get_mut().write_all(response.as_bytes()).unwrap();

            (request_line.trim().to_string(), String::from_utf8(request_body).unwrap())
        });

        (format!("http://{}", addr), handle)
    }

    fn client_for(base_url: &str) -> OllamaClient {
        OllamaClient::new(&OllamaConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..OllamaConfig::default()
        })
    }

    #[test]
    fn test_generate_trims_response() {
        let (url, handle) = serve_once("200 OK", r#"{"response":"  Hello there!\n","done":true}"#);
        let client = client_for(&url);

        let reply = client.generate("User: hi\nBot:").unwrap();
        assert_eq!(reply, "Hello there!");

        let (request_line, body) = handle.join().unwrap();
        assert!(request_line.starts_with("POST /api/generate"));
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["model"], "gemma2:2b");
        assert_eq!(body["stream"], false);
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_generate_missing_response_is_empty() {
        let (url, handle) = serve_once("200 OK", r#"{"done":true}"#);
        let client = client_for(&url);

        assert_eq!(client.generate("prompt").unwrap(), "");
        handle.join().unwrap();
    }

    #[test]
    fn test_generate_http_error() {
        let (url, handle) = serve_once("500 Internal Server Error", r#"{"error":"model not found"}"#);
        let client = client_for(&url);

        assert!(client.generate("prompt").is_err());
        handle.join().unwrap();
    }

    #[test]
    fn test_embed_sends_embedding_model() {
        let (url, handle) = serve_once("200 OK", r#"{"embedding":[0.5,-0.25,1.0]}"#);
        let client = client_for(&format!("{}/", url));

        let vector = client.embed("User: hi\nBot: hello").unwrap();
        assert_eq!(vector, vec![0.5, -0.25, 1.0]);

        let (request_line, body) = handle.join().unwrap();
        assert!(request_line.starts_with("POST /api/embeddings"));
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["model"], "mxbai-embed-large:335m-v1-fp16");
        assert_eq!(body["prompt"], "User: hi\nBot: hello");
    }

    #[test]
    fn test_list_models() {
        let (url, handle) = serve_once(
            "200 OK",
            r#"{"models":[{"name":"gemma2:2b","size":1},{"name":"nomic-embed-text:latest"}]}"#,
        );
        let client = client_for(&url);

        let models = client.list_models().unwrap();
        assert_eq!(models, vec!["gemma2:2b", "nomic-embed-text:latest"]);

        let (request_line, _) = handle.join().unwrap();
        assert!(request_line.starts_with("GET /api/tags"));
    }

    #[test]
    fn test_unreachable_server_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        assert!(client_for(&url).embed("text").is_err());
    }

    #[test]
    fn test_parse_embedding_missing_key() {
        let err = parse_embedding(r#"{"error":"no such model"}"#).unwrap_err();
        assert!(err.to_string().contains("no such model"));
    }

    #[test]
    fn test_parse_embedding_empty() {
        assert!(parse_embedding(r#"{"embedding":[]}"#).is_err());
    }

    #[test]
    fn test_generate_options_omitted_when_unset() {
        assert!(GenerateOptions::from_parts(None, None).is_none());
        let options = GenerateOptions::from_parts(Some(0.7), None).unwrap();
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.num_predict, None);
    }

    #[test]
    fn test_has_model() {
        let installed = vec!["gemma2:2b".to_string(), "llama3:latest".to_string()];
        assert!(has_model(&installed, "gemma2:2b"));
        assert!(has_model(&installed, "llama3"));
        assert!(has_model(&installed, "llama3:latest"));
        assert!(!has_model(&installed, "gemma2"));
        assert!(!has_model(&installed, "mistral"));
    }
}
