//! Text-to-speech.
//!
//! `GoogleTranslateTts` uses the public Google Translate speech endpoint,
//! which accepts at most 200 characters per request. Longer text is split on
//! whitespace, each chunk is fetched in order, and the MP3 frames are
//! concatenated into a single file.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use std::{
    path::PathBuf,
    time::Duration,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const ENDPOINT: &str = "https://translate.google.com/translate_tts";
pub const MAX_CHUNK_CHARS: usize = 200;

/// Turns text into an audio file on disk.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Writes speech for `text` and returns the path of the new file.
    async fn synthesize(&self, text: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct GoogleTranslateTts {
    http: Client,
    audio_dir: PathBuf,
    language: String,
}

impl GoogleTranslateTts {
    pub fn new(audio_dir: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            audio_dir: audio_dir.into(),
            language: language.into(),
        }
    }

    async fn fetch_chunk(&self, chunk: &str, idx: usize, total: usize) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(ENDPOINT)
            .timeout(Duration::from_secs(30))
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", chunk),
                ("total", &total.to_string()),
                ("idx", &idx.to_string()),
                ("textlen", &chunk.chars().count().to_string()),
            ])
            .send()
            .await
            .context("Speech request failed")?
            .error_for_status()
            .context("Speech endpoint returned an error status")?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn synthesize(&self, text: &str) -> Result<PathBuf> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            bail!("No text to speak");
        }

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, idx, chunks.len()).await?);
            debug!(idx, total = chunks.len(), "Speech chunk fetched");
        }

        tokio::fs::create_dir_all(&self.audio_dir)
            .await
            .with_context(|| format!("Cannot create {}", self.audio_dir.display()))?;
        let path = self.audio_dir.join(format!("{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("Cannot write {}", path.display()))?;

        info!(path = %path.display(), bytes = audio.len(), "Audio written");
        Ok(path)
    }
}

/// Splits `text` into whitespace-separated chunks of at most `max_chars`
/// characters. A single word longer than `max_chars` is split mid-word.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };

        if needed <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if word_len <= max_chars {
            current.push_str(word);
            current_len = word_len;
        } else {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("  Gravity pulls\nthings down. ", 200), ["Gravity pulls things down."]);
    }

    #[test]
    fn test_chunks_respect_limit() {
        let text = "word ".repeat(100);
        let chunks = chunk_text(&text, 22);
        assert!(chunks.iter().all(|c| c.chars().count() <= 22));
        assert_eq!(chunks.join(" "), text.trim());
        assert_eq!(chunks[0], "word word word word");
    }

    #[test]
    fn test_long_word_is_split() {
        let chunks = chunk_text("tiny abcdefghij end", 4);
        assert_eq!(chunks, ["tiny", "abcd", "efgh", "ij", "end"]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(chunk_text(" \n\t ", 200).is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_rejects_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let tts = GoogleTranslateTts::new(dir.path(), "en");
        let err = tts.synthesize("   ").await.unwrap_err();
        assert_eq!(err.to_string(), "No text to speak");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
