//! Read-only catalog of suggested topics, grouped into named packs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::info;

const BUILTIN: &str = include_str!("../topic_packs.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicPacks(BTreeMap<String, Vec<String>>);

impl TopicPacks {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN).context("Built-in topic packs are malformed")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a catalog that replaces the built-in one entirely.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read topic packs from {}", path.display()))?;
        let packs = Self::from_json(&json)
            .with_context(|| format!("Invalid topic packs in {}", path.display()))?;
        info!(path = %path.display(), packs = packs.len(), "Topic packs loaded");
        Ok(packs)
    }

    /// The file at `path` when given, the built-in catalog otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn packs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }
}
