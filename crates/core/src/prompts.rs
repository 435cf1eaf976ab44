//! Prompt templates for every model call.
//!
//! Templates use `{name}` placeholders. Built-in defaults are compiled into the
//! crate from `prompts/*.md`; a directory of markdown files with the same
//! stems can replace any of them at startup.

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::{collections::HashMap, fs, path::Path, sync::LazyLock};
use tracing::{info, warn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("valid regex"));

/// Identifies one prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKey {
    InferIntent,
    Simplify,
    Example,
    Safety,
    Question,
    EvaluateAnswer,
    QuizGenerate,
    QuizEvaluate,
}

impl PromptKey {
    pub const ALL: [PromptKey; 8] = [
        PromptKey::InferIntent,
        PromptKey::Simplify,
        PromptKey::Example,
        PromptKey::Safety,
        PromptKey::Question,
        PromptKey::EvaluateAnswer,
        PromptKey::QuizGenerate,
        PromptKey::QuizEvaluate,
    ];

    /// File stem used for overrides, e.g. `simplify` for `simplify.md`.
    pub fn file_stem(self) -> &'static str {
        match self {
            PromptKey::InferIntent => "infer_intent",
            PromptKey::Simplify => "simplify",
            PromptKey::Example => "example",
            PromptKey::Safety => "safety",
            PromptKey::Question => "question",
            PromptKey::EvaluateAnswer => "evaluate_answer",
            PromptKey::QuizGenerate => "quiz_generate",
            PromptKey::QuizEvaluate => "quiz_evaluate",
        }
    }

    pub fn from_file_stem(stem: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.file_stem() == stem)
    }

    fn builtin(self) -> &'static str {
        match self {
            PromptKey::InferIntent => include_str!("../prompts/infer_intent.md"),
            PromptKey::Simplify => include_str!("../prompts/simplify.md"),
            PromptKey::Example => include_str!("../prompts/example.md"),
            PromptKey::Safety => include_str!("../prompts/safety.md"),
            PromptKey::Question => include_str!("../prompts/question.md"),
            PromptKey::EvaluateAnswer => include_str!("../prompts/evaluate_answer.md"),
            PromptKey::QuizGenerate => include_str!("../prompts/quiz_generate.md"),
            PromptKey::QuizEvaluate => include_str!("../prompts/quiz_evaluate.md"),
        }
    }
}

/// The full set of templates used by one process.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<PromptKey, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        let templates = PromptKey::ALL
            .into_iter()
            .map(|key| (key, key.builtin().to_string()))
            .collect();
        Self { templates }
    }
}

impl PromptLibrary {
    /// Loads the built-in templates, then replaces any that have a matching
    /// `*.md` file in `prompts_path`.
    pub fn from_dir(prompts_path: &Path) -> Result<Self> {
        let mut library = Self::default();
        let entries = fs::read_dir(prompts_path).with_context(|| {
            format!("Could not read prompts directory {}", prompts_path.display())
        })?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?;
            match PromptKey::from_file_stem(stem) {
                Some(key) => {
                    let content = fs::read_to_string(&path)?;
                    info!(prompt = stem, "Overriding built-in prompt template");
                    library.templates.insert(key, content);
                }
                None => warn!(file = %path.display(), "Ignoring unknown prompt template"),
            }
        }
        Ok(library)
    }

    pub fn with_template(mut self, key: PromptKey, template: impl Into<String>) -> Self {
        self.templates.insert(key, template.into());
        self
    }

    pub fn template(&self, key: PromptKey) -> &str {
        self.templates
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| key.builtin())
    }

    /// Substitutes every `{name}` in the template with its value in a single
    /// pass. Inserted values are never scanned again, and placeholders with no
    /// matching value are left as they are.
    pub fn render(&self, key: PromptKey, vars: &[(&str, &str)]) -> String {
        PLACEHOLDER
            .replace_all(self.template(key), |caps: &Captures| {
                let placeholder = &caps[0];
                vars.iter()
                    .find(|(name, _)| *name == &caps[1])
                    .map_or_else(|| placeholder.to_string(), |(_, value)| value.to_string())
            })
            .into_owned()
    }
}

/// Age-tiered writing rules for the simplify stage.
///
/// Under 12 asks for short sentences, 12 to 18 for moderate detail, over 18 for
/// a concise register, and jargon is only allowed over 20.
pub fn complexity_rules(age: u32) -> String {
    let mut rules = vec![format!("- Vocabulary appropriate for age {age}")];
    rules.push(
        match age {
            0..=11 => "- Use short sentences",
            12..=18 => "- Use moderate detail",
            _ => "- Be clear but concise",
        }
        .to_string(),
    );
    rules.push(
        if age > 20 {
            "- Technical jargon is fine where it helps"
        } else {
            "- No jargon"
        }
        .to_string(),
    );
    rules.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_every_builtin_is_loaded() {
        let library = PromptLibrary::default();
        for key in PromptKey::ALL {
            assert!(!library.template(key).is_empty(), "{key:?} is empty");
            assert_eq!(PromptKey::from_file_stem(key.file_stem()), Some(key));
        }
    }

    #[test]
    fn test_explanation_prompts_suppress_meta_commentary() {
        let library = PromptLibrary::default();
        for key in [
            PromptKey::Simplify,
            PromptKey::Example,
            PromptKey::Safety,
            PromptKey::Question,
        ] {
            assert!(
                library
                    .template(key)
                    .contains("No need to mention safety rules"),
                "{key:?} lacks the suppression instruction"
            );
        }
    }

    #[test]
    fn test_render_replaces_all_occurrences() {
        let library = PromptLibrary::default();
        let prompt = library.render(
            PromptKey::EvaluateAnswer,
            &[("age", "9"), ("context", "Question: why?"), ("topic", "because")],
        );
        assert!(prompt.contains("Student's age: 9"));
        assert!(prompt.contains("age-appropriate for 9 years old"));
        assert!(prompt.contains("Student's latest response: because"));
        assert!(!prompt.contains("{age}"));
    }

    #[test]
    fn test_with_template_replaces_one_key() {
        let library = PromptLibrary::default()
            .with_template(PromptKey::Question, "Ask a {age}-year-old about: {safe_text}");
        assert_eq!(
            library.render(PromptKey::Question, &[("age", "9"), ("safe_text", "rain")]),
            "Ask a 9-year-old about: rain"
        );
        assert_eq!(
            library.template(PromptKey::Example),
            PromptKey::Example.builtin()
        );
    }

    #[test]
    fn test_render_leaves_inserted_values_untouched() {
        let library = PromptLibrary::default();
        let prompt = library.render(
            PromptKey::Safety,
            &[
                ("age", "8"),
                ("simplified", "Use {example} braces."),
                ("example", "APPLE"),
            ],
        );
        assert!(prompt.contains("Text:\nUse {example} braces.\n"));
        assert!(prompt.contains("Example:\nAPPLE"));

        let prompt = library.render(
            PromptKey::EvaluateAnswer,
            &[("age", "9"), ("context", "Question: what is {topic}?"), ("topic", "rain")],
        );
        assert!(prompt.contains("Question: what is {topic}?"));
        assert!(prompt.contains("Student's latest response: rain"));
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let library = PromptLibrary::default().with_template(PromptKey::Question, "{age} {mystery}");
        assert_eq!(
            library.render(PromptKey::Question, &[("age", "9")]),
            "9 {mystery}"
        );
    }

    #[test]
    fn test_render_keeps_literal_json_braces() {
        let library = PromptLibrary::default();
        let prompt = library.render(
            PromptKey::QuizGenerate,
            &[
                ("topic", "planets"),
                ("age", "10"),
                ("difficulty", "easy"),
                ("num_questions", "3"),
            ],
        );
        assert!(prompt.contains(r#"{"questions": ["#));
        assert!(prompt.contains("Number of questions: 3"));
    }

    #[test]
    fn test_complexity_rules_tiers() {
        for age in [5, 8, 11] {
            let rules = complexity_rules(age);
            assert!(rules.contains("short sentences"), "age {age}");
            assert!(!rules.contains("moderate detail"));
        }
        for age in [12, 15, 18] {
            let rules = complexity_rules(age);
            assert!(rules.contains("moderate detail"), "age {age}");
            assert!(!rules.contains("short sentences"));
            assert!(!rules.contains("concise"));
        }
        for age in [19, 20] {
            let rules = complexity_rules(age);
            assert!(rules.contains("concise"), "age {age}");
            assert!(rules.contains("No jargon"));
        }
        for age in [21, 35] {
            let rules = complexity_rules(age);
            assert!(rules.contains("concise"), "age {age}");
            assert!(rules.contains("jargon is fine"));
        }
    }

    #[test]
    fn test_from_dir_overrides_known_templates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("example.md"), "Custom example for {age}").unwrap();
        fs::write(dir.path().join("unrelated.md"), "ignored").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = PromptLibrary::from_dir(dir.path()).unwrap();
        assert_eq!(
            library.render(PromptKey::Example, &[("age", "7")]),
            "Custom example for 7"
        );
        assert_eq!(
            library.template(PromptKey::Safety),
            PromptKey::Safety.builtin()
        );
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let err = PromptLibrary::from_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("Could not read prompts directory"));
    }
}
