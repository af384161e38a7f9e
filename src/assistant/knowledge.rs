//! Static knowledge the assistant answers from.
//!
//! Loaded once at startup from TOML, either the built-in copy compiled into
//! the binary or a file named by `KNOWLEDGE_PATH`. Never mutated afterwards.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::KnowledgeError;

const BUILTIN: &str = include_str!("../../data/knowledge.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeBase {
    pub seed: String,
    pub greeting: String,
    pub farewell: String,
    pub gratitude: String,
    pub fallback: String,
    #[serde(default)]
    pub suggested_questions: Vec<String>,
    pub profile: Profile,
    pub contact: ContactChannels,
    pub topics: Vec<KnowledgeTopic>,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub assistant_name: String,
    pub name: String,
    pub title: String,
    pub location: String,
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactChannels {
    pub email: String,
    pub phone: String,
    pub whatsapp: String,
    pub linkedin: String,
    pub github: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeTopic {
    pub id: String,
    pub title: String,
    pub route: String,
    pub keywords: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub facts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Skill {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub narrative: String,
    pub usage: String,
}

impl KnowledgeBase {
    pub fn builtin() -> Result<Self, KnowledgeError> {
        Self::from_toml_str(BUILTIN)
    }

    pub fn from_path(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, KnowledgeError> {
        let kb: KnowledgeBase = toml::from_str(raw)?;
        kb.validate()?;
        Ok(kb)
    }

    fn validate(&self) -> Result<(), KnowledgeError> {
        if self.topics.is_empty() {
            return Err(KnowledgeError::Invalid("no topics defined".to_string()));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.id.trim().is_empty() {
                return Err(KnowledgeError::Invalid("topic with empty id".to_string()));
            }
            if !seen.insert(topic.id.as_str()) {
                return Err(KnowledgeError::Invalid(format!("duplicate topic id '{}'", topic.id)));
            }
            if !topic.route.starts_with('/') {
                return Err(KnowledgeError::Invalid(format!(
                    "topic '{}' route must start with '/'",
                    topic.id
                )));
            }
            if topic.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(KnowledgeError::Invalid(format!("topic '{}' has no keywords", topic.id)));
            }
        }

        if let Some(skill) = self.skills.iter().find(|s| s.name.trim().is_empty()) {
            return Err(KnowledgeError::Invalid(format!(
                "skill in category '{}' has no name",
                skill.category
            )));
        }
        Ok(())
    }

    /// Section titles in declaration order.
    pub fn section_titles(&self) -> Vec<&str> {
        self.topics.iter().map(|t| t.title.as_str()).collect()
    }
}
