//! Controlled tag vocabularies and the category-based fallback classifier.

use std::collections::HashSet;

use xq_core::{Article, TagPolicy};

pub const FLAT_TAGS: &[&str] = &[
    "AI",
    "LLM",
    "programming",
    "web",
    "security",
    "devops",
    "database",
    "cloud",
    "mobile",
    "opensource",
    "career",
    "product",
    "design",
    "hardware",
    "science",
    "tools",
];

pub const TOP_LEVEL_TAGS: &[&str] = &[
    "AI",
    "Programming",
    "Web",
    "Security",
    "DevOps",
    "Data",
    "Cloud",
    "Mobile",
    "OpenSource",
    "Career",
    "Product",
    "Design",
    "Hardware",
    "Science",
    "Tools",
];

const MAX_SEGMENTS: usize = 3;

struct CategoryRule {
    needle: &'static str,
    flat: &'static str,
    hierarchical: &'static str,
}

/// Ordered; every matching rule contributes. Needles are lowercase.
const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule { needle: "llm", flat: "LLM", hierarchical: "AI/LLM" },
    CategoryRule { needle: "machine learning", flat: "AI", hierarchical: "AI/ML" },
    CategoryRule { needle: "artificial intelligence", flat: "AI", hierarchical: "AI" },
    CategoryRule { needle: "人工智能", flat: "AI", hierarchical: "AI" },
    CategoryRule { needle: "security", flat: "security", hierarchical: "Security" },
    CategoryRule { needle: "安全", flat: "security", hierarchical: "Security" },
    CategoryRule { needle: "frontend", flat: "web", hierarchical: "Web/Frontend" },
    CategoryRule { needle: "前端", flat: "web", hierarchical: "Web/Frontend" },
    CategoryRule { needle: "web", flat: "web", hierarchical: "Web" },
    CategoryRule { needle: "backend", flat: "programming", hierarchical: "Programming/Backend" },
    CategoryRule { needle: "programming", flat: "programming", hierarchical: "Programming" },
    CategoryRule { needle: "engineering", flat: "programming", hierarchical: "Programming" },
    CategoryRule { needle: "devops", flat: "devops", hierarchical: "DevOps" },
    CategoryRule { needle: "infrastructure", flat: "devops", hierarchical: "DevOps" },
    CategoryRule { needle: "cloud", flat: "cloud", hierarchical: "Cloud" },
    CategoryRule { needle: "database", flat: "database", hierarchical: "Data/Database" },
    CategoryRule { needle: "data", flat: "database", hierarchical: "Data" },
    CategoryRule { needle: "mobile", flat: "mobile", hierarchical: "Mobile" },
    CategoryRule { needle: "open source", flat: "opensource", hierarchical: "OpenSource" },
    CategoryRule { needle: "career", flat: "career", hierarchical: "Career" },
    CategoryRule { needle: "product", flat: "product", hierarchical: "Product" },
    CategoryRule { needle: "design", flat: "design", hierarchical: "Design" },
    CategoryRule { needle: "hardware", flat: "hardware", hierarchical: "Hardware" },
    CategoryRule { needle: "science", flat: "science", hierarchical: "Science" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    policy: TagPolicy,
}

impl Vocabulary {
    pub fn new(policy: TagPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TagPolicy {
        self.policy
    }

    /// Flat tags, or the permitted first segments of hierarchical ones.
    pub fn permitted(&self) -> &'static [&'static str] {
        match self.policy {
            TagPolicy::Flat => FLAT_TAGS,
            TagPolicy::Hierarchical => TOP_LEVEL_TAGS,
        }
    }

    pub fn catch_all(&self) -> &'static str {
        match self.policy {
            TagPolicy::Flat => "tools",
            TagPolicy::Hierarchical => "Tools",
        }
    }

    /// Canonical form of `tag` if it is allowed, `None` otherwise.
    pub fn validate(&self, tag: &str) -> Option<String> {
        let tag = tag.trim();
        match self.policy {
            TagPolicy::Flat => FLAT_TAGS.contains(&tag).then(|| tag.to_string()),
            TagPolicy::Hierarchical => {
                let segments: Vec<&str> = tag.split('/').map(str::trim).collect();
                if segments.len() > MAX_SEGMENTS || segments.iter().any(|s| s.is_empty()) {
                    return None;
                }
                TOP_LEVEL_TAGS
                    .contains(&segments[0])
                    .then(|| segments.join("/"))
            }
        }
    }

    pub fn is_valid(&self, tag: &str) -> bool {
        self.validate(tag).is_some()
    }

    /// Keeps allowed tags in order, canonicalized.
    pub fn filter<S: AsRef<str>>(&self, tags: &[S]) -> Vec<String> {
        tags.iter().filter_map(|t| self.validate(t.as_ref())).collect()
    }

    /// Rule-based tags for a source category; empty when no rule matches.
    pub fn classify_category(&self, category: &str) -> Vec<String> {
        let category = category.to_lowercase();
        let mut tags: Vec<String> = Vec::new();
        for rule in CATEGORY_RULES.iter().filter(|r| category.contains(r.needle)) {
            let tag = match self.policy {
                TagPolicy::Flat => rule.flat,
                TagPolicy::Hierarchical => rule.hierarchical,
            };
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags
    }
}

/// Slash-containing tags from `articles`, in first-seen order, at most `limit`.
/// Callers pass newest articles first so the list favours recent usage.
pub fn recent_subtags<'a, I>(articles: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a Article>,
{
    let mut seen = HashSet::new();
    let mut subtags = Vec::new();
    for tag in articles.into_iter().flat_map(|a| a.tags.iter()) {
        if subtags.len() >= limit {
            break;
        }
        if tag.contains('/') && seen.insert(tag.as_str()) {
            subtags.push(tag.clone());
        }
    }
    subtags
}
