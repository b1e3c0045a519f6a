//! Known organizations and the keyword matcher that identifies them.
//!
//! The catalog is built once at startup and never mutated afterwards.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub name: String,
    /// Matched case-insensitively, in declared order.
    pub aliases: Vec<String>,
    /// Culture and career pages fetched after the primary source.
    #[serde(default)]
    pub supplementary_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationMatch<'a> {
    Matched(&'a Organization),
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct OrganizationCatalog {
    organizations: Vec<Organization>,
}

impl OrganizationCatalog {
    pub fn new(organizations: Vec<Organization>) -> Result<Self> {
        if organizations.is_empty() {
            bail!("Organization catalog is empty");
        }
        let mut seen = HashSet::new();
        for org in &organizations {
            if org.name.trim().is_empty() {
                bail!("Organization with an empty name in catalog");
            }
            if !seen.insert(org.name.as_str()) {
                bail!("Duplicate organization '{}' in catalog", org.name);
            }
            if org.aliases.iter().all(|a| a.trim().is_empty()) {
                bail!("Organization '{}' has no aliases", org.name);
            }
        }
        Ok(Self { organizations })
    }

    /// Reads a JSON array of `{name, aliases, supplementary_urls}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read organization catalog {}", path.display()))?;
        let organizations: Vec<Organization> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid organization catalog {}", path.display()))?;
        Self::new(organizations)
    }

    pub fn builtin() -> Self {
        let org = |name: &str, aliases: &[&str], urls: &[&str]| Organization {
            name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            supplementary_urls: urls.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            organizations: vec![
                org(
                    "현대오토에버",
                    &["현대오토에버", "hyundai autoever", "autoever"],
                    &[
                        "https://career.hyundai-autoever.com/ko/people",
                        "https://career.hyundai-autoever.com/ko/life",
                        "https://career.hyundai-autoever.com/ko/embeddedsw",
                    ],
                ),
                org(
                    "업스테이지",
                    &["업스테이지", "upstage"],
                    &["https://www.upstage.ai/about", "https://www.upstage.ai/careers"],
                ),
                org(
                    "토스",
                    &["토스", "toss", "비바리퍼블리카", "viva republica"],
                    &[
                        "https://toss.im/career/culture",
                        "https://toss.im/career/community/toss",
                    ],
                ),
            ],
        }
    }

    /// First organization, in declared order, with any alias contained in `text`.
    /// When several organizations are mentioned the earlier declaration wins.
    pub fn match_text(&self, text: &str) -> OrganizationMatch<'_> {
        let haystack = text.to_lowercase();
        self.organizations
            .iter()
            .find(|org| {
                org.aliases
                    .iter()
                    .map(|alias| alias.trim().to_lowercase())
                    .any(|alias| !alias.is_empty() && haystack.contains(&alias))
            })
            .map_or(OrganizationMatch::Unmatched, OrganizationMatch::Matched)
    }

    pub fn names(&self) -> Vec<String> {
        self.organizations.iter().map(|o| o.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn matched_name<'a>(catalog: &'a OrganizationCatalog, text: &str) -> Option<&'a str> {
        match catalog.match_text(text) {
            OrganizationMatch::Matched(org) => Some(org.name.as_str()),
            OrganizationMatch::Unmatched => None,
        }
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let catalog = OrganizationCatalog::builtin();
        for text in ["join toss today", "JOIN TOSS TODAY", "Join Toss Today"] {
            assert_eq!(matched_name(&catalog, text), Some("토스"), "{text}");
        }
    }

    #[test]
    fn test_first_declared_organization_wins() {
        let catalog = OrganizationCatalog::builtin();
        let text = "Upstage engineers previously worked at Hyundai AutoEver and Toss.";
        assert_eq!(matched_name(&catalog, text), Some("현대오토에버"));
    }

    #[test]
    fn test_korean_alias_matches() {
        let catalog = OrganizationCatalog::builtin();
        assert_eq!(matched_name(&catalog, "주식회사 비바리퍼블리카 채용"), Some("토스"));
        assert_eq!(matched_name(&catalog, "업스테이지 AI 엔지니어"), Some("업스테이지"));
    }

    #[test]
    fn test_unknown_text_is_unmatched() {
        let catalog = OrganizationCatalog::builtin();
        assert_eq!(catalog.match_text("Acme Corp backend engineer"), OrganizationMatch::Unmatched);
    }

    #[test]
    fn test_builtin_catalog_declares_supplementary_urls() {
        let catalog = OrganizationCatalog::builtin();
        assert_eq!(catalog.names(), vec!["현대오토에버", "업스테이지", "토스"]);
        match catalog.match_text("toss") {
            OrganizationMatch::Matched(org) => assert_eq!(org.supplementary_urls.len(), 2),
            OrganizationMatch::Unmatched => panic!("toss should match"),
        }
    }

    #[test]
    fn test_catalog_validation() {
        let org = |name: &str, aliases: &[&str]| Organization {
            name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            supplementary_urls: vec![],
        };
        assert!(OrganizationCatalog::new(vec![]).is_err());
        assert!(OrganizationCatalog::new(vec![org("A", &[" "])]).is_err());
        assert!(OrganizationCatalog::new(vec![org("A", &["a"]), org("A", &["b"])]).is_err());
        assert!(OrganizationCatalog::new(vec![org("A", &["a"])]).is_ok());
    }

    #[test]
    fn test_catalog_loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Acme", "aliases": ["acme"], "supplementary_urls": ["https://acme.example/culture"]}}]"#
        )
        .unwrap();

        let catalog = OrganizationCatalog::from_json_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(matched_name(&catalog, "ACME careers"), Some("Acme"));
    }
}
