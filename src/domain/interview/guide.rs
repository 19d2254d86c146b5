//! Manually authored knowledge guide.
//!
//! A markdown document split into sections by `#`/`##` headings. Bullet lines
//! are the cues; other lines are kept as a fallback when no bullet matches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::text::{content_tokens, overlap};
use super::topic::Topic;

/// Heading weight when matching a section to a topic.
const TITLE_WEIGHT: usize = 2;

/// One guide section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideSection {
    pub title: String,
    pub bullets: Vec<String>,
    pub lines: Vec<String>,
}

impl GuideSection {
    fn is_empty(&self) -> bool {
        self.bullets.is_empty() && self.lines.is_empty()
    }

    fn relevance(&self, vocabulary: &BTreeSet<String>) -> usize {
        let body: usize = self
            .bullets
            .iter()
            .chain(self.lines.iter())
            .map(|l| overlap(l, vocabulary))
            .sum();
        overlap(&self.title, vocabulary) * TITLE_WEIGHT + body
    }
}

/// Cues picked from a guide for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideMatch {
    pub section_title: String,
    /// Best cues first.
    pub cues: Vec<String>,
}

/// Parsed guide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGuide {
    pub sections: Vec<GuideSection>,
}

fn strip_bullet(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

impl KnowledgeGuide {
    /// Parses markdown. Text before the first heading lands in an untitled section.
    pub fn parse(markdown: &str) -> Self {
        let mut sections = Vec::new();
        let mut current = GuideSection::default();

        for raw in markdown.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if !current.is_empty() || !current.title.is_empty() {
                    sections.push(std::mem::take(&mut current));
                }
                current.title = line.trim_start_matches('#').trim().to_string();
            } else if let Some(bullet) = strip_bullet(line) {
                if !bullet.is_empty() {
                    current.bullets.push(bullet.to_string());
                }
            } else {
                current.lines.push(line.to_string());
            }
        }
        if !current.is_empty() || !current.title.is_empty() {
            sections.push(current);
        }

        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(GuideSection::is_empty)
    }

    /// Picks cues for a topic, or `None` if no section shares vocabulary with it.
    ///
    /// The section with the highest overlap wins (first on ties). Its bullets
    /// are ranked by overlap; if none overlaps, its first lines are used.
    pub fn cues_for(&self, topic: &Topic, limit: usize) -> Option<GuideMatch> {
        let mut vocabulary = content_tokens(&topic.label);
        for goal in &topic.sub_goals {
            vocabulary.extend(content_tokens(goal));
        }

        let mut best: Option<(&GuideSection, usize)> = None;
        for section in self.sections.iter().filter(|s| !s.is_empty()) {
            let score = section.relevance(&vocabulary);
            if score > 0 && best.map_or(true, |(_, b)| score > b) {
                best = Some((section, score));
            }
        }
        let (section, _) = best?;

        let mut ranked: Vec<(&String, usize)> = section
            .bullets
            .iter()
            .map(|b| (b, overlap(b, &vocabulary)))
            .filter(|(_, score)| *score > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let cues: Vec<String> = if ranked.is_empty() {
            section
                .lines
                .iter()
                .chain(section.bullets.iter())
                .take(limit)
                .cloned()
                .collect()
        } else {
            ranked.into_iter().take(limit).map(|(b, _)| b.clone()).collect()
        };

        Some(GuideMatch {
            section_title: section.title.clone(),
            cues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::TopicId;

    const GUIDE: &str = "\
Intro line before headings.

# Onboarding
New hires struggle in the first week.
- Ask which training material was missing
- Probe how long account setup took
* Check whether buddies were assigned

## Pricing and billing
1. Ask how pricing compares to competitors
2) Ask about billing surprises
• Ask about discounts
";

    fn topic(label: &str, goals: &[&str]) -> Topic {
        Topic::new(TopicId::new("t").unwrap(), label, 0).with_sub_goals(goals.iter().copied())
    }

    mod parsing {
        use super::*;

        #[test]
        fn splits_sections_and_bullets() {
            let guide = KnowledgeGuide::parse(GUIDE);
            assert_eq!(guide.sections.len(), 3);
            assert_eq!(guide.sections[0].title, "");
            assert_eq!(guide.sections[1].title, "Onboarding");
            assert_eq!(guide.sections[1].bullets.len(), 3);
            assert_eq!(guide.sections[1].lines, vec!["New hires struggle in the first week."]);
            assert_eq!(guide.sections[2].title, "Pricing and billing");
            assert_eq!(
                guide.sections[2].bullets,
                vec![
                    "Ask how pricing compares to competitors",
                    "Ask about billing surprises",
                    "Ask about discounts"
                ]
            );
        }

        #[test]
        fn empty_markdown_is_empty_guide() {
            assert!(KnowledgeGuide::parse("\n\n").is_empty());
        }
    }

    mod matching {
        use super::*;

        #[test]
        fn picks_section_by_label_overlap_and_ranks_bullets() {
            let guide = KnowledgeGuide::parse(GUIDE);
            let m = guide.cues_for(&topic("Billing", &["billing surprises"]), 2).unwrap();
            assert_eq!(m.section_title, "Pricing and billing");
            assert_eq!(m.cues[0], "Ask about billing surprises");
        }

        #[test]
        fn falls_back_to_section_lines_when_no_bullet_overlaps() {
            let guide = KnowledgeGuide::parse("# Onboarding\nGeneral advice here.\n- unrelated bullet");
            let m = guide.cues_for(&topic("Onboarding", &[]), 1).unwrap();
            assert_eq!(m.cues, vec!["General advice here."]);
        }

        #[test]
        fn no_shared_vocabulary_means_no_match() {
            let guide = KnowledgeGuide::parse(GUIDE);
            assert!(guide.cues_for(&topic("Security audits", &[]), 2).is_none());
        }
    }
}
