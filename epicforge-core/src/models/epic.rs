use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::payload::Payload;

/// Typed view of the document the feature prompt asks the model for.
///
/// Every field defaults, so partially conforming output still renders.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Epic {
    pub epic_title: String,
    pub description: String,
    pub rationale: String,
    pub long_description: String,
    pub stories: Vec<Story>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Story {
    pub story_title: String,
    pub description: String,
    pub agile_story: String,
    pub purpose: String,
    pub rationale: String,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub technical_considerations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AcceptanceCriterion {
    pub criteria: String,
    pub test_criteria: Vec<String>,
}

impl Epic {
    /// Best-effort decode of stored text; anything that is not an epic-shaped
    /// object yields an empty epic.
    pub fn from_payload(payload: Payload) -> Self {
        serde_json::from_value(payload.into_value()).unwrap_or_default()
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_markdown(&mut md);
        md
    }

    fn write_markdown(&self, md: &mut String) -> std::fmt::Result {
        writeln!(md, "# {}\n", self.epic_title)?;
        writeln!(md, "**Description:** {}\n", self.description)?;
        writeln!(md, "**Rationale:** {}\n", self.rationale)?;
        writeln!(md, "**Long Description:** {}\n", self.long_description)?;

        if self.stories.is_empty() {
            return Ok(());
        }

        writeln!(md, "## Stories\n")?;
        for story in &self.stories {
            writeln!(md, "### {}\n", story.story_title)?;
            writeln!(md, "**Description:** {}\n", story.description)?;
            writeln!(md, "**Agile Story:** {}\n", story.agile_story)?;
            writeln!(md, "**Purpose:** {}\n", story.purpose)?;
            writeln!(md, "**Rationale:** {}\n", story.rationale)?;

            if !story.acceptance_criteria.is_empty() {
                writeln!(md, "**Acceptance Criteria:**")?;
                for crit in &story.acceptance_criteria {
                    writeln!(md, "- Criteria: {}", crit.criteria)?;
                    for test in &crit.test_criteria {
                        writeln!(md, "   - {}", test)?;
                    }
                }
                writeln!(md)?;
            }

            if !story.technical_considerations.is_empty() {
                writeln!(md, "**Technical Considerations:**")?;
                for item in &story.technical_considerations {
                    writeln!(md, "- {}", item)?;
                }
                writeln!(md)?;
            }

            writeln!(md)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_epic_json() -> &'static str {
        r#"{
            "epic_title": "Dark Mode",
            "description": "Let users switch to a dark theme.",
            "rationale": "Reduces eye strain.",
            "long_description": "Adds a theme toggle persisted per user.",
            "stories": [{
                "story_title": "Theme toggle",
                "description": "Toggle in settings.",
                "agile_story": "As a user I want a dark theme so that I can read at night.",
                "purpose": "Comfort",
                "rationale": "Common request",
                "acceptance_criteria": [{
                    "criteria": "Toggle switches theme",
                    "test_criteria": ["Click toggle", "Background turns dark"]
                }],
                "technical_considerations": ["CSS variables"]
            }]
        }"#
    }

    #[test]
    fn test_markdown_layout() {
        let epic = Epic::from_payload(Payload::parse(sample_epic_json()));
        let md = epic.to_markdown();

        assert!(md.starts_with("# Dark Mode\n\n"));
        assert!(md.contains("**Rationale:** Reduces eye strain.\n"));
        assert!(md.contains("## Stories\n\n### Theme toggle\n\n"));
        assert!(md.contains("- Criteria: Toggle switches theme\n   - Click toggle\n   - Background turns dark\n"));
        assert!(md.contains("**Technical Considerations:**\n- CSS variables\n"));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let epic = Epic::from_payload(Payload::parse(r#"{"epic_title": "Only a title"}"#));
        assert_eq!(epic.epic_title, "Only a title");
        assert!(epic.stories.is_empty());

        let md = epic.to_markdown();
        assert!(md.starts_with("# Only a title"));
        assert!(!md.contains("## Stories"));
    }

    #[test]
    fn test_unparsed_or_mis_shaped_payload_is_empty_epic() {
        assert_eq!(Epic::from_payload(Payload::Unparsed), Epic::default());
        assert_eq!(Epic::from_payload(Payload::parse("[1,2]")), Epic::default());
        assert_eq!(
            Epic::from_payload(Payload::parse(r#"{"stories": "not a list"}"#)),
            Epic::default()
        );
    }
}
