//! Component 14: the prompt composer (§4.14). Generalizes a
//! workspace-file section builder from a fixed set of named files to
//! arbitrary named, prioritized sections: drop empty sections, sort by
//! descending priority, join with a configurable separator.

use sa_domain::ToolDefinition;

/// Standard priority bands (§4.14). Higher sorts first.
pub const PRIORITY_AGENT_BOOTSTRAP: i32 = 1000;
pub const PRIORITY_SOUL: i32 = 900;
pub const PRIORITY_CONTEXT: i32 = 800;
pub const PRIORITY_USER_PROFILE: i32 = 600;
pub const PRIORITY_SKILLS: i32 = 500;
pub const PRIORITY_TOOL_SUMMARY: i32 = 400;
pub const PRIORITY_ADDITIONAL: i32 = 300;
pub const PRIORITY_DATETIME: i32 = 100;

pub const DEFAULT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub content: String,
    pub priority: i32,
}

impl Section {
    pub fn new(name: impl Into<String>, content: impl Into<String>, priority: i32) -> Self {
        Self { name: name.into(), content: content.into(), priority }
    }
}

/// Drop empty sections, sort the rest by descending priority (ties keep
/// their relative order), and join with `separator` (defaults to
/// [`DEFAULT_SEPARATOR`]).
pub fn compose(mut sections: Vec<Section>, separator: Option<&str>) -> String {
    sections.retain(|s| !s.content.trim().is_empty());
    sections.sort_by(|a, b| b.priority.cmp(&a.priority));
    sections.into_iter().map(|s| s.content).collect::<Vec<_>>().join(separator.unwrap_or(DEFAULT_SEPARATOR))
}

#[derive(Debug, Clone)]
pub struct SkillInfo {
    pub name: String,
    pub priority: i32,
    pub instructions: String,
    pub examples: Vec<String>,
    pub tools: Vec<ToolDefinition>,
}

/// Render active skills as one section, each skill its own `##` block,
/// highest-priority skill first.
pub fn render_skills_section(skills: &[SkillInfo]) -> String {
    if skills.is_empty() {
        return String::new();
    }
    let mut ordered: Vec<&SkillInfo> = skills.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut blocks = Vec::with_capacity(ordered.len());
    for skill in ordered {
        let mut block = format!("## {}\n\n{}", skill.name, skill.instructions);
        if !skill.examples.is_empty() {
            block.push_str("\n\nExamples:\n");
            for example in &skill.examples {
                block.push_str("- ");
                block.push_str(example);
                block.push('\n');
            }
        }
        if !skill.tools.is_empty() {
            let names: Vec<&str> = skill.tools.iter().map(|t| t.name.as_str()).collect();
            block.push_str(&format!("\nTools: {}", names.join(", ")));
        }
        blocks.push(block);
    }
    blocks.join("\n\n")
}

/// Render the current date/time as its own low-priority section.
pub fn render_datetime_section(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("Current date and time (UTC): {}", now.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_are_dropped() {
        let out = compose(vec![Section::new("a", "", PRIORITY_SOUL), Section::new("b", "content", PRIORITY_SOUL)], None);
        assert_eq!(out, "content");
    }

    #[test]
    fn sections_sort_by_descending_priority() {
        let out = compose(
            vec![
                Section::new("datetime", "now", PRIORITY_DATETIME),
                Section::new("bootstrap", "boot", PRIORITY_AGENT_BOOTSTRAP),
                Section::new("soul", "soul", PRIORITY_SOUL),
            ],
            None,
        );
        assert_eq!(out, format!("boot{0}soul{0}now", DEFAULT_SEPARATOR));
    }

    #[test]
    fn custom_separator_is_honored() {
        let out = compose(vec![Section::new("a", "x", 1), Section::new("b", "y", 2)], Some(" | "));
        assert_eq!(out, "y | x");
    }

    #[test]
    fn skills_render_sorted_by_priority_with_examples_and_tools() {
        let skills = vec![
            SkillInfo {
                name: "low".into(),
                priority: 1,
                instructions: "do low things".into(),
                examples: vec![],
                tools: vec![],
            },
            SkillInfo {
                name: "high".into(),
                priority: 10,
                instructions: "do high things".into(),
                examples: vec!["example one".into()],
                tools: vec![ToolDefinition {
                    name: "search".into(),
                    description: "search".into(),
                    parameters: serde_json::json!({}),
                    required_permissions: vec![],
                }],
            },
        ];
        let rendered = render_skills_section(&skills);
        let high_pos = rendered.find("## high").unwrap();
        let low_pos = rendered.find("## low").unwrap();
        assert!(high_pos < low_pos);
        assert!(rendered.contains("Tools: search"));
        assert!(rendered.contains("example one"));
    }
}
