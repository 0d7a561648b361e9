//! Component 15: the tool collector (§4.15). Merges tool definitions
//! from three sources — the executor, active skills, and caller-supplied
//! extras — first occurrence of a name wins, then applies sandbox
//! allow/deny lists and permission-grant filtering before handing the
//! final list to the Prompt Composer / `ModelAdapter`.

use std::collections::HashSet;

use sa_domain::ToolDefinition;

#[derive(Debug, Clone, Default)]
pub struct SandboxFilter {
    /// If non-empty, only these tool names survive.
    pub allow: Vec<String>,
    /// Removed regardless of `allow`.
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectorInput {
    pub executor_tools: Vec<ToolDefinition>,
    pub skill_tools: Vec<Vec<ToolDefinition>>,
    pub additional_tools: Vec<ToolDefinition>,
    pub sandbox: Option<SandboxFilter>,
    pub granted_permissions: Option<Vec<String>>,
    pub exclude: Vec<String>,
}

/// `granted` is a permission the caller holds, possibly a wildcard
/// (`"*"` matches anything, `"fs.*"` matches `"fs.read"`/`"fs.write"`/...).
fn permission_matches(granted: &str, required: &str) -> bool {
    if granted == "*" {
        return true;
    }
    if let Some(prefix) = granted.strip_suffix(".*") {
        return required.strip_prefix(prefix).map(|rest| rest.starts_with('.')).unwrap_or(false);
    }
    granted == required
}

fn is_permitted(required: &[String], granted: &[String]) -> bool {
    required.iter().all(|req| granted.iter().any(|g| permission_matches(g, req)))
}

/// Run the full collection pipeline described in §4.15.
pub fn collect(input: CollectorInput) -> Vec<ToolDefinition> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<ToolDefinition> = Vec::new();

    for tool in input
        .executor_tools
        .into_iter()
        .chain(input.skill_tools.into_iter().flatten())
        .chain(input.additional_tools.into_iter())
    {
        if seen.insert(tool.name.clone()) {
            merged.push(tool);
        }
    }

    if let Some(sandbox) = &input.sandbox {
        if !sandbox.allow.is_empty() {
            merged.retain(|t| sandbox.allow.contains(&t.name));
        }
        merged.retain(|t| !sandbox.deny.contains(&t.name));
    }

    if let Some(granted) = &input.granted_permissions {
        merged.retain(|t| is_permitted(&t.required_permissions, granted));
    }

    merged.retain(|t| !input.exclude.contains(&t.name));
    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, perms: &[&str]) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: format!("{name} tool"),
            parameters: serde_json::json!({}),
            required_permissions: perms.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn executor_tool_wins_over_a_same_named_skill_tool() {
        let input = CollectorInput {
            executor_tools: vec![tool("search", &[])],
            skill_tools: vec![vec![tool("search", &["x"])]],
            ..Default::default()
        };
        let out = collect(input);
        assert_eq!(out.len(), 1);
        assert!(out[0].required_permissions.is_empty());
    }

    #[test]
    fn sandbox_allow_list_restricts_to_named_tools() {
        let input = CollectorInput {
            executor_tools: vec![tool("search", &[]), tool("exec", &[])],
            sandbox: Some(SandboxFilter { allow: vec!["search".into()], deny: vec![] }),
            ..Default::default()
        };
        let out = collect(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "search");
    }

    #[test]
    fn sandbox_deny_list_removes_named_tools_even_if_allowed() {
        let input = CollectorInput {
            executor_tools: vec![tool("search", &[]), tool("exec", &[])],
            sandbox: Some(SandboxFilter { allow: vec![], deny: vec!["exec".into()] }),
            ..Default::default()
        };
        let out = collect(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "search");
    }

    #[test]
    fn wildcard_permission_grant_covers_matching_required_permissions() {
        let input = CollectorInput {
            executor_tools: vec![tool("read_file", &["fs.read"]), tool("write_file", &["fs.write"])],
            granted_permissions: Some(vec!["fs.*".into()]),
            ..Default::default()
        };
        let out = collect(input);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn missing_grant_excludes_the_tool() {
        let input = CollectorInput {
            executor_tools: vec![tool("read_file", &["fs.read"])],
            granted_permissions: Some(vec!["net.*".into()]),
            ..Default::default()
        };
        let out = collect(input);
        assert!(out.is_empty());
    }

    #[test]
    fn explicit_exclude_removes_a_tool_regardless_of_permissions() {
        let input = CollectorInput { executor_tools: vec![tool("search", &[])], exclude: vec!["search".into()], ..Default::default() };
        assert!(collect(input).is_empty());
    }
}
