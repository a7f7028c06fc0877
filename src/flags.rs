//! Feature-flag resolution.
//!
//! Visibility of a capability is decided from three layered sources, in a
//! fixed order with short-circuiting:
//!
//! 1. the definition's own `disabled` flag,
//! 2. the per-request category switch (`?tools=false`),
//! 3. every allow-set in play (process config and request query) must
//!    contain the name,
//! 4. no deny-set may contain the name.
//!
//! Allow/deny sets are plain name membership, never patterns. Query flags
//! are accepted comma-separated (`disabled_tools=a,b`) or repeated
//! (`disabled_tools=a&disabled_tools=b`); an empty value is treated as
//! absent.

use std::collections::HashSet;

use crate::config::ProcessFlags;

/// Capability categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Tool,
    Prompt,
    Resource,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tool => "tool",
            Category::Prompt => "prompt",
            Category::Resource => "resource",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-level switches and name sets for one category.
#[derive(Debug, Clone, Default)]
pub struct CategoryFlags {
    /// Category switch; `false` hides every capability in the category.
    pub enabled: bool,
    pub allow: Option<HashSet<String>>,
    pub deny: Option<HashSet<String>>,
}

impl CategoryFlags {
    fn on() -> Self {
        CategoryFlags {
            enabled: true,
            allow: None,
            deny: None,
        }
    }
}

/// The resolved feature flags for one request (stateless mode) or one
/// session (stateful mode, resolved from the initialize request's query).
///
/// `query` keeps the raw query pairs so application-defined factories can
/// consume extension parameters without this crate knowing about them.
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    pub tools: CategoryFlags,
    pub prompts: CategoryFlags,
    pub resources: CategoryFlags,
    pub query: Vec<(String, String)>,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        FeatureFlags {
            tools: CategoryFlags::on(),
            prompts: CategoryFlags::on(),
            resources: CategoryFlags::on(),
            query: Vec::new(),
        }
    }
}

impl FeatureFlags {
    /// Parse flags from a raw query string. Unknown parameters are kept in
    /// `query` untouched.
    pub fn from_query(query: &str) -> Self {
        let mut flags = FeatureFlags::default();
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        for (key, value) in &pairs {
            match key.as_str() {
                "tools" => flags.tools.enabled = switch_value(value),
                "prompts" => flags.prompts.enabled = switch_value(value),
                "resources" => flags.resources.enabled = switch_value(value),
                "enabled_tools" => extend_set(&mut flags.tools.allow, value),
                "disabled_tools" => extend_set(&mut flags.tools.deny, value),
                "enabled_prompts" => extend_set(&mut flags.prompts.allow, value),
                "disabled_prompts" => extend_set(&mut flags.prompts.deny, value),
                "enabled_resources" => extend_set(&mut flags.resources.allow, value),
                "disabled_resources" => extend_set(&mut flags.resources.deny, value),
                _ => {}
            }
        }

        flags.query = pairs;
        flags
    }

    fn category(&self, category: Category) -> &CategoryFlags {
        match category {
            Category::Tool => &self.tools,
            Category::Prompt => &self.prompts,
            Category::Resource => &self.resources,
        }
    }

    /// Decide whether a definition is visible under these flags combined
    /// with the process-wide defaults.
    pub fn visible(
        &self,
        process: &ProcessFlags,
        category: Category,
        name: &str,
        disabled: bool,
    ) -> bool {
        if disabled {
            return false;
        }

        let request = self.category(category);
        if !request.enabled {
            return false;
        }

        let (process_allow, process_deny) = match category {
            Category::Tool => (&process.enabled_tools, &process.disabled_tools),
            Category::Prompt => (&process.enabled_prompts, &process.disabled_prompts),
            Category::Resource => (&process.enabled_resources, &process.disabled_resources),
        };

        for allow in [process_allow, &request.allow] {
            if let Some(set) = allow {
                if !set.contains(name) {
                    return false;
                }
            }
        }

        for deny in [process_deny, &request.deny] {
            if let Some(set) = deny {
                if set.contains(name) {
                    return false;
                }
            }
        }

        true
    }
}

/// `?tools=false` (or `0`/`no`) turns a category off; any other value,
/// including bare `?tools`, leaves it on.
fn switch_value(value: &str) -> bool {
    !matches!(value, "false" | "0" | "no")
}

fn extend_set(target: &mut Option<HashSet<String>>, value: &str) {
    let names: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        return;
    }
    let set = target.get_or_insert_with(HashSet::new);
    for name in names {
        set.insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process() -> ProcessFlags {
        ProcessFlags::default()
    }

    #[test]
    fn default_is_fully_visible() {
        let flags = FeatureFlags::default();
        assert!(flags.visible(&process(), Category::Tool, "search", false));
        assert!(flags.visible(&process(), Category::Prompt, "greet", false));
    }

    #[test]
    fn disabled_definition_wins_over_everything() {
        let flags = FeatureFlags::from_query("enabled_tools=search");
        assert!(!flags.visible(&process(), Category::Tool, "search", true));
    }

    #[test]
    fn category_switch_hides_whole_category() {
        let flags = FeatureFlags::from_query("tools=false&enabled_tools=search");
        assert!(!flags.visible(&process(), Category::Tool, "search", false));
        // Other categories are untouched.
        assert!(flags.visible(&process(), Category::Prompt, "greet", false));
    }

    #[test]
    fn allow_set_excludes_everything_else() {
        let flags = FeatureFlags::from_query("enabled_tools=search");
        assert!(flags.visible(&process(), Category::Tool, "search", false));
        assert!(!flags.visible(&process(), Category::Tool, "delete", false));
    }

    #[test]
    fn deny_set_removes_exactly_the_named_tool() {
        let flags = FeatureFlags::from_query("disabled_tools=delete");
        assert!(flags.visible(&process(), Category::Tool, "search", false));
        assert!(!flags.visible(&process(), Category::Tool, "delete", false));
    }

    #[test]
    fn repeated_parameters_accumulate() {
        let flags = FeatureFlags::from_query("disabled_tools=a&disabled_tools=b,c");
        let deny = flags.tools.deny.as_ref().unwrap();
        assert_eq!(deny.len(), 3);
    }

    #[test]
    fn empty_flag_is_absent_not_deny_all() {
        let flags = FeatureFlags::from_query("enabled_tools=");
        assert!(flags.tools.allow.is_none());
        assert!(flags.visible(&process(), Category::Tool, "anything", false));
    }

    #[test]
    fn name_must_pass_all_allow_sets() {
        let mut proc = ProcessFlags::default();
        proc.enabled_tools = Some(["search".to_string(), "delete".to_string()].into());
        let flags = FeatureFlags::from_query("enabled_tools=search,export");

        // In both allow sets.
        assert!(flags.visible(&proc, Category::Tool, "search", false));
        // Only in one of the two.
        assert!(!flags.visible(&proc, Category::Tool, "delete", false));
        assert!(!flags.visible(&proc, Category::Tool, "export", false));
    }

    #[test]
    fn process_deny_applies_without_query_flags() {
        let mut proc = ProcessFlags::default();
        proc.disabled_prompts = Some(["internal".to_string()].into());
        let flags = FeatureFlags::default();
        assert!(!flags.visible(&proc, Category::Prompt, "internal", false));
        assert!(flags.visible(&proc, Category::Prompt, "greet", false));
    }

    #[test]
    fn raw_query_pairs_are_preserved() {
        let flags = FeatureFlags::from_query("tools=false&tenant=acme");
        assert!(flags
            .query
            .iter()
            .any(|(k, v)| k == "tenant" && v == "acme"));
    }
}
