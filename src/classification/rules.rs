use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::config::{PhaseConfig, RulesConfig};

/// Cost category used for a project type when neither its rule nor the configuration names one.
pub const DEFAULT_PROJECT_TYPE_COSTS: &[(&str, &str)] = &[
    ("custom-dev", "Custom development"),
    ("product-dev", "Product development (shared feature improvements)"),
    ("deployment", "Deployment work"),
    ("analysis", "Data analysis (PoC)"),
];

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid pattern {pattern:?} in rule {rule:?}: {source}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("project type rule #{0} has an empty type")]
    EmptyProjectType(usize),
}

#[derive(Debug)]
pub struct ProjectTypeRule {
    pub project_type: String,
    pub cost_category: String,
    pub patterns: Vec<Regex>,
}

#[derive(Debug)]
pub struct PhaseRule {
    pub name: String,
    pub patterns: Vec<Regex>,
}

impl PhaseRule {
    fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

/// Compiled form of [RulesConfig]. Every list is evaluated in declaration order and the first
/// match wins.
#[derive(Debug)]
pub struct ClassificationRuleSet {
    pub project_types: Vec<ProjectTypeRule>,
    pub sub_phases: Vec<PhaseRule>,
    pub standalone_phases: Vec<PhaseRule>,
    pub default_project_type: String,
    project_type_costs: Vec<(String, String)>,
}

fn compile_patterns(rule: &str, keywords: &[String]) -> Result<Vec<Regex>, RuleError> {
    keywords
        .iter()
        .map(|keyword| {
            RegexBuilder::new(keyword)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    rule: rule.to_string(),
                    pattern: keyword.clone(),
                    source,
                })
        })
        .collect()
}

fn compile_phases<'a>(
    phases: impl Iterator<Item = (&'a str, &'a PhaseConfig)>,
) -> Result<Vec<PhaseRule>, RuleError> {
    phases
        .map(|(name, phase)| {
            Ok(PhaseRule {
                name: name.to_string(),
                patterns: compile_patterns(name, &phase.keywords)?,
            })
        })
        .collect()
}

impl ClassificationRuleSet {
    pub fn compile(config: &RulesConfig) -> Result<Self, RuleError> {
        let project_types = config
            .project_types
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                if rule.project_type.trim().is_empty() {
                    return Err(RuleError::EmptyProjectType(index));
                }
                Ok(ProjectTypeRule {
                    project_type: rule.project_type.clone(),
                    cost_category: rule.cost_category.clone(),
                    patterns: compile_patterns(&rule.project_type, &rule.keywords)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            project_types,
            sub_phases: compile_phases(config.sub_phases.iter())?,
            standalone_phases: compile_phases(config.standalone_phases.iter())?,
            default_project_type: config.default_project_type.clone(),
            project_type_costs: config
                .project_type_costs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        })
    }

    /// Configured cost category of a project type, falling back to the built-in table.
    pub fn cost_for(&self, project_type: &str) -> String {
        self.project_type_costs
            .iter()
            .find(|(k, _)| k == project_type)
            .map(|(_, v)| v.as_str())
            .or_else(|| {
                DEFAULT_PROJECT_TYPE_COSTS
                    .iter()
                    .find(|(k, _)| *k == project_type)
                    .map(|(_, v)| *v)
            })
            .unwrap_or_default()
            .to_string()
    }

    pub fn match_standalone(&self, text: &str) -> Option<&str> {
        self.standalone_phases
            .iter()
            .find(|phase| phase.matches(text))
            .map(|phase| phase.name.as_str())
    }

    pub fn match_sub_phase(&self, text: &str) -> Option<&str> {
        self.sub_phases
            .iter()
            .find(|phase| phase.matches(text))
            .map(|phase| phase.name.as_str())
    }

    /// Returns `(project_type, cost_category)` of the first matching rule or of the default type.
    pub fn detect_project_type(&self, text: &str) -> (String, String) {
        for rule in &self.project_types {
            if rule.patterns.iter().any(|p| p.is_match(text)) {
                let cost = if rule.cost_category.is_empty() {
                    self.cost_for(&rule.project_type)
                } else {
                    rule.cost_category.clone()
                };
                return (rule.project_type.clone(), cost);
            }
        }
        (
            self.default_project_type.clone(),
            self.cost_for(&self.default_project_type),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Ordered, PhaseConfig, ProjectTypeConfig, RulesConfig};

    use super::{ClassificationRuleSet, RuleError};

    fn phase(keywords: &[&str]) -> PhaseConfig {
        PhaseConfig {
            keywords: keywords.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn project_type_order_is_significant() {
        let config = RulesConfig {
            project_types: vec![
                ProjectTypeConfig {
                    project_type: "custom-dev".into(),
                    keywords: vec!["impulse-pj".into()],
                    cost_category: "".into(),
                },
                ProjectTypeConfig {
                    project_type: "product-dev".into(),
                    keywords: vec!["impulse".into()],
                    cost_category: "".into(),
                },
            ],
            ..RulesConfig::default()
        };
        let rules = ClassificationRuleSet::compile(&config).unwrap();

        assert_eq!(
            rules.detect_project_type("repo IMPULSE-PJ-42"),
            ("custom-dev".to_string(), "Custom development".to_string())
        );
        assert_eq!(
            rules.detect_project_type("impulse-core"),
            (
                "product-dev".to_string(),
                "Product development (shared feature improvements)".to_string()
            )
        );
        assert_eq!(
            rules.detect_project_type("unrelated"),
            ("custom-dev".to_string(), "Custom development".to_string())
        );
    }

    #[test]
    fn configured_costs_override_builtin_table() {
        let config = RulesConfig {
            default_project_type: "internal".into(),
            project_type_costs: Ordered(vec![
                ("internal".into(), "Overhead".into()),
                ("custom-dev".into(), "Client work".into()),
            ]),
            ..RulesConfig::default()
        };
        let rules = ClassificationRuleSet::compile(&config).unwrap();
        assert_eq!(rules.cost_for("custom-dev"), "Client work");
        assert_eq!(rules.cost_for("analysis"), "Data analysis (PoC)");
        assert_eq!(rules.cost_for("unknown"), "");
        assert_eq!(rules.detect_project_type("x").1, "Overhead");
    }

    #[test]
    fn phases_keep_declaration_order() {
        let config = RulesConfig {
            sub_phases: Ordered(vec![
                ("testing".into(), phase(&["test"])),
                ("implementation".into(), phase(&["terminal"])),
            ]),
            ..RulesConfig::default()
        };
        let rules = ClassificationRuleSet::compile(&config).unwrap();
        assert_eq!(rules.match_sub_phase("Terminal - cargo test"), Some("testing"));
        assert_eq!(rules.match_sub_phase("Terminal - vim"), Some("implementation"));
        assert_eq!(rules.match_sub_phase("Finder"), None);
    }

    #[test]
    fn invalid_pattern_names_the_rule() {
        let config = RulesConfig {
            standalone_phases: Ordered(vec![("meeting".into(), phase(&["zoom", "[broken"]))]),
            ..RulesConfig::default()
        };
        match ClassificationRuleSet::compile(&config) {
            Err(RuleError::InvalidPattern { rule, pattern, .. }) => {
                assert_eq!(rule, "meeting");
                assert_eq!(pattern, "[broken");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
