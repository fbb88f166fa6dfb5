//! Two-axis classification of window samples.
//!
//! A sample is mapped to a cost category (what the time is billed to) and a task category (what
//! kind of work it was). Standalone phases such as meetings win over everything and never carry a
//! cost category; otherwise the task category is `{project_type}-{sub_phase}` or just the
//! project type.

pub mod app_category;
pub mod rules;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub use app_category::app_category;
pub use rules::{ClassificationRuleSet, RuleError};

use crate::window_api::WindowSample;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub cost_category: String,
    pub task_category: String,
    pub app_category: String,
}

/// Text the rule patterns are matched against.
pub fn search_text(sample: &WindowSample) -> String {
    [
        sample.app_name.as_str(),
        sample.window_title.as_str(),
        sample.url.as_str(),
    ]
    .into_iter()
    .filter(|v| !v.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Classifies a sample. Total: an unmatched sample gets the default project type or empty
/// categories, never an error.
pub fn classify(sample: &WindowSample, rules: &ClassificationRuleSet) -> Classification {
    let app_category = app_category(&sample.app_name).to_string();
    let text = search_text(sample);

    if let Some(standalone) = rules.match_standalone(&text) {
        return Classification {
            cost_category: String::new(),
            task_category: standalone.to_string(),
            app_category,
        };
    }

    let (project_type, cost_category) = rules.detect_project_type(&text);
    let task_category = match rules.match_sub_phase(&text) {
        Some(sub_phase) => format!("{project_type}-{sub_phase}"),
        None => project_type,
    };

    trace!("Classified {text:?} as {task_category:?} / {cost_category:?}");
    Classification {
        cost_category,
        task_category,
        app_category,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::{
        config::{Ordered, PhaseConfig, ProjectTypeConfig, RulesConfig},
        window_api::WindowSample,
    };

    use super::{classify, search_text, ClassificationRuleSet};

    fn keywords(values: &[&str]) -> PhaseConfig {
        PhaseConfig {
            keywords: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn rules() -> ClassificationRuleSet {
        ClassificationRuleSet::compile(&RulesConfig {
            default_project_type: "product-dev".into(),
            project_types: vec![ProjectTypeConfig {
                project_type: "custom-dev".into(),
                keywords: vec!["impulse-pj".into()],
                cost_category: "CustomDevCost".into(),
            }],
            sub_phases: Ordered(vec![
                ("implementation".into(), keywords(&["VSCode", "Terminal"])),
                ("design".into(), keywords(&["figma"])),
            ]),
            standalone_phases: Ordered(vec![
                ("meeting".into(), keywords(&["zoom", "meet\\.google\\.com"])),
                ("email".into(), keywords(&["gmail"])),
            ]),
            ..RulesConfig::default()
        })
        .unwrap()
    }

    fn sample(app: &str, title: &str, url: &str) -> WindowSample {
        WindowSample {
            app_name: app.into(),
            window_title: title.into(),
            bundle_id: String::new(),
            url: url.into(),
            tab_title: String::new(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap(),
            is_idle: false,
        }
    }

    #[test]
    fn search_text_skips_empty_fields() {
        assert_eq!(search_text(&sample("Slack", "", "https://x")), "Slack https://x");
    }

    #[test]
    fn composes_project_type_and_sub_phase() {
        let result = classify(&sample("VSCode", "repo: impulse-pj-42", ""), &rules());
        assert_eq!(result.task_category, "custom-dev-implementation");
        assert_eq!(result.cost_category, "CustomDevCost");
        assert_eq!(result.app_category, "other");
    }

    #[test]
    fn standalone_phase_wins_and_drops_cost() {
        let result = classify(
            &sample("Google Chrome", "impulse-pj-42 sync", "https://meet.google.com/abc"),
            &rules(),
        );
        assert_eq!(result.task_category, "meeting");
        assert_eq!(result.cost_category, "");
        assert_eq!(result.app_category, "browser");
    }

    #[test]
    fn falls_back_to_default_project_type() {
        let result = classify(&sample("Finder", "Downloads", ""), &rules());
        assert_eq!(result.task_category, "product-dev");
        assert_eq!(
            result.cost_category,
            "Product development (shared feature improvements)"
        );

        let designed = classify(&sample("Figma", "Landing page", ""), &rules());
        assert_eq!(designed.task_category, "product-dev-design");
    }

    #[test]
    fn unmatched_default_type_without_cost_is_empty() {
        let rules = ClassificationRuleSet::compile(&RulesConfig {
            default_project_type: "misc".into(),
            ..RulesConfig::default()
        })
        .unwrap();
        let result = classify(&sample("Finder", "", ""), &rules);
        assert_eq!(result.task_category, "misc");
        assert_eq!(result.cost_category, "");
        assert_eq!(result.app_category, "productivity");
    }

    #[test]
    fn classification_is_deterministic() {
        let rules = rules();
        let input = sample("Terminal", "impulse-pj-1 zoom", "");
        assert_eq!(classify(&input, &rules), classify(&input, &rules));
    }
}
