//! Descriptor Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy: any error blocks the render, warnings travel with the output.

use serde::{Deserialize, Serialize};

use crate::descriptor::{AssetDescriptor, ListingStatus};
use crate::templates::TemplateSpec;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub template_id: String,
    pub template_version: String,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Warning)
    }

    /// `rule: message` for every error, joined.
    pub fn error_summary(&self) -> String {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, input: &AssetDescriptor, template: &TemplateSpec) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct PriceRequiredRule;

impl ValidationRule for PriceRequiredRule {
    fn name(&self) -> &'static str {
        "price_required"
    }

    fn validate(&self, input: &AssetDescriptor, _template: &TemplateSpec) -> Vec<ValidationViolation> {
        if !input.price.trim().is_empty() {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: "Price is required".to_string(),
            expected: Some("non-empty price".to_string()),
            actual: None,
            remediation: vec!["Enter a list price".to_string()],
        }]
    }
}

/// Headlines have a hard input limit; they are never truncated for display.
pub struct HeadlineLengthRule;

impl ValidationRule for HeadlineLengthRule {
    fn name(&self) -> &'static str {
        "headline_length"
    }

    fn validate(&self, input: &AssetDescriptor, template: &TemplateSpec) -> Vec<ValidationViolation> {
        let (Some(headline), Some(max)) = (input.headline.as_deref(), template.headline_max_chars()) else {
            return vec![];
        };
        let actual = headline.trim().chars().count();
        if actual <= max {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: "Headline too long".to_string(),
            expected: Some(format!("{max} characters max")),
            actual: Some(format!("{actual} characters")),
            remediation: vec![format!("Shorten the headline to {max} characters")],
        }]
    }
}

pub struct DescriptionBudgetRule;

impl ValidationRule for DescriptionBudgetRule {
    fn name(&self) -> &'static str {
        "description_budget"
    }

    fn validate(&self, input: &AssetDescriptor, template: &TemplateSpec) -> Vec<ValidationViolation> {
        let max = template.description.max_chars;
        let actual = input.description.trim().chars().count();
        if actual <= max {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Warning,
            message: "Description will be truncated".to_string(),
            expected: Some(format!("{max} characters")),
            actual: Some(format!("{actual} characters")),
            remediation: vec!["Summarize the description".to_string()],
        }]
    }
}

pub struct PhotoCapacityRule;

impl ValidationRule for PhotoCapacityRule {
    fn name(&self) -> &'static str {
        "photo_capacity"
    }

    fn validate(&self, input: &AssetDescriptor, template: &TemplateSpec) -> Vec<ValidationViolation> {
        let capacity = template.capacity();
        if input.photo_refs.len() <= capacity {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Warning,
            message: "Extra photos will not be shown".to_string(),
            expected: Some(format!("{capacity} photos")),
            actual: Some(format!("{} photos", input.photo_refs.len())),
            remediation: vec!["Select the photos to feature".to_string()],
        }]
    }
}

pub struct OpenHouseStatusRule;

impl ValidationRule for OpenHouseStatusRule {
    fn name(&self) -> &'static str {
        "open_house_status"
    }

    fn validate(&self, input: &AssetDescriptor, _template: &TemplateSpec) -> Vec<ValidationViolation> {
        let has_details = input
            .open_house
            .as_ref()
            .is_some_and(|open_house| !open_house.parts().is_empty());
        if !has_details || input.status == ListingStatus::OpenHouse {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Warning,
            message: "Open house details are ignored for this status".to_string(),
            expected: Some(ListingStatus::OpenHouse.label().to_string()),
            actual: Some(input.status.label().to_string()),
            remediation: vec!["Set the status to open house to show the ribbon".to_string()],
        }]
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule + Send + Sync>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(PriceRequiredRule),
                Box::new(HeadlineLengthRule),
                Box::new(DescriptionBudgetRule),
                Box::new(PhotoCapacityRule),
                Box::new(OpenHouseStatusRule),
            ],
        }
    }

    pub fn validate(&self, input: &AssetDescriptor, template: &TemplateSpec) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(input, template))
            .collect();
        let valid = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);
        ValidationResult {
            valid,
            violations,
            template_id: template.id.clone(),
            template_version: template.template_version.clone(),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
