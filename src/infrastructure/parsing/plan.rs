//! Field extraction plans
//!
//! Plans are plain data (serde) so a site can be described in a config file
//! as well as in code.

use scraper::Selector;
use serde::{Deserialize, Serialize};

use super::error::PlanError;
use super::lookup::PatternSet;
use crate::domain::product::Field;

/// Element a lookup queries within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupScope {
    /// The item element
    #[default]
    Item,
    /// The plan's subscope element inside the item (e.g. the price box)
    Subscope,
}

/// What is read from a matched element
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    #[default]
    Text,
    Attr(String),
}

/// Which matched element(s) are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pick {
    /// First match only
    #[default]
    First,
    /// Last match only
    Last,
    /// First match whose transformed value is non-empty
    Any,
}

/// Post-processing applied to a raw value, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// Keep ASCII digits only
    DigitsOnly,
    /// Regex match; first capture group (or whole match). No match is a miss.
    Capture { pattern: String },
    /// Miss unless the value contains `needle`
    RequireContains { needle: String },
    Replace { from: String, to: String },
}

/// One candidate lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub selector: String,
    #[serde(default)]
    pub scope: LookupScope,
    #[serde(default)]
    pub source: ValueSource,
    #[serde(default)]
    pub pick: Pick,
    #[serde(default)]
    pub transforms: Vec<Transform>,
}

impl Lookup {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            scope: LookupScope::Item,
            source: ValueSource::Text,
            pick: Pick::First,
            transforms: Vec::new(),
        }
    }

    pub fn attr(selector: &str, name: &str) -> Self {
        Self {
            source: ValueSource::Attr(name.to_string()),
            ..Self::text(selector)
        }
    }

    #[must_use]
    pub fn in_subscope(mut self) -> Self {
        self.scope = LookupScope::Subscope;
        self
    }

    #[must_use]
    pub fn pick(mut self, pick: Pick) -> Self {
        self.pick = pick;
        self
    }

    #[must_use]
    pub fn then(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    #[must_use]
    pub fn digits(self) -> Self {
        self.then(Transform::DigitsOnly)
    }

    #[must_use]
    pub fn capture(self, pattern: &str) -> Self {
        self.then(Transform::Capture {
            pattern: pattern.to_string(),
        })
    }

    #[must_use]
    pub fn require(self, needle: &str) -> Self {
        self.then(Transform::RequireContains {
            needle: needle.to_string(),
        })
    }
}

/// Colour swatches: every match contributes one colour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwatchRule {
    pub selector: String,
    #[serde(default)]
    pub scope: LookupScope,
    #[serde(default = "default_separator")]
    pub separator: String,
    /// When set, class tokens other than this prefix name the colour
    #[serde(default)]
    pub class_prefix: Option<String>,
}

fn default_separator() -> String {
    ", ".to_string()
}

impl SwatchRule {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            scope: LookupScope::Item,
            separator: default_separator(),
            class_prefix: None,
        }
    }

    #[must_use]
    pub fn class_named(mut self, prefix: &str) -> Self {
        self.class_prefix = Some(prefix.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FieldSource {
    Candidates { lookups: Vec<Lookup> },
    Swatches(SwatchRule),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: Field,
    pub source: FieldSource,
}

impl FieldRule {
    pub fn candidates(field: Field, lookups: Vec<Lookup>) -> Self {
        Self {
            field,
            source: FieldSource::Candidates { lookups },
        }
    }

    pub fn swatches(field: Field, rule: SwatchRule) -> Self {
        Self {
            field,
            source: FieldSource::Swatches(rule),
        }
    }
}

/// Element inside each item that `Subscope` lookups run against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscopeRule {
    pub selector: String,
    /// Missing subscope fails the whole item
    #[serde(default)]
    pub required: bool,
}

/// Path token rewrite applied to the winning image URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

impl PathRewrite {
    pub fn apply(&self, url: &str) -> String {
        if self.from.is_empty() {
            url.to_string()
        } else {
            url.replace(&self.from, &self.to)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionPlan {
    #[serde(default)]
    pub subscope: Option<SubscopeRule>,
    pub rules: Vec<FieldRule>,
    #[serde(default)]
    pub image_rewrite: Option<PathRewrite>,
}

impl ExtractionPlan {
    /// Declared fields in rule order, first occurrence wins
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if !fields.contains(&rule.field) {
                fields.push(rule.field);
            }
        }
        fields
    }

    /// Every selector parses and every pattern compiles
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.rules.is_empty() {
            return Err(PlanError::Empty);
        }
        if let Some(sub) = &self.subscope {
            check_selector("subscope", &sub.selector)?;
        }
        for rule in &self.rules {
            let name = rule.field.key();
            match &rule.source {
                FieldSource::Candidates { lookups } => {
                    if lookups.is_empty() {
                        return Err(PlanError::NoCandidates {
                            field: name.to_string(),
                        });
                    }
                    for lookup in lookups {
                        check_selector(name, &lookup.selector)?;
                    }
                }
                FieldSource::Swatches(swatch) => check_selector(name, &swatch.selector)?,
            }
        }
        PatternSet::compile(self).map(|_| ())
    }
}

pub(crate) fn check_selector(field: &str, selector: &str) -> Result<(), PlanError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| PlanError::invalid_selector(field, selector, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> ExtractionPlan {
        ExtractionPlan {
            subscope: Some(SubscopeRule {
                selector: ".prd-price".into(),
                required: true,
            }),
            rules: vec![
                FieldRule::candidates(Field::ProductName, vec![Lookup::text(".prd-name a")]),
                FieldRule::candidates(
                    Field::SalePrice,
                    vec![Lookup::text(".price").in_subscope().digits()],
                ),
                FieldRule::swatches(Field::Colors, SwatchRule::new(".clChip span")),
                FieldRule::candidates(Field::ProductName, vec![Lookup::text(".name")]),
            ],
            image_rewrite: None,
        }
    }

    #[test]
    fn test_fields_in_rule_order_without_duplicates() {
        assert_eq!(plan().fields(), vec![Field::ProductName, Field::SalePrice, Field::Colors]);
    }

    #[test]
    fn test_validate_accepts_good_plan() {
        assert_eq!(plan().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_selector_and_pattern() {
        let mut p = plan();
        p.rules.push(FieldRule::candidates(Field::Description, vec![Lookup::text("div[")]));
        assert!(matches!(p.validate(), Err(PlanError::InvalidSelector { .. })));

        let mut p = plan();
        p.rules
            .push(FieldRule::candidates(Field::ReviewCount, vec![Lookup::text(".r").capture("(\\d+")]));
        assert!(matches!(p.validate(), Err(PlanError::InvalidPattern { .. })));

        let mut p = plan();
        p.rules.push(FieldRule::candidates(Field::ImageUrl, vec![]));
        assert!(matches!(p.validate(), Err(PlanError::NoCandidates { .. })));
    }

    #[test]
    fn test_plan_deserializes_from_json() {
        let json = r#"{
            "rules": [
                {"field": "product_name", "source": {"strategy": "candidates", "lookups": [
                    {"selector": ".name a span", "pick": "last"},
                    {"selector": ".name a"}
                ]}},
                {"field": "image_url", "source": {"strategy": "candidates", "lookups": [
                    {"selector": "img", "source": {"attr": "src"},
                     "transforms": [{"op": "require_contains", "needle": "medium"}]}
                ]}},
                {"field": "colors", "source": {"strategy": "swatches", "selector": ".colorchip span"}}
            ],
            "image_rewrite": {"from": "/tiny/", "to": "/medium/"}
        }"#;
        let plan: ExtractionPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.fields(), vec![Field::ProductName, Field::ImageUrl, Field::Colors]);
        let FieldSource::Candidates { lookups } = &plan.rules[0].source else {
            panic!("expected candidates");
        };
        assert_eq!(lookups[0].pick, Pick::Last);
        assert_eq!(lookups[1].source, ValueSource::Text);
        let FieldSource::Swatches(swatch) = &plan.rules[2].source else {
            panic!("expected swatches");
        };
        assert_eq!(swatch.separator, ", ");
        assert_eq!(plan.validate(), Ok(()));
    }

    #[test]
    fn test_path_rewrite() {
        let rewrite = PathRewrite {
            from: "/tiny/".into(),
            to: "/medium/".into(),
        };
        assert_eq!(rewrite.apply("https://x/tiny/img.jpg"), "https://x/medium/img.jpg");
        assert_eq!(rewrite.apply("https://x/big/img.jpg"), "https://x/big/img.jpg");
    }
}
