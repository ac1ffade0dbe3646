//! Optional-result lookups
//!
//! `lookup` never fails: a missing element, a DOM error or a value that does
//! not survive its transforms is simply `None`.

#![allow(clippy::uninlined_format_args)]

use std::collections::HashMap;

use regex::Regex;
use tracing::trace;

use super::error::PlanError;
use super::plan::{ExtractionPlan, FieldSource, Lookup, LookupScope, Pick, Transform, ValueSource};
use crate::infrastructure::dom::{DomPort, ElementHandle, Scope};

/// Inline-style colour declaration
const SWATCH_STYLE_PATTERN: &str = r"background(?:-color)?\s*:\s*([^;]+)";

/// Compiled regexes of one plan, keyed by pattern text
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: HashMap<String, Regex>,
    swatch_style: Regex,
}

impl PatternSet {
    pub fn compile(plan: &ExtractionPlan) -> Result<Self, PlanError> {
        let mut patterns = HashMap::new();
        for rule in &plan.rules {
            let FieldSource::Candidates { lookups } = &rule.source else {
                continue;
            };
            for transform in lookups.iter().flat_map(|l| l.transforms.iter()) {
                if let Transform::Capture { pattern } = transform {
                    if patterns.contains_key(pattern) {
                        continue;
                    }
                    let regex = Regex::new(pattern)
                        .map_err(|e| PlanError::invalid_pattern(rule.field.key(), pattern, e))?;
                    patterns.insert(pattern.clone(), regex);
                }
            }
        }
        let swatch_style = Regex::new(SWATCH_STYLE_PATTERN)
            .map_err(|e| PlanError::invalid_pattern("colors", SWATCH_STYLE_PATTERN, e))?;
        Ok(Self {
            patterns,
            swatch_style,
        })
    }

    pub fn get(&self, pattern: &str) -> Option<&Regex> {
        self.patterns.get(pattern)
    }

    /// Colour value from an inline style, if it declares one
    pub fn swatch_colour(&self, style: &str) -> Option<String> {
        self.swatch_style
            .captures(style)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Elements lookups are scoped to for one item
#[derive(Debug, Clone, Copy)]
pub struct LookupContext {
    pub item: ElementHandle,
    pub subscope: Option<ElementHandle>,
}

impl LookupContext {
    pub const fn scope_element(&self, scope: LookupScope) -> Option<ElementHandle> {
        match scope {
            LookupScope::Item => Some(self.item),
            LookupScope::Subscope => self.subscope,
        }
    }
}

/// Apply `transforms` to a raw value; `None` once any step misses or the result is blank
pub fn apply_transforms(raw: &str, transforms: &[Transform], patterns: &PatternSet) -> Option<String> {
    let mut value = raw.trim().to_string();
    for transform in transforms {
        value = match transform {
            Transform::DigitsOnly => value.chars().filter(char::is_ascii_digit).collect(),
            Transform::Capture { pattern } => {
                let regex = patterns.get(pattern)?;
                let caps = regex.captures(&value)?;
                caps.get(1).or_else(|| caps.get(0))?.as_str().to_string()
            }
            Transform::RequireContains { needle } => {
                if !value.contains(needle.as_str()) {
                    return None;
                }
                value
            }
            Transform::Replace { from, to } => value.replace(from.as_str(), to),
        };
    }
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}

async fn read<D: DomPort + ?Sized>(dom: &D, element: ElementHandle, source: &ValueSource) -> Option<String> {
    let result = match source {
        ValueSource::Text => dom.text(element).await.map(Some),
        ValueSource::Attr(name) => dom.attribute(element, name).await,
    };
    match result {
        Ok(value) => value,
        Err(e) => {
            trace!("read failed: {}", e);
            None
        }
    }
}

/// Evaluate one candidate lookup
pub async fn lookup<D: DomPort + ?Sized>(
    dom: &mut D,
    ctx: &LookupContext,
    rule: &Lookup,
    patterns: &PatternSet,
) -> Option<String> {
    let root = ctx.scope_element(rule.scope)?;
    let matches = match dom.query(Scope::Within(root), &rule.selector).await {
        Ok(found) => found,
        Err(e) => {
            trace!("lookup '{}' failed: {}", rule.selector, e);
            return None;
        }
    };

    let candidates: Vec<ElementHandle> = match rule.pick {
        Pick::First => matches.first().copied().into_iter().collect(),
        Pick::Last => matches.last().copied().into_iter().collect(),
        Pick::Any => matches,
    };

    for element in candidates {
        let Some(raw) = read(&*dom, element, &rule.source).await else {
            continue;
        };
        if let Some(value) = apply_transforms(&raw, &rule.transforms, patterns) {
            return Some(value);
        }
    }
    trace!("lookup '{}' missed", rule.selector);
    None
}
