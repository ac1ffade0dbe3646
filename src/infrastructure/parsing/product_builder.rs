//! Product record builder
//!
//! Runs an [`ExtractionPlan`] against one item element. Per field the
//! candidates are tried strictly in declared order and the first value that
//! survives coercion wins; otherwise the field keeps its type default.

#![allow(clippy::uninlined_format_args)]

use tracing::{debug, trace};

use super::error::{ExtractionError, ExtractionResult, PlanError};
use super::lookup::{LookupContext, PatternSet, lookup};
use super::plan::{ExtractionPlan, FieldSource, SwatchRule};
use crate::domain::product::{Field, FieldKind, FieldValue, ProductRecord};
use crate::infrastructure::dom::{DomError, DomPort, ElementHandle, Scope};

/// Coerce a looked-up string into `field`'s kind; `None` when it does not fit
pub fn coerce(field: Field, raw: &str) -> Option<FieldValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match field.kind() {
        FieldKind::Text | FieldKind::OptionalText => Some(FieldValue::Text(raw.to_string())),
        FieldKind::Digits => {
            let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
            (!digits.is_empty()).then_some(FieldValue::Text(digits))
        }
        // 숫자만 있는 텍스트만 허용; 섞인 텍스트는 Capture/DigitsOnly로 먼저 정리해야 함
        FieldKind::Count => raw.parse::<u64>().ok().map(FieldValue::Count),
        FieldKind::Flag => Some(FieldValue::Flag(true)),
    }
}

/// Value a field keeps when every candidate misses
pub const fn default_value(field: Field) -> FieldValue {
    match field.kind() {
        FieldKind::Text => FieldValue::Text(String::new()),
        FieldKind::Digits | FieldKind::OptionalText => FieldValue::Absent,
        FieldKind::Count => FieldValue::Count(0),
        FieldKind::Flag => FieldValue::Flag(false),
    }
}

/// A list price with no sale price is the selling price
pub fn apply_price_pair(record: &mut ProductRecord) {
    if record.sale_price.is_none() && record.list_price.is_some() {
        record.sale_price = record.list_price.take();
    }
}

/// Builds typed records from item elements according to one plan
pub struct ProductRecordBuilder {
    plan: ExtractionPlan,
    patterns: PatternSet,
    fields: Vec<Field>,
}

impl ProductRecordBuilder {
    pub fn new(plan: ExtractionPlan) -> Result<Self, PlanError> {
        plan.validate()?;
        let patterns = PatternSet::compile(&plan)?;
        let fields = plan.fields();
        Ok(Self {
            plan,
            patterns,
            fields,
        })
    }

    pub fn plan(&self) -> &ExtractionPlan {
        &self.plan
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Extract one record from `item`
    pub async fn build<D: DomPort + ?Sized>(
        &self,
        dom: &mut D,
        item: ElementHandle,
    ) -> ExtractionResult<ProductRecord> {
        // 아이템 자체를 읽을 수 없으면 아이템 실패
        dom.text(item).await?;

        let subscope = self.resolve_subscope(dom, item).await?;
        let ctx = LookupContext { item, subscope };

        let mut record = ProductRecord::with_fields(self.fields.iter().copied());
        let mut filled: Vec<Field> = Vec::with_capacity(self.fields.len());
        for rule in &self.plan.rules {
            let value = match &rule.source {
                FieldSource::Candidates { lookups } => {
                    let mut found = None;
                    for (index, candidate) in lookups.iter().enumerate() {
                        if let Some(value) = lookup(dom, &ctx, candidate, &self.patterns)
                            .await
                            .and_then(|raw| coerce(rule.field, &raw))
                        {
                            trace!("{} <- candidate {}", rule.field.key(), index);
                            found = Some(value);
                            break;
                        }
                    }
                    found
                }
                FieldSource::Swatches(swatch) => self.swatches(dom, &ctx, swatch).await,
            };
            // 같은 필드의 뒤 규칙이 앞에서 채운 값을 지우지 않음
            match value {
                Some(v) => {
                    record.set(rule.field, v);
                    filled.push(rule.field);
                }
                None if !filled.contains(&rule.field) => record.set(rule.field, default_value(rule.field)),
                None => {}
            }
        }

        if let Some(rewrite) = &self.plan.image_rewrite {
            record.image_url = rewrite.apply(&record.image_url);
        }
        apply_price_pair(&mut record);

        Ok(record)
    }

    async fn resolve_subscope<D: DomPort + ?Sized>(
        &self,
        dom: &mut D,
        item: ElementHandle,
    ) -> ExtractionResult<Option<ElementHandle>> {
        let Some(rule) = &self.plan.subscope else {
            return Ok(None);
        };
        let found = match dom.query(Scope::Within(item), &rule.selector).await {
            Ok(found) => found.first().copied(),
            Err(e @ (DomError::StaleElement | DomError::NoPage | DomError::SessionClosed)) => {
                return Err(ExtractionError::from(e));
            }
            Err(e) => {
                debug!("subscope '{}' lookup failed: {}", rule.selector, e);
                None
            }
        };
        match found {
            None if rule.required => Err(ExtractionError::required_scope_missing(&rule.selector)),
            other => Ok(other),
        }
    }

    async fn swatches<D: DomPort + ?Sized>(
        &self,
        dom: &mut D,
        ctx: &LookupContext,
        rule: &SwatchRule,
    ) -> Option<FieldValue> {
        let root = ctx.scope_element(rule.scope)?;
        let chips = dom.query(Scope::Within(root), &rule.selector).await.ok()?;

        let mut colours = Vec::with_capacity(chips.len());
        for chip in chips {
            if let Some(prefix) = &rule.class_prefix {
                let class = dom.attribute(chip, "class").await.ok().flatten().unwrap_or_default();
                let name = class
                    .split_whitespace()
                    .filter(|token| *token != prefix.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if !name.is_empty() {
                    colours.push(name);
                    continue;
                }
            }
            let style = dom.attribute(chip, "style").await.ok().flatten().unwrap_or_default();
            if let Some(colour) = self.patterns.swatch_colour(&style) {
                colours.push(colour);
            }
        }

        (!colours.is_empty()).then(|| FieldValue::Text(colours.join(&rule.separator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fixture_source::FixturePageSource;
    use crate::infrastructure::html_session::HtmlDomSession;
    use crate::infrastructure::parsing::plan::{FieldRule, Lookup, PathRewrite, Pick, SubscopeRule, Transform};
    use rstest::rstest;
    use std::sync::Arc;

    const URL: &str = "https://shop.example/list";

    async fn items(html: &str, selector: &str) -> (HtmlDomSession<FixturePageSource>, Vec<ElementHandle>) {
        let source = FixturePageSource::new().with_page(URL, html);
        let mut dom = HtmlDomSession::new(Arc::new(source));
        dom.navigate(URL).await.unwrap();
        let found = dom.query(Scope::Page, selector).await.unwrap();
        (dom, found)
    }

    fn builder(rules: Vec<FieldRule>) -> ProductRecordBuilder {
        ProductRecordBuilder::new(ExtractionPlan {
            subscope: None,
            rules,
            image_rewrite: None,
        })
        .unwrap()
    }

    #[test]
    fn test_coerce_by_kind() {
        assert_eq!(coerce(Field::SalePrice, "15,000원"), Some(FieldValue::Text("15000".into())));
        assert_eq!(coerce(Field::SalePrice, "가격문의"), None);
        assert_eq!(coerce(Field::ReviewCount, "12"), Some(FieldValue::Count(12)));
        assert_eq!(coerce(Field::ReviewCount, "many"), None);
        assert_eq!(coerce(Field::SoldOut, "품절"), Some(FieldValue::Flag(true)));
        assert_eq!(coerce(Field::DiscountRate, "12.5"), Some(FieldValue::Text("12.5".into())));
        assert_eq!(coerce(Field::Description, "   "), None);
    }

    #[rstest]
    #[case("7", Some(7))]
    #[case(" 42 ", Some(42))]
    #[case("1.2k", None)]
    #[case("12 (3)", None)]
    #[case("좋아요 5", None)]
    #[case("-3", None)]
    fn test_count_needs_plain_integer(#[case] raw: &str, #[case] expected: Option<u64>) {
        assert_eq!(coerce(Field::LikeCount, raw), expected.map(FieldValue::Count));
    }

    #[tokio::test]
    async fn test_mixed_count_text_falls_back_to_zero() {
        let html = r#"<li class="p"><span class="likePrdCount">1.2k</span></li>
            <li class="p"><span class="likePrdCount">12</span></li>"#;
        let (mut dom, found) = items(html, "li.p").await;
        let b = builder(vec![FieldRule::candidates(Field::LikeCount, vec![Lookup::text(".likePrdCount")])]);

        assert_eq!(b.build(&mut dom, found[0]).await.unwrap().like_count, 0);
        assert_eq!(b.build(&mut dom, found[1]).await.unwrap().like_count, 12);
    }

    #[tokio::test]
    async fn test_replace_transform_runs_in_order() {
        let html = r#"<li class="p"><span class="name">[BEST] 울 코트 (NEW)</span></li>"#;
        let (mut dom, found) = items(html, "li.p").await;
        let b = builder(vec![FieldRule::candidates(
            Field::ProductName,
            vec![
                Lookup::text(".name")
                    .then(Transform::Replace {
                        from: "[BEST]".into(),
                        to: String::new(),
                    })
                    .then(Transform::Replace {
                        from: "(NEW)".into(),
                        to: String::new(),
                    }),
            ],
        )]);

        let record = b.build(&mut dom, found[0]).await.unwrap();
        assert_eq!(record.product_name, "울 코트");
    }

    #[test]
    fn test_price_pair() {
        let mut only_list = ProductRecord::with_fields([Field::ListPrice, Field::SalePrice]);
        only_list.list_price = Some("10000".into());
        apply_price_pair(&mut only_list);
        assert_eq!(only_list.list_price, None);
        assert_eq!(only_list.sale_price.as_deref(), Some("10000"));

        let mut both = ProductRecord::with_fields([Field::ListPrice, Field::SalePrice]);
        both.list_price = Some("20000".into());
        both.sale_price = Some("15000".into());
        apply_price_pair(&mut both);
        assert_eq!(both.list_price.as_deref(), Some("20000"));
        assert_eq!(both.sale_price.as_deref(), Some("15000"));
    }

    #[tokio::test]
    async fn test_first_present_candidate_wins() {
        let html = r#"<ul>
            <li class="p"><span class="b">second</span><span class="c">third</span></li>
            <li class="p"><span class="a">first</span><span class="b">second</span></li>
            <li class="p"><span class="z">none</span></li>
        </ul>"#;
        let (mut dom, found) = items(html, "li.p").await;
        let b = builder(vec![FieldRule::candidates(
            Field::Description,
            vec![Lookup::text(".a"), Lookup::text(".b"), Lookup::text(".c")],
        )]);

        assert_eq!(b.build(&mut dom, found[0]).await.unwrap().description, "second");
        assert_eq!(b.build(&mut dom, found[1]).await.unwrap().description, "first");
        assert_eq!(b.build(&mut dom, found[2]).await.unwrap().description, "");
    }

    #[tokio::test]
    async fn test_image_lazy_fallback_with_rewrite() {
        let html = r#"<div class="item"><div class="thumbnail">
            <img src="" data-src="https://x/tiny/img.jpg"></div></div>"#;
        let (mut dom, found) = items(html, ".item").await;
        let b = ProductRecordBuilder::new(ExtractionPlan {
            subscope: None,
            rules: vec![FieldRule::candidates(
                Field::ImageUrl,
                vec![
                    Lookup::attr(".thumbnail img", "src"),
                    Lookup::attr(".thumbnail img", "data-src"),
                ],
            )],
            image_rewrite: Some(PathRewrite {
                from: "/tiny/".into(),
                to: "/medium/".into(),
            }),
        })
        .unwrap();

        let record = b.build(&mut dom, found[0]).await.unwrap();
        assert_eq!(record.image_url, "https://x/medium/img.jpg");
    }

    #[tokio::test]
    async fn test_required_subscope_missing_fails_item() {
        let html = r#"<dl class="item-list"><p class="prd-name"><a href="/p/1">Coat</a></p></dl>"#;
        let (mut dom, found) = items(html, ".item-list").await;
        let b = ProductRecordBuilder::new(ExtractionPlan {
            subscope: Some(SubscopeRule {
                selector: ".prd-price".into(),
                required: true,
            }),
            rules: vec![
                FieldRule::candidates(Field::ProductName, vec![Lookup::text(".prd-name a")]),
                FieldRule::candidates(Field::SalePrice, vec![Lookup::text(".price").in_subscope()]),
            ],
            image_rewrite: None,
        })
        .unwrap();

        let err = b.build(&mut dom, found[0]).await.unwrap_err();
        assert_eq!(err, ExtractionError::required_scope_missing(".prd-price"));
    }

    #[tokio::test]
    async fn test_optional_subscope_missing_uses_defaults() {
        let html = r#"<li class="item"><a class="n" href="/p/9">Knit</a></li>"#;
        let (mut dom, found) = items(html, "li.item").await;
        let b = ProductRecordBuilder::new(ExtractionPlan {
            subscope: Some(SubscopeRule {
                selector: ".box".into(),
                required: false,
            }),
            rules: vec![
                FieldRule::candidates(Field::ProductName, vec![Lookup::text("a.n")]),
                FieldRule::candidates(Field::ReviewCount, vec![Lookup::text(".r").in_subscope()]),
                FieldRule::candidates(Field::ListPrice, vec![Lookup::text(".l").in_subscope()]),
            ],
            image_rewrite: None,
        })
        .unwrap();

        let record = b.build(&mut dom, found[0]).await.unwrap();
        assert_eq!(record.product_name, "Knit");
        assert_eq!(record.review_count, 0);
        assert_eq!(record.list_price, None);
    }

    #[tokio::test]
    async fn test_last_pick_and_any_pick() {
        let html = r#"<li class="item">
            <p class="name"><a href="/p/3"><span>상품명</span><span>Wool Coat</span></a></p>
            <ul class="spec"><li>COLOR</li><li>39,000원</li></ul>
            <div class="icon"><div class="promotion"><img alt="NEW"><img alt="품절"></div></div>
        </li>"#;
        let (mut dom, found) = items(html, "li.item").await;
        let b = builder(vec![
            FieldRule::candidates(
                Field::ProductName,
                vec![Lookup::text(".name a span").pick(Pick::Last), Lookup::text(".name a")],
            ),
            FieldRule::candidates(Field::SalePrice, vec![Lookup::text(".spec li").pick(Pick::Any).require("원")]),
            FieldRule::candidates(
                Field::SoldOut,
                vec![Lookup::attr(".icon .promotion img", "alt").pick(Pick::Any).require("품절")],
            ),
        ]);

        let record = b.build(&mut dom, found[0]).await.unwrap();
        assert_eq!(record.product_name, "Wool Coat");
        assert_eq!(record.sale_price.as_deref(), Some("39000"));
        assert!(record.sold_out);
    }

    #[tokio::test]
    async fn test_swatches_prefer_class_name_then_style() {
        let html = r#"<li class="item"><div class="colorchips">
            <span class="chip black" style="background-color:#000"></span>
            <span class="chip" style="background-color: #ffffff"></span>
            <span class="chip"></span>
        </div></li>"#;
        let (mut dom, found) = items(html, "li.item").await;
        let b = builder(vec![FieldRule::swatches(
            Field::Colors,
            crate::infrastructure::parsing::plan::SwatchRule::new(".colorchips .chip").class_named("chip"),
        )]);

        let record = b.build(&mut dom, found[0]).await.unwrap();
        assert_eq!(record.colors, "black, #ffffff");
    }

    #[tokio::test]
    async fn test_stale_item_is_item_failure() {
        let html = r#"<li class="item">x</li>"#;
        let (mut dom, found) = items(html, "li.item").await;
        dom.navigate(URL).await.unwrap();
        let b = builder(vec![FieldRule::candidates(Field::ProductName, vec![Lookup::text("a")])]);
        let err = b.build(&mut dom, found[0]).await.unwrap_err();
        assert_eq!(err, ExtractionError::ItemUnavailable { source: DomError::StaleElement });
    }
}
