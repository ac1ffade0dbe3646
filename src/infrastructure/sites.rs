//! Site profiles
//!
//! Everything that differs between shops lives here as data: selectors,
//! page size, dedup key, navigation order, delays and the field extraction
//! plan. The engine itself is shared.
//!
//! 기본 제공 프리셋: joamom, baddiary, chicfox, closhoew

#![allow(clippy::too_many_lines)]

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::dedup::DedupKey;
use crate::domain::delay::DelayRange;
use crate::domain::product::{Column, Field};
use crate::infrastructure::parsing::plan::check_selector;
use crate::infrastructure::parsing::{
    ExtractionPlan, FieldRule, Lookup, PathRewrite, PlanError, Pick, SubscopeRule, SwatchRule,
};

/// Ways of moving from page N to page N+1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStrategy {
    /// Click the pagination link labelled with the target number
    ClickPageNumber,
    /// Rewrite the page query parameter of the current URL
    RewriteUrl,
    /// Click a "next" control
    ClickNext,
}

impl std::fmt::Display for AdvanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ClickPageNumber => "click_page_number",
            Self::RewriteUrl => "rewrite_url",
            Self::ClickNext => "click_next",
        };
        f.write_str(name)
    }
}

/// Total item count indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalCountRule {
    pub selector: String,
    /// Regex whose first group is the count; bare integer text when absent
    #[serde(default)]
    pub pattern: Option<String>,
}

/// "Next page" control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextControl {
    pub selector: String,
    /// Accepted labels, compared case-insensitively after trimming
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationProfile {
    pub total_count: TotalCountRule,
    /// Pagination links; numeric labels are page numbers
    pub pagination_links: String,
    #[serde(default = "default_page_param")]
    pub page_param: String,
    #[serde(default)]
    pub next_control: Option<NextControl>,
    pub advance_order: Vec<AdvanceStrategy>,
}

fn default_page_param() -> String {
    "page".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingProfile {
    /// Container that must appear before items are read
    pub wait_selector: String,
    /// Item selectors, first one that yields elements wins
    pub item_selectors: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SiteError {
    #[error("Unknown site preset '{name}' (available: {available})")]
    UnknownPreset { name: String, available: String },

    #[error("Site '{site}' is invalid: {message}")]
    Invalid { site: String, message: String },

    #[error("Site '{site}' has an invalid extraction plan: {source}")]
    Plan {
        site: String,
        #[source]
        source: PlanError,
    },
}

/// Complete description of one shop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Short name, also used as the output file prefix
    pub name: String,
    pub navigation: NavigationProfile,
    pub listing: ListingProfile,
    /// Items per listing page, used when pagination links are missing
    pub page_size: u32,
    pub dedup_key: DedupKey,
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Wait after every navigation
    pub page_settle_delay: DelayRange,
    /// Politeness delay between pages
    pub inter_page_delay: DelayRange,
    pub plan: ExtractionPlan,
    /// Header labels by column key; unlabelled columns use their key
    #[serde(default)]
    pub column_labels: BTreeMap<String, String>,
}

pub const PRESET_NAMES: [&str; 4] = ["joamom", "baddiary", "chicfox", "closhoew"];

impl SiteProfile {
    /// Built-in profile by name
    pub fn preset(name: &str) -> Result<Self, SiteError> {
        match name.trim().to_lowercase().as_str() {
            "joamom" => Ok(Self::joamom()),
            "baddiary" => Ok(Self::baddiary()),
            "chicfox" => Ok(Self::chicfox()),
            "closhoew" => Ok(Self::closhoew()),
            other => Err(SiteError::UnknownPreset {
                name: other.to_string(),
                available: PRESET_NAMES.join(", "),
            }),
        }
    }

    pub fn validate(&self) -> Result<(), SiteError> {
        let invalid = |message: String| SiteError::Invalid {
            site: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(invalid("page_size must be greater than 0".to_string()));
        }
        if self.max_pages == Some(0) {
            return Err(invalid("max_pages must be at least 1".to_string()));
        }
        if self.navigation.advance_order.is_empty() {
            return Err(invalid("advance_order must list at least one strategy".to_string()));
        }
        if self.listing.item_selectors.is_empty() {
            return Err(invalid("at least one item selector is required".to_string()));
        }
        for range in [self.page_settle_delay, self.inter_page_delay] {
            if !range.is_valid() {
                return Err(invalid(format!("delay range {range} has min > max")));
            }
        }
        if let Some(pattern) = &self.navigation.total_count.pattern {
            Regex::new(pattern).map_err(|e| invalid(format!("total count pattern '{pattern}': {e}")))?;
        }

        let mut selectors = vec![
            ("total_count", self.navigation.total_count.selector.as_str()),
            ("pagination_links", self.navigation.pagination_links.as_str()),
            ("listing.wait_selector", self.listing.wait_selector.as_str()),
        ];
        if let Some(next) = &self.navigation.next_control {
            selectors.push(("next_control", next.selector.as_str()));
        }
        selectors.extend(self.listing.item_selectors.iter().map(|s| ("listing.item_selectors", s.as_str())));
        for (what, selector) in selectors {
            check_selector(what, selector).map_err(|source| SiteError::Plan {
                site: self.name.clone(),
                source,
            })?;
        }

        self.plan.validate().map_err(|source| SiteError::Plan {
            site: self.name.clone(),
            source,
        })
    }

    pub fn joamom() -> Self {
        Self {
            name: "joamom".to_string(),
            navigation: NavigationProfile {
                total_count: TotalCountRule {
                    selector: ".item-total strong".to_string(),
                    pattern: None,
                },
                pagination_links: ".paging a".to_string(),
                page_param: default_page_param(),
                next_control: None,
                advance_order: vec![AdvanceStrategy::ClickPageNumber, AdvanceStrategy::RewriteUrl],
            },
            listing: ListingProfile {
                wait_selector: ".item-cont".to_string(),
                item_selectors: vec![".item-cont dl.item-list".to_string()],
            },
            page_size: 20,
            dedup_key: DedupKey::Name,
            max_pages: None,
            page_settle_delay: DelayRange::from_secs(3, 3),
            inter_page_delay: DelayRange::from_secs(2, 5),
            plan: ExtractionPlan {
                subscope: Some(SubscopeRule {
                    selector: ".prd-price".to_string(),
                    required: true,
                }),
                rules: vec![
                    FieldRule::candidates(Field::ProductName, vec![Lookup::text(".prd-name a")]),
                    FieldRule::candidates(Field::ProductUrl, vec![Lookup::attr(".prd-name a", "href")]),
                    FieldRule::candidates(Field::Description, vec![Lookup::text(".prd-subname")]),
                    FieldRule::candidates(Field::ImageUrl, vec![Lookup::attr(".thumb img", "src")]),
                    FieldRule::candidates(Field::ListPrice, vec![Lookup::text(".strike").in_subscope().digits()]),
                    FieldRule::candidates(Field::SalePrice, vec![Lookup::text(".price").in_subscope().digits()]),
                    FieldRule::candidates(
                        Field::DiscountRate,
                        vec![Lookup::text(".salePercent").in_subscope().capture(r"(\d+(?:\.\d+)?)")],
                    ),
                    FieldRule::candidates(
                        Field::ReviewCount,
                        vec![Lookup::text(".crema-product-reviews-count").in_subscope().capture(r"리뷰:\s*(\d+)")],
                    ),
                    FieldRule::swatches(Field::Colors, SwatchRule::new(".clChip span")),
                ],
                image_rewrite: None,
            },
            column_labels: korean_labels(&[(Column::CategoryFull, "카테고리")]),
        }
    }

    pub fn baddiary() -> Self {
        Self {
            name: "baddiary".to_string(),
            navigation: NavigationProfile {
                total_count: TotalCountRule {
                    selector: ".prdCount strong".to_string(),
                    pattern: None,
                },
                pagination_links: ".ec-base-paginate li a".to_string(),
                page_param: default_page_param(),
                next_control: None,
                advance_order: vec![AdvanceStrategy::ClickPageNumber, AdvanceStrategy::RewriteUrl],
            },
            listing: ListingProfile {
                wait_selector: "ul.prdList".to_string(),
                item_selectors: vec![
                    ".xans-element-.xans-product.xans-product-listnormal ul.prdList li.item".to_string(),
                    "ul.prdList li.item".to_string(),
                ],
            },
            page_size: 48,
            dedup_key: DedupKey::Url,
            max_pages: None,
            page_settle_delay: DelayRange::from_secs(3, 3),
            inter_page_delay: DelayRange::from_secs(2, 5),
            plan: ExtractionPlan {
                subscope: None,
                rules: vec![
                    FieldRule::candidates(Field::ProductName, vec![Lookup::text(".name a")]),
                    FieldRule::candidates(Field::ProductUrl, vec![Lookup::attr(".name a", "href")]),
                    FieldRule::candidates(
                        Field::Description,
                        vec![Lookup::text(r#"[rel="상품 요약설명"] span:last-child"#)],
                    ),
                    FieldRule::candidates(
                        Field::ImageUrl,
                        vec![
                            Lookup::attr(".thumbnail img", "src"),
                            Lookup::attr(".thumbnail img", "data-src"),
                        ],
                    ),
                    FieldRule::candidates(
                        Field::ListPrice,
                        vec![Lookup::text(r#"[rel="판매가"] span"#).require("원").digits()],
                    ),
                    FieldRule::candidates(
                        Field::SalePrice,
                        vec![Lookup::text(r#"[rel="할인판매가"] span"#).capture(r"(\d+,?\d+)원").digits()],
                    ),
                    FieldRule::candidates(
                        Field::DiscountRate,
                        vec![
                            Lookup::text(r#"[rel="할인판매가"] span span"#).capture(r"(\d+(?:\.\d+)?)"),
                            Lookup::text(".discountrate span.per"),
                        ],
                    ),
                    FieldRule::candidates(
                        Field::ReviewCount,
                        vec![Lookup::text(".snap_review_count").capture(r"리뷰 : (\d+)")],
                    ),
                    FieldRule::swatches(Field::Colors, SwatchRule::new(".colorChip span.chips")),
                ],
                image_rewrite: None,
            },
            column_labels: korean_labels(&[]),
        }
    }

    pub fn chicfox() -> Self {
        Self {
            name: "chicfox".to_string(),
            navigation: NavigationProfile {
                total_count: TotalCountRule {
                    selector: ".item-total strong".to_string(),
                    pattern: None,
                },
                pagination_links: ".paging a".to_string(),
                page_param: default_page_param(),
                next_control: None,
                advance_order: vec![AdvanceStrategy::ClickPageNumber, AdvanceStrategy::RewriteUrl],
            },
            listing: ListingProfile {
                wait_selector: ".item-cont".to_string(),
                item_selectors: vec![".item-cont .item-list".to_string()],
            },
            page_size: 20,
            dedup_key: DedupKey::Url,
            max_pages: None,
            page_settle_delay: DelayRange::from_secs(3, 3),
            inter_page_delay: DelayRange::from_secs(2, 5),
            plan: ExtractionPlan {
                subscope: Some(SubscopeRule {
                    selector: ".item_price".to_string(),
                    required: true,
                }),
                rules: vec![
                    FieldRule::candidates(Field::ProductName, vec![Lookup::text(".item_name a")]),
                    FieldRule::candidates(Field::ProductUrl, vec![Lookup::attr(".item_name a", "href")]),
                    FieldRule::candidates(Field::Description, vec![Lookup::text(".item_option")]),
                    FieldRule::candidates(
                        Field::ImageUrl,
                        vec![
                            Lookup::attr(".item_img img", "src"),
                            Lookup::attr(".item_img img", "data-frz-src"),
                        ],
                    ),
                    FieldRule::candidates(Field::ListPrice, vec![Lookup::text(".strike").in_subscope().digits()]),
                    FieldRule::candidates(Field::SalePrice, vec![Lookup::text(".price").in_subscope().digits()]),
                    FieldRule::candidates(
                        Field::DiscountRate,
                        vec![Lookup::text(".salePercent").in_subscope().capture(r"(\d+(?:\.\d+)?)")],
                    ),
                    FieldRule::candidates(
                        Field::ReviewCount,
                        vec![Lookup::text(".snap_review_count").capture(r"리뷰 : (\d+)")],
                    ),
                    FieldRule::swatches(Field::Colors, SwatchRule::new(".colorchips .chip").class_named("chip")),
                    FieldRule::candidates(
                        Field::SalesCount,
                        vec![Lookup::text(".item_stock").capture(r"판매수량 : (\d+)")],
                    ),
                ],
                image_rewrite: None,
            },
            column_labels: korean_labels(&[]),
        }
    }

    pub fn closhoew() -> Self {
        Self {
            name: "closhoew".to_string(),
            navigation: NavigationProfile {
                total_count: TotalCountRule {
                    selector: ".prdCount".to_string(),
                    pattern: Some(r"(\d+)\s*PRODUCT".to_string()),
                },
                pagination_links: ".ec-base-paginate ol li a".to_string(),
                page_param: default_page_param(),
                next_control: Some(NextControl {
                    selector: ".ec-base-paginate a".to_string(),
                    labels: vec!["NEXT".to_string(), "다음".to_string()],
                }),
                advance_order: vec![
                    AdvanceStrategy::RewriteUrl,
                    AdvanceStrategy::ClickNext,
                    AdvanceStrategy::ClickPageNumber,
                ],
            },
            listing: ListingProfile {
                wait_selector: ".prdList".to_string(),
                item_selectors: vec![
                    ".prdList li.item".to_string(),
                    ".xans-product-listnormal ul.prdList li".to_string(),
                ],
            },
            page_size: 40,
            dedup_key: DedupKey::Url,
            max_pages: Some(2),
            page_settle_delay: DelayRange::from_secs(5, 5),
            inter_page_delay: DelayRange::from_secs(3, 7),
            plan: ExtractionPlan {
                subscope: None,
                rules: vec![
                    FieldRule::candidates(
                        Field::ProductName,
                        vec![Lookup::text(".name a span").pick(Pick::Last), Lookup::text(".name a")],
                    ),
                    FieldRule::candidates(Field::ProductUrl, vec![Lookup::attr(".name a", "href")]),
                    FieldRule::candidates(
                        Field::ImageUrl,
                        vec![Lookup::attr(".prdImg a img", "src").pick(Pick::Any)],
                    ),
                    FieldRule::candidates(
                        Field::SalePrice,
                        vec![Lookup::text(".spec li").pick(Pick::Any).require("원").digits()],
                    ),
                    FieldRule::swatches(Field::Colors, SwatchRule::new(".colorchip span")),
                    FieldRule::candidates(
                        Field::SoldOut,
                        vec![Lookup::attr(".icon .promotion img", "alt").pick(Pick::Any).require("품절")],
                    ),
                    FieldRule::candidates(Field::LikeCount, vec![Lookup::text(".likePrdCount")]),
                ],
                image_rewrite: Some(PathRewrite {
                    from: "/tiny/".to_string(),
                    to: "/medium/".to_string(),
                }),
            },
            column_labels: korean_labels(&[(Column::Field(Field::SalePrice), "가격")]),
        }
    }
}

/// Original Korean headers, with per-site overrides
fn korean_labels(overrides: &[(Column, &str)]) -> BTreeMap<String, String> {
    let base = [
        (Column::Field(Field::ProductName), "상품명"),
        (Column::Field(Field::ProductUrl), "상품URL"),
        (Column::Field(Field::Description), "상품설명"),
        (Column::Field(Field::ImageUrl), "이미지URL"),
        (Column::Field(Field::ListPrice), "정가"),
        (Column::Field(Field::SalePrice), "판매가"),
        (Column::Field(Field::DiscountRate), "할인율"),
        (Column::Field(Field::ReviewCount), "리뷰수"),
        (Column::Field(Field::LikeCount), "좋아요수"),
        (Column::Field(Field::SalesCount), "판매수량"),
        (Column::Field(Field::Colors), "색상"),
        (Column::Field(Field::SoldOut), "품절여부"),
        (Column::CategoryMain, "카테고리_대분류"),
        (Column::CategorySub, "카테고리_소분류"),
        (Column::CategoryFull, "카테고리_전체"),
    ];
    let mut labels: BTreeMap<String, String> =
        base.iter().map(|(c, l)| (c.key().to_string(), (*l).to_string())).collect();
    for (column, label) in overrides {
        labels.insert(column.key().to_string(), (*label).to_string());
    }
    labels
}
