//! Typed product record
//!
//! Every site fills a subset of the same fixed field set. Which fields a site
//! declares (and in what order) comes from its extraction plan; the record
//! remembers that order so exported columns follow it.

use serde::{Deserialize, Serialize};

use super::category::CategoryTag;
use super::dedup::DedupKey;

/// Logical product fields known to the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ProductName,
    ProductUrl,
    Description,
    ImageUrl,
    ListPrice,
    SalePrice,
    DiscountRate,
    ReviewCount,
    LikeCount,
    SalesCount,
    Colors,
    SoldOut,
}

/// How a raw looked-up string is coerced into a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, default empty string
    Text,
    /// Digits only, default absent
    Digits,
    /// Optional free text (rates), default absent
    OptionalText,
    /// Integer count, default zero
    Count,
    /// Boolean flag, default false
    Flag,
}

impl Field {
    pub const ALL: [Self; 12] = [
        Self::ProductName,
        Self::ProductUrl,
        Self::Description,
        Self::ImageUrl,
        Self::ListPrice,
        Self::SalePrice,
        Self::DiscountRate,
        Self::ReviewCount,
        Self::LikeCount,
        Self::SalesCount,
        Self::Colors,
        Self::SoldOut,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::ProductName => "product_name",
            Self::ProductUrl => "product_url",
            Self::Description => "description",
            Self::ImageUrl => "image_url",
            Self::ListPrice => "list_price",
            Self::SalePrice => "sale_price",
            Self::DiscountRate => "discount_rate",
            Self::ReviewCount => "review_count",
            Self::LikeCount => "like_count",
            Self::SalesCount => "sales_count",
            Self::Colors => "colors",
            Self::SoldOut => "sold_out",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::ProductName | Self::ProductUrl | Self::Description | Self::ImageUrl | Self::Colors => {
                FieldKind::Text
            }
            Self::ListPrice | Self::SalePrice => FieldKind::Digits,
            Self::DiscountRate => FieldKind::OptionalText,
            Self::ReviewCount | Self::LikeCount | Self::SalesCount => FieldKind::Count,
            Self::SoldOut => FieldKind::Flag,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// One exported column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Field(Field),
    CategoryMain,
    CategorySub,
    CategoryFull,
}

impl Column {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Field(f) => f.key(),
            Self::CategoryMain => "category_main",
            Self::CategorySub => "category_sub",
            Self::CategoryFull => "category_full",
        }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Count(u64),
    Flag(bool),
    Empty,
}

impl Cell {
    /// Delimited-text rendering
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Count(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
            Self::Empty => String::new(),
        }
    }
}

/// Value handed to [`ProductRecord::set`] after coercion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Count(u64),
    Flag(bool),
    Absent,
}

/// Product record with explicit optional fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProductRecord {
    pub product_name: String,
    pub product_url: String,
    pub description: String,
    pub image_url: String,
    /// Digits only
    pub list_price: Option<String>,
    /// Digits only
    pub sale_price: Option<String>,
    pub discount_rate: Option<String>,
    pub review_count: u64,
    pub like_count: u64,
    pub sales_count: u64,
    pub colors: String,
    pub sold_out: bool,
    /// Attached by the crawl loop, never by the builder
    pub category: Option<CategoryTag>,
    /// Fields the producing plan declared, in column order
    #[serde(skip)]
    declared: Vec<Field>,
}

impl ProductRecord {
    /// Empty record declaring `fields` (duplicates ignored)
    pub fn with_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        let mut declared = Vec::new();
        for field in fields {
            if !declared.contains(&field) {
                declared.push(field);
            }
        }
        Self {
            declared,
            ..Self::default()
        }
    }

    pub fn declared_fields(&self) -> &[Field] {
        &self.declared
    }

    /// Store a coerced value. Mismatched value kinds are ignored.
    pub fn set(&mut self, field: Field, value: FieldValue) {
        if !self.declared.contains(&field) {
            self.declared.push(field);
        }
        match (field, value) {
            (Field::ProductName, FieldValue::Text(v)) => self.product_name = v,
            (Field::ProductUrl, FieldValue::Text(v)) => self.product_url = v,
            (Field::Description, FieldValue::Text(v)) => self.description = v,
            (Field::ImageUrl, FieldValue::Text(v)) => self.image_url = v,
            (Field::Colors, FieldValue::Text(v)) => self.colors = v,
            (Field::ListPrice, FieldValue::Text(v)) => self.list_price = Some(v),
            (Field::ListPrice, FieldValue::Absent) => self.list_price = None,
            (Field::SalePrice, FieldValue::Text(v)) => self.sale_price = Some(v),
            (Field::SalePrice, FieldValue::Absent) => self.sale_price = None,
            (Field::DiscountRate, FieldValue::Text(v)) => self.discount_rate = Some(v),
            (Field::DiscountRate, FieldValue::Absent) => self.discount_rate = None,
            (Field::ReviewCount, FieldValue::Count(n)) => self.review_count = n,
            (Field::LikeCount, FieldValue::Count(n)) => self.like_count = n,
            (Field::SalesCount, FieldValue::Count(n)) => self.sales_count = n,
            (Field::SoldOut, FieldValue::Flag(b)) => self.sold_out = b,
            _ => {}
        }
    }

    pub fn cell(&self, column: Column) -> Cell {
        let text = |s: &str| Cell::Text(s.to_string());
        let opt = |o: &Option<String>| o.as_deref().map_or(Cell::Empty, text);
        match column {
            Column::Field(Field::ProductName) => text(&self.product_name),
            Column::Field(Field::ProductUrl) => text(&self.product_url),
            Column::Field(Field::Description) => text(&self.description),
            Column::Field(Field::ImageUrl) => text(&self.image_url),
            Column::Field(Field::ListPrice) => opt(&self.list_price),
            Column::Field(Field::SalePrice) => opt(&self.sale_price),
            Column::Field(Field::DiscountRate) => opt(&self.discount_rate),
            Column::Field(Field::ReviewCount) => Cell::Count(self.review_count),
            Column::Field(Field::LikeCount) => Cell::Count(self.like_count),
            Column::Field(Field::SalesCount) => Cell::Count(self.sales_count),
            Column::Field(Field::Colors) => text(&self.colors),
            Column::Field(Field::SoldOut) => Cell::Flag(self.sold_out),
            Column::CategoryMain | Column::CategorySub | Column::CategoryFull => match &self.category {
                None => Cell::Empty,
                Some(t) => text(match column {
                    Column::CategoryMain => &t.main,
                    Column::CategorySub => &t.sub,
                    _ => &t.full,
                }),
            },
        }
    }

    /// Columns this record contributes, in order
    pub fn columns(&self) -> Vec<Column> {
        let mut columns: Vec<Column> = self.declared.iter().copied().map(Column::Field).collect();
        if self.category.is_some() {
            columns.extend([Column::CategoryMain, Column::CategorySub, Column::CategoryFull]);
        }
        columns
    }

    /// Dedup key value, trimmed
    pub fn key(&self, key: DedupKey) -> &str {
        match key {
            DedupKey::Name => self.product_name.trim(),
            DedupKey::Url => self.product_url.trim(),
        }
    }

    /// At least one identity field is non-empty
    pub fn has_identity(&self) -> bool {
        !self.product_url.trim().is_empty() || !self.product_name.trim().is_empty()
    }

    pub fn tag_category(&mut self, tag: CategoryTag) {
        self.category = Some(tag);
    }
}
