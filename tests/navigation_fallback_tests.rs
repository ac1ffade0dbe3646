//! Page advance fallbacks: closhoew (URL rewrite, then "NEXT", 2-page cap)
//! and chicfox (page-number click, then URL rewrite)

use std::path::Path;
use std::sync::Arc;

use shop_crawler_lib::application::CrawlStop;
use shop_crawler_lib::infrastructure::config::{CrawlPolicy, OutputSettings};
use shop_crawler_lib::infrastructure::export::Exporter;
use shop_crawler_lib::infrastructure::{FixturePageSource, HtmlSessionProvider};
use shop_crawler_lib::{CategoryDescriptor, CrawlOrchestrator, SiteProfile};

const SHOES: &str = "https://closhoew.test/category/shoes/25/";
const REWRITTEN_2: &str = "https://closhoew.test/category/shoes/25/?page=2";
const NEXT_2: &str = "https://closhoew.test/category/shoes/25/p2.html";

fn item(no: u32, name: &str, price: &str, sold_out: bool) -> String {
    let promotion = if sold_out {
        r#"<div class="icon"><div class="promotion"><img src="/icon/new.gif" alt="NEW"><img src="/icon/soldout.gif" alt="품절"></div></div>"#
    } else {
        ""
    };
    format!(
        r#"<li class="item">
            <div class="prdImg"><a href="/product/view/{no}/"><img src="//cdn.closhoew.test/web/product/tiny/{no}.jpg"></a></div>
            <div class="name"><a href="/product/view/{no}/"><span class="title">상품명</span> <span>{name}</span></a></div>
            <ul class="spec"><li>SIZE 230-250</li><li>{price}원</li></ul>
            <div class="colorchip"><span style="background-color:#222222"></span></div>
            {promotion}
            <span class="likePrdCount">7</span>
        </li>"#
    )
}

fn listing(items: &[String], next_href: &str) -> String {
    format!(
        r#"<html><body>
        <p class="prdCount">Total 120 PRODUCT</p>
        <ul class="prdList">{}</ul>
        <div class="ec-base-paginate">
            <a href="/category/shoes/25/">PREV</a>
            <ol><li><a href="?page=1">1</a></li><li><a href="?page=2">2</a></li><li><a href="?page=3">3</a></li></ol>
            <a href="{next_href}">NEXT</a>
        </div>
        </body></html>"#,
        items.concat()
    )
}

fn orchestrator(source: Arc<FixturePageSource>, dir: &Path) -> CrawlOrchestrator<HtmlSessionProvider<FixturePageSource>> {
    let site = SiteProfile::closhoew();
    let policy = CrawlPolicy::for_site(&site).without_delays();
    let settings = OutputSettings {
        dir: dir.to_path_buf(),
        spreadsheet: false,
        ..OutputSettings::default()
    };
    let exporter = Exporter::from_settings(&settings, &site);
    CrawlOrchestrator::new(HtmlSessionProvider::new(source), site, policy, exporter)
}

fn shoes() -> Vec<CategoryDescriptor> {
    vec![CategoryDescriptor::new(["SHOES", "LOAFER"], SHOES).unwrap()]
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let bytes = std::fs::read(path).unwrap();
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(&bytes[3..]);
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn next_control_is_used_when_url_rewrite_fails() {
    let source = Arc::new(
        FixturePageSource::new()
            .with_page(SHOES, listing(&[item(1, "페니 로퍼", "39,000", false)], "p2.html"))
            .with_page(NEXT_2, listing(&[item(2, "태슬 로퍼", "45,000", true)], "p3.html")),
    );
    let dir = tempfile::tempdir().unwrap();

    let report = orchestrator(source.clone(), dir.path()).run(&shoes()).await.unwrap();

    let stats = &report.categories[0];
    assert_eq!(stats.total_items, 120);
    assert_eq!(stats.pages_total, 2, "three pagination links, capped at two");
    assert_eq!(stats.pages_crawled, 2);
    assert_eq!(stats.stop, None);

    let log = source.fetch_log();
    assert!(log.contains(&REWRITTEN_2.to_string()));
    assert!(log.contains(&NEXT_2.to_string()));
    assert!(!log.iter().any(|url| url.ends_with("p3.html")));

    let rows = read_rows(&dir.path().join("closhoew_products_data.csv"));
    assert_eq!(
        rows[0],
        vec![
            "상품명",
            "상품URL",
            "이미지URL",
            "가격",
            "색상",
            "품절여부",
            "좋아요수",
            "카테고리_대분류",
            "카테고리_소분류",
            "카테고리_전체",
        ]
    );
    assert_eq!(
        rows[1],
        vec![
            "페니 로퍼",
            "https://closhoew.test/product/view/1/",
            "https://cdn.closhoew.test/web/product/medium/1.jpg",
            "39000",
            "#222222",
            "false",
            "7",
            "SHOES",
            "LOAFER",
            "SHOES > LOAFER",
        ]
    );
    assert_eq!(rows[2][0], "태슬 로퍼");
    assert_eq!(rows[2][5], "true");
}

#[tokio::test]
async fn url_rewrite_wins_when_the_page_exists() {
    let source = Arc::new(
        FixturePageSource::new()
            .with_page(SHOES, listing(&[item(1, "페니 로퍼", "39,000", false)], "p2.html"))
            .with_page(REWRITTEN_2, listing(&[item(2, "태슬 로퍼", "45,000", false)], "p3.html")),
    );
    let dir = tempfile::tempdir().unwrap();

    let report = orchestrator(source.clone(), dir.path()).run(&shoes()).await.unwrap();

    assert_eq!(report.records_merged, 2);
    assert!(!source.fetch_log().contains(&NEXT_2.to_string()));
}

#[tokio::test]
async fn exhausted_navigation_keeps_first_page() {
    let source = Arc::new(
        FixturePageSource::new().with_page(SHOES, listing(&[item(1, "페니 로퍼", "39,000", false)], "p2.html")),
    );
    let dir = tempfile::tempdir().unwrap();

    let report = orchestrator(source, dir.path()).run(&shoes()).await.unwrap();

    let stats = &report.categories[0];
    assert_eq!(stats.stop, Some(CrawlStop::NavigationExhausted { page: 2 }));
    assert_eq!(stats.records_kept, 1);
    assert_eq!(report.records_merged, 1);
    assert!(dir.path().join("closhoew_products_data.csv").exists());
}

const CHICFOX_OUTER: &str = "https://chicfox.test/product/list.html?cate_no=7";
const CHICFOX_PAGE_2: &str = "https://chicfox.test/product/list.html?cate_no=7&page=2";

fn chicfox_listing() -> String {
    r#"<html><body>
    <div class="item-total">TOTAL <strong>40</strong></div>
    <div class="item-cont">
        <dl class="item-list">
            <dt class="item_img"><img src="/web/product/tiny/31.jpg"></dt>
            <dd class="item_name"><a href="/product/detail.html?product_no=31">하운드 자켓</a></dd>
            <dd class="item_price"><span class="price">59,000원</span></dd>
            <dd class="item_stock">판매수량 : 12</dd>
        </dl>
    </div>
    <div class="paging"><a href="?cate_no=7&page=1">1</a><a href="?cate_no=7&page=2">2</a></div>
    </body></html>"#
        .to_string()
}

#[tokio::test]
async fn chicfox_stops_when_click_and_rewrite_both_fail() {
    let source = Arc::new(FixturePageSource::new().with_page(CHICFOX_OUTER, chicfox_listing()));
    let dir = tempfile::tempdir().unwrap();
    let site = SiteProfile::chicfox();
    let policy = CrawlPolicy::for_site(&site).without_delays();
    let exporter = Exporter::new(dir.path(), site.name.clone()).with_spreadsheet(false);
    let orchestrator = CrawlOrchestrator::new(HtmlSessionProvider::new(source.clone()), site, policy, exporter);

    let categories = vec![CategoryDescriptor::new(["OUTER"], CHICFOX_OUTER).unwrap()];
    let report = orchestrator.run(&categories).await.unwrap();

    let stats = &report.categories[0];
    assert_eq!(stats.pages_total, 2);
    assert_eq!(stats.pages_crawled, 1);
    assert_eq!(stats.stop, Some(CrawlStop::NavigationExhausted { page: 2 }));
    assert_eq!(stats.records_kept, 1);

    let attempts = source.fetch_log().iter().filter(|url| url.as_str() == CHICFOX_PAGE_2).count();
    assert_eq!(attempts, 2, "page-number click, then URL rewrite");

    let rows = read_rows(&dir.path().join("chicfox_products_data.csv"));
    assert_eq!(rows[1][0], "하운드 자켓");
}
