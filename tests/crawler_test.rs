// tests/crawler_test.rs

mod common;

use canvas_transcriber::{
    browser::scripts,
    config::AppConfig,
    crawler::{CourseCrawler, PageVisit},
    error::AppError,
    models::{LinkType, VideoProvider},
};
use common::{FakeBrowser, FakePageSpec};
use serde_json::json;
use std::sync::Arc;

const MODULES: &str = "https://canvas.school.edu/courses/42/modules";
const ITEM_1: &str = "https://canvas.school.edu/courses/42/modules/items/1";
const ITEM_2: &str = "https://canvas.school.edu/courses/42/modules/items/2";
const ITEM_3: &str = "https://canvas.school.edu/courses/42/modules/items/3";
const KALTURA: &str = "https://kaf.school.edu/browseandembed/index/media/entryid/1_abc";

fn course() -> FakeBrowser {
    FakeBrowser::new()
        .with_page(
            MODULES,
            FakePageSpec::titled("Modules: BIO 101").script(
                scripts::MODULE_ITEMS,
                json!({ "items": [
                    { "moduleName": "Week 1: Cells", "text": "Lecture video", "href": ITEM_1 },
                    { "moduleName": "Week 2", "text": "Reading", "href": ITEM_2 },
                    { "moduleName": "Week 2", "text": "Recap", "href": ITEM_3 },
                    { "moduleName": "Week 1: Cells", "text": "Lecture video", "href": ITEM_1 },
                ]}),
            ),
        )
        .with_page(
            ITEM_1,
            FakePageSpec::titled("Lecture video").script(
                scripts::PAGE_LINKS,
                json!({
                    "heading": "Lecture video",
                    "links": [
                        { "type": "anchor", "text": "Syllabus", "href": "https://canvas.school.edu/courses/42/pages/syllabus" },
                        { "type": "iframe", "text": "Cell Division", "href": KALTURA },
                    ]
                }),
            ),
        )
        .with_page(ITEM_2, FakePageSpec::titled("Reading").failing(usize::MAX))
        .with_page(
            ITEM_3,
            FakePageSpec::titled("Recap").script(
                scripts::PAGE_LINKS,
                json!({
                    "links": [
                        { "type": "iframe", "text": "Cell Division (again)", "href": KALTURA },
                        { "type": "anchor", "text": "Bonus", "href": "https://youtu.be/xyz" },
                    ]
                }),
            ),
        )
}

fn crawler(browser: &FakeBrowser) -> CourseCrawler {
    CourseCrawler::new(Arc::new(browser.clone()), Arc::new(AppConfig::default()))
}

#[tokio::test]
async fn test_modules_crawl_visits_each_item_once_and_skips_broken_pages() {
    let browser = course();
    let report = crawler(&browser).crawl(MODULES).await.expect("crawl");

    assert_eq!(report.page_url, MODULES);
    assert_eq!(report.page_title, "Modules: BIO 101");
    assert_eq!(report.total_links, 2);
    assert_eq!(report.video_links_count, 2);

    let kaltura = &report.links[0];
    assert_eq!(kaltura.href, KALTURA);
    assert_eq!(kaltura.video_provider, VideoProvider::Kaltura);
    assert_eq!(kaltura.link_type, LinkType::Iframe);
    assert_eq!(kaltura.containing_module, "Week 1: Cells");
    assert_eq!(kaltura.canvas_item_text.as_deref(), Some("Lecture video"));

    let youtube = &report.links[1];
    assert_eq!(youtube.video_provider, VideoProvider::Youtube);
    assert_eq!(youtube.containing_module, "Week 2");

    assert_eq!(report.skipped_pages.len(), 1);
    assert_eq!(report.skipped_pages[0].url, ITEM_2);
    assert_eq!(report.skipped_pages[0].label, "Reading");

    assert_eq!(browser.open_count(ITEM_1), 1);
    // one load plus the configured retry
    assert_eq!(browser.open_count(ITEM_2), 2);
}

#[tokio::test]
async fn test_cursor_is_lazy_and_restartable() {
    let browser = course();
    let crawler = crawler(&browser);

    let mut cursor = crawler.cursor(MODULES);
    assert!(browser.opened().is_empty());

    match cursor.next().await {
        Some(Ok(PageVisit::Visited { url, links, .. })) => {
            assert_eq!(url, MODULES);
            assert!(links.is_empty());
        }
        other => panic!("unexpected first step: {:?}", other),
    }
    assert_eq!(cursor.remaining(), 3);
    assert_eq!(browser.opened(), vec![MODULES.to_string()]);
    drop(cursor);

    let first = crawler.crawl(MODULES).await.unwrap();
    let second = crawler.crawl(MODULES).await.unwrap();
    assert_eq!(first.links, second.links);
    assert_eq!(first.skipped_pages, second.skipped_pages);
}

#[tokio::test]
async fn test_single_page_keeps_all_links_with_breadcrumb_module() {
    let page = "https://canvas.school.edu/courses/42/pages/week-3";
    let browser = FakeBrowser::new().with_page(
        page,
        FakePageSpec::titled("Week 3").script(
            scripts::PAGE_LINKS,
            json!({
                "heading": "Week 3 overview",
                "breadcrumb": "Week 3: Genetics",
                "links": [
                    { "type": "anchor", "text": "Notes", "href": "https://canvas.school.edu/files/9" },
                    { "type": "anchor", "text": "", "href": "#main" },
                    { "type": "iframe", "text": "Panopto", "href": "https://school.hosted.panopto.com/Panopto/Embed.aspx?id=1" },
                ]
            }),
        ),
    );

    let report = crawler(&browser).crawl(page).await.unwrap();

    assert_eq!(report.total_links, 2);
    assert_eq!(report.video_links_count, 1);
    assert!(report.links.iter().all(|l| l.containing_module == "Week 3: Genetics"));
    assert_eq!(report.count_provider(VideoProvider::Panopto), 1);
}

#[tokio::test]
async fn test_login_redirect_is_fatal() {
    let browser = FakeBrowser::new().with_page(
        MODULES,
        FakePageSpec::titled("Log In").redirect_to("https://canvas.school.edu/login/saml"),
    );

    let err = crawler(&browser).crawl(MODULES).await.unwrap_err();
    assert!(matches!(err, AppError::AuthInvalid));
}

#[tokio::test]
async fn test_unreachable_entry_page_is_an_error() {
    let browser = FakeBrowser::new();
    let err = crawler(&browser).crawl(MODULES).await.unwrap_err();
    assert!(matches!(err, AppError::PageLoad { .. }));
}
