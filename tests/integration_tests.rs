use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use pagewright::browser::Phase;
use pagewright::driver::fake::{Call, FakeElement, FakeLauncher, FakePage};
use pagewright::driver::{ClickParams, GotoOptions, Viewport};
use pagewright::interaction::{ClickOptions, ScreenshotOptions, TypeOptions};
use pagewright::selectors::descriptor::parse_pages;
use pagewright::selectors::{classify, classify_value, resolve};
use pagewright::{Error, LocatorKind, PageDescriptor, Target, TargetSession};
use serde_json::json;
use tokio_test::assert_ok;

const RESULTS: &str = r#"(//div[@class="item"]//*[@class="title"]/a)[{}]"#;

fn movie_pages() -> serde_json::Value {
    json!({
        "HomePage": {
            "search_input": "#kw",
            "search_button": r#"//*[@id="su"]"#,
            "spinner": "#spinner",
        },
        "SearchResultPage": {
            "results": RESULTS,
            "titles": "div.item .title",
        },
    })
}

fn movie_target(launcher: Arc<FakeLauncher>) -> Target {
    Target::builder("movie", "https://movie.example.com/")
        .pages(parse_pages(&movie_pages()).unwrap())
        .build(launcher)
        .unwrap()
}

/// A launcher whose first tab already holds `page`.
fn launcher_with(page: &FakePage) -> Arc<FakeLauncher> {
    let launcher = Arc::new(FakeLauncher::new());
    launcher.queue_page(page.clone());
    launcher
}

fn keyboard_calls(page: &FakePage) -> Vec<Call> {
    page.calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                Call::KeyPress(_) | Call::KeyDown(_) | Call::KeyUp(_) | Call::Type(..)
            )
        })
        .collect()
}

// ── Locators ────────────────────────────────────────────────────────────

#[test]
fn test_classification_determinism() {
    assert_eq!(classify("#bar").unwrap(), (LocatorKind::Css, "#bar".to_string()));
    assert_eq!(classify("//foo").unwrap(), (LocatorKind::Xpath, "//foo".to_string()));
    // Valid in both grammars: CSS wins.
    assert_eq!(classify("div").unwrap().0, LocatorKind::Css);
    assert!(matches!(
        classify("##foo"),
        Err(Error::InvalidLocatorFormat { locator }) if locator == "##foo"
    ));
}

#[test]
fn test_non_string_locator_rejected() {
    for value in [json!(123), json!(null), json!(["#a"]), json!(true)] {
        assert!(matches!(
            classify_value(&value),
            Err(Error::InvalidLocatorType { .. })
        ));
    }
}

#[test]
fn test_placeholder_safe_classification() {
    let (kind, content) = classify("(//div[@class='item'])[{}]").unwrap();
    assert_eq!(kind, LocatorKind::Xpath);
    assert_eq!(content, "(//div[@class='item'])[{}]");
}

#[test]
fn test_resolution_round_trip() {
    let descriptor = PageDescriptor::from_value("ResultPage", &json!({"results": "(//div)[{}]"})).unwrap();
    let locator = resolve(&descriptor, "results", (1,)).unwrap();
    assert_eq!(locator.kind(), LocatorKind::Xpath);
    assert_eq!(locator.content(), "(//div)[1]");

    // A bare scalar is a single parameter.
    assert_eq!(resolve(&descriptor, "RESULTS", 2u32).unwrap().content(), "(//div)[2]");
    assert!(matches!(
        resolve(&descriptor, "results", ()),
        Err(Error::Format { .. })
    ));
}

#[test]
fn test_unknown_element_names_page() {
    let descriptor = PageDescriptor::from_value("ResultPage", &json!({"results": "(//div)[{}]"})).unwrap();
    let err = resolve(&descriptor, "missing_name", ()).unwrap_err();
    assert!(matches!(
        &err,
        Error::ElementNotDefined { element, page } if element == "missing_name" && page == "ResultPage"
    ));
    let message = err.to_string();
    assert!(message.contains("missing_name") && message.contains("ResultPage"));
}

// ── Target lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_sizes_tab_and_loads_base_url() {
    let page = FakePage::new();
    page.set_window(1440, 900, 2.0);
    let launcher = launcher_with(&page);
    let target = movie_target(launcher.clone());
    assert_eq!(target.phase().await, Phase::Unopened);

    target.open(true).await.unwrap();

    assert_eq!(target.phase().await, Phase::PageReady);
    assert_eq!(target.current_page().await, "HomePage");
    assert_eq!(page.url(), "https://movie.example.com/");
    assert_eq!(page.default_navigation_timeout(), 90_000);
    let calls = page.calls();
    assert!(calls.contains(&Call::SetViewport(Viewport {
        width: 1440,
        height: 900,
        device_scale_factor: Some(2.0),
        ..Default::default()
    })));
    assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test]
async fn test_operations_before_open() {
    let target = movie_target(Arc::new(FakeLauncher::new()));
    assert!(matches!(target.new_page().await, Err(Error::BrowserNotOpen)));
    assert!(matches!(
        target.get_value("search_input", (), 100).await,
        Err(Error::PageNotReady)
    ));
}

#[test]
fn test_home_page_required() {
    let pages = parse_pages(&json!({"SearchResultPage": {"titles": "h3"}})).unwrap();
    let err = Target::builder("movie", "https://movie.example.com/")
        .pages(pages)
        .build(Arc::new(FakeLauncher::new()))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::HomePageMissing { target, home_page } if target == "movie" && home_page == "HomePage"
    ));
}

#[tokio::test]
async fn test_switch_page() {
    let target = movie_target(Arc::new(FakeLauncher::new()));
    target.switch_page("searchresultpage").await.unwrap();
    assert_eq!(target.current_page().await, "SearchResultPage");
    assert_eq!(
        target.locator("results", 3u32).await.unwrap().content(),
        r#"(//div[@class="item"]//*[@class="title"]/a)[3]"#
    );
    assert!(matches!(
        target.switch_page("LoginPage").await,
        Err(Error::PageNotDefined { page, target }) if page == "LoginPage" && target == "movie"
    ));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let launcher = Arc::new(FakeLauncher::new());
    let target = movie_target(launcher.clone());

    // Never opened.
    assert_ok!(target.close().await);
    assert_eq!(target.phase().await, Phase::Closed);

    target.open(false).await.unwrap();
    assert_ok!(target.close().await);
    assert_eq!(target.phase().await, Phase::Closed);
    assert_ok!(target.close().await);
    assert_eq!(target.phase().await, Phase::Closed);

    let browsers = launcher.browsers();
    let browser = &browsers[0];
    assert_eq!(browser.close_calls(), 1);
    assert!(browser.pages()[0].is_closed());
}

#[tokio::test]
async fn test_reopen_after_close() {
    let launcher = Arc::new(FakeLauncher::new());
    let target = movie_target(launcher.clone());
    target.open(false).await.unwrap();
    target.close().await.unwrap();
    target.open(false).await.unwrap();
    assert_eq!(target.phase().await, Phase::PageReady);
    assert_eq!(launcher.browsers().len(), 2);
}

#[tokio::test]
async fn test_goto_errors_propagate_unchanged() {
    let page = FakePage::new();
    page.fail_navigation("https://movie.example.com/broken", "net::ERR_CERT_AUTHORITY_INVALID");
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();

    let err = target
        .goto("/broken", &GotoOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Driver(_)));
    assert_eq!(err.to_string(), "net::ERR_CERT_AUTHORITY_INVALID");
}

#[tokio::test(start_paused = true)]
async fn test_goto_timeout_is_not_an_element_timeout() {
    let page = FakePage::new();
    page.hang_navigation("https://movie.example.com/slow");
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();

    let options = GotoOptions {
        timeout: Some(5_000),
        ..Default::default()
    };
    let err = target.goto("slow", &options).await.unwrap_err();
    assert!(matches!(err, Error::Driver(pagewright::driver::DriverError::Timeout { timeout: 5_000 })));
}

// ── Element interaction ─────────────────────────────────────────────────

#[tokio::test]
async fn test_wait_timeout_is_bounded() {
    let target = movie_target(Arc::new(FakeLauncher::new()));
    target.open(false).await.unwrap();

    let start = std::time::Instant::now();
    let err = target
        .wait_for_element("search_input", (), false, 100)
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    match err {
        Error::ElementTimeout {
            locator,
            timeout,
            action,
        } => {
            assert_eq!(locator, "#kw");
            assert_eq!(timeout, 100);
            assert_eq!(action, "appear");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_hidden_wait_reports_disappear() {
    let page = FakePage::new();
    page.add("#spinner", FakeElement::text("loading"));
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();

    let err = target
        .wait_for_element("spinner", (), true, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ElementTimeout { action, .. } if action == "disappear"));

    page.set_visible("#spinner", false);
    target.wait_for_element("spinner", (), true, 100).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_type_with_clear_runs_erase_sequence() {
    let page = FakePage::new();
    page.add("#kw", FakeElement::input("abc"));
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();
    page.clear_log();

    let options = TypeOptions {
        delay: 20,
        clear: true,
        ..Default::default()
    };
    target
        .type_text("search_input", (), "rust", &options)
        .await
        .unwrap();

    let press = |k: &str| Call::KeyPress(k.into());
    assert_eq!(
        keyboard_calls(&page),
        vec![
            press("ArrowRight"),
            press("ArrowRight"),
            press("ArrowRight"),
            Call::KeyDown("Shift".into()),
            press("ArrowLeft"),
            press("ArrowLeft"),
            press("ArrowLeft"),
            Call::KeyUp("Shift".into()),
            press("Backspace"),
            Call::Type("#kw".into(), "rust".into(), 20),
        ]
    );

    // Right arrows go out back to back, left arrows are spaced by the delay.
    let recorded = page.recorded();
    let times = |call: Call| -> Vec<Duration> {
        recorded.iter().filter(|r| r.call == call).map(|r| r.at).collect()
    };
    let rights = times(press("ArrowRight"));
    assert!(rights.windows(2).all(|w| w[1] == w[0]));
    let lefts = times(press("ArrowLeft"));
    assert!(lefts.windows(2).all(|w| w[1] - w[0] == Duration::from_millis(20)));

    // The element was waited for before anything else happened.
    assert!(matches!(page.calls()[0], Call::WaitForSelector(ref s, _) if s == "#kw"));
    assert_eq!(page.value_of("#kw").as_deref(), Some("rust"));
    assert_eq!(page.calls().last(), Some(&Call::Dispose("#kw".into())));
}

#[tokio::test]
async fn test_get_values_keeps_document_order() {
    let page = FakePage::new();
    for title in ["First", "Second", "Third"] {
        page.add("div.item .title", FakeElement::text(format!(" {title} ")));
    }
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();
    target.switch_page("SearchResultPage").await.unwrap();

    let values = target.get_values("titles", (), 1_000).await.unwrap();
    assert_eq!(values, ["First", "Second", "Third"]);
    let disposed = page
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Dispose(_)))
        .count();
    assert_eq!(disposed, 3);
}

#[tokio::test]
async fn test_click_parametrized_xpath() {
    let page = FakePage::new();
    let second = r#"(//div[@class="item"]//*[@class="title"]/a)[2]"#;
    page.add(second, FakeElement::text("Second"));
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();
    target.switch_page("SearchResultPage").await.unwrap();

    assert!(target
        .click("results", 2u32, &ClickOptions::default())
        .await
        .unwrap());
    let calls = page.calls();
    assert!(calls.iter().any(|c| matches!(c, Call::WaitForXPath(s, _) if s == second)));
    assert!(calls.contains(&Call::Click(second.into(), ClickParams::default())));
}

#[tokio::test(start_paused = true)]
async fn test_click_guard_exhaustion() {
    let page = FakePage::new();
    page.add(r#"//*[@id="su"]"#, FakeElement::text("Search").unclickable_for(u32::MAX));
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();

    let lenient = target
        .click("search_button", (), &ClickOptions::default())
        .await
        .unwrap();
    assert!(!lenient);

    let strict = ClickOptions {
        strict: true,
        ..Default::default()
    };
    assert!(matches!(
        target.click("search_button", (), &strict).await,
        Err(Error::ElementNotClickable { attempts: 10, .. })
    ));
    assert!(!page.calls().iter().any(|c| matches!(c, Call::Click(..))));
}

#[tokio::test]
async fn test_missing_element_after_wait() {
    let page = FakePage::new();
    let target = movie_target(launcher_with(&page));
    target.open(false).await.unwrap();
    assert!(target.query("search_input", ()).await.unwrap().is_none());
}

// ── Sessions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_targets() {
    let launcher = Arc::new(FakeLauncher::new());
    let movie = movie_target(launcher.clone());
    let book = Target::builder("book", "https://book.example.com/")
        .pages(parse_pages(&json!({"HomePage": {"title": "h1"}})).unwrap())
        .build(launcher.clone())
        .unwrap();

    try_join_all([movie.open(true), book.open(true)]).await.unwrap();
    assert_eq!(launcher.browsers().len(), 2);
    let mut urls: Vec<String> = launcher
        .browsers()
        .iter()
        .map(|b| b.pages()[0].url())
        .collect();
    urls.sort();
    assert_eq!(urls, ["https://book.example.com/", "https://movie.example.com/"]);
}

#[tokio::test]
async fn test_session_teardown_captures_failures() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(FakeLauncher::new());
    let mut session = TargetSession::new();
    session.insert(movie_target(launcher.clone())).unwrap();
    assert!(matches!(
        session.insert(movie_target(launcher.clone())),
        Err(Error::Config(_))
    ));

    session.setup(true).await.unwrap();
    session.teardown(true, Some(dir.path())).await.unwrap();

    assert!(dir.path().join("movie.png").is_file());
    assert_eq!(session.get("movie").unwrap().phase().await, Phase::Closed);
}

#[tokio::test]
async fn test_screenshot_base64() {
    let target = movie_target(Arc::new(FakeLauncher::new()));
    target.open(false).await.unwrap();
    let shot = target
        .screenshot(&ScreenshotOptions {
            encoding: pagewright::interaction::Encoding::Base64,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(matches!(shot, pagewright::interaction::Screenshot::Base64(s) if s.starts_with("iVBORw0KGg")));
}

// ── Real browser ────────────────────────────────────────────────────────

fn fixture_url(name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = PathBuf::from(manifest_dir).join("fixtures").join(name);
    format!("file://{}", path.display())
}

#[tokio::test]
#[ignore = "needs Chrome"]
async fn test_chromium_search_fixture() {
    use pagewright::driver::chromium::ChromiumLauncher;

    let options = pagewright::Options::from_value(json!({"args": ["--no-sandbox"]})).unwrap();
    let target = Target::builder("fixture", fixture_url("search.html"))
        .pages(
            parse_pages(&json!({
                "HomePage": {
                    "heading": "h1",
                    "search_input": "#kw",
                    "search_button": r#"//*[@id="su"]"#,
                    "status": "#status",
                    "titles": "(//span[@class='title'])",
                }
            }))
            .unwrap(),
        )
        .options(options)
        .build(Arc::new(ChromiumLauncher::new()))
        .unwrap();

    target.open(true).await.unwrap();
    assert_eq!(target.get_value("heading", (), 5_000).await.unwrap(), "Movie search");
    target
        .type_text(
            "search_input",
            (),
            "rust",
            &TypeOptions {
                clear: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(target.get_value("search_input", (), 5_000).await.unwrap(), "rust");
    target
        .click("search_button", (), &ClickOptions::default())
        .await
        .unwrap();
    assert_eq!(target.get_value("status", (), 5_000).await.unwrap(), "searched rust");
    assert_eq!(
        target.get_values("titles", (), 5_000).await.unwrap(),
        ["First", "Second", "Third"]
    );
    target.close().await.unwrap();
}
