//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small directory site and run the
//! full top → region → sub-region → detail cycle end-to-end.

use md_directory::config::{
    Config, CrawlerConfig, OutputConfig, ProxyInput, RunConfig, SessionConfig,
};
use md_directory::crawler::{Crawler, Label, Task};
use md_directory::normalize_url;
use md_directory::state::RequestState;
use md_directory::storage::{RunStatus, SqliteStorage, Storage};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `region` from the mock server
fn create_test_config(base_url: &str, region: &str, db_path: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            seed_url: format!("{}/directory/md", base_url),
            desired_concurrency: 2,
            request_timeout_secs: 5,
            max_pages_per_listing: 500,
            max_request_retries: 0,
        },
        sessions: SessionConfig {
            max_pool_size: 4,
            max_usage_count: 50,
            max_error_score: 3,
        },
        input: RunConfig {
            target_region: region.to_string(),
        },
        proxy: ProxyInput::default(),
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            export_path: "./records.jsonl".to_string(),
        },
    }
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "text/html"),
        )
        .expect(expected_hits)
        .mount(server)
        .await;
}

const TOP_PAGE: &str = r#"<html><body>
    <ul>
      <li><a href="/directory/md/state/ohio">Ohio</a></li>
      <li><a href="/directory/md/state/texas">Texas</a></li>
    </ul>
    </body></html>"#;

const TEXAS_PAGE_1: &str = r#"<html><body>
    <ul><li><a href="/directory/md/location/austin-tx">Austin</a></li></ul>
    <a class="next_page" href="/directory/md/state/texas/page-2">Next</a>
    </body></html>"#;

const TEXAS_PAGE_2: &str = r#"<html><body>
    <ul><li><a href="/directory/md/location/dallas-tx">Dallas</a></li></ul>
    </body></html>"#;

const AUSTIN_PAGE: &str = r#"<html><body>
    <a href="/pub/jane-doe-md">Jane Doe, MD</a>
    <a href="/pub/john-roe-md">John Roe, MD</a>
    <a href="/pub/jane-doe-md#reviews">Reviews</a>
    </body></html>"#;

const DALLAS_PAGE: &str = r#"<html><body>
    <a href="/pub/jane-doe-md">Jane Doe, MD</a>
    <a href="/pub/sam-lee-md">Sam Lee, MD</a>
    </body></html>"#;

const JANE_PAGE: &str = r#"<html><body>
    <h1 id="user_full_name">
      <span class="user-name-first">Jane</span>
      <span class="user-name-last">Doe</span>
      <span class="user-name-credentials">MD</span>
    </h1>
    <p class="profile-head-subtitle">Cardiology</p>
    <ul class="award-info"><li><span>Top Doctor</span><span>2022</span></li></ul>
    </body></html>"#;

const SAM_PAGE: &str = r#"<html><body>
    <h1 id="user_full_name"><span class="user-name-first">Sam</span></h1>
    </body></html>"#;

#[tokio::test]
async fn test_full_crawl_of_one_region() {
    let server = MockServer::start().await;

    mount_page(&server, "/directory/md", TOP_PAGE, 1).await;
    mount_page(&server, "/directory/md/state/ohio", "", 0).await;
    mount_page(&server, "/directory/md/state/texas", TEXAS_PAGE_1, 1).await;
    mount_page(&server, "/directory/md/state/texas/page-2", TEXAS_PAGE_2, 1).await;
    mount_page(&server, "/directory/md/location/austin-tx", AUSTIN_PAGE, 1).await;
    mount_page(&server, "/directory/md/location/dallas-tx", DALLAS_PAGE, 1).await;
    mount_page(&server, "/pub/jane-doe-md", JANE_PAGE, 1).await;
    mount_page(&server, "/pub/sam-lee-md", SAM_PAGE, 1).await;

    // One failing practitioner page must not stop the crawl
    Mock::given(method("GET"))
        .and(path("/pub/john-roe-md"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream error"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("md.db");
    let config = create_test_config(&server.uri(), "Texas", &db_path);

    let crawler = Crawler::new(&config, "test-hash", true).unwrap();
    let report = crawler.run_until(std::future::pending()).await.unwrap();

    assert!(!report.interrupted);
    assert_eq!(report.records, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.gaps, 0);
    // top + two region pages + two cities + two practitioners
    assert_eq!(report.handled, 7);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.target_region, "Texas");
    assert_eq!(run.config_hash, "test-hash");

    let mut records = storage.load_records(Some(report.run_id)).unwrap();
    records.sort_by(|a, b| a.url.cmp(&b.url));
    assert_eq!(records.len(), 2);

    let jane = &records[0].data;
    assert!(records[0].url.ends_with("/pub/jane-doe-md"));
    assert_eq!(jane.first_name.as_deref(), Some("Jane"));
    assert_eq!(jane.credentials.as_deref(), Some("MD"));
    assert_eq!(jane.speciality.as_deref(), Some("Cardiology"));
    assert_eq!(jane.awards, vec!["Top Doctor, 2022"]);

    let sam = &records[1].data;
    assert_eq!(sam.first_name.as_deref(), Some("Sam"));
    assert!(sam.last_name.is_none());
    assert!(sam.education_and_trainings.is_empty());

    let failed = storage.load_requests(RequestState::Failed).unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].url.ends_with("/pub/john-roe-md"));
    assert_eq!(failed[0].label, Some(Label::Detail));
    assert!(failed[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("500"));

    assert_eq!(
        storage
            .count_requests_by_state(RequestState::Pending)
            .unwrap(),
        0
    );

    let page_2 = storage
        .load_requests(RequestState::Handled)
        .unwrap()
        .into_iter()
        .find(|r| r.url.ends_with("/page-2"))
        .unwrap();
    assert_eq!(page_2.label, Some(Label::Region));
    assert_eq!(page_2.page_index, 1);
}

#[tokio::test]
async fn test_pagination_cap_stops_listing_chain() {
    let server = MockServer::start().await;

    mount_page(&server, "/directory/md", TOP_PAGE, 1).await;
    mount_page(&server, "/directory/md/state/texas", TEXAS_PAGE_1, 1).await;
    mount_page(&server, "/directory/md/state/texas/page-2", TEXAS_PAGE_2, 0).await;
    mount_page(&server, "/directory/md/location/austin-tx", "<html></html>", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("md.db");
    let mut config = create_test_config(&server.uri(), "Texas", &db_path);
    config.crawler.max_pages_per_listing = 1;

    let crawler = Crawler::new(&config, "test-hash", true).unwrap();
    let report = crawler.run_until(std::future::pending()).await.unwrap();

    assert_eq!(report.handled, 3);
    assert_eq!(report.records, 0);
}

#[tokio::test]
async fn test_interrupted_run_is_resumed() {
    let server = MockServer::start().await;

    // Already handled by the interrupted run
    mount_page(&server, "/directory/md", TOP_PAGE, 0).await;
    mount_page(&server, "/pub/jane-doe-md", JANE_PAGE, 0).await;
    // Still pending
    mount_page(&server, "/pub/sam-lee-md", SAM_PAGE, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("md.db");
    let config = create_test_config(&server.uri(), "Texas", &db_path);

    let run_id = {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let run_id = storage.create_run("test-hash", "Texas").unwrap();

        let seed = Task::seed(normalize_url(&config.crawler.seed_url).unwrap());
        let jane = Task::new(
            normalize_url(&format!("{}/pub/jane-doe-md", server.uri())).unwrap(),
            Label::Detail,
        );
        let sam = Task::new(
            normalize_url(&format!("{}/pub/sam-lee-md", server.uri())).unwrap(),
            Label::Detail,
        );
        for task in [&seed, &jane, &sam] {
            storage.add_request(task).unwrap();
        }
        storage
            .mark_request(seed.key(), RequestState::Handled, None)
            .unwrap();
        storage
            .mark_request(jane.key(), RequestState::Handled, None)
            .unwrap();
        storage
            .update_run_status(run_id, RunStatus::Interrupted)
            .unwrap();
        run_id
    };

    let crawler = Crawler::new(&config, "test-hash", false).unwrap();
    assert_eq!(crawler.run_id(), run_id);

    let report = crawler.run_until(std::future::pending()).await.unwrap();
    assert_eq!(report.handled, 1);
    assert_eq!(report.records, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage.get_run(run_id).unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_interrupted_run_for_other_region_is_not_resumed() {
    let server = MockServer::start().await;

    mount_page(&server, "/directory/md", TOP_PAGE, 1).await;
    mount_page(&server, "/directory/md/state/ohio", "<html></html>", 1).await;
    mount_page(&server, "/directory/md/state/texas/page-2", TEXAS_PAGE_2, 0).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("md.db");
    let config = create_test_config(&server.uri(), "Ohio", &db_path);

    let texas_run = {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let run_id = storage.create_run("test-hash", "Texas").unwrap();

        let seed = Task::seed(normalize_url(&config.crawler.seed_url).unwrap());
        let texas = Task::new(
            normalize_url(&format!("{}/directory/md/state/texas/page-2", server.uri())).unwrap(),
            Label::Region,
        );
        storage.add_request(&seed).unwrap();
        storage.add_request(&texas).unwrap();
        storage
            .mark_request(seed.key(), RequestState::Handled, None)
            .unwrap();
        storage
            .update_run_status(run_id, RunStatus::Interrupted)
            .unwrap();
        run_id
    };

    let crawler = Crawler::new(&config, "test-hash", false).unwrap();
    assert_ne!(crawler.run_id(), texas_run);

    let report = crawler.run_until(std::future::pending()).await.unwrap();
    assert_eq!(report.handled, 2);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.target_region, "Ohio");
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_fresh_flag_starts_new_run() {
    let server = MockServer::start().await;
    mount_page(&server, "/directory/md", TOP_PAGE, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("md.db");
    let config = create_test_config(&server.uri(), "Atlantis", &db_path);

    let interrupted_run = {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage.create_run("old-hash", "Texas").unwrap()
    };

    let crawler = Crawler::new(&config, "test-hash", true).unwrap();
    assert_ne!(crawler.run_id(), interrupted_run);

    // Unknown region: the top page is an extraction gap, not an error
    let report = crawler.run_until(std::future::pending()).await.unwrap();
    assert_eq!(report.gaps, 1);
    assert_eq!(report.handled, 0);
}
