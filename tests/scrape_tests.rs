//! Integration tests for registry scraping against a scripted transport.

use async_trait::async_trait;
use legacy_bridge::config::MigrationConfig;
use legacy_bridge::db::{Database, TargetStore};
use legacy_bridge::error::ErrorCode;
use legacy_bridge::fetch::{
    AttemptError, FetchClient, FetchError, FetchResponse, RetryPolicy, Sleeper, Transport,
};
use legacy_bridge::mapping::EntityType;
use legacy_bridge::orchestrator::{RunContext, ScrapeSource, run_legacy, run_scrape};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a fresh in-memory target store for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

const BASE_URL: &str = "https://registry.test";

/// Serves each URL's scripted statuses in order, then 200 with the page.
#[derive(Default)]
struct ScriptedRegistry {
    pages: HashMap<String, String>,
    failures: Mutex<HashMap<String, Vec<u16>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRegistry {
    fn page(mut self, id: u64, body: &str) -> Self {
        self.pages.insert(format!("{BASE_URL}/kompanija/{id}"), body.to_string());
        self
    }

    fn failing(self, id: u64, statuses: &[u16]) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(format!("{BASE_URL}/kompanija/{id}"), statuses.to_vec());
        self
    }
}

#[async_trait]
impl Transport for ScriptedRegistry {
    async fn get(&self, url: &str) -> Result<FetchResponse, AttemptError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(statuses) = self.failures.lock().unwrap().get_mut(url)
            && !statuses.is_empty()
        {
            return Ok(FetchResponse {
                status: statuses.remove(0),
                body: String::new(),
            });
        }
        Ok(match self.pages.get(url) {
            Some(body) => FetchResponse {
                status: 200,
                body: body.clone(),
            },
            None => FetchResponse {
                status: 404,
                body: "<html>Not found</html>".to_string(),
            },
        })
    }
}

struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn client(registry: ScriptedRegistry, retries: u32) -> FetchClient<ScriptedRegistry, NoSleep> {
    FetchClient::new(
        registry,
        NoSleep,
        RetryPolicy::fixed(retries, Duration::from_millis(10)),
        2,
        Duration::ZERO,
    )
}

fn context(db: &Database, start_id: u64, limit: usize) -> RunContext {
    let mut config = MigrationConfig::default();
    config.dry_run = false;
    config.scrape.base_url = BASE_URL.into();
    config.scrape.start_id = start_id;
    config.scrape.limit = limit;
    RunContext::new(config, Arc::new(db.clone()))
}

fn detail_page(name: &str, tax_number: &str, city: &str, revenue: &str) -> String {
    format!(
        r#"<html><body>
        <table>
          <tr><td>Naziv pun</td><td>{name}</td></tr>
          <tr><td>PIB</td><td>{tax_number}</td></tr>
          <tr><td>Mjesto</td><td>{city}</td></tr>
        </table>
        <table>
          <tr><th>Pokazatelj</th><th>2023</th></tr>
          <tr><td>Poslovni prihodi</td><td>{revenue}</td></tr>
          <tr><td>Broj zaposlenih</td><td>3</td></tr>
        </table>
        </body></html>"#
    )
}

mod fetch_tests {
    use super::*;

    #[tokio::test]
    async fn not_found_is_terminal_without_retries() {
        let registry = ScriptedRegistry::default();
        let client = client(registry, 3);
        let err = client.fetch(&format!("{BASE_URL}/kompanija/5")).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { status: 404, .. }));
        let stats = client.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.not_found, 1);
    }

    #[tokio::test]
    async fn persistent_server_error_exhausts_retries() {
        let registry = ScriptedRegistry::default().failing(5, &[500, 500, 500, 500, 500]);
        let client = client(registry, 2);
        let err = client.fetch(&format!("{BASE_URL}/kompanija/5")).await.unwrap_err();
        match &err {
            FetchError::Failed { attempts, last, .. } => {
                assert_eq!(*attempts, 3);
                assert_eq!(*last, AttemptError::Status(500));
            }
            other => panic!("unexpected error {other:?}"),
        }
        let migration_error: legacy_bridge::error::MigrationError = err.into();
        assert_eq!(migration_error.code(), ErrorCode::FetchTransientFailure);
        assert_eq!(client.stats().retries, 2);
        assert_eq!(client.stats().failures, 1);
    }
}

mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn detail_scrape_recovers_from_transient_errors() {
        let db = setup_db();
        let ctx = context(&db, 11, 2);
        let registry = ScriptedRegistry::default()
            .page(11, &detail_page("Gama d.o.o.", "03111222", "Niksic", "10.000,00"))
            .page(10, &detail_page("Delta d.o.o.", "03111333", "Budva", "500,25"))
            .failing(10, &[503, 429]);
        let client = client(registry, 3);

        let report = run_scrape(&ctx, &client, ScrapeSource::Registry).await;
        assert_eq!(report.exit_code(), 0);
        let companies = &report.entities[&EntityType::Companies];
        assert_eq!(companies.succeeded, 2);
        assert_eq!(report.fetch.unwrap().retries, 2);

        let delta = db
            .select(
                "companies",
                &["name", "city", "revenue", "employees"],
                &[("tax_number", json!("03111333"))],
                None,
            )
            .unwrap();
        assert_eq!(delta[0]["name"], "Delta d.o.o.");
        assert_eq!(delta[0]["city"], "Budva");
        assert_eq!(delta[0]["revenue"], 500.25);
        assert_eq!(delta[0]["employees"], 3);
    }

    #[tokio::test]
    async fn registry_data_merges_into_migrated_company() {
        let temp = TempDir::new().unwrap();
        let legacy = temp.path().join("legacy.db");
        let conn = Connection::open(&legacy).unwrap();
        conn.execute_batch(
            "CREATE TABLE FIRME (FIRMA_ID INTEGER, NAZIV TEXT, MATICNI TEXT, TEL1 TEXT);
             INSERT INTO FIRME VALUES (1, 'Gama', '03111222', '020 333 444');",
        )
        .unwrap();

        let db = setup_db();
        let mut ctx = context(&db, 11, 1);
        let mut config = (*ctx.config).clone();
        config.source_path = legacy;
        ctx.config = Arc::new(config);

        run_legacy(&ctx, &[EntityType::Companies]);
        let before = db.select("companies", &["id"], &[], None).unwrap();

        let registry = ScriptedRegistry::default()
            .page(11, &detail_page("Gama d.o.o.", "03111222", "Niksic", "10.000,00"));
        let report = run_scrape(&ctx, &client(registry, 0), ScrapeSource::Registry).await;
        assert_eq!(report.exit_code(), 0);

        let rows = db
            .select(
                "companies",
                &["id", "name", "phone", "city", "revenue", "country", "source"],
                &[],
                None,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], before[0]["id"]);
        assert_eq!(rows[0]["name"], "Gama d.o.o.");
        assert_eq!(rows[0]["phone"], "020 333 444");
        assert_eq!(rows[0]["city"], "Niksic");
        assert_eq!(rows[0]["revenue"], 10000.0);
        assert_eq!(rows[0]["country"], "Montenegro");
        assert_eq!(rows[0]["source"], "legacy");
    }
}
