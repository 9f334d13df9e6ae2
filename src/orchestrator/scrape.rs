//! Registry scraping pipeline: fetch company pages or listing payloads,
//! extract registry fields, and merge them into `companies`.

use super::RunContext;
use crate::config::ScrapeMode;
use crate::db::IdMaps;
use crate::error::{MigrationError, MigrationResult};
use crate::extract::registry::{
    business_result_fields, detail_url, listing_fields, listing_url, registration_fields,
};
use crate::extract::{HtmlPage, JsonObject, extract, json};
use crate::fetch::{FetchClient, Sleeper, Transport};
use crate::mapping::{EntityType, MappedEntity, company};
use crate::report::{EntityState, RunMode, RunReport};
use crate::upsert::BatchUpsertEngine;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Where scraped companies come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeSource {
    /// The live registry, in the configured mode.
    Registry,
    /// A saved listing dump, possibly several concatenated JSON pages.
    Dump(PathBuf),
}

type Scraped = Vec<MigrationResult<MappedEntity>>;

/// Run one scrape. Never fails: fatal errors end up as an aborted report.
pub async fn run_scrape<T: Transport, S: Sleeper>(
    ctx: &RunContext,
    client: &FetchClient<T, S>,
    source: ScrapeSource,
) -> RunReport {
    let mut report = RunReport::new(RunMode::Scrape, ctx.config.dry_run);
    report.start();
    for entity in EntityType::ALL {
        if entity != EntityType::Companies {
            report.set_state(entity, EntityState::Skipped);
        }
    }
    report.set_state(EntityType::Companies, EntityState::Pending);

    let result = scrape(ctx, client, &source, &mut report).await;
    if source == ScrapeSource::Registry {
        report.fetch = Some(client.stats());
    }
    // Scrape runs have no link tables to verify.
    match result {
        Ok(()) => report.settle_entities(true),
        Err(err) => {
            error!(error = %err, "scrape aborted");
            report.abort(&err);
            report.settle_entities(false);
        }
    }

    report.finish();
    report
}

async fn scrape<T: Transport, S: Sleeper>(
    ctx: &RunContext,
    client: &FetchClient<T, S>,
    source: &ScrapeSource,
    report: &mut RunReport,
) -> MigrationResult<()> {
    let entity = EntityType::Companies;
    let settings = &ctx.config.scrape;
    report.set_state(entity, EntityState::Reading);

    let (origin, records) = match source {
        ScrapeSource::Dump(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| MigrationError::source_unavailable(path.display(), e))?;
            let pages = json::parse_pages(&content)
                .map_err(|e| MigrationError::source_unavailable(path.display(), e))?;
            let mut records = Scraped::new();
            for page in &pages {
                records.extend(companies_from_listing_page(page));
            }
            (format!("dump:{}", path.display()), records)
        }
        ScrapeSource::Registry => match settings.mode {
            ScrapeMode::Detail => ("registry:detail".to_string(), fetch_details(ctx, client).await),
            ScrapeMode::Listing => ("registry:listing".to_string(), fetch_listing(ctx, client).await),
        },
    };

    if ctx.cancel.is_cancelled() {
        return Err(MigrationError::Aborted("cancelled".into()));
    }
    report.set_state(entity, EntityState::Mapping);

    info!(origin = %origin, records = records.len(), "scraped records collected");
    let total = records.len() as u64;
    {
        let entity_report = report.entity_mut(entity);
        entity_report.source_table = Some(origin);
        entity_report.total = Some(total);
        entity_report.state = EntityState::Writing;
    }

    // Registry data is merged over existing rows rather than ignored.
    let engine = BatchUpsertEngine::new(ctx.store.as_ref(), ctx.batch_options(false))
        .with_cancellation(ctx.cancel.clone());
    let run = engine.upsert_batches(entity, records, &mut IdMaps::default(), Some(total));

    let entity_report = report.entity_mut(entity);
    entity_report.absorb(&run, ctx.config.max_errors_per_entity);
    info!(
        succeeded = entity_report.succeeded,
        failed = entity_report.failed,
        "scraped companies written"
    );

    if run.cancelled {
        return Err(MigrationError::Aborted("cancelled".into()));
    }
    Ok(())
}

/// Detail ids walk downward from `start_id`.
fn detail_ids(start_id: u64, limit: usize) -> Vec<u64> {
    (0..limit as u64)
        .map_while(|offset| start_id.checked_sub(offset))
        .collect()
}

async fn fetch_details<T: Transport, S: Sleeper>(
    ctx: &RunContext,
    client: &FetchClient<T, S>,
) -> Scraped {
    let settings = &ctx.config.scrape;
    let ids = detail_ids(settings.start_id, settings.limit);
    info!(
        start = settings.start_id,
        count = ids.len(),
        concurrency = ctx.config.max_concurrent_requests,
        "fetching company detail pages"
    );

    let mut pages = stream::iter(ids)
        .map(|id| {
            let url = detail_url(&settings.base_url, id);
            async move {
                let result = client.fetch(&url).await;
                (id, result)
            }
        })
        .buffer_unordered(ctx.config.max_concurrent_requests.max(1));

    let mut records = Scraped::new();
    while let Some((id, result)) = pages.next().await {
        if ctx.cancel.is_cancelled() {
            warn!("cancelled, dropping outstanding fetches");
            break;
        }
        match result {
            Ok(body) => {
                debug!(id, "company page fetched");
                records.push(Ok(company_from_detail(&body, settings.results_year)));
            }
            Err(err) => records.push(Err(err.into())),
        }
    }
    records
}

async fn fetch_listing<T: Transport, S: Sleeper>(
    ctx: &RunContext,
    client: &FetchClient<T, S>,
) -> Scraped {
    let settings = &ctx.config.scrape;
    let mut records = Scraped::new();
    let mut seen = 0u64;
    for page in 1..=settings.max_pages.max(1) {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let url = listing_url(&settings.base_url, page, settings.page_size);
        let payloads = match client.fetch(&url).await {
            Ok(body) => match json::parse_pages(&body) {
                Ok(payloads) => payloads,
                Err(e) => {
                    records.push(Err(MigrationError::table_unreadable(&url, e)));
                    continue;
                }
            },
            Err(err) => {
                records.push(Err(err.into()));
                continue;
            }
        };

        let rows: usize = payloads.iter().map(|p| json::listing_rows(p).len()).sum();
        if rows == 0 {
            info!(page, "listing exhausted");
            break;
        }
        seen += rows as u64;
        for payload in &payloads {
            records.extend(companies_from_listing_page(payload));
        }
        if let Some(total) = payloads.iter().find_map(json::listing_total)
            && total > 0
            && seen >= total
        {
            info!(page, total, "listing complete");
            break;
        }
    }
    records
}

/// Registration block plus one year of business results.
fn company_from_detail(body: &str, results_year: Option<i32>) -> MappedEntity {
    let page = HtmlPage::parse(body);
    let mut fields = extract(&page, &registration_fields());
    if let Some(column) = page.results_column(results_year) {
        debug!(year = column.year, "business results column selected");
        let results = extract(&column, &business_result_fields());
        for (name, value) in results.iter() {
            fields.insert(name, value.clone());
        }
    }
    MappedEntity::Company(company::from_registry(&fields))
}

fn companies_from_listing_page(page: &serde_json::Value) -> Scraped {
    let specs = listing_fields();
    json::listing_rows(page)
        .into_iter()
        .map(|row| {
            let fields = extract(&JsonObject(row), &specs);
            Ok(MappedEntity::Company(company::from_registry(&fields)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;
    use crate::db::{Database, TargetStore};
    use crate::fetch::{AttemptError, FetchResponse, RetryPolicy};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct PageTransport {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl Transport for PageTransport {
        async fn get(&self, url: &str) -> Result<FetchResponse, AttemptError> {
            Ok(match self.pages.get(url) {
                Some(body) => FetchResponse {
                    status: 200,
                    body: body.clone(),
                },
                None => FetchResponse {
                    status: 404,
                    body: String::new(),
                },
            })
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    const DETAIL: &str = r#"<html><body><table>
        <tr><td>Naziv pun</td><td>Beta Gradnja d.o.o. Podgorica</td></tr>
        <tr><td>PIB</td><td>02999888</td></tr>
        <tr><td>Mjesto</td><td>Podgorica</td></tr>
        <tr><td>Datum osnivanja</td><td>12.05.2008</td></tr>
    </table>
    <table>
        <tr><th>Pokazatelj</th><th>2022</th><th>2023</th></tr>
        <tr><td>Poslovni prihodi</td><td>1.000,00</td><td>2.500,50</td></tr>
        <tr><td>Broj zaposlenih</td><td>4</td><td>6</td></tr>
    </table></body></html>"#;

    fn context(db: &Database, live: bool) -> RunContext {
        let mut config = MigrationConfig::default();
        config.dry_run = !live;
        config.scrape.base_url = "https://registry.test".into();
        config.scrape.start_id = 101;
        config.scrape.limit = 2;
        RunContext::new(config, Arc::new(db.clone()))
    }

    fn client(pages: HashMap<String, String>) -> FetchClient<PageTransport, NoSleep> {
        FetchClient::new(
            PageTransport { pages },
            NoSleep,
            RetryPolicy::fixed(2, Duration::ZERO),
            4,
            Duration::ZERO,
        )
    }

    #[test]
    fn test_detail_ids_stop_at_zero() {
        assert_eq!(detail_ids(101, 3), vec![101, 100, 99]);
        assert_eq!(detail_ids(1, 5), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_detail_scrape_counts_not_found() {
        let db = Database::open_in_memory().unwrap();
        let ctx = context(&db, true);
        let mut pages = HashMap::new();
        pages.insert("https://registry.test/kompanija/101".to_string(), DETAIL.to_string());
        let client = client(pages);

        let report = run_scrape(&ctx, &client, ScrapeSource::Registry).await;
        let companies = &report.entities[&EntityType::Companies];
        assert_eq!(companies.succeeded, 1);
        assert_eq!(companies.failed, 1);
        assert_eq!(report.fetch.unwrap().not_found, 1);
        assert_eq!(report.fetch.unwrap().retries, 0);
        assert_eq!(report.exit_code(), 1);

        let rows = db
            .select("companies", &["name", "city", "revenue", "employees", "source"], &[], None)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Beta Gradnja d.o.o. Podgorica");
        assert_eq!(rows[0]["city"], "Podgorica");
        assert_eq!(rows[0]["revenue"], 2500.5);
        assert_eq!(rows[0]["employees"], 6);
        assert_eq!(rows[0]["source"], "registry");
    }

    #[tokio::test]
    async fn test_dump_with_concatenated_pages() {
        let temp = TempDir::new().unwrap();
        let dump = temp.path().join("listing.json");
        std::fs::write(
            &dump,
            r#"{"Data":[{"CompanyName":"Alfa","TaxNumber":"02000001","Place":"Bar"}],"Total":2}
{"Data":[{"CompanyName":"Bez PIB-a"}],"Total":2}"#,
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        let ctx = context(&db, false);
        let client = client(HashMap::new());
        let report = run_scrape(&ctx, &client, ScrapeSource::Dump(dump)).await;

        let companies = &report.entities[&EntityType::Companies];
        assert_eq!(companies.processed, 2);
        assert_eq!(companies.succeeded, 1);
        assert_eq!(companies.failed, 1);
        assert!(report.fetch.is_none());
        // dry run
        assert_eq!(db.count("companies").unwrap(), 0);
    }

    fn listing_context(db: &Database, max_pages: usize) -> RunContext {
        let mut config = MigrationConfig::default();
        config.dry_run = false;
        config.scrape.base_url = "https://registry.test".into();
        config.scrape.mode = ScrapeMode::Listing;
        config.scrape.page_size = 1;
        config.scrape.max_pages = max_pages;
        RunContext::new(config, Arc::new(db.clone()))
    }

    fn listing_page(page: usize, body: &str) -> (String, String) {
        (listing_url("https://registry.test", page, 1), body.to_string())
    }

    #[tokio::test]
    async fn test_listing_stops_at_empty_page() {
        let db = Database::open_in_memory().unwrap();
        let ctx = listing_context(&db, 5);
        let mut pages: HashMap<String, String> = (2..=5)
            .map(|page| listing_page(page, r#"{"Data":[]}"#))
            .collect();
        pages.extend([listing_page(
            1,
            r#"{"Data":[{"CompanyName":"Alfa","TaxNumber":"02000001","Place":"Bar"}]}"#,
        )]);
        let client = client(pages);

        let report = run_scrape(&ctx, &client, ScrapeSource::Registry).await;
        let companies = &report.entities[&EntityType::Companies];
        assert_eq!(companies.succeeded, 1);
        assert_eq!(companies.failed, 0);
        assert_eq!(companies.state, EntityState::Verified);
        assert_eq!(report.fetch.unwrap().requests, 2);
        assert_eq!(db.count("companies").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_listing_stops_at_advertised_total() {
        let db = Database::open_in_memory().unwrap();
        let ctx = listing_context(&db, 10);
        let pages = HashMap::from([
            listing_page(
                1,
                r#"{"Data":[{"CompanyName":"Alfa","TaxNumber":"02000001"}],"Total":2}"#,
            ),
            listing_page(
                2,
                r#"{"Data":[{"CompanyName":"Beta","TaxNumber":"02000002"}],"Total":2}"#,
            ),
        ]);
        let client = client(pages);

        let report = run_scrape(&ctx, &client, ScrapeSource::Registry).await;
        assert_eq!(report.entities[&EntityType::Companies].succeeded, 2);
        assert_eq!(report.fetch.unwrap().requests, 2);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_missing_dump_aborts() {
        let db = Database::open_in_memory().unwrap();
        let ctx = context(&db, false);
        let client = client(HashMap::new());
        let report =
            run_scrape(&ctx, &client, ScrapeSource::Dump(PathBuf::from("/nonexistent/dump.json"))).await;
        assert!(report.is_aborted());
        assert_eq!(report.exit_code(), 2);
    }
}
