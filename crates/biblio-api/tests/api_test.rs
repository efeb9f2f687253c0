//! Router-level tests against in-memory repositories.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use biblio_api::{router, AppState, CacheConfig, DirectoryCaches};
use biblio_core::{
    Organization, Project, Record, RecordKind, RecordRepository, RecordSearcher, Result,
    SearchArgs, SearchHits, SearchScope, Status,
};
use biblio_db::test_fixtures::{complete_dataset, complete_publication, person, user};
use biblio_db::{Dataset, MemoryDirectory, MemoryRecordRepository, Publication, Role, User};
use biblio_jobs::{HubConfig, OrcidClient, TaskHub, TaskHubHandle, TaskStatus};

/// Lists repository records in id order, honouring status filters and the
/// public scope.
struct RepoSearcher {
    datasets: Arc<MemoryRecordRepository<Dataset>>,
    publications: Arc<MemoryRecordRepository<Publication>>,
}

fn matching<T: Record>(records: Vec<T>, args: &SearchArgs, scope: &SearchScope) -> Vec<Uuid> {
    let statuses = args.filters.get("status");
    records
        .into_iter()
        .filter(|r| statuses.map_or(true, |s| s.iter().any(|v| v == r.status().as_str())))
        .filter(|r| *scope != SearchScope::Public || r.status() == Status::Public)
        .map(|r| r.id())
        .collect()
}

#[async_trait]
impl RecordSearcher for RepoSearcher {
    async fn search(
        &self,
        kind: RecordKind,
        args: &SearchArgs,
        scope: &SearchScope,
    ) -> Result<SearchHits> {
        let ids = match kind {
            RecordKind::Dataset => matching(self.datasets.page(None, 10_000).await?, args, scope),
            RecordKind::Publication => {
                matching(self.publications.page(None, 10_000).await?, args, scope)
            }
        };
        Ok(SearchHits {
            total: ids.len() as u64,
            page: args.page,
            page_size: args.limit(),
            ids: ids
                .into_iter()
                .skip(args.offset())
                .take(args.limit())
                .collect(),
            facets: Default::default(),
        })
    }
}

struct TestApp {
    app: Router,
    datasets: Arc<MemoryRecordRepository<Dataset>>,
    publications: Arc<MemoryRecordRepository<Publication>>,
    tasks: TaskHubHandle,
}

fn alice() -> User {
    user("alice", Role::User)
}

fn bob() -> User {
    user("bob", Role::User)
}

fn curator() -> User {
    user("carol", Role::Curator)
}

fn admin() -> User {
    user("root", Role::Admin)
}

fn setup() -> TestApp {
    let directory = Arc::new(
        MemoryDirectory::new()
            .with_person(person("p-alice", "Alice", "Liddell"))
            .with_organization(Organization {
                id: "CA".into(),
                name: "Faculty of Arts".into(),
                ..Default::default()
            })
            .with_project(Project {
                id: "P1".into(),
                title: "Soil health".into(),
                ..Default::default()
            })
            .with_user(alice(), Some("alice-key"))
            .with_user(bob(), Some("bob-key"))
            .with_user(curator(), Some("curator-key"))
            .with_user(admin(), Some("admin-key")),
    );
    let caches = DirectoryCaches::new(
        directory.clone(),
        directory.clone(),
        directory.clone(),
        CacheConfig::default(),
    );

    let datasets = Arc::new(MemoryRecordRepository::<Dataset>::new());
    let publications = Arc::new(MemoryRecordRepository::<Publication>::new());
    let searcher = Arc::new(RepoSearcher {
        datasets: datasets.clone(),
        publications: publications.clone(),
    });
    let (tasks, _hub) = TaskHub::start(HubConfig::default());

    let state = AppState {
        datasets: datasets.clone(),
        publications: publications.clone(),
        people: caches.people.clone(),
        organizations: caches.organizations.clone(),
        projects: caches.projects.clone(),
        users: directory,
        searcher,
        tasks: tasks.clone(),
        orcid: OrcidClient::new("http://127.0.0.1:9").unwrap(),
        search_index: None,
        caches: Some(caches),
        frontoffice_url: Some("https://biblio.example.org".into()),
    };

    TestApp {
        app: router(state),
        datasets,
        publications,
        tasks,
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn etag(&self) -> String {
        self.headers[header::ETAG].to_str().unwrap().to_string()
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    key: Option<&str>,
    if_match: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    if let Some(etag) = if_match {
        builder = builder.header(header::IF_MATCH, etag);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        headers,
        body,
    }
}

fn etag_of<T: Record>(record: &T) -> String {
    format!("\"{}\"", record.snapshot_id().unwrap())
}

async fn create_dataset(t: &TestApp, key: &str, title: &str) -> Reply {
    let reply = send(
        &t.app,
        Method::POST,
        "/api/v1/datasets",
        Some(key),
        None,
        Some(json!({"title": title})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    reply
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let reply = send(&t.app, Method::GET, "/health", None, None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "healthy");
}

#[tokio::test]
async fn test_backoffice_requires_api_key() {
    let t = setup();
    let uri = format!("/api/v1/datasets/{}", Uuid::now_v7());

    let missing = send(&t.app, Method::GET, &uri, None, None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let wrong = send(&t.app, Method::GET, &uri, Some("nope"), None, None).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_ignores_workflow_fields() {
    let t = setup();
    let reply = send(
        &t.app,
        Method::POST,
        "/api/v1/datasets",
        Some("alice-key"),
        None,
        Some(json!({
            "title": "Soil samples",
            "status": "public",
            "locked": true,
            "reviewer_note": "approved"
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let body = reply.json();
    assert_eq!(body["title"], "Soil samples");
    assert_eq!(body["status"], "new");
    assert_eq!(body["creator_id"], "alice");
    assert_eq!(body["locked"], false);
    assert_eq!(body["reviewer_note"].as_str().unwrap_or(""), "");
    assert_eq!(
        reply.etag(),
        format!("\"{}\"", body["snapshot_id"].as_str().unwrap())
    );

    let id = body["id"].as_str().unwrap();
    let fetched = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/datasets/{}", id),
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.etag(), reply.etag());
}

#[tokio::test]
async fn test_edits_require_current_snapshot() {
    let t = setup();
    let created = create_dataset(&t, "alice-key", "Soil samples").await;
    let id = created.json()["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/datasets/{}/message", id);
    let body = json!({"message": "ready for review"});

    let missing = send(&t.app, Method::PUT, &uri, Some("alice-key"), None, Some(body.clone())).await;
    assert_eq!(missing.status, StatusCode::PRECONDITION_REQUIRED);

    let malformed = send(
        &t.app,
        Method::PUT,
        &uri,
        Some("alice-key"),
        Some("garbage"),
        Some(body.clone()),
    )
    .await;
    assert_eq!(malformed.status, StatusCode::PRECONDITION_FAILED);

    let stale = format!("\"{}\"", Uuid::now_v7());
    let conflict = send(
        &t.app,
        Method::PUT,
        &uri,
        Some("alice-key"),
        Some(&stale),
        Some(body.clone()),
    )
    .await;
    assert_eq!(conflict.status, StatusCode::CONFLICT);
    let conflict = conflict.json();
    assert_eq!(conflict["reload"], true);
    assert_eq!(conflict["snapshot_id"], created.json()["snapshot_id"]);

    let ok = send(
        &t.app,
        Method::PUT,
        &uri,
        Some("alice-key"),
        Some(&created.etag()),
        Some(body),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json()["message"], "ready for review");
    assert_ne!(ok.etag(), created.etag());

    // The old snapshot is now stale.
    let again = send(
        &t.app,
        Method::PUT,
        &uri,
        Some("alice-key"),
        Some(&created.etag()),
        Some(json!({"message": "again"})),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_abstracts_and_contributors() {
    let t = setup();
    let created = create_dataset(&t, "alice-key", "Soil samples").await;
    let id = created.json()["id"].as_str().unwrap().to_string();

    let with_abstract = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/abstracts", id),
        Some("alice-key"),
        Some(&created.etag()),
        Some(json!({"lang": "eng", "text": "Samples from 40 sites."})),
    )
    .await;
    assert_eq!(with_abstract.status, StatusCode::OK);
    assert_eq!(
        with_abstract.json()["abstract"][0]["text"],
        "Samples from 40 sites."
    );

    let with_author = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/contributors/author", id),
        Some("alice-key"),
        Some(&with_abstract.etag()),
        Some(json!({"person_id": "p-alice", "credit_roles": ["writing_original_draft"]})),
    )
    .await;
    assert_eq!(with_author.status, StatusCode::OK);
    let author = &with_author.json()["author"][0];
    assert_eq!(author["person_id"], "p-alice");
    assert_eq!(author["full_name"], "Alice Liddell");

    let bad_role = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/contributors/translator", id),
        Some("alice-key"),
        Some(&with_author.etag()),
        Some(json!({"first_name": "Lewis", "last_name": "Carroll"})),
    )
    .await;
    assert_eq!(bad_role.status, StatusCode::BAD_REQUEST);

    let unknown_person = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/contributors/author", id),
        Some("alice-key"),
        Some(&with_author.etag()),
        Some(json!({"person_id": "p-nobody"})),
    )
    .await;
    assert_eq!(unknown_person.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_departments_must_exist() {
    let t = setup();
    let created = create_dataset(&t, "alice-key", "Soil samples").await;
    let id = created.json()["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/datasets/{}/departments", id);

    let unknown = send(
        &t.app,
        Method::POST,
        &uri,
        Some("alice-key"),
        Some(&created.etag()),
        Some(json!({"organization_id": "XX"})),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let linked = send(
        &t.app,
        Method::POST,
        &uri,
        Some("alice-key"),
        Some(&created.etag()),
        Some(json!({"organization_id": "CA"})),
    )
    .await;
    assert_eq!(linked.status, StatusCode::OK);
    assert_eq!(
        linked.json()["related_organizations"][0]["organization_id"],
        "CA"
    );
}

#[tokio::test]
async fn test_publish_validates_and_withdraw_returns() {
    let t = setup();
    let incomplete = create_dataset(&t, "alice-key", "Soil samples").await;
    let id = incomplete.json()["id"].as_str().unwrap().to_string();
    let rejected = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/publish", id),
        Some("alice-key"),
        Some(&incomplete.etag()),
        None,
    )
    .await;
    assert_eq!(rejected.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!rejected.json()["errors"].as_array().unwrap().is_empty());

    let complete = t
        .datasets
        .create(complete_dataset("Sediment cores"), Some(&alice()))
        .await
        .unwrap();
    let published = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/publish", complete.id()),
        Some("alice-key"),
        Some(&etag_of(&complete)),
        None,
    )
    .await;
    assert_eq!(published.status, StatusCode::OK);
    assert_eq!(published.json()["status"], "public");
    assert_eq!(published.json()["has_been_public"], true);

    let withdrawn = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/withdraw", complete.id()),
        Some("alice-key"),
        Some(&published.etag()),
        None,
    )
    .await;
    assert_eq!(withdrawn.status, StatusCode::OK);
    assert_eq!(withdrawn.json()["status"], "returned");
}

#[tokio::test]
async fn test_researchers_cannot_touch_others_records() {
    let t = setup();
    let created = create_dataset(&t, "alice-key", "Soil samples").await;
    let id = created.json()["id"].as_str().unwrap().to_string();

    let view = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/datasets/{}", id),
        Some("bob-key"),
        None,
        None,
    )
    .await;
    assert_eq!(view.status, StatusCode::FORBIDDEN);

    let note_uri = format!("/api/v1/datasets/{}/reviewer-note", id);
    let note = json!({"reviewer_note": "license missing"});
    let owner_note = send(
        &t.app,
        Method::PUT,
        &note_uri,
        Some("alice-key"),
        Some(&created.etag()),
        Some(note.clone()),
    )
    .await;
    assert_eq!(owner_note.status, StatusCode::FORBIDDEN);

    let curated = send(
        &t.app,
        Method::PUT,
        &note_uri,
        Some("curator-key"),
        Some(&created.etag()),
        Some(note),
    )
    .await;
    assert_eq!(curated.status, StatusCode::OK);
    assert_eq!(curated.json()["reviewer_note"], "license missing");

    let owner_view = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/datasets/{}", id),
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(owner_view.status, StatusCode::OK);
    assert_eq!(owner_view.json()["reviewer_note"].as_str().unwrap_or(""), "");
}

#[tokio::test]
async fn test_linking_updates_both_records() {
    let t = setup();
    let dataset = t
        .datasets
        .create(complete_dataset("Sediment cores"), Some(&alice()))
        .await
        .unwrap();
    let publication = t
        .publications
        .create(complete_publication("Sediment study"), Some(&alice()))
        .await
        .unwrap();

    let linked = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/publications", dataset.id()),
        Some("alice-key"),
        Some(&etag_of(&dataset)),
        Some(json!({"publication_id": publication.id()})),
    )
    .await;
    assert_eq!(linked.status, StatusCode::OK);
    assert_eq!(
        linked.json()["related_publications"][0],
        publication.id().to_string()
    );

    let other_side = t.publications.get(publication.id()).await.unwrap().unwrap();
    assert_eq!(other_side.related_datasets, vec![dataset.id()]);

    let unlinked = send(
        &t.app,
        Method::DELETE,
        &format!(
            "/api/v1/datasets/{}/publications/{}",
            dataset.id(),
            publication.id()
        ),
        Some("alice-key"),
        Some(&linked.etag()),
        None,
    )
    .await;
    assert_eq!(unlinked.status, StatusCode::OK);
    let other_side = t.publications.get(publication.id()).await.unwrap().unwrap();
    assert!(other_side.related_datasets.is_empty());
}

#[tokio::test]
async fn test_linking_refuses_locked_far_record() {
    let t = setup();
    let dataset = t
        .datasets
        .create(complete_dataset("Sediment cores"), Some(&alice()))
        .await
        .unwrap();
    let mut locked = complete_publication("Sediment study");
    locked.common.locked = true;
    let publication = t
        .publications
        .create(locked, Some(&alice()))
        .await
        .unwrap();

    let reply = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/publications", dataset.id()),
        Some("alice-key"),
        Some(&etag_of(&dataset)),
        Some(json!({"publication_id": publication.id()})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let stored = t.datasets.get(dataset.id()).await.unwrap().unwrap();
    assert_eq!(stored.snapshot_id(), dataset.snapshot_id());
    assert!(stored.related_publications.is_empty());
    let far = t.publications.get(publication.id()).await.unwrap().unwrap();
    assert_eq!(far.snapshot_id(), publication.snapshot_id());
    assert!(far.related_datasets.is_empty());
}

#[tokio::test]
async fn test_linking_missing_record_leaves_near_side_untouched() {
    let t = setup();
    let dataset = t
        .datasets
        .create(complete_dataset("Sediment cores"), Some(&alice()))
        .await
        .unwrap();
    let publication = t
        .publications
        .create(complete_publication("Sediment study"), Some(&alice()))
        .await
        .unwrap();
    t.publications.purge(publication.id()).await.unwrap();

    let reply = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/datasets/{}/publications", dataset.id()),
        Some("alice-key"),
        Some(&etag_of(&dataset)),
        Some(json!({"publication_id": publication.id()})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let stored = t.datasets.get(dataset.id()).await.unwrap().unwrap();
    assert_eq!(stored.snapshot_id(), dataset.snapshot_id());
}

#[tokio::test]
async fn test_unlinking_purged_record_clears_near_side() {
    let t = setup();
    let publication = t
        .publications
        .create(complete_publication("Sediment study"), Some(&alice()))
        .await
        .unwrap();
    let mut linked = complete_dataset("Sediment cores");
    linked.related_publications.push(publication.id());
    let dataset = t.datasets.create(linked, Some(&alice())).await.unwrap();
    t.publications.purge(publication.id()).await.unwrap();

    let reply = send(
        &t.app,
        Method::DELETE,
        &format!(
            "/api/v1/datasets/{}/publications/{}",
            dataset.id(),
            publication.id()
        ),
        Some("alice-key"),
        Some(&etag_of(&dataset)),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json()["related_publications"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_search_rejects_pages_past_result_window() {
    let t = setup();
    let reply = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/datasets?page={}", usize::MAX),
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let export = send(
        &t.app,
        Method::GET,
        "/api/v1/export/publications?page=100000",
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(export.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_frontoffice_serves_public_records_only() {
    let t = setup();
    let mut public = complete_dataset("Sediment cores");
    public.common.status = Status::Public;
    public.common.has_been_public = true;
    public.common.reviewer_note = "checked".into();
    let public = t.datasets.create(public, Some(&alice())).await.unwrap();
    let private = t
        .datasets
        .create(complete_dataset("Draft"), Some(&alice()))
        .await
        .unwrap();

    let shown = send(
        &t.app,
        Method::GET,
        &format!("/frontoffice/datasets/{}", public.id()),
        None,
        None,
        None,
    )
    .await;
    assert_eq!(shown.status, StatusCode::OK);
    let body = shown.json();
    assert_eq!(body["title"], "Sediment cores");
    assert!(body.get("reviewer_note").is_none());
    assert!(body.get("creator_id").is_none());

    let hidden = send(
        &t.app,
        Method::GET,
        &format!("/frontoffice/datasets/{}", private.id()),
        None,
        None,
        None,
    )
    .await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let mut withdrawn = public.clone();
    withdrawn.common.status = Status::Returned;
    t.datasets
        .update(public.snapshot_id().unwrap(), withdrawn, Some(&curator()))
        .await
        .unwrap();

    let harvest = send(&t.app, Method::GET, "/frontoffice/datasets", None, None, None).await;
    assert_eq!(harvest.status, StatusCode::OK);
    let records = harvest.json()["records"].as_array().unwrap().clone();
    assert_eq!(records.len(), 1, "never-public drafts stay out of the feed");
    assert_eq!(records[0]["id"], public.id().to_string());
    assert_eq!(records[0]["status"], "returned");
    assert!(records[0].get("title").is_none());
}

#[tokio::test]
async fn test_harvest_follows_next_cursor() {
    let t = setup();
    let mut created = Vec::new();
    for title in ["Cores", "Transects", "Soundings"] {
        let mut dataset = complete_dataset(title);
        dataset.common.status = Status::Public;
        dataset.common.has_been_public = true;
        created.push(t.datasets.create(dataset, Some(&alice())).await.unwrap().id());
    }

    let first = send(&t.app, Method::GET, "/frontoffice/datasets?limit=2", None, None, None).await;
    assert_eq!(first.status, StatusCode::OK);
    let body = first.json();
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
    let next = &body["next"];
    let since = next["updated_since"].as_str().unwrap().replace('+', "%2B");
    let after = next["after"].as_str().unwrap();

    let second = send(
        &t.app,
        Method::GET,
        &format!("/frontoffice/datasets?limit=2&updated_since={}&after={}", since, after),
        None,
        None,
        None,
    )
    .await;
    assert_eq!(second.status, StatusCode::OK);
    let body = second.json();
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert!(body.get("next").is_none());

    let mut seen: Vec<String> = first.json()["records"]
        .as_array()
        .unwrap()
        .iter()
        .chain(records)
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    let mut expected: Vec<String> = created.iter().map(Uuid::to_string).collect();
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_search_and_csv_export() {
    let t = setup();
    create_dataset(&t, "alice-key", "Soil samples").await;
    create_dataset(&t, "alice-key", "Sediment cores").await;

    let page = send(
        &t.app,
        Method::GET,
        "/api/v1/datasets?page_size=1",
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(page.status, StatusCode::OK);
    let body = page.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["hits"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_next_page"], true);

    let filtered = send(
        &t.app,
        Method::GET,
        "/api/v1/datasets?f%5Bstatus%5D=public",
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(filtered.status, StatusCode::OK);
    assert_eq!(filtered.json()["total"], 0);

    let export = send(
        &t.app,
        Method::GET,
        "/api/v1/export/datasets",
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(export.status, StatusCode::OK);
    assert!(export.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let csv = String::from_utf8(export.body).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("Sediment cores"));
}

#[tokio::test]
async fn test_dashboard_is_for_curators() {
    let t = setup();
    let mut public = complete_dataset("Sediment cores");
    public.common.status = Status::Public;
    t.datasets.create(public, Some(&alice())).await.unwrap();

    let denied = send(&t.app, Method::GET, "/api/v1/dashboard", Some("alice-key"), None, None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let dashboard = send(
        &t.app,
        Method::GET,
        "/api/v1/dashboard",
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(dashboard.status, StatusCode::OK);
    let body = dashboard.json();
    assert_eq!(body["datasets"]["public"]["total"], 1);
    assert_eq!(body["publications"]["public"]["total"], 0);
}

#[tokio::test]
async fn test_embargo_sweep_runs_as_task() {
    let t = setup();

    let denied = send(
        &t.app,
        Method::POST,
        "/api/v1/tasks/embargo-sweep",
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let started = send(
        &t.app,
        Method::POST,
        "/api/v1/tasks/embargo-sweep",
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(started.status, StatusCode::ACCEPTED);
    let ids: Vec<Uuid> = serde_json::from_value(started.json()["ids"].clone()).unwrap();
    assert_eq!(ids.len(), 2);

    for id in &ids {
        let info = t.tasks.wait(*id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(info.status, TaskStatus::Done);
    }

    let status = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/tasks/{}", ids[0]),
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json()["status"]["state"], "done");
    assert_eq!(status.json()["submitted_by"], "carol");

    let hidden = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/tasks/{}", ids[0]),
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND, "only the submitter or curators");

    let unknown = send(
        &t.app,
        Method::GET,
        &format!("/api/v1/tasks/{}", Uuid::now_v7()),
        Some("curator-key"),
        None,
        None,
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reindex_needs_search_backend() {
    let t = setup();
    let reply = send(
        &t.app,
        Method::POST,
        "/api/v1/tasks/reindex",
        Some("admin-key"),
        None,
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orcid_token_is_validated() {
    let t = setup();
    let invalid = send(
        &t.app,
        Method::PUT,
        "/api/v1/me/orcid",
        Some("alice-key"),
        None,
        Some(json!({"orcid": "0000-0002", "token": "t"})),
    )
    .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let stored = send(
        &t.app,
        Method::PUT,
        "/api/v1/me/orcid",
        Some("alice-key"),
        None,
        Some(json!({"orcid": "0000-0002-1825-0097", "token": "t"})),
    )
    .await;
    assert_eq!(stored.status, StatusCode::NO_CONTENT);

    let person = send(
        &t.app,
        Method::GET,
        "/api/v1/people/p-alice",
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(person.status, StatusCode::OK);
    assert_eq!(person.json()["orcid"], "0000-0002-1825-0097");
    assert!(person.json().get("orcid_token").is_none());
}

#[tokio::test]
async fn test_task_status_is_private_to_submitter() {
    let t = setup();
    let started = send(
        &t.app,
        Method::POST,
        "/api/v1/tasks/orcid-sync",
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(started.status, StatusCode::ACCEPTED);
    let ids: Vec<Uuid> = serde_json::from_value(started.json()["ids"].clone()).unwrap();
    let uri = format!("/api/v1/tasks/{}", ids[0]);

    let own = send(&t.app, Method::GET, &uri, Some("alice-key"), None, None).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.json()["name"], "orcid_sync");

    let other = send(&t.app, Method::GET, &uri, Some("bob-key"), None, None).await;
    assert_eq!(other.status, StatusCode::NOT_FOUND);

    let curator = send(&t.app, Method::GET, &uri, Some("curator-key"), None, None).await;
    assert_eq!(curator.status, StatusCode::OK);
}

#[tokio::test]
async fn test_directory_suggestions_and_cache_admin() {
    let t = setup();
    let people = send(
        &t.app,
        Method::GET,
        "/api/v1/people?q=alice",
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(people.status, StatusCode::OK);
    assert_eq!(people.json()[0]["id"], "p-alice");

    let org = send(
        &t.app,
        Method::GET,
        "/api/v1/organizations/CA",
        Some("alice-key"),
        None,
        None,
    )
    .await;
    assert_eq!(org.status, StatusCode::OK);

    let denied = send(&t.app, Method::GET, "/api/v1/admin/cache", Some("alice-key"), None, None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let stats = send(&t.app, Method::GET, "/api/v1/admin/cache", Some("admin-key"), None, None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.json()["organizations"]["entries"], 1);

    let cleared = send(
        &t.app,
        Method::DELETE,
        "/api/v1/admin/cache",
        Some("admin-key"),
        None,
        None,
    )
    .await;
    assert!(cleared.status.is_success());
}
