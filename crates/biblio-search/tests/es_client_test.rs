//! Elasticsearch client, searcher, reindexer and index queue against a mock
//! cluster.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use biblio_core::{
    ChangeListener, Dataset, Publication, PublicationKind, RecordKind, RecordRepository,
    RecordSearcher, SearchArgs, SearchScope,
};
use biblio_db::MemoryRecordRepository;
use biblio_search::{
    BulkOp, DocumentBuilder, EsClient, EsSearcher, IndexNames, IndexQueue, IndexQueueConfig,
    Reindexer,
};

fn bulk_ok(n: usize) -> Value {
    let items: Vec<Value> = (0..n)
        .map(|i| json!({"index": {"_id": i.to_string(), "status": 201}}))
        .collect();
    json!({"took": 1, "errors": false, "items": items})
}

async fn bulk_bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/_bulk")
        .map(|r| String::from_utf8(r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_alias_targets_and_missing_alias() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_alias/biblio_datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "biblio_datasets_2": {"aliases": {"biblio_datasets": {}}},
            "biblio_datasets_1": {"aliases": {"biblio_datasets": {}}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_alias/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"status": 404})))
        .mount(&server)
        .await;

    let client = EsClient::new(server.uri()).unwrap();
    assert_eq!(
        client.alias_targets("biblio_datasets").await.unwrap(),
        vec!["biblio_datasets_1", "biblio_datasets_2"]
    );
    assert!(client.alias_targets("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_switch_alias_sends_remove_and_add() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_aliases"))
        .and(body_partial_json(json!({"actions": [
            {"remove": {"index": "old", "alias": "a"}},
            {"add": {"index": "new", "alias": "a"}}
        ]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = EsClient::new(server.uri()).unwrap();
    client
        .switch_alias("a", "new", &["old".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bulk_reports_item_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .and(header("content-type", "application/x-ndjson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": true,
            "items": [
                {"index": {"_id": "a", "status": 201}},
                {"index": {"_id": "b", "status": 400, "error": {"reason": "failed to parse"}}}
            ]
        })))
        .mount(&server)
        .await;

    let client = EsClient::new(server.uri()).unwrap();
    let ops = vec![
        BulkOp::Index {
            index: "i".into(),
            id: "a".into(),
            doc: json!({}),
        },
        BulkOp::Index {
            index: "i".into(),
            id: "b".into(),
            doc: json!({"year": "x"}),
        },
    ];
    let report = client.bulk(&ops).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "b");
    assert_eq!(report.failures[0].reason, "failed to parse");
}

#[tokio::test]
async fn test_cluster_errors_surface_as_search_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/biblio_publications/_search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let searcher = EsSearcher::new(EsClient::new(server.uri()).unwrap(), IndexNames::default());
    let err = searcher
        .search(RecordKind::Publication, &SearchArgs::new(), &SearchScope::All)
        .await
        .unwrap_err();
    assert!(matches!(err, biblio_core::Error::Search(_)));
}

#[tokio::test]
async fn test_searcher_returns_ids_and_facets() {
    let server = MockServer::start().await;
    let id = uuid::Uuid::now_v7();
    Mock::given(method("POST"))
        .and(path("/biblio_datasets/_search"))
        .and(body_partial_json(json!({"from": 0, "size": 20})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {"total": 1, "hits": [{"_id": id.to_string(), "_score": 1.0}]},
            "aggregations": {"status": {"doc_count": 1, "facet": {"buckets": [
                {"key": "private", "doc_count": 1}
            ]}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let searcher = EsSearcher::new(EsClient::new(server.uri()).unwrap(), IndexNames::default());
    let args = SearchArgs::new().with_query("soil").with_facets(["status"]);
    let hits = searcher
        .search(RecordKind::Dataset, &args, &SearchScope::All)
        .await
        .unwrap();
    assert_eq!(hits.ids, vec![id]);
    assert_eq!(hits.facets["status"][0].value, "private");
}

#[tokio::test]
async fn test_reindex_switches_alias_and_drops_old_index() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/biblio_datasets_\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bulk_ok(2)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/biblio_datasets_\d+/_refresh$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_alias/biblio_datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "biblio_datasets_1": {"aliases": {"biblio_datasets": {}}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_aliases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/biblio_datasets_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;

    let repo = Arc::new(MemoryRecordRepository::<Dataset>::new());
    for title in ["a", "b", "c"] {
        repo.create(Dataset::new(title), None).await.unwrap();
    }

    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = progress.clone();
    let reindexer = Reindexer::new(
        EsClient::new(server.uri()).unwrap(),
        "biblio_datasets",
        repo.clone() as Arc<dyn RecordRepository<Dataset>>,
    )
    .with_batch_size(2)
    .with_page_size(2);

    let report = reindexer
        .run(move |p| seen.lock().unwrap().push(p))
        .await
        .unwrap();

    assert_eq!(report.indexed, 3);
    assert!(report.failures.is_empty());
    assert_eq!(report.removed, vec!["biblio_datasets_1"]);
    assert!(report.index.starts_with("biblio_datasets_"));

    let bodies = bulk_bodies(&server).await;
    assert_eq!(bodies.len(), 2, "three records in batches of two");
    assert_eq!(bodies[0].lines().count(), 4);
    assert!(bodies[0].contains(&report.index));

    let progress = progress.lock().unwrap();
    let last = progress.last().unwrap();
    assert_eq!((last.done, last.total), (3, 3));
}

#[tokio::test]
async fn test_index_queue_flushes_on_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bulk_ok(2)))
        .mount(&server)
        .await;

    let (queue, handle) = IndexQueue::start(
        EsClient::new(server.uri()).unwrap(),
        IndexNames::default(),
        DocumentBuilder::new(),
        IndexQueueConfig {
            capacity: 16,
            batch_size: 100,
            flush_interval: Duration::from_secs(3600),
        },
    );

    let dataset = Dataset::new("queued");
    let publication = Publication::new(PublicationKind::Book, "gone");
    ChangeListener::<Dataset>::record_changed(&queue, &dataset);
    ChangeListener::<Publication>::record_purged(&queue, publication.common.id);

    queue.shutdown().await;
    handle.await.unwrap();

    let bodies = bulk_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let lines: Vec<Value> = bodies[0]
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["index"]["_index"], "biblio_datasets");
    assert_eq!(lines[1]["title"], "queued");
    assert_eq!(lines[2]["delete"]["_index"], "biblio_publications");
    assert_eq!(
        lines[2]["delete"]["_id"],
        publication.common.id.to_string()
    );
}
