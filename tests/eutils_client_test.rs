use httpmock::prelude::*;
use pubmed_sync::core::retry::RetryPolicy;
use pubmed_sync::core::{DetailFetcher, SearchClient};
use pubmed_sync::{EtlError, EutilsClient, EutilsSettings};
use std::time::Duration;

const TWO_ARTICLES: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
<PubmedArticle>
  <MedlineCitation>
    <PMID Version="1">101</PMID>
    <Article>
      <Journal>
        <JournalIssue><PubDate><Year>2024</Year></PubDate></JournalIssue>
        <Title>Journal of Hospital Medicine</Title>
      </Journal>
      <ArticleTitle>Hospital outcomes</ArticleTitle>
      <AuthorList>
        <Author>
          <LastName>Smith</LastName>
          <ForeName>Jane A</ForeName>
          <Initials>JA</Initials>
          <AffiliationInfo><Affiliation>General Hospital Dept.</Affiliation></AffiliationInfo>
        </Author>
      </AuthorList>
    </Article>
  </MedlineCitation>
  <PubmedData>
    <ArticleIdList><ArticleId IdType="doi">10.1000/jhm.101</ArticleId></ArticleIdList>
  </PubmedData>
</PubmedArticle>
<PubmedArticle>
  <MedlineCitation>
    <Article><ArticleTitle>No identifier here</ArticleTitle></Article>
  </MedlineCitation>
</PubmedArticle>
</PubmedArticleSet>"#;

fn client(server: &MockServer, api_key: Option<&str>) -> EutilsClient {
    let mut settings = EutilsSettings::new(
        "pubmed-sync-test",
        "lab@example.org",
        api_key.map(str::to_string),
    );
    settings.base_url = server.base_url();
    settings.request_interval = Duration::ZERO;
    settings.batch_size = 2;

    let retry = RetryPolicy::new(4, Duration::from_millis(1), Duration::from_millis(5));
    EutilsClient::new(settings, retry).unwrap()
}

#[tokio::test]
async fn test_search_sends_expected_parameters() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let search_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("db", "pubmed")
                .query_param("retmode", "json")
                .query_param("sort", "pub_date")
                .query_param("retmax", "500")
                .query_param("tool", "pubmed-sync-test")
                .query_param("email", "lab@example.org")
                .query_param("api_key", "secret")
                .query_param_exists("term");
            then.status(200).json_body(serde_json::json!({
                "esearchresult": {"count": "3", "idlist": ["102", "101", "100"]}
            }));
        })
        .await;

    let ids = client(&server, Some("secret"))
        .search("\"Smith JA\"[Author]", 900)
        .await?;

    assert_eq!(ids, vec!["102", "101", "100"]);
    search_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path("/esearch.fcgi");
            then.status(503).body("Service Unavailable");
        })
        .await;

    let err = client(&server, None)
        .search("\"Smith JA\"[Author]", 500)
        .await
        .unwrap_err();

    failing.assert_hits_async(4).await;
    match err {
        EtlError::FetchError { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("expected FetchError, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_client_errors_are_not_retried() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let bad_request = server
        .mock_async(|when, then| {
            when.method(GET).path("/esearch.fcgi");
            then.status(400).body("Invalid query syntax");
        })
        .await;

    let err = client(&server, None)
        .search("broken[", 500)
        .await
        .unwrap_err();

    bad_request.assert_hits_async(1).await;
    assert!(!err.is_transient());
    assert!(err.to_string().contains("Invalid query syntax"));
    Ok(())
}

#[tokio::test]
async fn test_fetch_chunks_requests_and_drops_unparseable_records() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let first_chunk = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/efetch.fcgi")
                .query_param("retmode", "xml")
                .query_param("id", "101,102");
            then.status(200)
                .header("Content-Type", "text/xml")
                .body(TWO_ARTICLES);
        })
        .await;
    let second_chunk = server
        .mock_async(|when, then| {
            when.method(GET).path("/efetch.fcgi").query_param("id", "103");
            then.status(200)
                .body("<?xml version=\"1.0\" ?><PubmedArticleSet></PubmedArticleSet>");
        })
        .await;

    let ids: Vec<String> = ["101", "102", "103"].iter().map(|s| s.to_string()).collect();
    let batch = client(&server, None).fetch(&ids).await?;

    first_chunk.assert_async().await;
    second_chunk.assert_async().await;
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.dropped, 1);

    let record = &batch.records[0];
    assert_eq!(record.id, "101");
    assert_eq!(record.journal, "Journal of Hospital Medicine");
    assert_eq!(record.doi, "10.1000/jhm.101");
    assert_eq!(record.author_list(), vec!["Smith JA"]);
    Ok(())
}

#[tokio::test]
async fn test_rate_limited_search_gives_up_then_succeeds_later() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let mut throttled = server
        .mock_async(|when, then| {
            when.method(GET).path("/esearch.fcgi");
            then.status(429).body("API rate limit exceeded");
        })
        .await;

    let client = client(&server, None);
    assert!(client.search("\"Leon R\"[Author]", 10).await.is_err());
    throttled.assert_hits_async(4).await;
    throttled.delete_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/esearch.fcgi");
            then.status(200)
                .json_body(serde_json::json!({"esearchresult": {"idlist": ["7"]}}));
        })
        .await;

    assert_eq!(client.search("\"Leon R\"[Author]", 10).await?, vec!["7"]);
    Ok(())
}
