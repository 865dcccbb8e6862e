mod common;

use std::thread;
use std::time::Duration;

use common::{StubFetcher, inline, wrapper};
use tiny_http::{Response, Server};
use vast_chain::async_api;
use vast_chain::markup::DEFAULT_VENDOR_NAMESPACE;
use vast_chain::{
    CancelToken, CreativeType, ErrorKind, HttpFetcher, MediaSource, ResolutionError,
    ResolverConfig, VastChainResolver, VastInput, parse_ad_markup,
};

fn envelope(ad_type: &str, payload: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<tns:Response xmlns:tns="{DEFAULT_VENDOR_NAMESPACE}">
  <tns:Ad><![CDATA[{payload}]]></tns:Ad>
  <tns:AdWidth Value="320"/>
  <tns:AdHeight Value="480"/>
  <tns:AdType Value="{ad_type}"/>
</tns:Response>"#
    )
}

/// Wrapper markup as vendors embed it: no CDATA, so it can sit inside the
/// envelope's CDATA section.
fn embedded_wrapper(next: &str) -> String {
    format!(
        "<VAST version=\"3.0\"><Ad><Wrapper><AdSystem>Exchange</AdSystem><VASTAdTagURI>{next}</VASTAdTagURI></Wrapper></Ad></VAST>"
    )
}

fn two_bitrates() -> String {
    inline(
        &[
            ("https://cdn.example/320.mp4", "video/mp4", Some(320)),
            ("https://cdn.example/640.mp4", "video/mp4", Some(640)),
        ],
        Some("https://brand.example/"),
    )
}

#[test]
fn envelope_to_media_url() {
    let envelope = envelope("8", &embedded_wrapper("https://ads.example/inline"));
    let creative = parse_ad_markup(&envelope).unwrap();
    assert_eq!(creative.creative_type, CreativeType::Vast);
    assert!(creative.is_portrait());

    let fetcher = StubFetcher::new().with_document("https://ads.example/inline", two_bitrates());
    let result = VastChainResolver::with_fetcher(&fetcher, ResolverConfig::default())
        .resolve_media(VastInput::Markup(&creative.payload))
        .unwrap();

    assert_eq!(result.media_url, "https://cdn.example/640.mp4");
    assert_eq!(result.hops, 1);
    assert_eq!(result.click_through_url.as_deref(), Some("https://brand.example/"));
    assert_eq!(fetcher.fetched(), vec!["https://ads.example/inline".to_string()]);
}

#[test]
fn display_creatives_are_passed_through() {
    let envelope = envelope("4", "<div><img src=\"https://cdn.example/b.png\"/></div>");
    let creative = parse_ad_markup(&envelope).unwrap();

    assert_eq!(creative.creative_type, CreativeType::Display);
    assert_eq!(creative.payload, "<div><img src=\"https://cdn.example/b.png\"/></div>");
}

/// Serves `/wrapper`, `/inline` and `/broken` until the test process exits.
fn vast_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let base = format!("http://{addr}");
    let inline_uri = format!("{base}/inline");

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = match request.url() {
                "/wrapper" => Response::from_string(wrapper(&inline_uri)),
                "/inline" => Response::from_string(two_bitrates()),
                "/broken" => Response::from_string("<VAST><Ad>"),
                _ => Response::from_string("").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    base
}

#[test]
fn http_fetcher_follows_a_served_chain() {
    let base = vast_server();
    let fetcher = HttpFetcher::new("vast-chain-tests").unwrap();
    let config = ResolverConfig::default().with_request_timeout(Duration::from_secs(5));

    let result = VastChainResolver::with_fetcher(fetcher, config)
        .resolve_media(VastInput::Uri(&format!("{base}/wrapper")))
        .unwrap();

    assert_eq!(result.media_url, "https://cdn.example/640.mp4");
    assert_eq!(result.hops, 2);
    assert_eq!(result.chain, vec![format!("{base}/wrapper"), format!("{base}/inline")]);
    assert_eq!(result.source, MediaSource::WrapperChain);
}

#[test]
fn http_fetcher_reports_status_and_bad_documents() {
    let base = vast_server();
    let resolver = VastChainResolver::with_fetcher(
        HttpFetcher::new("vast-chain-tests").unwrap(),
        ResolverConfig::default(),
    );

    let err = resolver
        .resolve_media(VastInput::Uri(&format!("{base}/missing")))
        .unwrap_err();
    assert!(matches!(err, ResolutionError::HttpStatus { status: 404, depth: 0, .. }));

    let err = resolver
        .resolve_media(VastInput::Uri(&format!("{base}/broken")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidVast);
}

#[test]
fn unsupported_schemes_are_invalid_input() {
    let resolver = VastChainResolver::with_fetcher(
        HttpFetcher::new("vast-chain-tests").unwrap(),
        ResolverConfig::default(),
    );
    let err = resolver
        .resolve_media(VastInput::Uri("ftp://ads.example/vast.xml"))
        .unwrap_err();

    assert!(matches!(err, ResolutionError::Network { depth: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidVast);
}

#[tokio::test]
async fn async_resolutions_run_concurrently() {
    let base = vast_server();
    let config = ResolverConfig::default().with_request_timeout(Duration::from_secs(5));

    let by_uri = async_api::resolve(
        format!("{base}/wrapper"),
        true,
        config.clone(),
        CancelToken::new(),
    );
    let by_markup = async_api::resolve(
        embedded_wrapper(&format!("{base}/inline")),
        false,
        config,
        CancelToken::new(),
    );

    let (by_uri, by_markup) = tokio::join!(by_uri, by_markup);
    assert_eq!(by_uri.unwrap().hops, 2);
    assert_eq!(by_markup.unwrap().hops, 1);
}

#[tokio::test]
async fn async_resolution_honours_cancellation() {
    let token = CancelToken::new();
    token.cancel();

    let err = async_api::resolve(
        "http://127.0.0.1:9/never".to_string(),
        true,
        ResolverConfig::default(),
        token,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ResolutionError::Cancelled { depth: 0 }));
}

#[tokio::test]
async fn fetch_document_returns_body() {
    let base = vast_server();

    let body = async_api::fetch_document(
        format!("{base}/inline"),
        "vast-chain-tests".to_string(),
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    assert!(body.contains("640.mp4"));

    let missing = async_api::fetch_document(
        format!("{base}/missing"),
        "vast-chain-tests".to_string(),
        Duration::from_secs(5),
    )
    .await;
    assert!(missing.is_err());
}
