use std::time::Duration;

use courtportal_api::{Error, PortalClient};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

fn client() -> PortalClient {
    PortalClient::with_delay(Duration::ZERO).unwrap()
}

#[tokio::test]
async fn get_document_success() {
    let mock_server = MockServer::start().await;
    let body = load_fixture("login_page.html");

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(&body))
        .mount(&mock_server)
        .await;

    let url = Url::parse(&format!("{}/public-portal/?q=user/login", mock_server.uri())).unwrap();
    let doc = client().get_document(&url).await.unwrap();

    assert_eq!(
        doc.first_attr("input[name='form_build_id']", "value"),
        Some("form-login-1".to_string())
    );
    assert!(doc.base().as_str().contains("q=user/login"));
}

#[tokio::test]
async fn get_document_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let url = Url::parse(&format!("{}/down", mock_server.uri())).unwrap();
    assert!(client().get_document(&url).await.is_err());
}

#[tokio::test]
async fn server_error_with_long_multibyte_body_yields_status_error() {
    // A subscriber must be active for the error log's body excerpt to be
    // rendered at all; without one the truncation path never runs.
    let _guard = tracing::subscriber::set_default(tracing_subscriber::fmt().finish());

    let mock_server = MockServer::start().await;
    let mut body = "a".repeat(1999);
    body.push('é');
    body.push_str(&"<p>Service indisponible</p>".repeat(50));

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string(&body))
        .mount(&mock_server)
        .await;

    let url = Url::parse(&format!("{}/down", mock_server.uri())).unwrap();
    let err = client().get_document(&url).await.unwrap_err();
    match err {
        Error::HttpStatus { status } => assert_eq!(status.as_u16(), 503),
        other => panic!("expected HttpStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn submit_form_posts_urlencoded_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(body_string_contains("name=someone%40example.org"))
        .and(body_string_contains("captcha_response=XK4F2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><a href='?q=user/logout'>Logout</a></html>"))
        .mount(&mock_server)
        .await;

    let url = Url::parse(&format!("{}/public-portal/?q=user/login", mock_server.uri())).unwrap();
    let fields = vec![
        ("name".to_string(), "someone@example.org".to_string()),
        ("captcha_response".to_string(), "XK4F2".to_string()),
    ];
    let doc = client().submit_form(&url, &fields).await.unwrap();
    assert!(doc.contains("Logout"));
}

#[tokio::test]
async fn fetch_bytes_returns_raw_body() {
    let mock_server = MockServer::start().await;
    let png = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    Mock::given(method("GET"))
        .and(path("/captcha/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png.as_slice()))
        .mount(&mock_server)
        .await;

    let url = Url::parse(&format!("{}/captcha/generate", mock_server.uri())).unwrap();
    let bytes = client().fetch_bytes(&url).await.unwrap();
    assert_eq!(bytes, png);
}

#[tokio::test]
async fn session_cookie_carries_across_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SSESS=abc123; Path=/")
                .set_body_string("<html></html>"),
        )
        .mount(&mock_server)
        .await;

    // Only matches when the session cookie from the first response is sent back.
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("cookie", "SSESS=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>search</html>"))
        .mount(&mock_server)
        .await;

    let c = client();
    let login = Url::parse(&format!("{}/login", mock_server.uri())).unwrap();
    let search = Url::parse(&format!("{}/search", mock_server.uri())).unwrap();

    c.get_document(&login).await.unwrap();
    let doc = c.get_document(&search).await.unwrap();
    assert!(doc.contains("search"));
}
