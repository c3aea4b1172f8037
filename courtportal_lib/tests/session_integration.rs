use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use courtportal_lib::courtportal_api::PortalClient;
use courtportal_lib::diagnostics::NullDiagnostics;
use courtportal_lib::ocr::CaptchaOcr;
use courtportal_lib::prompt::CaptchaPrompt;
use courtportal_lib::{CaptchaStage, CaseLookup, Credentials, PartyRecord, PortalConfig, SessionError};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

struct StubOcr {
    answer: Option<&'static str>,
}

impl CaptchaOcr for StubOcr {
    fn recognize(&self, _image_bytes: &[u8]) -> Option<String> {
        self.answer.map(str::to_string)
    }
}

struct StubPrompt {
    answer: Option<&'static str>,
    calls: AtomicU32,
}

impl StubPrompt {
    fn new(answer: Option<&'static str>) -> Self {
        Self {
            answer,
            calls: AtomicU32::new(0),
        }
    }
}

impl CaptchaPrompt for StubPrompt {
    fn request_manual_captcha(&self, _image_url: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.map(str::to_string)
    }
}

fn config_for(server: &MockServer) -> PortalConfig {
    PortalConfig::new(
        Url::parse(&format!("{}/public-portal/", server.uri())).unwrap(),
        Credentials {
            username: "someone@example.org".to_string(),
            password: "hunter2".to_string(),
        },
    )
}

fn client() -> PortalClient {
    PortalClient::with_delay(Duration::ZERO).unwrap()
}

async fn mount_login(server: &MockServer, captcha_answer: &str) {
    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("login_page.html")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "image_captcha/generate/1234"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 16]))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(query_param("q", "user/login"))
        .and(body_string_contains(format!("captcha_response={}", captcha_answer)))
        .and(body_string_contains("name=someone%40example.org"))
        .and(body_string_contains("form_build_id=form-login-build-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("logged_in.html")))
        .mount(server)
        .await;
}

async fn mount_search_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/379"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("search_page.html")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_lookup_happy_path() {
    let server = MockServer::start().await;
    mount_login(&server, "XK4F2").await;
    mount_search_pages(&server).await;

    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/379"))
        .and(body_string_contains("captcha_response=9"))
        .and(body_string_contains("PRMC2400654"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("results_page.html")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/385"))
        .and(query_param("id", "123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("detail_page.html")))
        .mount(&server)
        .await;

    let client = client();
    let config = config_for(&server);
    let ocr = StubOcr {
        answer: Some("XK4F2"),
    };
    let prompt = StubPrompt::new(None);
    let lookup = CaseLookup::new(&client, &config, Some(&ocr), &prompt, &NullDiagnostics);

    let record = lookup.run("PRMC2400654").await.unwrap();

    assert_eq!(record.case_number, "PRMC2400654");
    assert_eq!(record.filed_date, "2023-01-02");
    assert_eq!(record.case_type, "Probate");
    assert_eq!(record.status, "Active");
    assert_eq!(record.description, "Estate Of John Doe");
    assert_eq!(
        record.parties,
        vec![PartyRecord::new("John Smith", "Petitioner")]
    );
    // The OCR solved the login CAPTCHA; the operator was never bothered.
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn manual_prompt_used_when_ocr_yields_nothing() {
    let server = MockServer::start().await;
    // Login only accepts the operator's answer.
    mount_login(&server, "ZZTOP").await;
    mount_search_pages(&server).await;

    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/379"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("results_page.html")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/385"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("detail_page.html")))
        .mount(&server)
        .await;

    let client = client();
    let config = config_for(&server);
    let ocr = StubOcr { answer: None };
    let prompt = StubPrompt::new(Some("ZZTOP"));
    let lookup = CaseLookup::new(&client, &config, Some(&ocr), &prompt, &NullDiagnostics);

    let record = lookup.run("PRMC2400654").await.unwrap();
    assert_eq!(record.case_number, "PRMC2400654");
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn search_captcha_retry_bound_halts_after_three_attempts() {
    let server = MockServer::start().await;
    mount_login(&server, "XK4F2").await;

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/379"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("search_page.html")))
        .expect(3)
        .mount(&server)
        .await;

    // Every answer is rejected. Exactly 3 submissions, never a 4th.
    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/379"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(load_fixture("captcha_incorrect.html")),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = client();
    let config = config_for(&server);
    let ocr = StubOcr {
        answer: Some("XK4F2"),
    };
    let prompt = StubPrompt::new(None);
    let lookup = CaseLookup::new(&client, &config, Some(&ocr), &prompt, &NullDiagnostics);

    let err = lookup.run("PRMC2400654").await.unwrap_err();
    match err {
        SessionError::RetriesExhausted { stage, attempts } => {
            assert_eq!(stage, CaptchaStage::Search);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn login_captcha_retry_bound_halts_after_three_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("login_page.html")))
        .expect(3)
        .mount(&server)
        .await;

    // The portal keeps re-rendering the CAPTCHA form: the answer is
    // always wrong.
    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(query_param("q", "user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("login_page.html")))
        .expect(3)
        .mount(&server)
        .await;

    let client = client();
    let config = config_for(&server);
    let prompt = StubPrompt::new(Some("WRONG"));
    let lookup = CaseLookup::new(&client, &config, None, &prompt, &NullDiagnostics);

    let err = lookup.run("PRMC2400654").await.unwrap_err();
    match err {
        SessionError::RetriesExhausted { stage, attempts } => {
            assert_eq!(stage, CaptchaStage::Login);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(prompt.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn login_without_recaptcha_failure_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("login_page.html")))
        .mount(&server)
        .await;

    // Wrong credentials: no logout link, but no fresh CAPTCHA either.
    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(query_param("q", "user/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Access denied.</p></body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let config = config_for(&server);
    let prompt = StubPrompt::new(Some("XK4F2"));
    let lookup = CaseLookup::new(&client, &config, None, &prompt, &NullDiagnostics);

    let err = lookup.run("PRMC2400654").await.unwrap_err();
    assert!(matches!(err, SessionError::LoginFailed { .. }));
}

#[tokio::test]
async fn missing_math_question_is_a_structural_halt() {
    let server = MockServer::start().await;
    mount_login(&server, "XK4F2").await;

    Mock::given(method("GET"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/379"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><form><label>Case Number</label>\
             <input type='text' maxlength='50' name='data(147057)'></form></body></html>",
        ))
        .mount(&server)
        .await;

    let client = client();
    let config = config_for(&server);
    let ocr = StubOcr {
        answer: Some("XK4F2"),
    };
    let prompt = StubPrompt::new(None);
    let lookup = CaseLookup::new(&client, &config, Some(&ocr), &prompt, &NullDiagnostics);

    let err = lookup.run("PRMC2400654").await.unwrap_err();
    match err {
        SessionError::Structural { reason } => assert!(reason.contains("math question")),
        other => panic!("expected Structural, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_result_link_is_a_structural_halt() {
    let server = MockServer::start().await;
    mount_login(&server, "XK4F2").await;
    mount_search_pages(&server).await;

    Mock::given(method("POST"))
        .and(path("/public-portal/"))
        .and(query_param("q", "node/379"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><div class='view-empty'>No results found.</div></body></html>",
        ))
        .mount(&server)
        .await;

    let client = client();
    let config = config_for(&server);
    let ocr = StubOcr {
        answer: Some("XK4F2"),
    };
    let prompt = StubPrompt::new(None);
    let lookup = CaseLookup::new(&client, &config, Some(&ocr), &prompt, &NullDiagnostics);

    let err = lookup.run("PRMC2400654").await.unwrap_err();
    match err {
        SessionError::Structural { reason } => {
            assert!(reason.contains("no result link"));
        }
        other => panic!("expected Structural, got {:?}", other),
    }
}
