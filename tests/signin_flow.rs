use anyhow::Result;
use raphacure::{
    backend::{AuthApi, BackendClient, BackendConfig},
    browser::{CookieJar, MemoryCookieJar, MemoryStorage, RecordingFrame, RecordingNavigator},
    deeplink::{DeepLinkOrchestrator, DeepLinkView},
    routes::{return_path_from_query, RouteTable},
    session::{store::SESSION_COOKIE_NAME, SessionContext, SessionStore},
    signin::{OtpFlow, OtpPhase},
};
use secrecy::SecretString;
use serde_json::json;
use std::{net::TcpListener, sync::Arc};
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

struct Browser {
    cookies: Arc<MemoryCookieJar>,
    navigator: Arc<RecordingNavigator>,
    session: Arc<SessionContext>,
}

async fn browser() -> Browser {
    let cookies = Arc::new(MemoryCookieJar::new());
    let store = SessionStore::new(Arc::new(MemoryStorage::new()), cookies.clone());
    let session = Arc::new(SessionContext::new(store));
    session.init().await;
    Browser {
        cookies,
        navigator: Arc::new(RecordingNavigator::new()),
        session,
    }
}

fn backend(server: &MockServer) -> Result<Arc<dyn AuthApi>> {
    let config = BackendConfig::new(
        Url::parse(&server.uri())?,
        SecretString::from("site-key".to_string()),
    );
    Ok(Arc::new(BackendClient::new(config)?))
}

#[tokio::test]
async fn phone_otp_sign_in_sets_cookie_and_returns_to_path() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/otp/request"))
        .and(query_param("marketplace_name", "raphacure"))
        .and(header("x-api-key", "site-key"))
        .and(body_json(json!({"phone": "9876543210", "source": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"isNewUser": false}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/otp/verify"))
        .and(body_json(json!({"phone": "9876543210", "otp": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"token": "tok-42", "id": "u-7", "first_name": "Asha"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let browser = browser().await;
    let flow = OtpFlow::new(
        backend(&server)?,
        browser.session.clone(),
        browser.navigator.clone(),
        return_path_from_query("redirect=%2Fdashboard"),
    );

    flow.set_input("9876543210");
    flow.set_terms_accepted(true);
    assert!(flow.can_submit());

    flow.request_otp().await?;
    assert_eq!(flow.view().phase, OtpPhase::Sent);
    assert_eq!(flow.view().countdown, 60);

    let session = flow.enter_code("123456").await?;
    assert_eq!(session.map(|s| s.token), Some("tok-42".to_string()));
    assert_eq!(flow.view().phase, OtpPhase::Authenticated);

    assert_eq!(
        browser.cookies.read(SESSION_COOKIE_NAME),
        Some("tok-42".to_string())
    );
    assert_eq!(
        browser.session.user().and_then(|user| user.first_name()),
        Some("Asha".to_string())
    );
    assert_eq!(browser.navigator.visits(), ["/dashboard"]);

    // the edge host now lets the browser through
    assert_eq!(
        RouteTable::default().decide("/dashboard", browser.session.is_authenticated()),
        raphacure::routes::Decision::Allow
    );
    Ok(())
}

#[tokio::test]
async fn rejected_code_keeps_user_on_sign_in() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/otp/request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/otp/verify"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "OTP expired"
        })))
        .mount(&server)
        .await;

    let browser = browser().await;
    let flow = OtpFlow::new(
        backend(&server)?,
        browser.session.clone(),
        browser.navigator.clone(),
        "/site",
    );

    flow.set_input("Asha@Example.com");
    flow.request_otp().await?;
    assert!(flow.enter_code("000000").await.is_err());

    let view = flow.view();
    assert_eq!(view.phase, OtpPhase::Sent);
    assert!(view.code_error.is_some());
    assert!(!browser.session.is_authenticated());
    assert_eq!(browser.cookies.read(SESSION_COOKIE_NAME), None);
    assert!(browser.navigator.visits().is_empty());
    Ok(())
}

#[tokio::test]
async fn deep_link_loads_minted_sso_url_in_frame() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/auth/signinasuserwithjwt"))
        .and(header("authorization", "Bearer jwt-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"url": "https://app.raphacure.com/sso?code=one-time"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let browser = browser().await;
    let user = serde_json::from_value(json!({"accessToken": "jwt-9"}))?;
    browser.session.login("tok-1", user)?;

    let frame = Arc::new(RecordingFrame::new());
    let orchestrator = DeepLinkOrchestrator::new(
        backend(&server)?,
        browser.session.clone(),
        browser.navigator.clone(),
        frame.clone(),
        RouteTable::default(),
    );

    orchestrator.start("/consultation/42").await?;

    let sso = Url::parse("https://app.raphacure.com/sso?code=one-time")?;
    assert_eq!(frame.loads(), [sso.clone()]);
    assert_eq!(
        orchestrator.view(),
        DeepLinkView::Frame {
            url: sso,
            loaded: false
        }
    );
    assert!(browser.navigator.visits().is_empty());
    Ok(())
}
