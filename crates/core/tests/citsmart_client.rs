//! CITSmart login and ticket calls against a mocked portal.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

use alertbridge_core::audit::{AuditFilter, AuditLog, SqliteAuditStore};
use alertbridge_core::config::TicketingConfig;
use alertbridge_core::flow::{FlowContext, FlowOutcome, OpenFlow};
use alertbridge_core::session::AuthError;
use alertbridge_core::testing::fixtures::{close_note, problem_event};
use alertbridge_core::testing::MockEventStore;
use alertbridge_core::ticketing::{NewTicket, TicketError, TicketId};
use alertbridge_core::{
    load_config_from_str, Authenticator, CitsmartAuthenticator, CitsmartClient, CitsmartHttp,
    Session, SessionManager, TicketClient,
};

const LOGIN: &str = "/citsmart/services/login";
const PORTAL_EVENT: &str = "/citsmart/pages/smartPortal/smartPortal.event";
const DELEGATE_SAVE: &str = "/citsmart/pages/smartPortal/delegacaoTarefa.save";
const CITAJAX: &str = "/citsmart/rest/citajax/ticket/serviceRequestIncident";

fn config_for(server: &MockServer) -> TicketingConfig {
    load_config_from_str(&format!(
        r#"
[ticketing]
base_url = "{}"
user = "svc"
password = "secret"
activity_id = "2001"
destination_group_id = "71"
service_id = "1494"
contract_id = "2"

[monitoring]
api_url = "https://zabbix.example.org/api_jsonrpc.php"
api_token = "token"
"#,
        server.uri()
    ))
    .unwrap()
    .ticketing
}

fn client_for(server: &MockServer) -> CitsmartClient {
    let config = config_for(server);
    CitsmartClient::new(CitsmartHttp::new(&config).unwrap(), config)
}

fn session() -> Session {
    Session::new("JSESSIONID=abc", Utc::now())
}

fn portal_step(step: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(PORTAL_EVENT))
        .and(body_string_contains(format!("parm3={}", step)))
}

fn citajax(endpoint: &str) -> MockBuilder {
    Mock::given(method("POST")).and(path(format!("{}/{}", CITAJAX, endpoint)))
}

fn new_ticket() -> NewTicket {
    NewTicket::for_event(&problem_event("12345", "CPU high", "777"), "2001", "71")
}

fn ticket(id: &str) -> TicketId {
    TicketId::parse(id).unwrap()
}

async fn mount_creation(server: &MockServer) {
    portal_step("adicionaSolicitacaoServico")
        .and(header("cookie", "JSESSIONID=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(server)
        .await;
    portal_step("saveMeusPedidos")
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ticketNumber":"52606"}"#))
        .expect(1)
        .mount(server)
        .await;
    portal_step("openAtividade")
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<input type="hidden" name="idTarefa" value="8812"/>"#),
        )
        .mount(server)
        .await;
    citajax("restoreRequest")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 52606,
            "idSolicitacaoServico": 52606
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(DELEGATE_SAVE))
        .and(body_string_contains("idTarefa=8812"))
        .and(body_string_contains("idGrupoDestino=71"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_keeps_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_partial_json(json!({ "userName": "svc", "password": "secret" })))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "JSESSIONID=abc123; Path=/citsmart; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let auth = CitsmartAuthenticator::new(CitsmartHttp::new(&config).unwrap(), &config);
    let session = auth.authenticate().await.unwrap();
    assert_eq!(session.cookie_header(), "JSESSIONID=abc123");
}

#[tokio::test]
async fn test_login_refused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let auth = CitsmartAuthenticator::new(CitsmartHttp::new(&config).unwrap(), &config);
    assert!(matches!(
        auth.authenticate().await,
        Err(AuthError::InvalidCredentials(_))
    ));
}

#[tokio::test]
async fn test_login_without_cookie_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let auth = CitsmartAuthenticator::new(CitsmartHttp::new(&config).unwrap(), &config);
    assert!(matches!(
        auth.authenticate().await,
        Err(AuthError::Protocol(_))
    ));
}

#[tokio::test]
async fn test_create_ticket() {
    let server = MockServer::start().await;
    mount_creation(&server).await;

    let client = client_for(&server);
    let reference = client.create_ticket(&session(), &new_ticket()).await.unwrap();

    assert_eq!(reference.id, ticket("52606"));
    assert!(reference.is_open());
}

#[tokio::test]
async fn test_create_survives_failed_delegation() {
    let server = MockServer::start().await;
    portal_step("adicionaSolicitacaoServico")
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    portal_step("saveMeusPedidos")
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<h2 class="text-citsmart">52607</h2>"#,
        ))
        .mount(&server)
        .await;
    // Unmatched requests answer 404, so routing steps fail.

    let client = client_for(&server);
    let reference = client.create_ticket(&session(), &new_ticket()).await.unwrap();
    assert_eq!(reference.id, ticket("52607"));
}

#[tokio::test]
async fn test_create_redirect_is_unauthorized() {
    let server = MockServer::start().await;
    portal_step("adicionaSolicitacaoServico")
        .respond_with(
            ResponseTemplate::new(302).append_header("location", "/citsmart/pages/login/login.load"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.create_ticket(&session(), &new_ticket()).await;
    assert!(matches!(result, Err(TicketError::Unauthorized(_))));
}

#[tokio::test]
async fn test_create_server_error_is_transient() {
    let server = MockServer::start().await;
    portal_step("adicionaSolicitacaoServico")
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    portal_step("saveMeusPedidos")
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.create_ticket(&session(), &new_ticket()).await;
    assert!(matches!(result, Err(TicketError::Transient(_))));
}

#[tokio::test]
async fn test_create_without_ticket_number_is_rejected() {
    let server = MockServer::start().await;
    portal_step("adicionaSolicitacaoServico")
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    portal_step("saveMeusPedidos")
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>erro</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.create_ticket(&session(), &new_ticket()).await;
    assert!(matches!(result, Err(TicketError::Rejected(_))));
}

#[tokio::test]
async fn test_close_ticket_saves_resolution_twice() {
    let server = MockServer::start().await;
    citajax("restoreRequest")
        .and(body_partial_json(json!({ "object": { "idSolicitacaoServico": 52606 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 52606,
            "idItemTrabalho": 8812,
            "idStatus": 1,
            "dtLastModification": "2026-10-19 10:00:00"
        })))
        .expect(2)
        .mount(&server)
        .await;
    citajax("groupsForCapture")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    citajax("capturarTarefa")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    citajax("validateConcurrentAccess")
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    citajax("saveOrUpdate")
        .and(body_partial_json(json!({
            "object": {
                "id": 52606,
                "idItemTrabalho": 8812,
                "idStatus": 4,
                "solucaoResposta": close_note().solution_html
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .close_ticket(&session(), &ticket("52606"), &close_note())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_close_already_resolved_ticket_is_noop() {
    let server = MockServer::start().await;
    citajax("restoreRequest")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 52606,
            "idItemTrabalho": 8812,
            "idStatus": 4
        })))
        .expect(1)
        .mount(&server)
        .await;
    citajax("saveOrUpdate")
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .close_ticket(&session(), &ticket("52606"), &close_note())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_close_missing_ticket_is_not_found() {
    let server = MockServer::start().await;
    citajax("restoreRequest")
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .close_ticket(&session(), &ticket("52606"), &close_note())
        .await;
    assert!(matches!(result, Err(TicketError::NotFound(_))));
}

#[tokio::test]
async fn test_close_empty_dto_is_not_found() {
    let server = MockServer::start().await;
    citajax("restoreRequest")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": null })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .close_ticket(&session(), &ticket("52606"), &close_note())
        .await;
    assert!(matches!(result, Err(TicketError::NotFound(_))));
}

#[tokio::test]
async fn test_open_flow_logs_in_again_after_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(200).append_header("set-cookie", "JSESSIONID=abc; Path=/"),
        )
        .expect(2)
        .mount(&server)
        .await;
    // The first portal call finds the session expired.
    portal_step("adicionaSolicitacaoServico")
        .respond_with(ResponseTemplate::new(302))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_creation(&server).await;

    let config = config_for(&server);
    let http = CitsmartHttp::new(&config).unwrap();
    let sessions = Arc::new(SessionManager::new(
        Arc::new(CitsmartAuthenticator::new(http.clone(), &config)),
        Duration::minutes(30),
    ));
    let store = Arc::new(MockEventStore::new());
    let audit = AuditLog::new(Arc::new(SqliteAuditStore::in_memory().unwrap()));
    let ctx = FlowContext::new(
        store.clone(),
        Arc::new(CitsmartClient::new(http, config.clone())),
        sessions,
        audit.clone(),
    );

    let problem = problem_event("12345", "CPU high", "777");
    store.insert_event(problem.clone()).await;
    let outcome = OpenFlow::new(ctx, &config)
        .handle_problem(&problem)
        .await
        .unwrap();

    assert_eq!(outcome, FlowOutcome::Opened(ticket("52606")));
    assert_eq!(
        store.messages("12345").await,
        vec!["CITSmartTicketID=52606 | CPU high"]
    );
    let records = audit.query(&AuditFilter::new()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].summary(), "OPEN,SUCCESS,12345,52606");
}
