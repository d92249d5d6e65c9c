//! CITSmart ticket client.
//!
//! Creation goes through the self-service portal (`smartPortal.event`), the
//! same requests the web UI issues; closure goes through the `citajax` REST
//! endpoints of the service request screen.

use async_trait::async_trait;
use chrono::Utc;
use regex_lite::Regex;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::{CloseConfig, TicketingConfig};
use crate::session::Session;

use super::ticket_number::extract_ticket_number;
use super::{
    CitsmartHttp, CloseNote, NewTicket, TicketClient, TicketError, TicketId, TicketReference,
};

const PORTAL_EVENT: &str = "/citsmart/pages/smartPortal/smartPortal.event";
const DELEGATE_SAVE: &str = "/citsmart/pages/smartPortal/delegacaoTarefa.save";
const RESTORE_REQUEST: &str = "/citsmart/rest/citajax/ticket/serviceRequestIncident/restoreRequest";
const GROUPS_FOR_CAPTURE: &str =
    "/citsmart/rest/citajax/ticket/serviceRequestIncident/groupsForCapture";
const CAPTURE_TASK: &str = "/citsmart/rest/citajax/ticket/serviceRequestIncident/capturarTarefa";
const VALIDATE_ACCESS: &str =
    "/citsmart/rest/citajax/ticket/serviceRequestIncident/validateConcurrentAccess";
const SAVE_OR_UPDATE: &str = "/citsmart/rest/citajax/ticket/serviceRequestIncident/saveOrUpdate";

/// `realUrl` the citajax endpoints expect in every payload.
const REAL_URL: &str = "/citsmart/serviceRequestIncident/serviceRequestIncident.load";

const DEFAULT_DELEGATION_NOTE: &str = "Delegado automaticamente via integração";

/// CITSmart implementation of [`TicketClient`].
pub struct CitsmartClient {
    http: CitsmartHttp,
    config: TicketingConfig,
}

impl CitsmartClient {
    pub fn new(http: CitsmartHttp, config: TicketingConfig) -> Self {
        Self { http, config }
    }

    fn close_config(&self) -> &CloseConfig {
        &self.config.close
    }

    /// Send a request, mapping transport failures.
    async fn send(request: RequestBuilder, step: &str) -> Result<Response, TicketError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                TicketError::Transient(format!("{}: timed out", step))
            } else if e.is_connect() {
                TicketError::Transient(format!("{}: connection failed: {}", step, e))
            } else {
                TicketError::Transient(format!("{}: {}", step, e))
            }
        })
    }

    /// Map a non-success status to an error. A redirect means the portal sent
    /// us to its login page.
    fn check(response: Response, step: &str) -> Result<Response, TicketError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(status_error(status, step))
    }

    async fn read_json(response: Response, step: &str) -> Result<Value, TicketError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| TicketError::Rejected(format!("{}: response is not JSON: {}", step, e)))
    }

    async fn portal_post(
        &self,
        session: &Session,
        form: &[(&str, String)],
        step: &str,
    ) -> Result<Response, TicketError> {
        let request = self.http.post_form(PORTAL_EVENT, form, session);
        let response = Self::send(request, step).await?;
        Self::check(response, step)
    }

    async fn add_service_request(
        &self,
        session: &Session,
        ticket: &NewTicket,
    ) -> Result<(), TicketError> {
        let c = &self.config;
        let form = vec![
            ("uuid", c.portal_item_uuid.clone()),
            ("idPortfolio", c.portfolio_id.clone()),
            ("idServico", c.service_id.clone()),
            ("idAtividade", ticket.activity_id.clone()),
            ("nomeAtividade", c.activity_name.clone()),
            ("mostrarDescPortal", "S".to_string()),
            ("idQuestionario", String::new()),
            ("questionarioObrigatorio", "false".to_string()),
            ("questionarioRespondido", "false".to_string()),
            ("requestStatus", String::new()),
            ("idManager", "0".to_string()),
            ("serializedBuilderObjects", "{}".to_string()),
            ("idsItemConfiguracaoSelecionados", String::new()),
            ("idContrato", c.contract_id.clone()),
            ("requestTitle", ticket.title.clone()),
            ("solicitacaoObservacao", ticket.description.clone()),
            ("nomeDoManager", String::new()),
            ("method", "execute".to_string()),
            ("parmCount", String::new()),
            ("parm1", "smartPortal".to_string()),
            ("parm2", String::new()),
            ("parm3", "adicionaSolicitacaoServico".to_string()),
            ("nocache", nocache()),
        ];
        self.portal_post(session, &form, "adicionaSolicitacaoServico")
            .await
            .map(|_| ())
    }

    async fn save_requests(&self, session: &Session) -> Result<TicketId, TicketError> {
        let form = vec![
            ("uuid", String::new()),
            ("requestStatus", String::new()),
            ("requestMessage", String::new()),
            ("removeLastTicketWhenErrorOccurs", "true".to_string()),
            ("method", "execute".to_string()),
            ("parmCount", String::new()),
            ("parm1", "smartPortal".to_string()),
            ("parm2", String::new()),
            ("parm3", "saveMeusPedidos".to_string()),
            ("nocache", nocache()),
        ];
        let response = self.portal_post(session, &form, "saveMeusPedidos").await?;
        let body = response
            .text()
            .await
            .map_err(|e| TicketError::Transient(format!("saveMeusPedidos: {}", e)))?;

        extract_ticket_number(&body).ok_or_else(|| {
            TicketError::Rejected("saveMeusPedidos: no ticket number in response".to_string())
        })
    }

    /// Open the activity screen; its body may carry the task id.
    async fn open_activity(&self, session: &Session) -> Result<String, TicketError> {
        let c = &self.config;
        let form = vec![
            ("idPortfolio", c.portfolio_id.clone()),
            ("idServico", c.service_id.clone()),
            ("idAtividade", c.activity_id.clone()),
            ("tipoPortfolio", String::new()),
            ("nomePortfolio", c.portfolio_name.clone()),
            ("nomeServicoNegocio", c.service_name.clone()),
            ("nomeAtividade", c.activity_name.clone()),
            ("servicosAdicionados", String::new()),
            ("method", "execute".to_string()),
            ("parmCount", String::new()),
            ("parm1", "smartPortal".to_string()),
            ("parm2", String::new()),
            ("parm3", "openAtividade".to_string()),
            ("nocache", nocache()),
        ];
        let response = self.portal_post(session, &form, "openAtividade").await?;
        response
            .text()
            .await
            .map_err(|e| TicketError::Transient(format!("openAtividade: {}", e)))
    }

    /// Delegate the new ticket's task to the destination group.
    async fn delegate(
        &self,
        session: &Session,
        ticket_id: &TicketId,
        ticket: &NewTicket,
        activity_page: Option<&str>,
    ) -> Result<(), TicketError> {
        let mut task_id = String::new();
        let mut request_id = ticket_id.to_string();

        match self.restore_request(session, ticket_id).await {
            Ok(dto) => {
                if let Some(id) = dto.get("idItemTrabalho").and_then(scalar_string) {
                    task_id = id;
                }
                if let Some(id) = dto
                    .get("idSolicitacaoServico")
                    .and_then(scalar_string)
                    .or_else(|| dto.get("id").and_then(scalar_string))
                {
                    request_id = id;
                }
            }
            Err(e) => debug!(ticket_id = %ticket_id, "restoreRequest before delegation failed: {}", e),
        }

        if task_id.is_empty() {
            if let Some(id) = activity_page.and_then(extract_task_id) {
                task_id = id;
            }
        }

        let justification = if ticket.description.is_empty() {
            DEFAULT_DELEGATION_NOTE.to_string()
        } else {
            ticket.description.clone()
        };
        let form = vec![
            ("idSolicitacaoServico", request_id),
            ("idTarefa", task_id),
            ("acaoFluxo", "D".to_string()),
            ("idUsuarioDestino", String::new()),
            ("txtFiltro", String::new()),
            ("acUsuario", String::new()),
            ("idGrupoDestino", ticket.destination_group_id.clone()),
            ("delegacaoJustificativa", justification),
            ("nocache", nocache()),
        ];

        let request = self.http.post_form(DELEGATE_SAVE, &form, session);
        let response = Self::send(request, "delegacaoTarefa").await?;
        Self::check(response, "delegacaoTarefa").map(|_| ())
    }

    /// Load the ticket DTO. A 404 or a body without `id` means the ticket
    /// does not exist.
    async fn restore_request(
        &self,
        session: &Session,
        ticket_id: &TicketId,
    ) -> Result<Map<String, Value>, TicketError> {
        let payload = json!({
            "object": { "idSolicitacaoServico": json_id(ticket_id), "view": false },
            "realUrl": REAL_URL,
        });
        let request = self.http.post_json(RESTORE_REQUEST, &payload, Some(session));
        let response = Self::send(request, "restoreRequest").await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(TicketError::NotFound(ticket_id.to_string()));
        }
        let response = Self::check(response, "restoreRequest")?;
        let dto = Self::read_json(response, "restoreRequest").await?;

        match dto {
            Value::Object(map) if map.get("id").map_or(false, |id| !id.is_null()) => Ok(map),
            _ => Err(TicketError::NotFound(ticket_id.to_string())),
        }
    }

    async fn citajax(
        &self,
        session: &Session,
        path: &str,
        object: Value,
        step: &str,
    ) -> Result<Response, TicketError> {
        let payload = json!({ "object": object, "realUrl": REAL_URL });
        let request = self.http.post_json(path, &payload, Some(session));
        let response = Self::send(request, step).await?;
        Self::check(response, step)
    }

    fn apply_resolution(&self, dto: &mut Map<String, Value>, note: &CloseNote) {
        let close = self.close_config();
        dto.insert("idStatus".into(), json!(close.status_id));
        dto.insert("acaoFluxo".into(), json!(close.flow_action));
        dto.insert("idCategoriaSolucao".into(), json!(close.solution_category_id));
        dto.insert("idCausaIncidente".into(), json!(close.incident_cause_id));
        dto.insert("solucaoResposta".into(), json!(note.solution_html));
        dto.insert("detalhamentoCausa".into(), json!(note.cause_html));
        dto.insert("view".into(), json!(false));
        dto.insert("commentMode".into(), json!(false));
        dto.insert("dtLastModification".into(), json!(now_dt()));
        dto.entry("original").or_insert_with(|| json!({}));
    }

    fn is_resolved(&self, dto: &Map<String, Value>) -> bool {
        dto.get("idStatus")
            .and_then(scalar_string)
            .map_or(false, |s| s == self.close_config().status_id.to_string())
    }

    /// One restore + resolve + save round.
    async fn save_resolution(
        &self,
        session: &Session,
        ticket_id: &TicketId,
        mut dto: Map<String, Value>,
        item_id: &Value,
        note: &CloseNote,
    ) -> Result<(), TicketError> {
        dto.insert("id".into(), json_id(ticket_id));
        dto.insert("idItemTrabalho".into(), item_id.clone());
        self.apply_resolution(&mut dto, note);
        self.citajax(session, SAVE_OR_UPDATE, Value::Object(dto), "saveOrUpdate")
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl TicketClient for CitsmartClient {
    fn name(&self) -> &str {
        "citsmart"
    }

    async fn create_ticket(
        &self,
        session: &Session,
        ticket: &NewTicket,
    ) -> Result<TicketReference, TicketError> {
        self.add_service_request(session, ticket).await?;
        let ticket_id = self.save_requests(session).await?;
        info!(ticket_id = %ticket_id, "Ticket created");

        // The ticket exists from here on; later steps only route it.
        let activity_page = match self.open_activity(session).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(ticket_id = %ticket_id, "Failed to open activity: {}", e);
                None
            }
        };
        if let Err(e) = self
            .delegate(session, &ticket_id, ticket, activity_page.as_deref())
            .await
        {
            warn!(
                ticket_id = %ticket_id,
                group = %ticket.destination_group_id,
                "Failed to delegate ticket: {}",
                e
            );
        }

        Ok(TicketReference::open(ticket_id))
    }

    async fn close_ticket(
        &self,
        session: &Session,
        ticket_id: &TicketId,
        note: &CloseNote,
    ) -> Result<(), TicketError> {
        let dto = self.restore_request(session, ticket_id).await?;
        if self.is_resolved(&dto) {
            info!(ticket_id = %ticket_id, "Ticket already resolved on the platform");
            return Ok(());
        }

        let item_id = dto
            .get("idItemTrabalho")
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                TicketError::Rejected("restoreRequest: no idItemTrabalho".to_string())
            })?;

        self.citajax(
            session,
            GROUPS_FOR_CAPTURE,
            json!({ "idItemTrabalho": item_id.clone() }),
            "groupsForCapture",
        )
        .await?;

        let mut captured = dto.clone();
        captured.insert("id".into(), json_id(ticket_id));
        captured.insert("idItemTrabalho".into(), item_id.clone());
        let capture = self
            .citajax(session, CAPTURE_TASK, Value::Object(captured), "capturarTarefa")
            .await?;
        let capture: Value = capture.json().await.unwrap_or_else(|_| json!({}));

        let last_modification = capture
            .get("dtLastModification")
            .or_else(|| dto.get("dtLastModification"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(now_dt);
        let mut validate = json!({
            "id": json_id(ticket_id),
            "idItemTrabalho": item_id.clone(),
            "dtLastModification": last_modification,
        });
        if let Some(owner) = dto.get("idUsuarioResponsavelAtual").filter(|v| !v.is_null()) {
            validate["idUsuarioResponsavelAtual"] = owner.clone();
        }
        if let Err(e) = self
            .citajax(session, VALIDATE_ACCESS, validate, "validateConcurrentAccess")
            .await
        {
            debug!(ticket_id = %ticket_id, "validateConcurrentAccess failed: {}", e);
        }

        self.save_resolution(session, ticket_id, dto, &item_id, note)
            .await?;
        debug!(ticket_id = %ticket_id, "First saveOrUpdate done");

        // The workflow advances one step per save, so the resolution is
        // applied again on the refreshed DTO.
        let refreshed = self.restore_request(session, ticket_id).await?;
        let item_id = refreshed
            .get("idItemTrabalho")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or(item_id);
        self.save_resolution(session, ticket_id, refreshed, &item_id, note)
            .await?;

        info!(ticket_id = %ticket_id, "Ticket closed");
        Ok(())
    }
}

fn status_error(status: StatusCode, step: &str) -> TicketError {
    let message = format!("{}: HTTP {}", step, status);
    match status.as_u16() {
        401 | 403 => TicketError::Unauthorized(message),
        300..=399 => TicketError::Unauthorized(message),
        408 | 429 | 500..=599 => TicketError::Transient(message),
        _ => TicketError::Rejected(message),
    }
}

/// Numeric ids are sent as JSON numbers, anything else as a string.
fn json_id(ticket_id: &TicketId) -> Value {
    match ticket_id.as_str().parse::<u64>() {
        Ok(n) => json!(n),
        Err(_) => json!(ticket_id.as_str()),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Find the task id in the activity page HTML/JS.
fn extract_task_id(page: &str) -> Option<String> {
    [
        r#"name="idTarefa"\s*value="(\d+)""#,
        r#""idTarefa"\s*:\s*"?(\d+)"?"#,
        r"idTarefa=(\d+)",
    ]
    .iter()
    .find_map(|pattern| {
        let re = Regex::new(pattern).ok()?;
        Some(re.captures(page)?.get(1)?.as_str().to_string())
    })
}

fn nocache() -> String {
    Utc::now()
        .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
        .to_string()
}

fn now_dt() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
