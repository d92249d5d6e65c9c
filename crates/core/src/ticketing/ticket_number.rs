//! Extraction of the ticket number from the portal's "save request" response.
//!
//! Depending on version and locale the portal answers with JSON or with an
//! HTML/JS fragment, so the number is searched for in a fixed order.

use regex_lite::Regex;
use serde_json::Value;

use super::TicketId;

/// JSON fields that may carry the number, most specific first.
const JSON_FIELDS: &[&str] = &["ticketNumber", "ticket", "number", "id"];

/// Text patterns, most specific first. The last one catches any run of five or
/// more digits.
const TEXT_PATTERNS: &[&str] = &[
    r"(?i)class=\\#33#text-citsmart\\#33#\s*>\s*(\d+)\s*</h[23]>",
    r#"(?i)<h2[^>]*class="[^"]*text-citsmart[^"]*"[^>]*>\s*(\d+)\s*</h2>"#,
    r"(?i)ticket[:\s]*(\d+)",
    r"(?i)ticketNumber[:\s]*(\d+)",
    r"(?i)number[:\s]*(\d+)",
    r"(?i)id[:\s]*(\d+)",
    r"(\d{5,})",
];

/// Find the ticket number in a response body.
pub fn extract_ticket_number(body: &str) -> Option<TicketId> {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => from_json(&json),
        Err(_) => from_text(body),
    }
}

fn from_json(json: &Value) -> Option<TicketId> {
    let object = json.as_object()?;
    JSON_FIELDS.iter().find_map(|field| match object.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => TicketId::parse(s),
        Value::Number(n) if n.as_u64().unwrap_or(0) > 0 => TicketId::parse(&n.to_string()),
        _ => None,
    })
}

fn from_text(body: &str) -> Option<TicketId> {
    TEXT_PATTERNS.iter().find_map(|pattern| {
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(body)?;
        TicketId::parse(caps.get(1)?.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_ticket_number_field() {
        let id = extract_ticket_number(r#"{"ticketNumber": 52606, "id": 1}"#).unwrap();
        assert_eq!(id.as_str(), "52606");
    }

    #[test]
    fn test_json_falls_through_empty_fields() {
        let id = extract_ticket_number(r#"{"ticketNumber": "", "ticket": null, "number": "777"}"#)
            .unwrap();
        assert_eq!(id.as_str(), "777");
    }

    #[test]
    fn test_json_without_number() {
        assert!(extract_ticket_number(r#"{"status": "ok"}"#).is_none());
        assert!(extract_ticket_number(r#"["52606"]"#).is_none());
    }

    #[test]
    fn test_html_heading() {
        let body = r#"<div><span class="label-numero">Ticket</span><h2 class="text-citsmart big"> 52606 </h2></div>"#;
        assert_eq!(extract_ticket_number(body).unwrap().as_str(), "52606");
    }

    #[test]
    fn test_escaped_js_fragment() {
        let body = r"document.write('<h3 class=\#33#text-citsmart\#33#>61234</h3>')";
        assert_eq!(extract_ticket_number(body).unwrap().as_str(), "61234");
    }

    #[test]
    fn test_plain_text_ticket_label() {
        assert_eq!(
            extract_ticket_number("Solicitacao registrada. Ticket: 4321").unwrap().as_str(),
            "4321"
        );
    }

    #[test]
    fn test_long_digit_run_fallback() {
        assert_eq!(
            extract_ticket_number("<p>Registro 98765 criado</p>").unwrap().as_str(),
            "98765"
        );
    }

    #[test]
    fn test_nothing_found() {
        assert!(extract_ticket_number("<p>Erro ao registrar</p>").is_none());
    }
}
