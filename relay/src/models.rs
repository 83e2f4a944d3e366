//! Request/response DTOs for the HTTP surface, mirroring the shape of the
//! original `uam.relay.models` Pydantic models field-for-field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub agent_name: String,
    pub public_key: String,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub address: String,
    pub token: String,
    pub relay: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub envelope: Value,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message_id: String,
    pub delivered: bool,
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub address: String,
    pub messages: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread_id: String,
    pub messages: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub status: &'static str,
    pub message_id: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub address: String,
    pub public_key: String,
    pub tier: &'static str,
    pub verified_domain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub address: String,
    pub online: bool,
    pub last_seen: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub relay_domain: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyDomainRequest {
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyDomainResponse {
    pub success: bool,
    pub method: Option<String>,
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookUrlRequest {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookUrlResponse {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookDeliveryRecord {
    pub id: i64,
    pub message_id: String,
    pub status: String,
    pub attempt: i32,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookDeliveryListResponse {
    pub deliveries: Vec<WebhookDeliveryRecord>,
}

#[derive(Debug, Deserialize)]
pub struct BlocklistRequest {
    pub pattern: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlocklistEntry {
    pub pattern: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlocklistListResponse {
    pub entries: Vec<BlocklistEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AllowlistRequest {
    pub pattern: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AllowlistEntry {
    pub pattern: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AllowlistListResponse {
    pub entries: Vec<AllowlistEntry>,
}

#[derive(Debug, Serialize)]
pub struct ReputationResponse {
    pub address: String,
    pub score: i32,
    pub tier: &'static str,
    pub messages_sent: i64,
    pub messages_rejected: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetReputationRequest {
    pub score: i32,
}

#[derive(Debug, Serialize)]
pub struct AuditLogEntry {
    pub actor: String,
    pub action: String,
    pub target: Option<String>,
    pub detail: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditLogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    #[serde(rename = "type")]
    pub receipt_type: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}
