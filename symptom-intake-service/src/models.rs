use serde::{Deserialize, Serialize};
use symptom_flow::{ConversationState, ConversationTurn, SymptomInfo};

use crate::history::ChatRecord;

pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub turn: ConversationTurn,
    pub session_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MedicalInfoResponse {
    pub info: Option<SymptomInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub state: ConversationState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatRecord>,
}
