use serde::{Deserialize, Serialize};

/// The `{"success": true, ...}` envelope of every JSON API response.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub result: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NewConversationResponse {
    pub conversation_id: String,
    pub session_id: String,
    pub title: String,
}

/// One row of the conversation sidebar.
#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationItem {
    pub id: String,
    pub title: String,
    pub last_message: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
    pub is_resolved: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationItem>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResolveResponse {
    pub qa_log_cd: i64,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryMessage {
    pub turn_no: i64,
    pub question: String,
    pub answer: String,
    pub timestamp: String,
    pub is_resolved: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<HistoryMessage>,
    pub total_turns: usize,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub user_cd: i64,
    pub email: String,
    pub name: String,
}

/// UI texts for the chat page.
#[derive(Serialize, Deserialize, Debug)]
pub struct SettingsResponse {
    pub header_title: Option<String>,
    pub welcome_message: Option<String>,
    pub question_default: Option<String>,
    pub app_env: String,
    pub login_mode: u8,
}

/// Query string of the login error page.
#[derive(Deserialize, Debug, Default)]
pub struct LoginErrorParams {
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Query string of the OAuth redirect back from the identity provider.
#[derive(Deserialize, Debug, Default)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}
