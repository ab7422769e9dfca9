use serde::{Deserialize, Serialize};

use crate::models::NewMessage;

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub user_id: String,
}

// -- Messages --

/// Body of a single send. The recipient comes from the path and the
/// timestamp from the server clock.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender: String,
    pub payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchSendRequest {
    pub messages: Vec<NewMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchSendResponse {
    pub stored: usize,
}
