//! In-app notification model.

use serde::{Deserialize, Serialize};

use super::common::flag;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}
