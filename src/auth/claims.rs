use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>, // user ID, string form
    pub exp: usize,  // expires at (unix timestamp)
}

impl Claims {
    /// The only identity fact trusted from a token. Still has to be resolved
    /// against the user store before use.
    pub fn user_uuid(&self) -> Option<Uuid> {
        self.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok())
    }
}
