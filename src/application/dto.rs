use serde::{Deserialize, Serialize};

use crate::domain::guidance::GuidanceState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub running: bool,
    #[serde(default)]
    pub guidance: Option<GuidanceState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}
