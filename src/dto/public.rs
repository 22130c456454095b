use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::session::SessionPhase;

/// Marker used to reject unexpected query strings on read-only routes.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NoQuery {}

/// Categories and subject offered to the presenter.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoriesResponse {
    pub subject: String,
    pub categories: Vec<String>,
}

/// Lookup result for a room code typed on a controller.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatusResponse {
    pub room_code: String,
    pub state: SessionPhase,
}

/// Value of one usage counter.
#[derive(Debug, Serialize, ToSchema)]
pub struct CounterSummary {
    pub name: String,
    pub value: i64,
}

/// Usage counters.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub counters: Vec<CounterSummary>,
}
