use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use crate::todos::repo::Priority;

/// Request body for creating or updating a todo. Fields stay optional so the
/// service owns the validation instead of the JSON layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoPayload {
    pub name: Option<String>,
    pub deadline: Option<Date>,
    pub priority: Option<Priority>,
    pub user_id: Option<Uuid>,
}
