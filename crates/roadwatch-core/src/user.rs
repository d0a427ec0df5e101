//! The acting user, as resolved by the external identity service.

use serde::{Deserialize, Serialize};

use crate::incident::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:     UserId,
  pub handle: String,
  pub role:   Option<Role>,
}
