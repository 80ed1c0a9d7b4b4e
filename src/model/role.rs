use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Faculty = 2,
    Student = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Faculty),
            3 => Some(Role::Student),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn id_and_name_agree() {
        for role in [Role::Admin, Role::Faculty, Role::Student] {
            assert_eq!(Role::from_id(role.id()), Some(role));
            assert_eq!(Role::from_str(role.as_ref()).unwrap(), role);
        }
        assert_eq!(Role::from_id(9), None);
        assert_eq!(Role::Faculty.to_string(), "faculty");
    }
}
