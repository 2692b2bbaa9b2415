//! Shared domain enumerations aligned with persisted storage values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PageStatus {
    Draft,
    Published,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Published => "published",
        }
    }
}

impl TryFrom<&str> for PageStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(PageStatus::Draft),
            "published" => Ok(PageStatus::Published),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [PageStatus::Draft, PageStatus::Published] {
            assert_eq!(PageStatus::try_from(status.as_str()), Ok(status));
        }
        assert!(PageStatus::try_from("archived").is_err());
    }
}
