use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use snafu::ResultExt;
use uuid::Uuid;

use super::error::{InvalidIdSnafu, StorageError, StorageResult};

macro_rules! define_storage_id {
    ($name:ident, $id_type:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn parse(raw: &str) -> StorageResult<Self> {
                let parsed = Uuid::parse_str(raw.trim()).context(InvalidIdSnafu {
                    stage: "parse-storage-id",
                    id_type: $id_type,
                    raw: raw.to_string(),
                })?;
                Ok(Self(parsed))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = StorageError;

            fn from_str(raw: &str) -> StorageResult<Self> {
                Self::parse(raw)
            }
        }

        // Records cross the tool wire as JSON, where ids travel as plain strings.
        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.collect_str(self)
            }
        }
    };
}

define_storage_id!(UserId, "user-id");
define_storage_id!(JobId, "job-id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_and_serialize_as_strings() {
        let raw = "01903c2a-0000-7000-8000-000000000001";
        let parsed = match JobId::parse(raw) {
            Ok(id) => id,
            Err(error) => panic!("seed id should parse: {error}"),
        };

        assert_eq!(parsed.to_string(), raw);
        assert_eq!(
            serde_json::to_value(parsed).ok(),
            Some(serde_json::Value::from(raw))
        );
    }

    #[test]
    fn malformed_id_reports_its_type() {
        let result = UserId::parse("not-a-uuid");

        assert!(matches!(
            result,
            Err(StorageError::InvalidId {
                id_type: "user-id",
                ..
            })
        ));
    }
}
