use core::fmt;

use serde::{Deserialize, Serialize};

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

server_id!(
    /// Server-side identifier of one uploaded spreadsheet.
    SpreadsheetId
);
server_id!(
    /// Identifier of the analysis job whose results are being visualized.
    JobId
);
server_id!(
    /// Identifier of the file a spreadsheet was parsed from.
    FileId
);

/// Join ids into the comma-separated form used in query strings.
pub fn join_ids<I, T>(ids: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_transparent_in_json() {
        let id = SpreadsheetId(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: SpreadsheetId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn join_ids_uses_commas() {
        assert_eq!(join_ids([SpreadsheetId(1), SpreadsheetId(7)]), "1,7");
        assert_eq!(join_ids(Vec::<usize>::new()), "");
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", JobId(3)), "JobId(3)");
        assert_eq!(format!("{}", FileId(9)), "9");
    }
}
