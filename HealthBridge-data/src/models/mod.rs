// Storage models shared by the repositories and the domain layer

/// Implements string conversion and SQLite column mapping for a
/// fieldless enum stored as TEXT.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Wire and storage representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Every variant, in declaration order
            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("invalid {} value '{}'", stringify!($name), other)),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| rusqlite::types::FromSqlError::Other(e.into()))
            }
        }
    };
}

pub mod appointment;
pub mod audit;
pub mod billing;
pub mod consultation;
pub mod learning;
pub mod policy;
pub mod stats;
pub mod survey;
pub mod sync;
pub mod user;
pub mod wellness;

pub use appointment::*;
pub use audit::*;
pub use billing::*;
pub use consultation::*;
pub use learning::*;
pub use policy::*;
pub use stats::*;
pub use survey::*;
pub use sync::*;
pub use user::*;
pub use wellness::*;
