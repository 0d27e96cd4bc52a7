use rusqlite::types::Type;
use rusqlite::{Error, Row};

/// Extension trait for optional query results.
pub(super) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, Error>;
}

impl<T> OptionalExt<T> for Result<T, Error> {
    fn optional(self) -> Result<Option<T>, Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Read a TEXT column holding one of our string-tagged enums.
pub(super) fn text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: for<'s> TryFrom<&'s str, Error = String>,
{
    let raw: String = row.get(idx)?;
    T::try_from(raw.as_str())
        .map_err(|e| Error::FromSqlConversionFailure(idx, Type::Text, Box::from(e)))
}

/// Like [`text_enum`], for nullable columns.
pub(super) fn optional_text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: for<'s> TryFrom<&'s str, Error = String>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        T::try_from(s.as_str())
            .map_err(|e| Error::FromSqlConversionFailure(idx, Type::Text, Box::from(e)))
    })
    .transpose()
}

/// Read an INTEGER column that is stored from a `u64` quantity.
pub(super) fn unsigned(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|_| Error::IntegralValueOutOfRange(idx, raw))
}
