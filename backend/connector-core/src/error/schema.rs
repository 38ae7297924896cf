use crate::schema::TypeCategory;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SchemaError {
    /// A lookup named a type or field the schema does not contain, in a
    /// query that must fail loudly rather than answer `false`.
    #[error("Unknown {category} reference '{key}' {location}")]
    UnknownType {
        category: TypeCategory,
        key: String,
        location: ErrorLocation,
    },

    /// The schema payload from the host app did not have the expected shape.
    #[error("Invalid schema payload: {message} {location}")]
    InvalidPayload {
        message: String,
        location: ErrorLocation,
    },
}
