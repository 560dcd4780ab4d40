mod list;
mod record;
mod related;
mod transfer;

pub use list::create;
pub use list::list;
pub use record::delete as record_delete;
pub use record::get as record_get;
pub use record::patch as record_patch;
pub use related::assignments;
pub use related::courses;
pub use related::schedule;
pub use related::stats;
pub use transfer::export;
pub use transfer::import;

use uuid::Uuid;

use crate::error::ApiError;
use crate::store::STUDENT_NOT_FOUND;

/// Path ids arrive as opaque strings; anything that is not a valid id
/// simply names no student, so it maps to 404 rather than 400.
pub(crate) fn parse_student_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(STUDENT_NOT_FOUND))
}
