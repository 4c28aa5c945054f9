//! Passenger request model and input validators.

mod types;
mod validate;

pub use types::{phone_parts, IdentityMode, LoginKind, PassengerRequest};
pub use validate::{
    normalize_time, validate_date, validate_email, validate_password, validate_phone,
    validate_required, validate_time, ValidationError,
};
