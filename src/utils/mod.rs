pub mod address_validator;
pub mod hex_utils;
pub mod units;

pub use address_validator::AddressValidator;
pub use units::{format_units, parse_units};
