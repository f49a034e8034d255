pub mod claims;
pub mod encoder;

pub use claims::{scope_claims, subject_for, IdToken};
pub use encoder::JwtEncoder;
