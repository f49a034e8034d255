pub mod publisher;

pub use publisher::{b64_enc, Jwk, Jwks, JwksPublisher};
