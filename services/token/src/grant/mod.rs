pub mod extractor;
pub mod params;
pub mod pkce;

pub use extractor::{Grant, GrantExtractor, GrantRequest};
pub use params::{extract_client_auth, ClientAuth, GrantType, RequestContext, TokenRequestForm};
