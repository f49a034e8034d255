pub mod grant;
pub mod provider;
pub mod user;
pub mod validity;

pub use grant::{AuthorizationCode, RefreshToken};
pub use provider::{Application, ClientType, OAuth2Provider, RedirectUris, SubjectMode};
pub use user::{Credential, TokenIntent, User, USER_ATTRIBUTE_SA};
pub use validity::TokenValidity;
