pub mod factory;
pub mod generator;
pub mod response;

pub use factory::TokenFactory;
pub use generator::TokenGenerator;
pub use response::TokenResponse;
