pub mod crud;
pub mod validation;

pub use crud::ResourceService;
pub use validation::RequestValidator;
