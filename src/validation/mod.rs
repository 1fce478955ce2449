pub mod deep_equal;
pub mod problem;
pub mod schema;
pub mod validator;

pub use deep_equal::is_deeply_equal;
pub use problem::{Problem, ProblemType, ValidationResult};
pub use schema::SchemaStore;
pub use validator::{ActualResponse, ResponseValidator};
