//! Deployment topology of the video similarity search service.
//!
//! The stack is a vector search collection, a container function reading
//! `SAGEMAKER_ENDPOINT` and `OPENSEARCH_HOST`, its execution role and
//! grants, the collection's data access and network policies, and an HTTP
//! API routing five POST paths to the function. [`stack::synthesize`]
//! declares all of it into a CloudFormation [`template::Template`].

pub mod config;
pub mod error;
pub mod expr;
pub mod resolve;
pub mod stack;
pub mod template;
pub mod tools;
pub mod types;

pub use config::StackConfig;
pub use error::{ResolveError, SynthError, SynthResult};
pub use expr::Expr;
pub use stack::{synthesize, Parameters, SynthesizedStack};
pub use template::{Template, TemplateFormat};
