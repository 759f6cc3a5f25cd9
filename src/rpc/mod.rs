//! External RPC Surface (spec §4.13, component C13): one axum router per
//! service, bound to its own default port. No gRPC/IDL/codegen — plain JSON
//! over HTTP, the same way the teacher exposes its OpenAI-compatible API.

pub mod deploy;
pub mod error;
pub mod prompt;
pub mod runtime;

pub use deploy::{router as deploy_router, DeployState};
pub use error::RpcError;
pub use prompt::{router as prompt_router, PromptState};
pub use runtime::{router as runtime_router, RuntimeState};
