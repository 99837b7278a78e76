pub mod error;
pub mod feishu;
mod http;
pub mod jimeng;
pub mod juejin;
pub mod mcp;
pub mod settings;
pub mod tasks;
pub mod wechat;

pub use error::{Error, PublishStep, Result};
pub use jimeng::types::{GenerationRequest, ImageModel, JobId, JobStatus};
pub use jimeng::{JimengClient, PollPolicy};
