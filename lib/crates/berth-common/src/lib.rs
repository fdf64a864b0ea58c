pub mod request;
pub mod status;

pub use request::{
    CONFIG_FILE_NAME, Channel, FileSpec, ParseChannelError, ProviderCredential,
    ProvisioningRequest, ToolCredential,
};
pub use status::{AgentRuntimeState, AgentStats, CreateOutcome, OfflineAlert, StatusEvent};
