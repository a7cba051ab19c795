mod id;
pub use id::TaskId;

mod spec;
pub use spec::{RegistryAuth, Resources, TaskSpec};

mod status;
pub use status::TaskStatus;
