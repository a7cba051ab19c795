mod domain;
pub use domain::{DISCOVERY_SEEDS_ENV, LABEL_DISCOVER};
pub use domain::{Env, Flag, KeyValue, Labels};

mod error;
pub use error::{ModelError, ModelResult};

mod task;
pub use task::{RegistryAuth, Resources, TaskId, TaskSpec, TaskStatus};

mod container;
pub use container::{ContainerConfig, ContainerId, ContainerState};
