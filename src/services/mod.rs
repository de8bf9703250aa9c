pub mod inspect;
pub mod registry;
pub mod upload;

pub use inspect::{ImageReport, InspectService};
pub use registry::{RegistrationOutcome, Registry, RegistryError};
pub use upload::{Upload, media_type_for_path};
