pub mod codec;
pub mod descriptor;
pub mod store;

pub use codec::ParamMap;
pub use descriptor::{SessionDescriptor, SessionMode, Timeline};
pub use store::{DescriptorStore, LinkStore};
