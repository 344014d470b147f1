pub mod batch;
pub mod capability;
pub mod codec;
pub mod container;
pub mod envelope;
pub mod error;
pub mod resolver;
pub mod response;

pub use batch::{creation_ref, Arguments, BackReference, Batch, BatchStep, StepRef};
pub use capability::CapabilitySet;
pub use codec::{decode_response, encode_request, MethodResponse, WireRequest, WireResponse};
pub use container::{find_container, Container};
pub use envelope::{GetResponse, QueryResponse, SetResponse};
pub use error::{
    BuildError, JmapError, MethodError, Rejection, RejectionKind, Result, SetError,
};
pub use response::{BatchResponse, StepResult};
