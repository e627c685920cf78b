//! Admission gate and the interceptor boundary around guarded operations.

mod admission;
mod interceptor;
mod registry;

pub use admission::{Admission, AdmissionGate, FailurePolicy, Rejection, RejectionReason};
pub use interceptor::{ip_identity, Interceptor};
pub use registry::OperationRegistry;
