//! Rules shared by every approval kind: who may mutate approvals and parcels, and how request
//! payloads are checked before anything reaches the data layer.

pub mod policy;
pub mod validation;
