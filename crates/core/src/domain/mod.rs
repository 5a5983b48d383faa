pub mod approval;
pub mod kind;
pub mod parcel;
pub mod pending;
pub mod principal;
