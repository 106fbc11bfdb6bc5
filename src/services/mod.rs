pub mod codec;
pub mod digest;
pub mod irods_store;
pub mod local_store;
pub mod observer;
pub mod pipeline;
pub mod store;
