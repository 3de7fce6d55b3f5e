pub mod buildqueue;
pub mod layout;
pub mod snapshot;
