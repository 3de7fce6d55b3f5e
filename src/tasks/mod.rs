pub mod actions;
pub mod assignment;
pub mod capacity;
pub mod context;
pub mod data;
pub mod execution;
pub mod handlers;
pub mod rules;
