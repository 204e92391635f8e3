pub mod activities;
pub mod groups;
pub mod members;
