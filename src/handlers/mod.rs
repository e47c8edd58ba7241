//! Command Handlers module
//!
//! Handlers that validate commands and orchestrate the stores.
//! Each handler is constructed per request from the shared pool.

mod commands;
mod deactivate_user_handler;
mod transfer_handler;
mod update_user_handler;
mod user_handler;


pub use commands::*;
pub use deactivate_user_handler::DeactivateUserHandler;
pub use transfer_handler::TransferHandler;
pub use update_user_handler::UpdateUserHandler;
pub use user_handler::CreateUserHandler;
