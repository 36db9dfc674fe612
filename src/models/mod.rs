//! Wire models shared by the client, the gate and the command line.

pub mod common;
pub mod notification;
pub mod ride;
pub mod user;

pub use notification::*;
pub use ride::*;
pub use user::*;
