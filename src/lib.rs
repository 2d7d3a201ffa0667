//! Accessibility-check scripts: parse `@action` files, evaluate conditions
//! against a variable store and drive a browser session through the actions.

pub mod driver;
pub mod error_style;
pub mod interpreter;
pub mod kernel;
pub mod packets;
pub mod router;
