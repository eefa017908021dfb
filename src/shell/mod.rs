pub mod banner;
pub mod command;
pub mod defaults;
pub mod environ;
pub mod error;
pub mod execute;
pub mod executor;
pub mod lookup;
pub mod real;
