//! Message handling - Event-driven message processing

pub mod dispatcher;
pub mod parser;

pub use dispatcher::EventDispatcher;
pub use parser::MessageParser;
