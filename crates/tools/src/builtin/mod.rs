//! Built-in local tools.

pub mod calculator;
pub mod echo;

pub use calculator::CalculatorTool;
pub use echo::EchoTool;
