pub mod calculator;
pub mod clock;
pub mod registry;
pub mod search;

pub use calculator::CalculatorTool;
pub use clock::CurrentTimeTool;
pub use registry::{Tool, ToolDefinition, ToolRegistry};
pub use search::JinaSearchTool;
