// Operator-facing operations, shared by the CLI and the MCP server.

pub mod preview;
pub mod reference;
pub mod synth;
pub mod validate;
