//! Built-in functions every router registers.

use pr_01_dispatcher::{FunctionRegistry, InboundContext, RegistryBuilder};
use serde_json::{json, Value};

/// Name of the liveness function.
pub const PING: &str = "ping";

/// Liveness check: echoes its input back with the answering function name.
pub async fn ping(input: Value, context: InboundContext) -> anyhow::Result<Value> {
    Ok(json!({
        "pong": true,
        "function": context.function_name,
        "echo": input,
    }))
}

/// A registry builder with the built-ins already registered.
pub fn with_builtins() -> RegistryBuilder {
    FunctionRegistry::builder().register(PING, ping)
}
