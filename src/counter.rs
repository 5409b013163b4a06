//! The demo counter object.
//!
//! `inc` and `dec` are exclusive and keep per-handler call counts next to the
//! counter; `count` is a shared read.

use offload_runtime::virtual_objects::{
    HandlerFuture, ObjectContext, ObjectDefinition, SharedObjectContext,
};
use serde_json::{Value, json};

pub const SERVICE: &str = "count";

const COUNT: &str = "count";
const INC_CALLED: &str = "incCalled";
const DEC_CALLED: &str = "decCalled";

fn inc<'a>(ctx: &'a mut ObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move {
        let count = ctx.get_i64(COUNT).unwrap_or(0).saturating_add(1);
        let inc = ctx.get_i64(INC_CALLED).unwrap_or(0).saturating_add(1);
        ctx.set(COUNT, count);
        ctx.set(INC_CALLED, inc);
        Ok(json!({ "count": count, "inc": inc }))
    })
}

fn dec<'a>(ctx: &'a mut ObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move {
        let count = ctx.get_i64(COUNT).unwrap_or(0).saturating_sub(1);
        let dec = ctx.get_i64(DEC_CALLED).unwrap_or(0).saturating_add(1);
        ctx.set(COUNT, count);
        ctx.set(DEC_CALLED, dec);
        Ok(json!({ "count": count, "dec": dec }))
    })
}

fn count<'a>(ctx: &'a SharedObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move { Ok(json!(ctx.get_i64(COUNT).unwrap_or(0))) })
}

/// Build the unwrapped counter definition.
///
/// # Errors
///
/// Returns `InvalidDefinition` if the handler set is malformed.
pub fn definition() -> offload_core::Result<ObjectDefinition> {
    ObjectDefinition::builder(SERVICE)
        .exclusive("inc", inc)
        .exclusive("dec", dec)
        .shared("count", count)
        .build()
}
