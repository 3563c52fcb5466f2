//! Set resolution.
//!
//! Expands a [`HandlerRef`] into the flat, ordered handler list a pipeline
//! runs. Names are looked up lazily, at resolution time, so a set may name
//! sets that are registered after it.
//!
//! ```text
//! base   = [h0]
//! level1 = ["base", h1]
//! level2 = ["level1", h2]
//!
//! resolve("level2") → [h0, h1, h2]      depth-first, left to right
//! ```

use std::collections::HashMap;

use crate::error::Error;
use crate::set::HandlerRef;

/// Registered sets of one handler kind, keyed by name.
pub(crate) type SetTable<H> = HashMap<String, Vec<HandlerRef<H>>>;

/// Flattens `reference` against `table`.
///
/// Fails with [`Error::UnknownSet`] on an unregistered name and with
/// [`Error::CyclicSet`] when a set reaches itself. A set named twice on
/// different branches (a diamond) is not a cycle and expands twice.
pub(crate) fn resolve<H: Clone>(table: &SetTable<H>, reference: &HandlerRef<H>) -> Result<Vec<H>, Error> {
    let mut out = Vec::new();
    let mut stack = Vec::new();
    expand(table, reference, &mut stack, &mut out)?;
    Ok(out)
}

/// `stack` holds the names currently being expanded, outermost first.
fn expand<H: Clone>(
    table: &SetTable<H>,
    reference: &HandlerRef<H>,
    stack: &mut Vec<String>,
    out: &mut Vec<H>,
) -> Result<(), Error> {
    match reference {
        HandlerRef::Handler(handler) => out.push(handler.clone()),
        HandlerRef::List(items) => {
            for item in items {
                expand(table, item, stack, out)?;
            }
        }
        HandlerRef::Name(name) => {
            if let Some(start) = stack.iter().position(|n| n == name) {
                let mut path = stack[start..].to_vec();
                path.push(name.clone());
                return Err(Error::CyclicSet(path));
            }
            let items = table.get(name).ok_or_else(|| Error::UnknownSet(name.clone()))?;

            stack.push(name.clone());
            for item in items {
                expand(table, item, stack, out)?;
            }
            stack.pop();
        }
    }
    Ok(())
}
