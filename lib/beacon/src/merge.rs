use crate::value::{Globals, Params};

/// Combine a beacon's globals with the parameters of one send.
///
/// The globals are copied and every lazy value is resolved exactly once
/// before the call parameters are laid over them, so a key supplied by the
/// call always wins. The caller's `globals` are never modified.
pub fn merge(globals: &Globals, call: &Params) -> Params {
    overlay(resolve_globals(globals), call)
}

/// Copy `globals`, invoking each lazy value once.
pub fn resolve_globals(globals: &Globals) -> Params {
    globals
        .iter()
        .map(|(key, value)| (key.clone(), value.resolve()))
        .collect()
}

/// Lay `call` over already resolved globals.
pub fn overlay(mut resolved: Params, call: &Params) -> Params {
    for (key, value) in call {
        resolved.insert(key.clone(), value.clone());
    }
    resolved
}
