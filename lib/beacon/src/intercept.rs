//! Observation hooks around named tracker and beacon operations.
//!
//! An observer attached to an operation runs synchronously, with the same
//! receiver and arguments, right before the operation itself. It cannot change
//! the arguments, the result or whether the operation runs. Observers on the
//! same operation compose like wrappers: the most recently attached one runs
//! first.

use crate::args::{GlobalsInput, SendArgs, UrlInput};
use crate::tracker::{Beacon, Tracker};
use crate::value::Params;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Encode,
    Dispatch,
    Send,
    Merge,
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Create => "create",
            Op::Encode => "encode",
            Op::Dispatch => "dispatch",
            Op::Send => "send",
            Op::Merge => "merge",
        }
    }
}

/// An interceptable operation: either on the tracker (the factory) or on
/// every beacon it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Factory(Op),
    Instance(Op),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterceptError {
    #[error("invalid interception target '{0}': expected 'factory.<op>' or 'instance.<op>'")]
    InvalidTarget(String),
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
}

impl FromStr for Target {
    type Err = InterceptError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let (prefix, op) = name
            .split_once('.')
            .ok_or_else(|| InterceptError::InvalidTarget(name.to_string()))?;

        match prefix.to_ascii_lowercase().as_str() {
            "factory" => match op {
                "create" => Ok(Target::Factory(Op::Create)),
                "encode" => Ok(Target::Factory(Op::Encode)),
                "dispatch" => Ok(Target::Factory(Op::Dispatch)),
                _ => Err(InterceptError::UnknownOperation(name.to_string())),
            },
            "instance" => match op {
                "send" => Ok(Target::Instance(Op::Send)),
                "merge" => Ok(Target::Instance(Op::Merge)),
                _ => Err(InterceptError::UnknownOperation(name.to_string())),
            },
            _ => Err(InterceptError::InvalidTarget(name.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Factory(op) => write!(f, "factory.{}", op.name()),
            Target::Instance(op) => write!(f, "instance.{}", op.name()),
        }
    }
}

/// One invocation of an interceptable operation: its receiver and arguments.
pub enum Call<'a> {
    Create {
        tracker: &'a Tracker,
        url: &'a UrlInput,
        globals: &'a GlobalsInput,
    },
    Encode {
        tracker: &'a Tracker,
        params: &'a Params,
        url: &'a str,
    },
    Dispatch {
        tracker: &'a Tracker,
        params: &'a Params,
        url: &'a str,
    },
    Send {
        beacon: &'a Beacon,
        args: &'a SendArgs,
    },
    /// `globals` are the beacon's globals, already resolved for this send.
    Merge {
        beacon: &'a Beacon,
        params: &'a Params,
        globals: &'a Params,
    },
}

impl Call<'_> {
    pub fn target(&self) -> Target {
        match self {
            Call::Create { .. } => Target::Factory(Op::Create),
            Call::Encode { .. } => Target::Factory(Op::Encode),
            Call::Dispatch { .. } => Target::Factory(Op::Dispatch),
            Call::Send { .. } => Target::Instance(Op::Send),
            Call::Merge { .. } => Target::Instance(Op::Merge),
        }
    }

    /// The tracker the call runs against, directly or through its beacon.
    pub fn tracker(&self) -> &Tracker {
        match self {
            Call::Create { tracker, .. }
            | Call::Encode { tracker, .. }
            | Call::Dispatch { tracker, .. } => tracker,
            Call::Send { beacon, .. } | Call::Merge { beacon, .. } => beacon.tracker(),
        }
    }
}

pub type Observer = Arc<dyn Fn(&Call<'_>) + Send + Sync>;

/// Observer chains, one per target.
#[derive(Clone, Default)]
pub struct Interceptors {
    chains: HashMap<Target, Vec<Observer>>,
}

impl Interceptors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `observer` to the operation named `"factory.<op>"` or `"instance.<op>"`.
    pub fn intercept<F>(&mut self, name: &str, observer: F) -> Result<(), InterceptError>
    where
        F: Fn(&Call<'_>) + Send + Sync + 'static,
    {
        let target = name.parse::<Target>()?;
        self.attach(target, Arc::new(observer));
        Ok(())
    }

    pub fn attach(&mut self, target: Target, observer: Observer) {
        self.chains.entry(target).or_default().push(observer);
    }

    /// Append every chain of `other` after the observers already attached here.
    pub fn extend(&mut self, other: Interceptors) {
        for (target, observers) in other.chains {
            self.chains.entry(target).or_default().extend(observers);
        }
    }

    /// Run the observers for `call`, newest first.
    pub fn observe(&self, call: &Call<'_>) {
        if let Some(chain) = self.chains.get(&call.target()) {
            for observer in chain.iter().rev() {
                observer(call);
            }
        }
    }

    pub fn count(&self, target: Target) -> usize {
        self.chains.get(&target).map_or(0, Vec::len)
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (target, chain) in &self.chains {
            map.entry(&target.to_string(), &chain.len());
        }
        map.finish()
    }
}
