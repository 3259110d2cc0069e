use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Variables keep their definition order so context dumps are deterministic.
type VarMap = IndexMap<String, Value, ahash::RandomState>;

/// The three named frames a variable reference can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum FrameKind {
    /// `GF` — the global frame, always present.
    #[strum(serialize = "GF")]
    Global,
    /// `LF` — the top of the frame stack, absent when the stack is empty.
    #[strum(serialize = "LF")]
    Local,
    /// `TF` — the temporary frame, absent until `CREATEFRAME`.
    #[strum(serialize = "TF")]
    Temporary,
}

/// A frame of named variables.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    vars: VarMap,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name` as an `Undefined` entry; false when it already exists.
    pub fn define(&mut self, name: &str) -> bool {
        if self.vars.contains_key(name) {
            return false;
        }
        self.vars.insert(name.to_owned(), Value::Undefined);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.vars.get_mut(name)
    }

    /// Renders the frame's variables in definition order.
    pub fn dump_into(&self, out: &mut String) {
        if self.vars.is_empty() {
            out.push_str("The frame is empty.\n");
            return;
        }
        for (name, value) in &self.vars {
            let _ = writeln!(
                out,
                "Variable '{name}', type {:?}: '{}'",
                value.data_type(),
                value.diagnostic_text()
            );
        }
    }
}
