//! Debugger backend profiles.
//!
//! Each supported debug adapter speaks its own expression dialect and wraps
//! standard containers in its own internals, so "take the address of the first
//! element" is spelled differently per adapter. Profiles are plain data: adding
//! an adapter means adding one row to [`PROFILES`].

use std::fmt::{Display, Formatter};

/// Debug adapter driving a session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Backend {
    /// `cppdbg`: GDB (or LLDB) behind the MI engine.
    CppDbg,
    /// `cppvsdbg`: the Visual Studio Windows debugger.
    CppVsDbg,
    /// `lldb`: CodeLLDB.
    CodeLldb,
    Unknown,
}

impl Backend {
    /// Map a DAP adapter type (the `type` of a launch configuration) to a backend.
    pub fn from_adapter_type(adapter: &str) -> Self {
        match adapter.trim().to_ascii_lowercase().as_str() {
            "cppdbg" | "gdb" => Backend::CppDbg,
            "cppvsdbg" | "vsdbg" => Backend::CppVsDbg,
            "lldb" | "codelldb" | "lldb-dap" => Backend::CodeLldb,
            _ => Backend::Unknown,
        }
    }

    pub fn profile(self) -> &'static Profile {
        PROFILES
            .iter()
            .find(|p| p.backend == self)
            .unwrap_or(&GENERIC_PROFILE)
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Backend::CppDbg => "cppdbg",
            Backend::CppVsDbg => "cppvsdbg",
            Backend::CodeLldb => "lldb",
            Backend::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Layout of the container holding the buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Shape {
    /// Heap allocated contiguous container (`std::vector<T>` and friends).
    Flat,
    /// Inline fixed-size array (`std::array<T, N>`, `T[N]`).
    FixedArray,
    /// Nested container of rows.
    Matrix,
    /// Nested container of planes.
    Tensor,
}

impl Shape {
    /// Number of container levels that must be traversed to reach the first element.
    pub fn dims(self) -> usize {
        match self {
            Shape::Flat | Shape::FixedArray => 1,
            Shape::Matrix => 2,
            Shape::Tensor => 3,
        }
    }
}

/// Evaluate request flavour accepted by a backend.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Dialect {
    /// DAP `evaluate` context.
    pub context: &'static str,
    /// Prefix switching the adapter into native expression mode.
    pub prefix: &'static str,
}

/// Ordered expression templates per shape, `{name}` is substituted with the variable name.
#[derive(Debug)]
pub struct Profile {
    pub backend: Backend,
    pub dialect: Dialect,
    flat: &'static [&'static str],
    fixed: &'static [&'static str],
    matrix: &'static [&'static str],
    tensor: &'static [&'static str],
}

impl Profile {
    /// Expression templates for a shape, cheapest first.
    pub fn templates(&self, shape: Shape) -> &'static [&'static str] {
        match shape {
            Shape::Flat => self.flat,
            Shape::FixedArray => self.fixed,
            Shape::Matrix => self.matrix,
            Shape::Tensor => self.tensor,
        }
    }

    /// Ready-to-send candidate expressions for a variable.
    pub fn candidates(&self, shape: Shape, name: &str) -> Vec<String> {
        self.templates(shape)
            .iter()
            .map(|tpl| self.expression(tpl, name))
            .collect()
    }

    /// Render a template in this backend dialect.
    pub fn expression(&self, template: &str, name: &str) -> String {
        format!("{}{}", self.dialect.prefix, template.replace("{name}", name))
    }
}

const WATCH: Dialect = Dialect {
    context: "watch",
    prefix: "",
};

static PROFILES: [Profile; 3] = [
    Profile {
        backend: Backend::CppDbg,
        dialect: WATCH,
        flat: &[
            "{name}._M_impl._M_start",
            "&{name}[0]",
            "{name}.data()",
            "&{name}.operator[](0)",
        ],
        fixed: &[
            "&{name}._M_elems[0]",
            "&{name}[0]",
            "{name}.data()",
            "&{name}",
        ],
        matrix: &[
            "{name}[0]._M_impl._M_start",
            "{name}._M_impl._M_start[0]._M_impl._M_start",
            "&{name}[0][0]",
            "{name}[0].data()",
        ],
        tensor: &[
            "{name}[0][0]._M_impl._M_start",
            "&{name}[0][0][0]",
            "{name}[0][0].data()",
        ],
    },
    Profile {
        backend: Backend::CppVsDbg,
        dialect: WATCH,
        flat: &[
            "{name}._Mypair._Myval2._Myfirst",
            "&{name}[0]",
            "{name}.data()",
        ],
        fixed: &["&{name}._Elems[0]", "&{name}[0]", "&{name}"],
        matrix: &[
            "{name}[0]._Mypair._Myval2._Myfirst",
            "&{name}[0][0]",
            "{name}[0].data()",
        ],
        tensor: &[
            "{name}[0][0]._Mypair._Myval2._Myfirst",
            "&{name}[0][0][0]",
        ],
    },
    Profile {
        backend: Backend::CodeLldb,
        dialect: Dialect {
            context: "watch",
            prefix: "/nat ",
        },
        flat: &[
            "{name}.__begin_",
            "{name}._M_impl._M_start",
            "&{name}[0]",
            "{name}.data()",
        ],
        fixed: &[
            "&{name}.__elems_[0]",
            "&{name}._M_elems[0]",
            "&{name}[0]",
            "&{name}",
        ],
        matrix: &[
            "{name}[0].__begin_",
            "{name}[0]._M_impl._M_start",
            "&{name}[0][0]",
            "{name}[0].data()",
        ],
        tensor: &[
            "{name}[0][0].__begin_",
            "{name}[0][0]._M_impl._M_start",
            "&{name}[0][0][0]",
        ],
    },
];

static GENERIC_PROFILE: Profile = Profile {
    backend: Backend::Unknown,
    dialect: WATCH,
    flat: &["&{name}[0]", "{name}.data()"],
    fixed: &["&{name}[0]", "&{name}"],
    matrix: &["&{name}[0][0]", "{name}[0].data()"],
    tensor: &["&{name}[0][0][0]"],
};
