//! The Mini type system
//!
//! A closed set of three scalar kinds plus the implicit/explicit conversion
//! matrix every operator and assignment goes through. The corresponding IR
//! conversion instructions live in the code generator; this module only
//! answers "is this pair of types convertible, and how".

/// A Mini scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Double,
    Bool,
}

impl Type {
    /// Source-level spelling.
    pub fn name(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Double => "double",
            Type::Bool => "bool",
        }
    }

    /// Spelling in the emitted IR.
    pub fn ir_name(self) -> &'static str {
        match self {
            Type::Int => "i32",
            Type::Double => "double",
            Type::Bool => "i1",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Double)
    }

    /// Conversions applied automatically by assignments and arithmetic
    /// promotion.
    pub fn implicitly_convertible_to(self, to: Type) -> bool {
        matches!(
            (self, to),
            (Type::Int, Type::Int)
                | (Type::Int, Type::Double)
                | (Type::Double, Type::Double)
                | (Type::Bool, Type::Bool)
        )
    }

    /// Conversions reachable through an explicit `int(...)` / `double(...)`
    /// cast. A strict superset of the implicit matrix.
    pub fn explicitly_convertible_to(self, to: Type) -> bool {
        self.implicitly_convertible_to(to)
            || matches!((self, to), (Type::Double, Type::Int) | (Type::Bool, Type::Int))
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
