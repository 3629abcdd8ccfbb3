//! Static typing rules applied by the compiler before any row is processed.
//!
//! The rules are pure functions over operand types. `None` stands for the
//! untyped `null` literal, which is compatible with every type.

pub use self::error::TypeRuleError;

// --- MODULE DECLARATIONS ---
pub mod checker;
pub mod error;
pub mod rules {
    pub mod arithmetic;
    pub mod cast;
}
