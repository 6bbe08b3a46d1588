pub mod address;
pub mod clvm;
pub mod coinscript;
pub mod curry;
pub mod error;
pub mod expr;
pub mod hash;
pub mod includes;
pub mod opcodes;
pub mod parse;
pub mod puzzle;
pub mod serialize;
pub mod solution;
pub mod spend;
pub mod tree;

pub use clvm::{ClvmProgram, DEFAULT_MAX_COST};
pub use coinscript::{compile_file, compile_source, CompileOutput};
pub use error::{Error, Result};
pub use expr::Expression;
pub use puzzle::{Puzzle, PuzzleBuilder, Simulation, SolutionInput};
pub use solution::{ConditionsBuilder, SolutionBuilder, SolutionValue, StateValue};
pub use spend::{make_coin, SpendBundleBuilder};
pub use tree::{Atom, TreeNode};
