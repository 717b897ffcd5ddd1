//! One-line textual plan form.
//!
//! ```text
//! plan    := SCAN(table)
//!          | FILTER(plan, col op literal)
//!          | PROJECT(plan, col [, col]*)
//!          | JOIN(plan, plan, col op col)
//!          | AGG(plan, FUNC(col) [, GROUP col])
//!          | PARTIAL_AGG(plan, FUNC(col) [, GROUP col])
//!          | VALUES([name:type, ...] [, (literal, ...)]*)
//! col     := index | name | "quoted name"
//! op      := = | == | != | <> | < | <= | > | >=
//! literal := integer | float | 'text'
//! ```
//!
//! Keywords are case-insensitive. Inside quotes a doubled quote stands for
//! itself and `\\`, `\n`, `\r` are escapes.

mod lexer;
mod parser;

pub use parser::parse;
