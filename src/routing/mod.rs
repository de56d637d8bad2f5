//! Rule-based message routing.

pub mod grammar;
pub mod router;
pub mod substitute;

pub use grammar::{parse, validate_lines, Destination, Operator, Route, SyntaxError};
pub use router::{RouteOutcome, Router};
pub use substitute::SubstitutionContext;
