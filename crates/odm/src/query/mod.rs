//! Query derivation and compilation.
//!
//! Method names are parsed into a [`QueryMethod`] once, at registration. Each
//! invocation binds [`QueryArgs`] and compiles a [`QueryPlan`]:
//!
//! ```ignore
//! let method = MethodNameParser::new(&registry).derive("findByNameAndPrice", &metadata)?;
//! let plan = QueryCompiler::new(&converter, &config)
//!     .compile(&method, &metadata, &QueryArgs::new().arg("Foo").arg(10))?;
//! ```

mod compiler;
mod parser;
mod plan;
mod predicate;
mod template;

pub use compiler::QueryCompiler;
pub use parser::MethodNameParser;
pub use plan::{PointInTime, QueryArgs, QueryPlan, TrackTotalHits};
pub use predicate::{Condition, Operator, Predicate, PropertyPath, QueryMethod, Subject};
pub use template::StringQuery;
