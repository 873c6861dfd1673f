//! litewrap: a typed, ownership-safe wrapper over the SQLite C API.
//!
//! The raw engine interface is untyped, returns error codes and requires
//! manual handle lifetimes. This crate turns it into an owned object model:
//! [`Connection`] and [`Statement`] release their handles on drop, every
//! fallible call returns a [`Result`] with a classified [`Error`], parameters
//! bind by position or name, and columns read back through typed getters.
//!
//! ```
//! use litewrap::{Connection, Result};
//!
//! fn run() -> Result<()> {
//!     let conn = Connection::open_in_memory()?;
//!     conn.exec("CREATE TABLE t(id INTEGER, name TEXT)")?;
//!
//!     let mut insert = conn.prepare("INSERT INTO t VALUES (:id, :name)")?;
//!     insert.bind(":id", 1)?;
//!     insert.bind(":name", "a")?;
//!     insert.step()?;
//!
//!     let mut select = conn.prepare("SELECT id, name FROM t")?;
//!     while select.step()? {
//!         let id: i64 = select.get_int64("id")?;
//!         let name = select.get_string("name")?;
//!         println!("{id}: {name}");
//!     }
//!     Ok(())
//! }
//! # run().unwrap();
//! ```

// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod column;
pub mod connection;
pub mod engine;
pub mod statement;
pub mod value;

pub use crate::core::{Error, Result};

pub use column::{Column, FromColumn};
pub use connection::{Connection, OpenFlags};
pub use statement::{Bindable, ColumnIndex, ParamIndex, Parameter, Statement};
pub use value::{Blob, DataType, Value};
