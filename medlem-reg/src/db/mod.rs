//! Registration service database queries
//!
//! All mutating queries take `&mut SqliteConnection` so they compose inside
//! one admission transaction; handlers acquire a connection from the pool
//! for reads.

pub mod events;
pub mod registrations;
