pub mod backend;
pub mod geometry;
pub mod io;
pub mod session;
pub mod solve;
pub mod store;
pub mod tracking;
